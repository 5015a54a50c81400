#[cfg(test)]
mod tests {
    use crate::compression::binary_quant::BinaryQuantizer;
    use crate::compression::codec::CodecSpec;
    use crate::compression::pq::training::PQTrainer;
    use crate::compression::quantizer::{QuantizedVector, Quantizer};
    use crate::compression::scalar_quant::ScalarQuantizer;
    use crate::core::errors::{ErrorCode, NewsvecError};
    use crate::vector::distance::DistanceMetric;

    fn sample_vectors(n: usize, dim: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| {
                (0..dim)
                    .map(|d| (((i * 31 + d * 17) % 97) as f32 / 48.5) - 1.0)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_binary_quantizer_encode() {
        let quantizer = BinaryQuantizer::new(10);
        let encoded = quantizer.encode(&[0.5, -1.5, 0.0, 2.0, 1.0, 1.0, 1.0, 1.0, 0.1, -0.1]);
        assert_eq!(encoded, vec![0b1111_1001, 0b0000_0001]);
    }

    #[test]
    fn test_binary_quantizer_decode_is_unit_length() {
        let quantizer = BinaryQuantizer::new(4);
        let decoded = quantizer.decode(&quantizer.encode(&[0.1, -0.5, 0.9, -0.2]));
        assert_eq!(decoded, vec![0.5, -0.5, 0.5, -0.5]);
    }

    #[test]
    fn test_scalar_quantizer_encode_decode() {
        let data = vec![
            vec![0.0, 50.0, 100.0],
            vec![10.0, 60.0, 90.0],
        ];

        let quantizer = ScalarQuantizer::train(&data).unwrap();
        let encoded = quantizer.encode(&data[0]);
        assert_eq!(encoded[0], -128);
        assert_eq!(encoded[2], 127);
        let decoded = quantizer.decode(&encoded);
        for (orig, approx) in data[0].iter().zip(decoded.iter()) {
            assert!((orig - approx).abs() <= quantizer.max_error() + 1e-4);
        }
    }

    #[test]
    fn test_scalar_quantizer_saturates_out_of_range() {
        let quantizer = ScalarQuantizer::unit_range(2);
        assert_eq!(quantizer.encode(&[-7.0, 7.0]), vec![-128, 127]);
    }

    #[test]
    fn test_scalar_quantizer_constant_dimension() {
        let quantizer = ScalarQuantizer::train(&[vec![3.0], vec![3.0]]).unwrap();
        let decoded = quantizer.decode(&quantizer.encode(&[3.0]));
        assert_eq!(decoded, vec![3.0]);
    }

    #[test]
    fn test_pq_trainer_small() {
        let trainer = PQTrainer::new(2, 4);
        let training_data = vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![1.5, 2.5, 3.5, 4.5],
            vec![2.0, 3.0, 4.0, 5.0],
            vec![2.5, 3.5, 4.5, 5.5],
        ];

        let pq = trainer.train(&training_data, 4);
        assert_eq!(pq.subspaces(), 2);
        assert_eq!(pq.codebooks[0].len(), 4);
        // One centroid per distinct sample: training vectors reconstruct exactly.
        for v in &training_data {
            assert_eq!(&pq.decode(&pq.encode(v)), v);
        }
    }

    #[test]
    fn test_pq_training_is_deterministic() {
        let data = sample_vectors(64, 8);
        let a = PQTrainer::new(4, 8).train(&data, 8);
        let b = PQTrainer::new(4, 8).train(&data, 8);
        assert_eq!(a, b);
    }

    #[test]
    fn test_codec_spec_parsing() {
        assert_eq!("f32".parse::<CodecSpec>().unwrap(), CodecSpec::Float32);
        assert_eq!("INT8".parse::<CodecSpec>().unwrap(), CodecSpec::Int8);
        assert_eq!("binary".parse::<CodecSpec>().unwrap(), CodecSpec::Binary);
        assert_eq!(
            "pq:8".parse::<CodecSpec>().unwrap(),
            CodecSpec::Product { subspaces: 8, centroids: 256 }
        );
        assert_eq!(
            "pq:4x16".parse::<CodecSpec>().unwrap(),
            CodecSpec::Product { subspaces: 4, centroids: 16 }
        );
        assert!("pq:4x512".parse::<CodecSpec>().is_err());
        assert!("lz4".parse::<CodecSpec>().is_err());
        let spec = CodecSpec::Product { subspaces: 4, centroids: 16 };
        assert_eq!(spec.to_string().parse::<CodecSpec>().unwrap(), spec);
    }

    #[test]
    fn test_compression_ratio() {
        assert_eq!(CodecSpec::Int8.compression_ratio(1024), 4.0);
        assert_eq!(CodecSpec::Binary.compression_ratio(1024), 32.0);
        assert_eq!(CodecSpec::Float32.compression_ratio(1024), 1.0);
    }

    #[test]
    fn test_quantizer_rejects_wrong_dimension() {
        let q = Quantizer::train(CodecSpec::Int8, 4, DistanceMetric::Cosine, &[]).unwrap();
        assert_eq!(
            q.encode(&[1.0, 2.0]),
            Err(NewsvecError::DimensionMismatch { expected: 4, got: 2 })
        );
    }

    #[test]
    fn test_quantizer_metric_codec_pairing() {
        assert!(Quantizer::train(CodecSpec::Binary, 8, DistanceMetric::Cosine, &[]).is_err());
        assert!(Quantizer::train(CodecSpec::Int8, 8, DistanceMetric::Hamming, &[]).is_err());
        assert!(Quantizer::train(CodecSpec::Binary, 8, DistanceMetric::Hamming, &[]).is_ok());
    }

    #[test]
    fn test_quantizer_pq_requires_sample_and_divisible_dimension() {
        let spec = CodecSpec::Product { subspaces: 3, centroids: 4 };
        assert!(Quantizer::train(spec, 8, DistanceMetric::Euclidean, &sample_vectors(8, 8)).is_err());
        let spec = CodecSpec::Product { subspaces: 4, centroids: 4 };
        assert!(Quantizer::train(spec, 8, DistanceMetric::Euclidean, &[]).is_err());
    }

    #[test]
    fn test_encoding_is_bit_identical() {
        let data = sample_vectors(32, 8);
        for spec in [
            CodecSpec::Float32,
            CodecSpec::Int8,
            CodecSpec::Product { subspaces: 2, centroids: 8 },
        ] {
            let q = Quantizer::train(spec, 8, DistanceMetric::Euclidean, &data).unwrap();
            assert_eq!(q.encode(&data[3]).unwrap(), q.encode(&data[3]).unwrap());
        }
    }

    #[test]
    fn test_int8_round_trip_within_tolerance() {
        let data = sample_vectors(50, 16);
        let q = Quantizer::train(CodecSpec::Int8, 16, DistanceMetric::Cosine, &data).unwrap();
        let bound = q.error_bound().unwrap();
        for v in &data {
            let decoded = q.decode(&q.encode(v).unwrap()).unwrap();
            for (a, b) in v.iter().zip(decoded.iter()) {
                assert!((a - b).abs() <= bound + 1e-5);
            }
        }
    }

    #[test]
    fn test_binary_round_trip_preserves_signs() {
        let data = sample_vectors(10, 12);
        let q = Quantizer::train(CodecSpec::Binary, 12, DistanceMetric::Hamming, &[]).unwrap();
        for v in &data {
            let decoded = q.decode(&q.encode(v).unwrap()).unwrap();
            assert_eq!(DistanceMetric::Hamming.distance(v, &decoded), 0.0);
        }
    }

    #[test]
    fn test_quantized_distance_of_identical_vectors_is_zero() {
        let data = sample_vectors(16, 8);
        let cases = [
            (CodecSpec::Float32, DistanceMetric::Euclidean),
            (CodecSpec::Int8, DistanceMetric::Euclidean),
            (CodecSpec::Int8, DistanceMetric::Cosine),
            (CodecSpec::Binary, DistanceMetric::Hamming),
            (CodecSpec::Product { subspaces: 4, centroids: 4 }, DistanceMetric::Euclidean),
        ];
        for (spec, metric) in cases {
            let q = Quantizer::train(spec, 8, metric, &data).unwrap();
            let a = q.encode(&data[5]).unwrap();
            assert!(q.distance(&a, &a).abs() < 1e-5, "{} / {}", spec, metric);
        }
    }

    #[test]
    fn test_quantized_distance_tracks_raw_distance() {
        let data = sample_vectors(40, 16);
        let q = Quantizer::train(CodecSpec::Int8, 16, DistanceMetric::Euclidean, &data).unwrap();
        let a = q.encode(&data[0]).unwrap();
        let b = q.encode(&data[7]).unwrap();
        let raw = DistanceMetric::Euclidean.distance(&data[0], &data[7]);
        let bound = q.error_bound().unwrap() * 2.0 * (16.0_f32).sqrt();
        assert!((q.distance(&a, &b) - raw).abs() <= bound + 1e-4);
    }

    #[test]
    fn test_check_rejects_foreign_codes() {
        let q = Quantizer::train(CodecSpec::Int8, 4, DistanceMetric::Cosine, &[]).unwrap();
        let err = q.check(&QuantizedVector::Binary(vec![0])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidQuantizedVector);
        assert!(q.check(&QuantizedVector::Int8(vec![0; 3])).is_err());
        assert!(q.check(&QuantizedVector::Int8(vec![0; 4])).is_ok());
    }
}
