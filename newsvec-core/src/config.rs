/// Corpus configuration.
///
/// Creation-time parameters (dimension, metric, codec) are written into the
/// manifest by `Corpus::create` and read back from it afterwards; the rest
/// are runtime knobs that may change between runs.

use std::env;
use std::path::PathBuf;
use tracing::warn;
use crate::compression::CodecSpec;
use crate::core::errors::{NewsvecError, Result};
use crate::vector::distance::DistanceMetric;

#[derive(Debug, Clone, PartialEq)]
pub struct CorpusConfig {
    /// Directory holding the manifest, snapshots and WAL.
    pub data_dir: PathBuf,

    /// Embedding dimensionality D.
    pub dimension: usize,

    /// Distance metric, fixed at creation.
    pub metric: DistanceMetric,

    /// Codec, fixed at creation and changed only by `recode`.
    pub codec: CodecSpec,

    /// Filtered queries fetch `k * overfetch_factor` candidates before
    /// filtering.
    pub overfetch_factor: usize,

    /// Committed batches between automatic checkpoints; 0 disables them.
    pub checkpoint_interval: u64,

    /// fsync the WAL after every batch.
    pub fsync: bool,

    /// Tasks in the ingestion worker pool.
    pub ingest_workers: usize,

    /// Bounded capacity of the ingestion channel, in batches.
    pub channel_capacity: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        CorpusConfig {
            data_dir: PathBuf::from("./newsvec-data"),
            dimension: 1024,
            metric: DistanceMetric::Cosine,
            codec: CodecSpec::Float32,
            overfetch_factor: 4,
            checkpoint_interval: 64,
            fsync: true,
            ingest_workers: 2,
            channel_capacity: 8,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = env::var(key) {
        match val.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value = %val, "Ignoring unparsable environment override"),
        }
    }
}

impl CorpusConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables (defaults in [`CorpusConfig::default`]):
    /// - NEWSVEC_DATA_DIR
    /// - NEWSVEC_DIMENSION
    /// - NEWSVEC_METRIC: cosine | euclidean | inner-product | hamming
    /// - NEWSVEC_CODEC: f32 | int8 | binary | pq:M[xK]
    /// - NEWSVEC_OVERFETCH_FACTOR
    /// - NEWSVEC_CHECKPOINT_INTERVAL
    /// - NEWSVEC_FSYNC: true | false
    /// - NEWSVEC_INGEST_WORKERS
    /// - NEWSVEC_CHANNEL_CAPACITY
    ///
    /// Unparsable values fall back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("NEWSVEC_DATA_DIR") {
            config.data_dir = PathBuf::from(val);
        }
        env_parse("NEWSVEC_DIMENSION", &mut config.dimension);
        env_parse("NEWSVEC_METRIC", &mut config.metric);
        env_parse("NEWSVEC_CODEC", &mut config.codec);
        env_parse("NEWSVEC_OVERFETCH_FACTOR", &mut config.overfetch_factor);
        env_parse("NEWSVEC_CHECKPOINT_INTERVAL", &mut config.checkpoint_interval);
        env_parse("NEWSVEC_FSYNC", &mut config.fsync);
        env_parse("NEWSVEC_INGEST_WORKERS", &mut config.ingest_workers);
        env_parse("NEWSVEC_CHANNEL_CAPACITY", &mut config.channel_capacity);

        config
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Validate configuration for sanity
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(NewsvecError::config("dimension must be > 0"));
        }
        if self.overfetch_factor == 0 {
            return Err(NewsvecError::config("overfetch_factor must be > 0"));
        }
        if self.ingest_workers == 0 {
            return Err(NewsvecError::config("ingest_workers must be > 0"));
        }
        if self.channel_capacity == 0 {
            return Err(NewsvecError::config("channel_capacity must be > 0"));
        }
        match (self.codec, self.metric) {
            (CodecSpec::Binary, DistanceMetric::Hamming) => {}
            (CodecSpec::Binary, _) | (_, DistanceMetric::Hamming) => {
                return Err(NewsvecError::config(
                    "the binary codec and the hamming metric must be used together",
                ))
            }
            (CodecSpec::Product { subspaces, .. }, _) if self.dimension % subspaces != 0 => {
                return Err(NewsvecError::config(format!(
                    "PQ subspace count {} does not divide dimension {}",
                    subspaces, self.dimension
                )))
            }
            _ => {}
        }

        if !self.fsync {
            warn!("WAL fsync disabled; committed batches may be lost on power failure");
        }
        if self.overfetch_factor > 100 {
            warn!(overfetch_factor = self.overfetch_factor, "Very large overfetch factor");
        }

        Ok(())
    }
}
