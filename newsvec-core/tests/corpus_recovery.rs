/// Crash recovery and persistence of a corpus directory: snapshot load,
/// WAL replay, torn tails and generation checks.

#[cfg(test)]
mod corpus_recovery_tests {
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::path::Path;
    use newsvec_core::storage::snapshot::MAPPING_FILE;
    use newsvec_core::storage::{snapshot_name, DataLayout, WalOp, WalRecord, WriteAheadLog};
    use newsvec_core::{
        CodecSpec, Corpus, CorpusConfig, DistanceMetric, ErrorCode, ExternalId, IngestBatch,
        IngestCoordinator, IngestRecord, MetadataRecord, NewsvecError, QuantizedVector,
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    fn config(dir: &Path) -> CorpusConfig {
        CorpusConfig {
            data_dir: dir.to_path_buf(),
            dimension: 8,
            metric: DistanceMetric::Cosine,
            codec: CodecSpec::Float32,
            checkpoint_interval: 0,
            fsync: false,
            ..CorpusConfig::default()
        }
    }

    fn unit(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; 8];
        v[axis] = 1.0;
        v
    }

    fn ingest(corpus: Arc<Corpus>, docs: &[(&str, usize)]) {
        let coordinator = IngestCoordinator::new(corpus);
        let records = docs
            .iter()
            .map(|(id, axis)| {
                IngestRecord::new(*id, unit(*axis), MetadataRecord::new("wire", format!("about {}", id)))
            })
            .collect();
        coordinator.ingest(IngestBatch::new(records)).unwrap();
    }

    fn id(s: &str) -> ExternalId {
        ExternalId::new(s)
    }

    /// Append a raw record to the WAL of a closed corpus.
    fn append_record(dir: &Path, record: &WalRecord) {
        let layout = DataLayout::new(dir);
        let scan = WriteAheadLog::scan(&layout.wal()).unwrap();
        let mut wal = WriteAheadLog::open(&layout.wal(), scan.valid_len, false).unwrap();
        wal.append(record).unwrap();
    }

    fn insert_record(seq: u64, generation: u64, doc: &str, position: u64, axis: usize) -> WalRecord {
        WalRecord::new(
            seq,
            generation,
            format!("manual-{}", seq),
            vec![
                WalOp::Insert {
                    id: id(doc),
                    position,
                    vector: QuantizedVector::Float32(unit(axis)),
                },
                WalOp::PutMetadata {
                    id: id(doc),
                    record: MetadataRecord::new("wire", "manual"),
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_committed_batches_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let corpus = Arc::new(Corpus::create(config(dir.path()), &[]).unwrap());
            ingest(Arc::clone(&corpus), &[("doc1", 0), ("doc2", 1)]);
            ingest(corpus, &[("doc3", 2)]);
        }

        let corpus = Corpus::open(config(dir.path())).unwrap();
        let report = corpus.recovery();
        assert_eq!(report.replayed_batches, 2);
        assert_eq!(report.last_seq, 2);
        assert_eq!(report.discarded_bytes, 0);

        let state = corpus.read();
        assert_eq!(state.mapper().lookup(&id("doc3")), Some(2));
        assert_eq!(state.metadata_of(&id("doc1")).unwrap().text, "about doc1");
        assert_eq!(state.index().len(), 3);
    }

    #[test]
    fn test_appended_but_unapplied_batch_is_replayed() {
        let dir = TempDir::new().unwrap();
        {
            let corpus = Arc::new(Corpus::create(config(dir.path()), &[]).unwrap());
            ingest(corpus, &[("doc1", 0)]);
        }
        append_record(dir.path(), &insert_record(2, 0, "doc9", 1, 5));

        let corpus = Corpus::open(config(dir.path())).unwrap();
        assert_eq!(corpus.recovery().replayed_batches, 2);
        let state = corpus.read();
        assert_eq!(state.mapper().lookup(&id("doc9")), Some(1));
        assert!(state.metadata_of(&id("doc9")).is_some());
        assert_eq!(state.seq(), 2);
    }

    #[test]
    fn test_torn_tail_is_discarded() {
        let dir = TempDir::new().unwrap();
        {
            let corpus = Arc::new(Corpus::create(config(dir.path()), &[]).unwrap());
            ingest(corpus, &[("doc1", 0)]);
        }
        let wal_path = DataLayout::new(dir.path()).wal();
        let torn = br#"{"seq":2,"generation":0,"batch_id":"torn","ops":[{"op":"ins"#;
        OpenOptions::new()
            .append(true)
            .open(&wal_path)
            .unwrap()
            .write_all(torn)
            .unwrap();

        {
            let corpus = Arc::new(Corpus::open(config(dir.path())).unwrap());
            assert_eq!(corpus.recovery().discarded_bytes, torn.len() as u64);
            assert_eq!(corpus.recovery().replayed_batches, 1);
            assert_eq!(corpus.read().mapper().live_count(), 1);

            // The log continues from the intact prefix.
            ingest(corpus, &[("doc2", 1)]);
        }

        let corpus = Corpus::open(config(dir.path())).unwrap();
        assert_eq!(corpus.recovery().discarded_bytes, 0);
        assert_eq!(corpus.recovery().replayed_batches, 2);
        assert_eq!(corpus.read().mapper().lookup(&id("doc2")), Some(1));
    }

    #[test]
    fn test_checkpoint_folds_wal_into_snapshot() {
        let dir = TempDir::new().unwrap();
        {
            let corpus = Arc::new(Corpus::create(config(dir.path()), &[]).unwrap());
            ingest(Arc::clone(&corpus), &[("doc1", 0), ("doc2", 1)]);
            let manifest = corpus.checkpoint().unwrap();
            assert_eq!(manifest.snapshot, snapshot_name(0, 1));
            assert_eq!(corpus.stats().wal_bytes, 0);
        }

        let snapshots: Vec<_> = fs::read_dir(DataLayout::new(dir.path()).snapshots())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(snapshots, vec![snapshot_name(0, 1)]);

        let corpus = Corpus::open(config(dir.path())).unwrap();
        assert_eq!(corpus.recovery().replayed_batches, 0);
        assert_eq!(corpus.recovery().snapshot, snapshot_name(0, 1));
        assert_eq!(corpus.read().mapper().live_count(), 2);
    }

    #[test]
    fn test_automatic_checkpoint() {
        let dir = TempDir::new().unwrap();
        let corpus = Arc::new(
            Corpus::create(
                CorpusConfig {
                    checkpoint_interval: 2,
                    ..config(dir.path())
                },
                &[],
            )
            .unwrap(),
        );
        ingest(Arc::clone(&corpus), &[("doc1", 0)]);
        assert_eq!(corpus.read().checkpoint_seq(), 0);
        ingest(Arc::clone(&corpus), &[("doc2", 1)]);

        let stats = corpus.stats();
        assert_eq!(stats.checkpoint_seq, 2);
        assert_eq!(stats.wal_bytes, 0);
        assert_eq!(stats.commits.checkpoints, 1);
    }

    #[test]
    fn test_records_covered_by_snapshot_are_skipped() {
        let dir = TempDir::new().unwrap();
        {
            let corpus = Arc::new(Corpus::create(config(dir.path()), &[]).unwrap());
            ingest(Arc::clone(&corpus), &[("doc1", 0)]);
            corpus.checkpoint().unwrap();
        }
        // A crash between manifest write and WAL reset leaves this behind.
        append_record(dir.path(), &insert_record(1, 0, "doc1", 0, 0));

        let corpus = Corpus::open(config(dir.path())).unwrap();
        assert_eq!(corpus.recovery().skipped_records, 1);
        assert_eq!(corpus.recovery().replayed_batches, 0);
        assert_eq!(corpus.read().mapper().live_count(), 1);
    }

    #[test]
    fn test_wal_gap_fails_recovery() {
        let dir = TempDir::new().unwrap();
        drop(Corpus::create(config(dir.path()), &[]).unwrap());
        append_record(dir.path(), &insert_record(5, 0, "doc1", 0, 0));

        let err = Corpus::open(config(dir.path())).err().unwrap();
        assert_eq!(err.code(), ErrorCode::WALReplayFailed);
    }

    #[test]
    fn test_generation_mismatch_rejected_on_open() {
        let dir = TempDir::new().unwrap();
        drop(Corpus::create(config(dir.path()), &[]).unwrap());

        let mapping = DataLayout::new(dir.path())
            .snapshot(&snapshot_name(0, 0))
            .join(MAPPING_FILE);
        let mut file: serde_json::Value = serde_json::from_slice(&fs::read(&mapping).unwrap()).unwrap();
        file["generation"] = serde_json::json!(7);
        fs::write(&mapping, serde_json::to_vec(&file).unwrap()).unwrap();

        let err = Corpus::open(config(dir.path())).err().unwrap();
        assert!(matches!(
            err,
            NewsvecError::GenerationMismatch { expected: 0, found: 7, .. }
        ));
    }

    #[test]
    fn test_create_refuses_existing_corpus() {
        let dir = TempDir::new().unwrap();
        drop(Corpus::create(config(dir.path()), &[]).unwrap());
        assert!(matches!(
            Corpus::create(config(dir.path()), &[]),
            Err(NewsvecError::ConfigError { .. })
        ));
        assert!(Corpus::open_or_create(config(dir.path())).is_ok());
    }

    #[test]
    fn test_manifest_parameters_win_on_open() {
        let dir = TempDir::new().unwrap();
        drop(Corpus::create(config(dir.path()), &[]).unwrap());

        let corpus = Corpus::open(CorpusConfig {
            dimension: 1024,
            codec: CodecSpec::Int8,
            ..config(dir.path())
        })
        .unwrap();
        assert_eq!(corpus.config().dimension, 8);
        assert_eq!(corpus.config().codec, CodecSpec::Float32);
    }

    #[test]
    fn test_checkpoint_refused_while_another_handle_ingests() {
        let dir = TempDir::new().unwrap();
        {
            let writer = Arc::new(Corpus::create(config(dir.path()), &[]).unwrap());
            let lock = writer.ingest_lock().unwrap();
            ingest(Arc::clone(&writer), &[("doc1", 0)]);

            let other = Corpus::open(config(dir.path())).unwrap();
            let err = other.checkpoint().unwrap_err();
            assert!(matches!(err, NewsvecError::MaintenanceLocked(_)));
            assert!(err.to_string().contains(&format!("pid {}", std::process::id())));

            ingest(Arc::clone(&writer), &[("doc2", 1)]);
            drop(other);
            drop(lock);
        }

        let corpus = Corpus::open(config(dir.path())).unwrap();
        assert_eq!(corpus.recovery().discarded_bytes, 0);
        assert_eq!(corpus.recovery().replayed_batches, 2);
        assert_eq!(corpus.read().mapper().lookup(&id("doc1")), Some(0));
        assert_eq!(corpus.read().mapper().lookup(&id("doc2")), Some(1));
    }

    #[test]
    fn test_commit_after_foreign_wal_reset_is_rejected() {
        let dir = TempDir::new().unwrap();
        {
            let writer = Arc::new(Corpus::create(config(dir.path()), &[]).unwrap());
            ingest(Arc::clone(&writer), &[("doc1", 0)]);

            // No ingest lock is held, so a second handle may checkpoint.
            Corpus::open(config(dir.path())).unwrap().checkpoint().unwrap();

            let coordinator = IngestCoordinator::new(Arc::clone(&writer));
            let batch = IngestBatch::new(vec![IngestRecord::new(
                "doc2",
                unit(1),
                MetadataRecord::new("wire", "late"),
            )]);
            let err = coordinator.ingest(batch).unwrap_err();
            assert_eq!(err.code(), ErrorCode::StorageIOError);
            assert_eq!(writer.read().mapper().lookup(&id("doc2")), None);
        }

        let corpus = Corpus::open(config(dir.path())).unwrap();
        assert_eq!(corpus.recovery().discarded_bytes, 0);
        assert_eq!(corpus.read().mapper().lookup(&id("doc1")), Some(0));
        assert_eq!(corpus.read().mapper().lookup(&id("doc2")), None);
    }

    #[test]
    fn test_failed_automatic_checkpoint_keeps_commit() {
        let dir = TempDir::new().unwrap();
        let corpus = Arc::new(
            Corpus::create(
                CorpusConfig {
                    checkpoint_interval: 1,
                    ..config(dir.path())
                },
                &[],
            )
            .unwrap(),
        );
        // Snapshots can no longer be written.
        let snapshots = DataLayout::new(dir.path()).snapshots();
        fs::remove_dir_all(&snapshots).unwrap();
        fs::write(&snapshots, b"").unwrap();

        let coordinator = IngestCoordinator::new(Arc::clone(&corpus));
        let summary = coordinator
            .ingest(IngestBatch::new(vec![IngestRecord::new(
                "doc1",
                unit(0),
                MetadataRecord::new("wire", "kept"),
            )]))
            .unwrap();
        assert_eq!(summary.seq, Some(1));
        assert_eq!(summary.inserted, 1);
        assert_eq!(corpus.read().mapper().lookup(&id("doc1")), Some(0));

        let stats = corpus.stats();
        assert_eq!(stats.checkpoint_seq, 0);
        assert_eq!(stats.commits.checkpoints, 0);
        assert!(stats.wal_bytes > 0);
    }
}
