#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;
    use crate::compression::CodecSpec;
    use crate::config::CorpusConfig;
    use crate::core::errors::{ErrorCode, NewsvecError};
    use crate::core::types::ExternalId;
    use crate::corpus::Corpus;
    use crate::ingest::{IngestBatch, IngestCoordinator, IngestPool, IngestRecord};
    use crate::metadata::MetadataRecord;
    use crate::storage::IngestLock;
    use crate::vector::distance::DistanceMetric;

    fn test_config(dir: &Path) -> CorpusConfig {
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

    fn meta(text: &str) -> MetadataRecord {
        MetadataRecord::new("test", text)
    }

    fn triple(id: &str, axis: usize, text: &str) -> IngestRecord {
        IngestRecord::new(id, unit(axis), meta(text))
    }

    fn setup() -> (TempDir, IngestCoordinator) {
        let dir = TempDir::new().unwrap();
        let corpus = Corpus::create(test_config(dir.path()), &[]).unwrap();
        (dir, IngestCoordinator::new(Arc::new(corpus)))
    }

    fn id(s: &str) -> ExternalId {
        ExternalId::new(s)
    }

    #[test]
    fn test_fresh_inserts_get_sequential_positions() {
        let (_dir, coordinator) = setup();
        let summary = coordinator
            .ingest(IngestBatch::new(vec![triple("doc1", 0, "a"), triple("doc2", 1, "b")]))
            .unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.seq, Some(1));

        let state = coordinator.corpus().read();
        assert_eq!(state.mapper().lookup(&id("doc1")), Some(0));
        assert_eq!(state.mapper().lookup(&id("doc2")), Some(1));
        assert_eq!(state.metadata_of(&id("doc2")).unwrap().text, "b");
        assert!(state.metadata_of(&id("doc2")).unwrap().ingested_at.is_some());
    }

    #[test]
    fn test_resubmission_is_idempotent() {
        let (_dir, coordinator) = setup();
        let records = vec![triple("doc1", 0, "a"), triple("doc2", 1, "b")];
        coordinator.ingest(IngestBatch::new(records.clone())).unwrap();

        let summary = coordinator.ingest(IngestBatch::new(records)).unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.inserted + summary.updated, 0);
        assert_eq!(summary.seq, None);
        assert_eq!(coordinator.corpus().read().seq(), 1);
    }

    #[test]
    fn test_update_keeps_position() {
        let (_dir, coordinator) = setup();
        coordinator.ingest(IngestBatch::new(vec![triple("doc1", 0, "meta_a")])).unwrap();

        let summary = coordinator
            .ingest(IngestBatch::new(vec![triple("doc1", 3, "meta_b")]))
            .unwrap();
        assert_eq!(summary.updated, 1);

        let state = coordinator.corpus().read();
        assert_eq!(state.mapper().live_count(), 1);
        assert_eq!(state.mapper().lookup(&id("doc1")), Some(0));
        assert_eq!(state.metadata_of(&id("doc1")).unwrap().text, "meta_b");
        assert_eq!(state.index().len(), 1);
        assert_eq!(state.index().tombstones(), 0);
    }

    #[test]
    fn test_metadata_only_change_is_an_update() {
        let (_dir, coordinator) = setup();
        coordinator.ingest(IngestBatch::new(vec![triple("doc1", 0, "a")])).unwrap();
        let summary = coordinator.ingest(IngestBatch::new(vec![triple("doc1", 0, "b")])).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(coordinator.corpus().read().metadata_of(&id("doc1")).unwrap().text, "b");
    }

    #[test]
    fn test_repeated_id_in_batch_is_insert_then_update() {
        let (_dir, coordinator) = setup();
        let summary = coordinator
            .ingest(IngestBatch::new(vec![
                triple("doc1", 0, "first"),
                triple("doc1", 1, "second"),
                triple("doc1", 1, "second"),
            ]))
            .unwrap();
        assert_eq!((summary.inserted, summary.updated, summary.skipped), (1, 1, 1));

        let state = coordinator.corpus().read();
        assert_eq!(state.mapper().live_count(), 1);
        assert_eq!(state.metadata_of(&id("doc1")).unwrap().text, "second");
        assert_eq!(state.index().next_position(), 1);
    }

    #[test]
    fn test_invalid_triples_are_reported_not_fatal() {
        let (_dir, coordinator) = setup();
        let mut nan = unit(2);
        nan[5] = f32::NAN;
        let summary = coordinator
            .ingest(IngestBatch::new(vec![
                triple("doc1", 0, "ok"),
                IngestRecord::new("short", vec![1.0, 2.0], meta("bad")),
                IngestRecord::new("nan", nan, meta("bad")),
            ]))
            .unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failures[0].index, 1);
        assert_eq!(summary.failures[0].code, ErrorCode::VectorDimensionMismatch.as_str());
        assert_eq!(summary.failures[1].id, id("nan"));
        assert_eq!(summary.total(), 3);
        assert!(coordinator.corpus().read().mapper().lookup(&id("short")).is_none());
    }

    #[test]
    fn test_stale_prepared_batch_aborts() {
        let (_dir, coordinator) = setup();
        let prepared = coordinator.prepare(IngestBatch::new(vec![triple("doc1", 0, "a")])).unwrap();
        coordinator.ingest(IngestBatch::new(vec![triple("doc2", 1, "b")])).unwrap();

        let err = coordinator.commit(prepared).unwrap_err();
        assert!(matches!(err, NewsvecError::BatchAborted { .. }));
        assert!(err.is_retryable());
        assert!(coordinator.corpus().read().mapper().lookup(&id("doc1")).is_none());

        let prepared = coordinator.prepare(IngestBatch::new(vec![triple("doc1", 0, "a")])).unwrap();
        assert_eq!(coordinator.commit(prepared).unwrap().inserted, 1);
    }

    #[test]
    fn test_dropped_prepared_batch_has_no_effect() {
        let (_dir, coordinator) = setup();
        let prepared = coordinator.prepare(IngestBatch::new(vec![triple("doc1", 0, "a")])).unwrap();
        assert_eq!(prepared.summary().inserted, 1);
        assert_eq!(prepared.ops().len(), 2);
        drop(prepared);

        let state = coordinator.corpus().read();
        assert_eq!(state.seq(), 0);
        assert_eq!(state.mapper().live_count(), 0);
    }

    #[test]
    fn test_remove_vector_keeps_metadata() {
        let (_dir, coordinator) = setup();
        coordinator.ingest(IngestBatch::new(vec![triple("doc1", 0, "a")])).unwrap();
        assert_eq!(coordinator.remove_vector(&id("doc1")).unwrap(), 0);

        {
            let state = coordinator.corpus().read();
            assert!(state.mapper().lookup(&id("doc1")).is_none());
            assert!(state.metadata_of(&id("doc1")).is_some());
            assert_eq!(state.index().tombstones(), 1);
        }
        assert!(matches!(
            coordinator.remove_vector(&id("doc1")),
            Err(NewsvecError::NotFound(_))
        ));

        // Re-ingesting gets a fresh position; the old one stays dead.
        let summary = coordinator.ingest(IngestBatch::new(vec![triple("doc1", 0, "a")])).unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(coordinator.corpus().read().mapper().lookup(&id("doc1")), Some(1));
    }

    #[test]
    fn test_metadata_only_lifecycle() {
        let (_dir, coordinator) = setup();
        coordinator.put_metadata(&id("doc9"), meta("orphan")).unwrap();
        assert!(coordinator.corpus().read().mapper().lookup(&id("doc9")).is_none());

        let summary = coordinator.ingest(IngestBatch::new(vec![triple("doc9", 4, "orphan")])).unwrap();
        assert_eq!(summary.inserted, 1);

        assert!(coordinator.delete_metadata(&id("doc9")).unwrap());
        assert!(!coordinator.delete_metadata(&id("doc9")).unwrap());
        assert!(coordinator.corpus().read().mapper().lookup(&id("doc9")).is_some());
    }

    #[test]
    fn test_delete_removes_both() {
        let (_dir, coordinator) = setup();
        coordinator.ingest(IngestBatch::new(vec![triple("doc1", 0, "a")])).unwrap();
        coordinator.delete(&id("doc1")).unwrap();
        {
            let state = coordinator.corpus().read();
            assert!(state.mapper().lookup(&id("doc1")).is_none());
            assert!(state.metadata_of(&id("doc1")).is_none());
        }
        assert!(matches!(coordinator.delete(&id("doc1")), Err(NewsvecError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_pool_commits_all_batches() {
        let (dir, coordinator) = setup();
        let coordinator = Arc::new(coordinator);
        let pool = IngestPool::start(Arc::clone(&coordinator), 3, 2).unwrap();
        assert!(IngestLock::is_held(&dir.path().join("ingest.lock")));

        let mut receivers = Vec::new();
        for b in 0..6 {
            let records = (0..4)
                .map(|i| triple(&format!("doc-{}-{}", b, i), (b + i) % 8, "text"))
                .collect();
            receivers.push(pool.submit(IngestBatch::new(records)).await.unwrap());
        }

        let err = coordinator.corpus().compact().unwrap_err();
        assert_eq!(err.code(), ErrorCode::MaintenanceLocked);

        let mut inserted = 0;
        for receiver in receivers {
            inserted += receiver.await.unwrap().unwrap().inserted;
        }
        pool.shutdown().await;

        assert_eq!(inserted, 24);
        assert!(!IngestLock::is_held(&dir.path().join("ingest.lock")));
        let state = coordinator.corpus().read();
        assert_eq!(state.mapper().live_count(), 24);
        assert_eq!(state.index().next_position(), 24);
    }

    #[tokio::test]
    async fn test_second_pool_is_refused() {
        let (_dir, coordinator) = setup();
        let coordinator = Arc::new(coordinator);
        let pool = IngestPool::start(Arc::clone(&coordinator), 1, 1).unwrap();
        assert!(matches!(
            IngestPool::start(Arc::clone(&coordinator), 1, 1),
            Err(NewsvecError::MaintenanceLocked(_))
        ));
        pool.shutdown().await;
    }
}
