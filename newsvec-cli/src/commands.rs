use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use newsvec_core::{
    BatchSummary, CodecSpec, Corpus, CorpusConfig, DistanceMetric, ExternalId, FilterBuilder,
    FilterOp, IngestBatch, IngestCoordinator, IngestPool, QueryFacade, QueryVector,
};
use crate::input::{parse_csv_vector, read_sample, JsonlReader};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open(config: CorpusConfig) -> Result<Corpus> {
    let data_dir = config.data_dir.clone();
    Corpus::open(config).with_context(|| format!("opening corpus at {}", data_dir.display()))
}

pub fn init(config: CorpusConfig, train: Option<&Path>, train_limit: usize) -> Result<()> {
    let sample = match train {
        Some(path) => read_sample(path, train_limit)?,
        None => Vec::new(),
    };
    let data_dir = config.data_dir.clone();
    let corpus = Corpus::create(config, &sample)
        .with_context(|| format!("creating corpus at {}", data_dir.display()))?;
    print_json(&corpus.stats())
}

#[derive(Debug, Serialize)]
struct FailedLine {
    /// 1-based record number in the input, blank lines excluded.
    record: usize,
    id: ExternalId,
    code: &'static str,
    error: String,
}

#[derive(Debug, Default, Serialize)]
struct IngestReport {
    batches: usize,
    inserted: usize,
    updated: usize,
    skipped: usize,
    failed: usize,
    last_seq: Option<u64>,
    failures: Vec<FailedLine>,
    duration_ms: u64,
}

impl IngestReport {
    fn record(&mut self, first_record: usize, summary: &BatchSummary) {
        self.batches += 1;
        self.inserted += summary.inserted;
        self.updated += summary.updated;
        self.skipped += summary.skipped;
        self.failed += summary.failed;
        if summary.seq.is_some() {
            self.last_seq = summary.seq;
        }
        self.failures.extend(summary.failures.iter().map(|f| FailedLine {
            record: first_record + f.index + 1,
            id: f.id.clone(),
            code: f.code,
            error: f.error.clone(),
        }));
    }
}

/// Stream a JSONL file through the ingestion pool, `batch_size` records
/// per batch.
pub async fn ingest(config: CorpusConfig, file: &Path, batch_size: usize, workers: Option<usize>) -> Result<()> {
    if batch_size == 0 {
        bail!("--batch-size must be > 0");
    }
    let start = Instant::now();
    let corpus = Arc::new(open(config)?);
    let workers = workers.unwrap_or(corpus.config().ingest_workers);
    let capacity = corpus.config().channel_capacity;
    let coordinator = Arc::new(IngestCoordinator::new(Arc::clone(&corpus)));
    let pool = IngestPool::start(coordinator, workers, capacity).context("starting ingestion")?;

    let mut reader = JsonlReader::open(file)?;
    let mut pending = Vec::new();
    let mut offset = 0;
    let read_result = loop {
        let records = match reader.next_batch(batch_size) {
            Ok(records) if records.is_empty() => break Ok(()),
            Ok(records) => records,
            Err(e) => break Err(e),
        };
        let count = records.len();
        match pool.submit(IngestBatch::new(records)).await {
            Ok(receiver) => pending.push((offset, receiver)),
            Err(e) => break Err(e.into()),
        }
        offset += count;
    };

    let mut report = IngestReport::default();
    let mut first_error = None;
    for (first_record, receiver) in pending {
        match receiver.await {
            Ok(Ok(summary)) => report.record(first_record, &summary),
            Ok(Err(e)) => {
                warn!(first_record, error = %e, "Batch failed");
                first_error.get_or_insert_with(|| anyhow::Error::new(e));
            }
            Err(_) => {
                first_error.get_or_insert_with(|| anyhow::anyhow!("ingest worker dropped a batch"));
            }
        }
    }
    pool.shutdown().await;
    report.duration_ms = start.elapsed().as_millis() as u64;

    info!(
        batches = report.batches,
        inserted = report.inserted,
        updated = report.updated,
        skipped = report.skipped,
        failed = report.failed,
        duration_ms = report.duration_ms,
        "Ingest finished"
    );
    print_json(&report)?;
    read_result?;
    match first_error {
        Some(e) => Err(e.context("ingest incomplete")),
        None => Ok(()),
    }
}

pub fn query(
    config: CorpusConfig,
    vector: Option<&str>,
    id: Option<&str>,
    k: usize,
    filters: &[String],
) -> Result<()> {
    let query = match (vector, id) {
        (Some(raw), None) => QueryVector::Raw(parse_csv_vector(raw)?),
        (None, Some(id)) => QueryVector::ById(ExternalId::new(id)),
        _ => bail!("exactly one of --vector or --id is required"),
    };
    let filter = filters
        .iter()
        .try_fold(FilterBuilder::new(), |builder, raw| {
            raw.parse::<FilterOp>()
                .map(|op| builder.condition(op))
                .with_context(|| format!("invalid filter '{}'", raw))
        })?
        .build();

    let facade = QueryFacade::new(Arc::new(open(config)?));
    let filter = (!filter.is_empty()).then_some(&filter);
    let hits = facade.similarity_search(query, k, filter).context("query failed")?;
    print_json(&hits)
}

pub fn document(config: CorpusConfig, id: &str) -> Result<()> {
    let facade = QueryFacade::new(Arc::new(open(config)?));
    let document = facade
        .document(&ExternalId::new(id))
        .with_context(|| format!("looking up '{}'", id))?;
    print_json(&document)
}

pub fn compact(config: CorpusConfig) -> Result<()> {
    let stats = open(config)?.compact().context("compaction failed")?;
    print_json(&stats)
}

pub fn recode(config: CorpusConfig, codec: CodecSpec, metric: Option<DistanceMetric>) -> Result<()> {
    let stats = open(config)?.recode(codec, metric).context("recode failed")?;
    print_json(&stats)
}

pub fn checkpoint(config: CorpusConfig) -> Result<()> {
    let manifest = open(config)?.checkpoint().context("checkpoint failed")?;
    print_json(&manifest)
}

#[derive(Serialize)]
struct StatsReport<'a> {
    #[serde(flatten)]
    stats: newsvec_core::CorpusStats,
    recovery: &'a newsvec_core::RecoveryReport,
}

pub fn stats(config: CorpusConfig) -> Result<()> {
    let corpus = open(config)?;
    print_json(&StatsReport {
        stats: corpus.stats(),
        recovery: corpus.recovery(),
    })
}
