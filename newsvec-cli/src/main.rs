//! newsvec maintenance CLI
//!
//! ```bash
//! newsvec --data-dir ./corpus init --dimension 1024 --codec int8 --train sample.jsonl
//! newsvec --data-dir ./corpus ingest articles.jsonl --batch-size 500
//! newsvec --data-dir ./corpus query --id doc-42 --k 5 --filter tld=de
//! newsvec --data-dir ./corpus compact
//! newsvec --data-dir ./corpus recode --codec binary
//! ```

mod commands;
mod input;
mod logging;

use std::path::PathBuf;
use anyhow::Result;
use clap::{Parser, Subcommand};
use newsvec_core::{CodecSpec, CorpusConfig, DistanceMetric};
use logging::LogFormat;

#[derive(Parser)]
#[command(name = "newsvec")]
#[command(about = "Maintain a quantized news vector corpus and its metadata")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Corpus directory (default: NEWSVEC_DATA_DIR or ./newsvec-data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Disable fsync of WAL appends
    #[arg(long, global = true)]
    no_fsync: bool,

    #[arg(long, global = true, value_enum, default_value = "json")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty corpus. Later commands take dimension, metric and
    /// codec from its manifest.
    Init {
        #[arg(long)]
        dimension: Option<usize>,

        /// Distance metric: cosine, euclidean, inner-product, hamming
        #[arg(long)]
        metric: Option<DistanceMetric>,

        /// Codec: f32, int8, binary, pq:<m>[x<k>]
        #[arg(long)]
        codec: Option<CodecSpec>,

        /// JSONL file whose vectors train the codec (required for pq)
        #[arg(long)]
        train: Option<PathBuf>,

        /// Records read from the training file
        #[arg(long, default_value = "10000")]
        train_limit: usize,
    },

    /// Upsert id/vector/metadata records from a JSONL file
    Ingest {
        file: PathBuf,

        #[arg(long, default_value = "1000")]
        batch_size: usize,

        /// Ingestion workers (default: NEWSVEC_INGEST_WORKERS)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Nearest documents to a vector or to a stored document
    Query {
        /// Comma-separated raw vector
        #[arg(long, conflicts_with = "id")]
        vector: Option<String>,

        /// Use the stored vector of this document
        #[arg(long)]
        id: Option<String>,

        #[arg(short, long, default_value = "10")]
        k: usize,

        /// Metadata condition, e.g. `source=dpa`, `tld=de`, `title~storm`,
        /// `nuts^=DE1`, `published=2024-01-01..2024-06-30`. Repeat to AND.
        #[arg(long = "filter")]
        filters: Vec<String>,
    },

    /// Show the position and metadata of one document
    Document { id: String },

    /// Drop tombstones and renumber positions
    Compact,

    /// Re-encode all vectors under a new codec
    Recode {
        #[arg(long)]
        codec: CodecSpec,

        /// Metric for the recoded corpus (default: keep, or as the codec requires)
        #[arg(long)]
        metric: Option<DistanceMetric>,
    },

    /// Fold the WAL into a new snapshot
    Checkpoint,

    /// Print corpus statistics and the last recovery report
    Stats,
}

impl Cli {
    /// Environment first, then flags.
    fn corpus_config(&self) -> CorpusConfig {
        let mut config = CorpusConfig::from_env();
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if self.no_fsync {
            config.fsync = false;
        }
        config
    }
}

/// Apply `init` flags; a codec given without a metric picks the one it needs.
fn creation_config(
    mut config: CorpusConfig,
    dimension: Option<usize>,
    metric: Option<DistanceMetric>,
    codec: Option<CodecSpec>,
) -> CorpusConfig {
    if let Some(dimension) = dimension {
        config.dimension = dimension;
    }
    if let Some(codec) = codec {
        config.codec = codec;
        config.metric = match codec {
            CodecSpec::Binary => DistanceMetric::Hamming,
            _ if config.metric == DistanceMetric::Hamming => DistanceMetric::Cosine,
            _ => config.metric,
        };
    }
    if let Some(metric) = metric {
        config.metric = metric;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_format);
    let config = cli.corpus_config();

    match cli.command {
        Commands::Init { dimension, metric, codec, train, train_limit } => commands::init(
            creation_config(config, dimension, metric, codec),
            train.as_deref(),
            train_limit,
        ),
        Commands::Ingest { file, batch_size, workers } => {
            commands::ingest(config, &file, batch_size, workers).await
        }
        Commands::Query { vector, id, k, filters } => {
            commands::query(config, vector.as_deref(), id.as_deref(), k, &filters)
        }
        Commands::Document { id } => commands::document(config, &id),
        Commands::Compact => commands::compact(config),
        Commands::Recode { codec, metric } => commands::recode(config, codec, metric),
        Commands::Checkpoint => commands::checkpoint(config),
        Commands::Stats => commands::stats(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_binary_codec_implies_hamming() {
        let config = creation_config(CorpusConfig::default(), Some(64), None, Some(CodecSpec::Binary));
        assert_eq!(config.dimension, 64);
        assert_eq!(config.metric, DistanceMetric::Hamming);
        assert!(config.validate().is_ok());

        let config = creation_config(config, None, None, Some(CodecSpec::Int8));
        assert_eq!(config.metric, DistanceMetric::Cosine);
    }

    #[test]
    fn test_parse_query_flags() {
        let cli = Cli::parse_from([
            "newsvec", "--data-dir", "/tmp/c", "query", "--id", "doc1", "-k", "3",
            "--filter", "tld=de", "--filter", "source=dpa",
        ]);
        assert_eq!(cli.corpus_config().data_dir, PathBuf::from("/tmp/c"));
        match cli.command {
            Commands::Query { id, k, filters, vector } => {
                assert_eq!(id.as_deref(), Some("doc1"));
                assert_eq!(k, 3);
                assert_eq!(filters.len(), 2);
                assert!(vector.is_none());
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn test_recode_requires_codec() {
        assert!(Cli::try_parse_from(["newsvec", "recode"]).is_err());
        assert!(Cli::try_parse_from(["newsvec", "recode", "--codec", "pq:8x16"]).is_ok());
    }
}
