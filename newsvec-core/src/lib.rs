// ============================================================================
// CORE TYPES & UTILITIES
// ============================================================================
pub mod core;
pub mod config;

// ============================================================================
// VECTORS & CODECS
// ============================================================================
pub mod vector;
pub mod compression;

// ============================================================================
// MAPPING, INDEX & METADATA STORES
// ============================================================================
pub mod mapping;
pub mod index;
pub mod metadata;

// ============================================================================
// STORAGE, RECOVERY & MAINTENANCE
// ============================================================================
pub mod storage;
pub mod corpus;

// ============================================================================
// INGESTION & QUERY
// ============================================================================
pub mod ingest;
pub mod query;

// Re-export commonly used types
pub use core::{ErrorCode, ExternalId, Generation, InternalPosition, NewsvecError, Result};
pub use config::CorpusConfig;
pub use vector::DistanceMetric;
pub use compression::{CodecSpec, QuantizedVector, Quantizer};
pub use mapping::IdMapper;
pub use index::{FlatIndex, IndexHit, VectorIndex};
pub use metadata::{
    Field, Filter, FilterBuilder, FilterOp, InMemoryMetadataStore, Location, MetadataRecord,
    MetadataStore, TextField,
};
pub use corpus::{CompactionStats, Corpus, CorpusStats, RecodeStats, RecoveryReport};
pub use ingest::{BatchSummary, IngestBatch, IngestCoordinator, IngestPool, IngestRecord, PreparedBatch};
pub use query::{Document, QueryFacade, QueryVector, SearchHit};
