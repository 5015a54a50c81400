use std::fmt;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// 1000-1099: Dimension/Vector errors
    VectorDimensionMismatch = 1001,
    VectorInvalid = 1002,

    /// 1200-1299: Codec errors
    CodecFailed = 1201,
    InvalidQuantizedVector = 1202,

    /// 1300-1399: Storage errors
    StorageIOError = 1301,
    SerializationError = 1302,
    WALReplayFailed = 1303,
    GenerationMismatch = 1304,

    /// 1400-1499: Mapping/Index errors
    NotFound = 1401,
    AlreadyMapped = 1402,
    PositionOccupied = 1403,
    IndexCorrupted = 1404,

    /// 1500-1599: Ingestion errors
    BatchAborted = 1501,

    /// 1600-1699: Maintenance/Concurrency errors
    MaintenanceLocked = 1601,

    /// 1700-1799: Configuration/Validation errors
    InvalidConfiguration = 1701,
    InvalidQuery = 1702,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::VectorDimensionMismatch => "VECTOR_DIMENSION_MISMATCH",
            ErrorCode::VectorInvalid => "VECTOR_INVALID",
            ErrorCode::CodecFailed => "CODEC_FAILED",
            ErrorCode::InvalidQuantizedVector => "INVALID_QUANTIZED_VECTOR",
            ErrorCode::StorageIOError => "STORAGE_IO_ERROR",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::WALReplayFailed => "WAL_REPLAY_FAILED",
            ErrorCode::GenerationMismatch => "GENERATION_MISMATCH",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyMapped => "ALREADY_MAPPED",
            ErrorCode::PositionOccupied => "POSITION_OCCUPIED",
            ErrorCode::IndexCorrupted => "INDEX_CORRUPTED",
            ErrorCode::BatchAborted => "BATCH_ABORTED",
            ErrorCode::MaintenanceLocked => "MAINTENANCE_LOCKED",
            ErrorCode::InvalidConfiguration => "INVALID_CONFIGURATION",
            ErrorCode::InvalidQuery => "INVALID_QUERY",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NewsvecError {
    /// Vector dimensionality differs from the corpus dimensionality
    DimensionMismatch { expected: usize, got: usize },
    /// Vector contains NaN or infinite components
    InvalidVector(String),
    /// Codec could not be built or applied
    CodecError { code: ErrorCode, message: String },
    /// External id already holds a live position
    AlreadyMapped(String),
    /// Item not found with context
    NotFound(String),
    /// Insert targeted a slot that is not vacant
    PositionOccupied(u64),
    /// Index and mapping table disagree
    IndexCorruption { position: u64, message: String },
    /// Batch rolled back before it became durable; safe to retry
    BatchAborted { batch_id: String, reason: String },
    /// Persisted store belongs to a different corpus generation
    GenerationMismatch { store: String, expected: u64, found: u64 },
    /// Exclusive maintenance refused because ingestion is in progress
    MaintenanceLocked(String),
    /// Query parameters rejected before searching
    InvalidQuery(String),
    /// Storage error with details
    StorageError { code: ErrorCode, message: String },
    /// Configuration error
    ConfigError { message: String },
}

impl NewsvecError {
    pub fn code(&self) -> ErrorCode {
        match self {
            NewsvecError::DimensionMismatch { .. } => ErrorCode::VectorDimensionMismatch,
            NewsvecError::InvalidVector(_) => ErrorCode::VectorInvalid,
            NewsvecError::CodecError { code, .. } => *code,
            NewsvecError::AlreadyMapped(_) => ErrorCode::AlreadyMapped,
            NewsvecError::NotFound(_) => ErrorCode::NotFound,
            NewsvecError::PositionOccupied(_) => ErrorCode::PositionOccupied,
            NewsvecError::IndexCorruption { .. } => ErrorCode::IndexCorrupted,
            NewsvecError::BatchAborted { .. } => ErrorCode::BatchAborted,
            NewsvecError::GenerationMismatch { .. } => ErrorCode::GenerationMismatch,
            NewsvecError::MaintenanceLocked(_) => ErrorCode::MaintenanceLocked,
            NewsvecError::InvalidQuery(_) => ErrorCode::InvalidQuery,
            NewsvecError::StorageError { code, .. } => *code,
            NewsvecError::ConfigError { .. } => ErrorCode::InvalidConfiguration,
        }
    }

    /// Per-triple validation failures. The coordinator skips the triple and
    /// reports it in the batch summary instead of aborting the batch.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            NewsvecError::DimensionMismatch { .. } | NewsvecError::InvalidVector(_)
        )
    }

    /// Index/mapping divergence. Never retried automatically.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            NewsvecError::PositionOccupied(_)
                | NewsvecError::IndexCorruption { .. }
                | NewsvecError::GenerationMismatch { .. }
        )
    }

    /// Whether resubmitting the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NewsvecError::BatchAborted { .. } | NewsvecError::MaintenanceLocked(_)
        )
    }

    pub(crate) fn storage(code: ErrorCode, message: impl Into<String>) -> Self {
        NewsvecError::StorageError {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        NewsvecError::ConfigError {
            message: message.into(),
        }
    }

    pub(crate) fn codec(message: impl Into<String>) -> Self {
        NewsvecError::CodecError {
            code: ErrorCode::CodecFailed,
            message: message.into(),
        }
    }
}

impl fmt::Display for NewsvecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewsvecError::DimensionMismatch { expected, got } => {
                write!(f, "[{}] Vector dimension mismatch: expected {}, got {}",
                    self.code().as_str(), expected, got)
            }
            NewsvecError::InvalidVector(msg) => {
                write!(f, "[{}] Invalid vector: {}", self.code().as_str(), msg)
            }
            NewsvecError::CodecError { code, message } => {
                write!(f, "[{}] Codec error: {}", code.as_str(), message)
            }
            NewsvecError::AlreadyMapped(id) => {
                write!(f, "[{}] External id already mapped: {}", self.code().as_str(), id)
            }
            NewsvecError::NotFound(context) => {
                write!(f, "[{}] Not found: {}", self.code().as_str(), context)
            }
            NewsvecError::PositionOccupied(position) => {
                write!(f, "[{}] Position {} is already occupied", self.code().as_str(), position)
            }
            NewsvecError::IndexCorruption { position, message } => {
                write!(f, "[{}] Index corruption at position {}: {}",
                    self.code().as_str(), position, message)
            }
            NewsvecError::BatchAborted { batch_id, reason } => {
                write!(f, "[{}] Batch {} aborted: {}", self.code().as_str(), batch_id, reason)
            }
            NewsvecError::GenerationMismatch { store, expected, found } => {
                write!(f, "[{}] Store '{}' has generation {}, manifest expects {}",
                    self.code().as_str(), store, found, expected)
            }
            NewsvecError::MaintenanceLocked(context) => {
                write!(f, "[{}] Maintenance refused: {}", self.code().as_str(), context)
            }
            NewsvecError::InvalidQuery(msg) => {
                write!(f, "[{}] Invalid query: {}", self.code().as_str(), msg)
            }
            NewsvecError::StorageError { code, message } => {
                write!(f, "[{}] Storage error: {}", code.as_str(), message)
            }
            NewsvecError::ConfigError { message } => {
                write!(f, "[{}] Config error: {}", self.code().as_str(), message)
            }
        }
    }
}

impl std::error::Error for NewsvecError {}

impl From<std::io::Error> for NewsvecError {
    fn from(e: std::io::Error) -> Self {
        NewsvecError::storage(ErrorCode::StorageIOError, e.to_string())
    }
}

impl From<serde_json::Error> for NewsvecError {
    fn from(e: serde_json::Error) -> Self {
        NewsvecError::storage(ErrorCode::SerializationError, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NewsvecError>;
