pub mod batch;
pub mod coordinator;
pub mod worker;

pub use batch::{BatchSummary, IngestBatch, IngestRecord, PreparedBatch, TripleFailure};
pub use coordinator::IngestCoordinator;
pub use worker::{IngestPool, SummaryReceiver};

#[cfg(test)]
mod tests;
