pub mod filter;
pub mod schema;
pub mod store;

pub use filter::{Field, Filter, FilterBuilder, FilterOp, TextField};
pub use schema::{Location, MetadataRecord, SCHEMA_VERSION};
pub use store::{InMemoryMetadataStore, MetadataEntry, MetadataStore};

#[cfg(test)]
mod tests;
