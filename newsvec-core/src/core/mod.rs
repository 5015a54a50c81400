pub mod errors;
pub mod types;
pub mod utils;

pub use errors::{ErrorCode, NewsvecError, Result};
pub use types::{ExternalId, Generation, InternalPosition};
pub use utils::*;
