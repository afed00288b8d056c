pub mod backend;
pub mod error;
pub mod glob;
pub mod json;
pub mod location;
pub mod parquet;
pub mod partition;

pub use backend::{LocalBackend, S3Backend, StorageBackend};
pub use error::StorageError;
pub use glob::GlobPattern;
pub use json::{decode_records, read_records, JsonScan};
pub use location::Location;
pub use crate::parquet::{read_table, write_table, TableWrite, SUCCESS_MARKER};
