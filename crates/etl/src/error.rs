use thiserror::Error;

use sparkify_core::ConfigError;
use sparkify_storage::StorageError;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("no input files match '{pattern}' under {root}")]
    NoInput { pattern: String, root: String },

    #[error("relation not registered: {0}")]
    RelationNotFound(String),

    #[error("relation '{name}' does not hold {expected} rows")]
    RelationType { name: String, expected: &'static str },

    #[error("schema error: {0}")]
    Schema(String),
}
