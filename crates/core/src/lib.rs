pub mod config;
pub mod error;
pub mod record;
pub mod star;

pub use config::{AwsConfig, JobConfig, PathsConfig};
pub use error::*;
pub use record::*;
pub use star::*;
