//! JSON record files: one or more JSON objects per file, separated by
//! whitespace (newline-delimited in practice).

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::glob::GlobPattern;

/// Records read from every file matching a pattern.
#[derive(Debug)]
pub struct JsonScan<T> {
    pub records: Vec<T>,
    pub files: Vec<String>,
}

/// Decode every JSON value in `data` as a `T`. `key` names the file in errors.
pub fn decode_records<T: DeserializeOwned>(data: &[u8], key: &str) -> Result<Vec<T>, StorageError> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    serde_json::Deserializer::from_slice(data)
        .into_iter::<T>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| StorageError::Json {
            key: key.to_string(),
            source,
        })
}

/// Read all records from files matching `pattern`, in key order.
///
/// A malformed line anywhere fails the whole scan.
pub async fn read_records<T: DeserializeOwned>(
    backend: &StorageBackend,
    pattern: &GlobPattern,
) -> Result<JsonScan<T>, StorageError> {
    let start = std::time::Instant::now();
    let files = pattern.expand(backend).await?;

    let mut records = Vec::new();
    for key in &files {
        let data = backend.get(key).await?;
        let mut batch = decode_records::<T>(&data, key)?;
        debug!(key = %key, records = batch.len(), "Decoded JSON file");
        records.append(&mut batch);
    }

    info!(
        pattern = %pattern,
        files = files.len(),
        records = records.len(),
        "Read JSON records in {:.1}s",
        start.elapsed().as_secs_f64()
    );
    Ok(JsonScan { records, files })
}
