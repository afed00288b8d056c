//! Partitioned Parquet datasets on a [`StorageBackend`](crate::StorageBackend).
//!
//! A table is a directory of `part-*.parquet` files, optionally split into
//! Hive-style `col=value/` subdirectories. Partition columns live only in the
//! directory names, never inside the files. A completed write leaves a
//! `_SUCCESS` marker next to the data.

mod reader;
mod writer;

pub use reader::read_table;
pub use writer::{encode_parquet, write_table, TableWrite};

/// Marker object written after every part file of a table.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// True for keys holding table data (skips markers and hidden files).
pub(crate) fn is_data_file(table: &str, key: &str) -> bool {
    let rel = key
        .strip_prefix(table.trim_matches('/'))
        .unwrap_or(key)
        .trim_start_matches('/');
    key.ends_with(".parquet")
        && rel
            .split('/')
            .all(|segment| !segment.starts_with('_') && !segment.starts_with('.'))
}
