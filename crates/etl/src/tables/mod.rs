//! The five star-schema tables: how each is derived from the base relations
//! and how its rows map to Arrow.

pub mod artists;
pub mod songplays;
pub mod songs;
pub mod time;
pub mod users;

use arrow::array::AsArray;
use arrow::datatypes::{DataType, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use sparkify_storage::{write_table, StorageBackend, TableWrite};

use crate::error::EtlError;

pub use artists::artists_table;
pub use songplays::songplays_table;
pub use songs::{read_songs, songs_table};
pub use time::time_table;
pub use users::users_table;

/// A table of the star schema with a fixed Arrow layout.
pub trait StarTable: Sized {
    /// Directory name under the output root.
    const NAME: &'static str;
    /// Hive partition columns, outermost first.
    const PARTITION_BY: &'static [&'static str];

    fn schema() -> SchemaRef;

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError>;
}

/// Overwrite the table's output directory with `rows`.
pub async fn write_star_table<T: StarTable>(
    backend: &StorageBackend,
    rows: &[T],
) -> Result<TableWrite, EtlError> {
    let batch = T::to_batch(rows)?;
    Ok(write_table(backend, T::NAME, &batch, T::PARTITION_BY).await?)
}

/// Timestamps are stored as UTC milliseconds.
pub(crate) fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into()))
}

/// Column `name` of `batch` as a string array, or a schema error.
pub(crate) fn string_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a arrow::array::StringArray, EtlError> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_string_opt::<i32>())
        .ok_or_else(|| EtlError::Schema(format!("expected utf8 column '{name}'")))
}

/// Column `name` of `batch` as a primitive array of type `T`.
pub(crate) fn primitive_column<'a, T: arrow::datatypes::ArrowPrimitiveType>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a arrow::array::PrimitiveArray<T>, EtlError> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_primitive_opt::<T>())
        .ok_or_else(|| {
            EtlError::Schema(format!(
                "expected {} column '{name}'",
                T::DATA_TYPE
            ))
        })
}
