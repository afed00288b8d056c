use arrow::array::{new_null_array, ArrayRef, StringArray};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, info};

use super::is_data_file;
use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::partition::extract_value;

/// Read a table written by [`write_table`](super::write_table).
///
/// Batches are returned in the given `schema`: partition columns are rebuilt
/// from directory names and cast to their declared types; data columns
/// missing from a file come back as nulls. A prefix with no objects at all is
/// `NotFound`; a table holding only its `_SUCCESS` marker reads as empty.
pub async fn read_table(
    backend: &StorageBackend,
    table: &str,
    schema: SchemaRef,
    partition_by: &[&str],
) -> Result<Vec<RecordBatch>, StorageError> {
    let table = table.trim_matches('/');
    let keys = backend.list(table).await?;
    if keys.is_empty() {
        return Err(StorageError::NotFound(format!(
            "table '{}' under {}",
            table,
            backend.describe()
        )));
    }

    let mut batches = Vec::new();
    for key in keys.iter().filter(|k| is_data_file(table, k)) {
        let data = backend.get(key).await?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(data)?.build()?;
        for batch in reader {
            batches.push(align_batch(&batch?, &schema, partition_by, key)?);
        }
        debug!(key = %key, "Read part file");
    }

    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    info!(table, rows, "Read table from {}", backend.describe());
    Ok(batches)
}

/// Rebuild `batch` in `schema` order, adding partition columns from `key`.
fn align_batch(
    batch: &RecordBatch,
    schema: &SchemaRef,
    partition_by: &[&str],
    key: &str,
) -> Result<RecordBatch, StorageError> {
    let num_rows = batch.num_rows();

    let columns = schema
        .fields()
        .iter()
        .map(|field| -> Result<ArrayRef, StorageError> {
            let name = field.name().as_str();
            if partition_by.contains(&name) {
                let value = extract_value(key, name).ok_or_else(|| {
                    StorageError::Other(format!("no '{name}=' directory in {key}"))
                })?;
                let raw = StringArray::from(vec![value.as_deref(); num_rows]);
                return Ok(arrow::compute::cast(&raw, field.data_type())?);
            }

            match batch.column_by_name(name) {
                Some(col) if col.data_type() == field.data_type() => Ok(col.clone()),
                Some(col) => Ok(arrow::compute::cast(col, field.data_type())?),
                None => Ok(new_null_array(field.data_type(), num_rows)),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RecordBatch::try_new(schema.clone(), columns)?)
}
