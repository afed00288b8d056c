use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, UInt32Array};
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::{debug, info};

use super::SUCCESS_MARKER;
use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::partition::partition_dir;

/// Outcome of one table write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableWrite {
    pub table: String,
    pub rows: usize,
    /// Keys of the part files written, relative to the backend root.
    pub files: Vec<String>,
}

/// Encode a batch as a ZSTD-compressed Parquet file held in memory.
pub fn encode_parquet(batch: &RecordBatch, table: &str) -> Result<Vec<u8>, StorageError> {
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .set_key_value_metadata(Some(vec![
            parquet::format::KeyValue::new("sparkify.table".to_string(), Some(table.to_string())),
            parquet::format::KeyValue::new(
                "sparkify.rows".to_string(),
                Some(batch.num_rows().to_string()),
            ),
        ]))
        .build();

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(buf)
}

/// Overwrite `table` (a key prefix) with the rows of `batch`.
///
/// Everything previously under the prefix is deleted first. Rows are grouped
/// by the values of `partition_by`; each group becomes one part file under its
/// partition directory, with the partition columns projected out. An
/// unpartitioned table always gets exactly one part file, even when empty.
pub async fn write_table(
    backend: &StorageBackend,
    table: &str,
    batch: &RecordBatch,
    partition_by: &[&str],
) -> Result<TableWrite, StorageError> {
    let table = table.trim_matches('/');
    let start = std::time::Instant::now();
    let run_id = uuid::Uuid::new_v4();

    backend.clear(table).await?;

    let groups = group_rows(batch, partition_by)?;
    let data_schema = project_out(&batch.schema(), partition_by);
    let data_columns: Vec<usize> = batch
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !partition_by.contains(&f.name().as_str()))
        .map(|(i, _)| i)
        .collect();

    let mut files = Vec::with_capacity(groups.len());
    for (part, (values, rows)) in groups.into_iter().enumerate() {
        let indices = UInt32Array::from(rows);
        let columns = data_columns
            .iter()
            .map(|&i| arrow::compute::take(batch.column(i).as_ref(), &indices, None))
            .collect::<Result<Vec<ArrayRef>, _>>()?;
        let chunk = RecordBatch::try_new(data_schema.clone(), columns)?;

        let dir = if partition_by.is_empty() {
            table.to_string()
        } else {
            format!("{}/{}", table, partition_dir(partition_by, &values))
        };
        let key = format!("{dir}/part-{part:05}-{run_id}.zstd.parquet");

        let data = encode_parquet(&chunk, table)?;
        debug!(key = %key, rows = chunk.num_rows(), bytes = data.len(), "Writing part file");
        backend.put(&key, Bytes::from(data)).await?;
        files.push(key);
    }

    backend
        .put(&format!("{table}/{SUCCESS_MARKER}"), Bytes::new())
        .await?;

    info!(
        table,
        rows = batch.num_rows(),
        files = files.len(),
        "Wrote table to {} in {:.1}s",
        backend.describe(),
        start.elapsed().as_secs_f64()
    );

    Ok(TableWrite {
        table: table.to_string(),
        rows: batch.num_rows(),
        files,
    })
}

type PartitionKey = Vec<Option<String>>;

/// Row indices per distinct partition key, in key order.
fn group_rows(
    batch: &RecordBatch,
    partition_by: &[&str],
) -> Result<BTreeMap<PartitionKey, Vec<u32>>, StorageError> {
    let mut groups: BTreeMap<PartitionKey, Vec<u32>> = BTreeMap::new();

    if partition_by.is_empty() {
        groups.insert(Vec::new(), (0..batch.num_rows() as u32).collect());
        return Ok(groups);
    }

    let schema = batch.schema();
    let key_columns = partition_by
        .iter()
        .map(|name| Ok(batch.column(schema.index_of(name)?)))
        .collect::<Result<Vec<&ArrayRef>, StorageError>>()?;

    for row in 0..batch.num_rows() {
        let key = key_columns
            .iter()
            .map(|col| {
                if col.is_null(row) {
                    Ok(None)
                } else {
                    array_value_to_string(col.as_ref(), row).map(Some)
                }
            })
            .collect::<Result<PartitionKey, _>>()?;
        groups.entry(key).or_default().push(row as u32);
    }

    Ok(groups)
}

fn project_out(schema: &SchemaRef, partition_by: &[&str]) -> SchemaRef {
    let fields: Vec<_> = schema
        .fields()
        .iter()
        .filter(|f| !partition_by.contains(&f.name().as_str()))
        .cloned()
        .collect();
    Arc::new(Schema::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use sparkify_core::config::AwsConfig;

    use crate::location::Location;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("song_id", DataType::Utf8, false),
            Field::new("year", DataType::Int64, true),
            Field::new("artist_id", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["S1", "S2", "S3"])),
                Arc::new(Int64Array::from(vec![Some(2000), Some(2000), None])),
                Arc::new(StringArray::from(vec![Some("A1"), Some("A1"), Some("A2")])),
            ],
        )
        .unwrap()
    }

    fn local(dir: &std::path::Path) -> StorageBackend {
        StorageBackend::open(&Location::Local(dir.to_path_buf()), &AwsConfig::anonymous()).unwrap()
    }

    #[test]
    fn grouping_by_two_columns() {
        let groups = group_rows(&sample_batch(), &["year", "artist_id"]).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&vec![Some("2000".to_string()), Some("A1".to_string())]], vec![0, 1]);
        assert_eq!(groups[&vec![None, Some("A2".to_string())]], vec![2]);
    }

    #[test]
    fn grouping_by_unknown_column_fails() {
        assert!(group_rows(&sample_batch(), &["month"]).is_err());
    }

    #[test]
    fn encoded_file_reads_back() {
        let data = encode_parquet(&sample_batch(), "songs_table").unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 3);
    }

    #[tokio::test]
    async fn partitioned_write_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = local(tmp.path());

        let written = write_table(&backend, "songs_table/", &sample_batch(), &["year", "artist_id"])
            .await
            .unwrap();
        assert_eq!(written.table, "songs_table");
        assert_eq!(written.rows, 3);
        assert_eq!(written.files.len(), 2);
        // Null partition values sort first.
        assert!(written.files[0]
            .starts_with("songs_table/year=__HIVE_DEFAULT_PARTITION__/artist_id=A2/part-00000-"));
        assert!(written.files[1].starts_with("songs_table/year=2000/artist_id=A1/part-00001-"));
        assert!(tmp.path().join("songs_table/_SUCCESS").exists());

        // Partition columns are not stored in the files.
        let data = backend.get(&written.files[0]).await.unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(data).unwrap();
        let names: Vec<String> = builder
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, vec!["song_id"]);
    }

    #[tokio::test]
    async fn rewrite_replaces_previous_output() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = local(tmp.path());

        write_table(&backend, "t", &sample_batch(), &["artist_id"]).await.unwrap();
        let second = write_table(&backend, "t", &sample_batch().slice(0, 1), &["artist_id"])
            .await
            .unwrap();

        let parts: Vec<String> = backend
            .list("t")
            .await
            .unwrap()
            .into_iter()
            .filter(|k| k.ends_with(".parquet"))
            .collect();
        assert_eq!(parts, second.files);
        assert!(!tmp.path().join("t/artist_id=A2").exists());
    }

    #[tokio::test]
    async fn empty_unpartitioned_table_still_has_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = local(tmp.path());
        let empty = sample_batch().slice(0, 0);

        let written = write_table(&backend, "users_table", &empty, &[]).await.unwrap();
        assert_eq!(written.rows, 0);
        assert_eq!(written.files.len(), 1);

        let partitioned = write_table(&backend, "time_table", &empty, &["year"]).await.unwrap();
        assert!(partitioned.files.is_empty());
        assert!(backend.exists("time_table/_SUCCESS").await.unwrap());
    }
}
