use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int32Array, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use tracing::warn;

use sparkify_core::{LogEvent, TimeRow};

use super::{timestamp_type, StarTable};

/// One row per distinct non-null event timestamp, in order of first
/// appearance.
pub fn time_table(events: &[LogEvent]) -> Vec<TimeRow> {
    let mut seen = HashSet::new();
    events
        .iter()
        .filter_map(|e| e.ts)
        .filter(|ts| seen.insert(*ts))
        .filter_map(|ts| {
            let row = TimeRow::from_millis(ts);
            if row.is_none() {
                warn!(ts, "Skipping unrepresentable event timestamp");
            }
            row
        })
        .collect()
}

impl StarTable for TimeRow {
    const NAME: &'static str = "time_table";
    const PARTITION_BY: &'static [&'static str] = &["year", "month"];

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("start_time", timestamp_type(), false),
            Field::new("hour", DataType::Int32, false),
            Field::new("day", DataType::Int32, false),
            Field::new("week", DataType::Int32, false),
            Field::new("month", DataType::Int32, false),
            Field::new("year", DataType::Int32, false),
            Field::new("weekday", DataType::Int32, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let int = |f: fn(&TimeRow) -> i32| -> ArrayRef {
            Arc::new(Int32Array::from_iter_values(rows.iter().map(f)))
        };
        let columns: Vec<ArrayRef> = vec![
            Arc::new(
                TimestampMillisecondArray::from_iter_values(
                    rows.iter().map(|r| r.start_time.timestamp_millis()),
                )
                .with_timezone("UTC"),
            ),
            int(|r| r.hour),
            int(|r| r.day),
            int(|r| r.week),
            int(|r| r.month),
            int(|r| r.year),
            int(|r| r.weekday),
        ];
        RecordBatch::try_new(Self::schema(), columns)
    }
}
