use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use sparkify_core::{Artist, SongRecord};

use super::StarTable;

/// Distinct artists with a non-null artist_id. When one artist_id appears
/// with differing attributes the first record wins, so artist_id stays unique.
pub fn artists_table(records: &[SongRecord]) -> Vec<Artist> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|r| {
            let artist_id = r.artist_id.as_ref()?;
            if !seen.insert(artist_id.as_str()) {
                return None;
            }
            Some(Artist {
                artist_id: artist_id.clone(),
                artist_name: r.artist_name.clone(),
                artist_location: r.artist_location.clone(),
                artist_latitude: r.artist_latitude,
                artist_longitude: r.artist_longitude,
            })
        })
        .collect()
}

impl StarTable for Artist {
    const NAME: &'static str = "artists_table";
    const PARTITION_BY: &'static [&'static str] = &[];

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("artist_id", DataType::Utf8, false),
            Field::new("artist_name", DataType::Utf8, true),
            Field::new("artist_location", DataType::Utf8, true),
            Field::new("artist_latitude", DataType::Float64, true),
            Field::new("artist_longitude", DataType::Float64, true),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.artist_id.as_str()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.artist_name.as_deref()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.artist_location.as_deref()))),
            Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.artist_latitude))),
            Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.artist_longitude))),
        ];
        RecordBatch::try_new(Self::schema(), columns)
    }
}
