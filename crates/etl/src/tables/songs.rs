use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use sparkify_core::{Song, SongRecord};
use sparkify_storage::{read_table, StorageBackend};

use super::{primitive_column, string_column, StarTable};
use crate::error::EtlError;

/// `SELECT song_id, title, artist_id, year, duration WHERE song_id IS NOT NULL`,
/// keeping the first record seen for each song_id.
pub fn songs_table(records: &[SongRecord]) -> Vec<Song> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|r| {
            let song_id = r.song_id.as_ref()?;
            if !seen.insert(song_id.as_str()) {
                return None;
            }
            Some(Song {
                song_id: song_id.clone(),
                title: r.title.clone(),
                artist_id: r.artist_id.clone(),
                year: r.year,
                duration: r.duration,
            })
        })
        .collect()
}

impl StarTable for Song {
    const NAME: &'static str = "songs_table";
    const PARTITION_BY: &'static [&'static str] = &["year", "artist_id"];

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("song_id", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, true),
            Field::new("artist_id", DataType::Utf8, true),
            Field::new("year", DataType::Int64, true),
            Field::new("duration", DataType::Float64, true),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.song_id.as_str()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.title.as_deref()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.artist_id.as_deref()))),
            Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.year))),
            Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.duration))),
        ];
        RecordBatch::try_new(Self::schema(), columns)
    }
}

/// Read the songs table back from the output store.
pub async fn read_songs(backend: &StorageBackend) -> Result<Vec<Song>, EtlError> {
    let batches = read_table(backend, Song::NAME, Song::schema(), Song::PARTITION_BY).await?;

    let mut songs = Vec::new();
    for batch in &batches {
        let song_id = string_column(batch, "song_id")?;
        let title = string_column(batch, "title")?;
        let artist_id = string_column(batch, "artist_id")?;
        let year = primitive_column::<Int64Type>(batch, "year")?;
        let duration = primitive_column::<Float64Type>(batch, "duration")?;

        for i in 0..batch.num_rows() {
            songs.push(Song {
                song_id: song_id.value(i).to_string(),
                title: (!title.is_null(i)).then(|| title.value(i).to_string()),
                artist_id: (!artist_id.is_null(i)).then(|| artist_id.value(i).to_string()),
                year: (!year.is_null(i)).then(|| year.value(i)),
                duration: (!duration.is_null(i)).then(|| duration.value(i)),
            });
        }
    }
    Ok(songs)
}
