use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Int32Builder, Int64Builder, StringBuilder, TimestampMillisecondBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use tracing::debug;

use sparkify_core::{LogEvent, Song, SongRecord, Songplay, TimeRow};

use super::{timestamp_type, StarTable};

/// Catalog records addressable by their own `(artist_name, title)` pair.
struct SongIndex<'a> {
    by_artist: HashMap<&'a str, HashMap<&'a str, &'a SongRecord>>,
}

impl<'a> SongIndex<'a> {
    /// Only records whose song_id made it into the songs table are indexed.
    /// When several records share an artist name and title the smallest
    /// song_id is used.
    fn build(songs: &'a [Song], catalog: &'a [SongRecord]) -> Self {
        let known: HashSet<&str> = songs.iter().map(|s| s.song_id.as_str()).collect();

        let mut by_artist: HashMap<&str, HashMap<&str, &SongRecord>> = HashMap::new();
        for record in catalog {
            let (Some(song_id), Some(name), Some(title)) = (
                record.song_id.as_deref(),
                record.artist_name.as_deref(),
                record.title.as_deref(),
            ) else {
                continue;
            };
            if !known.contains(song_id) {
                continue;
            }
            by_artist
                .entry(name)
                .or_default()
                .entry(title)
                .and_modify(|current| {
                    if current.song_id.as_deref().is_some_and(|c| song_id < c) {
                        *current = record;
                    }
                })
                .or_insert(record);
        }

        Self { by_artist }
    }

    fn lookup(&self, artist: &str, title: &str) -> Option<&'a SongRecord> {
        self.by_artist.get(artist)?.get(title).copied()
    }

    fn len(&self) -> usize {
        self.by_artist.values().map(HashMap::len).sum()
    }
}

/// Inner join of play events with the song catalog on
/// `(artist, song) = (artist_name, title)`, restricted to songs present in
/// the songs table.
///
/// Each matching event yields exactly one row; events without a match are
/// dropped. An event without a usable timestamp still matches and gets null
/// `start_time`, `year` and `month`. `songplay_id` counts up from 0 in event
/// order and is only meaningful within one run.
pub fn songplays_table(events: &[LogEvent], songs: &[Song], catalog: &[SongRecord]) -> Vec<Songplay> {
    let index = SongIndex::build(songs, catalog);
    debug!(keys = index.len(), "Built song index");

    let mut next_id = 0i64;
    events
        .iter()
        .filter_map(|event| {
            let record = index.lookup(event.artist.as_deref()?, event.song.as_deref()?)?;
            let song_id = record.song_id.clone()?;
            let time = event.ts.and_then(TimeRow::from_millis);

            let songplay_id = next_id;
            next_id += 1;
            Some(Songplay {
                songplay_id,
                start_time: time.as_ref().map(|t| t.start_time),
                month: time.as_ref().map(|t| t.month),
                year: time.as_ref().map(|t| t.year),
                user_id: event.user_id.clone(),
                level: event.level.clone(),
                song_id,
                artist_id: record.artist_id.clone(),
                session_id: event.session_id,
                location: event.location.clone(),
                user_agent: event.user_agent.clone(),
            })
        })
        .collect()
}

impl StarTable for Songplay {
    const NAME: &'static str = "songplays_table";
    const PARTITION_BY: &'static [&'static str] = &["year", "month"];

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("songplay_id", DataType::Int64, false),
            Field::new("start_time", timestamp_type(), true),
            Field::new("month", DataType::Int32, true),
            Field::new("year", DataType::Int32, true),
            Field::new("user_id", DataType::Utf8, true),
            Field::new("level", DataType::Utf8, true),
            Field::new("song_id", DataType::Utf8, false),
            Field::new("artist_id", DataType::Utf8, true),
            Field::new("session_id", DataType::Int64, true),
            Field::new("location", DataType::Utf8, true),
            Field::new("user_agent", DataType::Utf8, true),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let n = rows.len();
        let mut songplay_id = Int64Builder::with_capacity(n);
        let mut start_time = TimestampMillisecondBuilder::with_capacity(n);
        let mut month = Int32Builder::with_capacity(n);
        let mut year = Int32Builder::with_capacity(n);
        let mut user_id = StringBuilder::with_capacity(n, n * 4);
        let mut level = StringBuilder::with_capacity(n, n * 4);
        let mut song_id = StringBuilder::with_capacity(n, n * 18);
        let mut artist_id = StringBuilder::with_capacity(n, n * 18);
        let mut session_id = Int64Builder::with_capacity(n);
        let mut location = StringBuilder::with_capacity(n, n * 32);
        let mut user_agent = StringBuilder::with_capacity(n, n * 128);

        for row in rows {
            songplay_id.append_value(row.songplay_id);
            start_time.append_option(row.start_time.map(|t| t.timestamp_millis()));
            month.append_option(row.month);
            year.append_option(row.year);
            user_id.append_option(row.user_id.as_deref());
            level.append_option(row.level.as_deref());
            song_id.append_value(&row.song_id);
            artist_id.append_option(row.artist_id.as_deref());
            session_id.append_option(row.session_id);
            location.append_option(row.location.as_deref());
            user_agent.append_option(row.user_agent.as_deref());
        }

        let columns: Vec<ArrayRef> = vec![
            Arc::new(songplay_id.finish()),
            Arc::new(start_time.finish().with_timezone("UTC")),
            Arc::new(month.finish()),
            Arc::new(year.finish()),
            Arc::new(user_id.finish()),
            Arc::new(level.finish()),
            Arc::new(song_id.finish()),
            Arc::new(artist_id.finish()),
            Arc::new(session_id.finish()),
            Arc::new(location.finish()),
            Arc::new(user_agent.finish()),
        ];
        RecordBatch::try_new(Self::schema(), columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    use crate::tables::songs_table;

    fn catalog() -> Vec<SongRecord> {
        vec![
            SongRecord {
                song_id: Some("S1".into()),
                title: Some("T1".into()),
                artist_id: Some("A1".into()),
                artist_name: Some("AR1".into()),
                year: Some(2000),
                duration: Some(200.0),
                ..Default::default()
            },
            SongRecord {
                song_id: Some("S2".into()),
                title: Some("Other".into()),
                artist_id: Some("A2".into()),
                artist_name: Some("AR2".into()),
                ..Default::default()
            },
        ]
    }

    fn play(user_id: &str, artist: &str, song: &str, ts: Option<i64>) -> LogEvent {
        LogEvent {
            user_id: Some(user_id.into()),
            page: Some("NextSong".into()),
            artist: Some(artist.into()),
            song: Some(song.into()),
            ts,
            session_id: Some(100),
            level: Some("free".into()),
            location: Some("Chicago, IL".into()),
            user_agent: Some("Mozilla/5.0".into()),
            ..Default::default()
        }
    }

    #[test]
    fn single_matching_event() {
        let catalog = catalog();
        let songs = songs_table(&catalog);
        let plays = songplays_table(&[play("1", "AR1", "T1", Some(1_541_106_106_796))], &songs, &catalog);

        assert_eq!(plays.len(), 1);
        let p = &plays[0];
        assert_eq!(p.songplay_id, 0);
        assert_eq!(p.song_id, "S1");
        assert_eq!(p.artist_id.as_deref(), Some("A1"));
        assert_eq!(p.user_id.as_deref(), Some("1"));
        assert_eq!(p.session_id, Some(100));
        assert_eq!((p.year, p.month), (Some(2018), Some(11)));
        assert_eq!(p.start_time.map(|t| t.timestamp_millis()), Some(1_541_106_106_796));
    }

    #[test]
    fn unmatched_events_are_dropped() {
        let catalog = catalog();
        let songs = songs_table(&catalog);
        let events = vec![
            play("1", "AR1", "T1", Some(1)),
            play("2", "AR1", "Unknown", Some(2)),
            play("3", "AR2", "T1", Some(3)),
            play("4", "AR2", "Other", Some(4)),
        ];
        let plays = songplays_table(&events, &songs, &catalog);

        let users: Vec<&str> = plays.iter().filter_map(|p| p.user_id.as_deref()).collect();
        assert_eq!(users, vec!["1", "4"]);
        let ids: Vec<i64> = plays.iter().map(|p| p.songplay_id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(plays.len() <= events.len());
    }

    #[test]
    fn duplicate_titles_match_once() {
        let mut catalog = catalog();
        catalog.push(SongRecord {
            song_id: Some("S0".into()),
            title: Some("T1".into()),
            artist_id: Some("A1".into()),
            artist_name: Some("AR1".into()),
            ..Default::default()
        });
        let songs = songs_table(&catalog);
        let plays = songplays_table(&[play("1", "AR1", "T1", Some(1))], &songs, &catalog);
        assert_eq!(plays.len(), 1);
        assert_eq!(plays[0].song_id, "S0");
    }

    #[test]
    fn songs_missing_from_table_cannot_match() {
        let catalog = catalog();
        let songs = vec![Song {
            song_id: "S9".into(),
            title: Some("T1".into()),
            artist_id: Some("A1".into()),
            year: None,
            duration: None,
        }];
        let plays = songplays_table(&[play("1", "AR1", "T1", Some(1))], &songs, &catalog);
        assert!(plays.is_empty());
    }

    #[test]
    fn artist_name_comes_from_the_same_record() {
        // One artist_id credited under two names.
        let catalog = vec![
            SongRecord {
                song_id: Some("S1".into()),
                title: Some("Numb".into()),
                artist_id: Some("A1".into()),
                artist_name: Some("Jay-Z / Linkin Park".into()),
                ..Default::default()
            },
            SongRecord {
                song_id: Some("S2".into()),
                title: Some("Other".into()),
                artist_id: Some("A1".into()),
                artist_name: Some("Jay-Z".into()),
                ..Default::default()
            },
        ];
        let songs = songs_table(&catalog);

        let plays = songplays_table(&[play("1", "Jay-Z", "Numb", Some(1))], &songs, &catalog);
        assert!(plays.is_empty());

        let plays = songplays_table(
            &[play("1", "Jay-Z / Linkin Park", "Numb", Some(1))],
            &songs,
            &catalog,
        );
        assert_eq!(plays.len(), 1);
        assert_eq!(plays[0].song_id, "S1");
        assert_eq!(plays[0].artist_id.as_deref(), Some("A1"));
    }

    #[test]
    fn missing_timestamp_still_counts() {
        let catalog = catalog();
        let songs = songs_table(&catalog);
        let plays = songplays_table(&[play("1", "AR1", "T1", None)], &songs, &catalog);

        assert_eq!(plays.len(), 1);
        assert_eq!(plays[0].song_id, "S1");
        assert_eq!((plays[0].start_time, plays[0].year, plays[0].month), (None, None, None));

        let batch = Songplay::to_batch(&plays).unwrap();
        assert_eq!(batch.column_by_name("start_time").unwrap().null_count(), 1);
        assert_eq!(batch.column_by_name("year").unwrap().null_count(), 1);
    }

    #[test]
    fn batch_layout() {
        let catalog = catalog();
        let songs = songs_table(&catalog);
        let plays = songplays_table(&[play("1", "AR1", "T1", Some(1))], &songs, &catalog);
        let batch = Songplay::to_batch(&plays).unwrap();
        assert_eq!(batch.schema(), Songplay::schema());
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.num_columns(), 11);
    }
}
