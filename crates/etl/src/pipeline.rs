//! The two processing stages and the job entry point.
//!
//! `process_songs` turns the song catalog into the songs and artists tables;
//! `process_logs` turns NextSong events into users, time and songplays.
//! Stages run strictly in that order because songplays re-reads the songs
//! table from the output store and joins events against the raw catalog
//! registered by the first stage.

use std::time::Instant;

use tracing::{info, warn};

use sparkify_core::{JobConfig, LogEvent, PathsConfig, SongRecord};
use sparkify_storage::{read_records, GlobPattern, Location, StorageBackend, TableWrite};

use crate::error::EtlError;
use crate::session::Session;
use crate::tables::{
    artists_table, read_songs, songplays_table, songs_table, time_table, users_table,
    write_star_table,
};

/// Relation holding every decoded song record.
pub const SONG_DATA_TABLE: &str = "song_data_table";

/// Relation holding the NextSong events.
pub const LOG_DATA_TABLE: &str = "log_data_table";

/// Where the raw datasets live.
#[derive(Debug, Clone)]
pub struct Source {
    pub root: Location,
    pub song_data: GlobPattern,
    pub log_data: GlobPattern,
}

impl Source {
    pub fn new(root: Location, song_data: &str, log_data: &str) -> Result<Self, EtlError> {
        Ok(Self {
            root,
            song_data: GlobPattern::new(song_data)?,
            log_data: GlobPattern::new(log_data)?,
        })
    }

    pub fn from_config(paths: &PathsConfig) -> Result<Self, EtlError> {
        Self::new(Location::parse(&paths.input)?, &paths.song_data, &paths.log_data)
    }
}

/// What one stage read and wrote.
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    pub input_files: usize,
    pub input_records: usize,
    pub tables: Vec<TableWrite>,
}

impl StageReport {
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables.iter().find(|t| t.table == table).map(|t| t.rows)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub songs: StageReport,
    pub logs: StageReport,
}

impl RunReport {
    pub fn tables(&self) -> impl Iterator<Item = &TableWrite> {
        self.songs.tables.iter().chain(&self.logs.tables)
    }

    pub fn log_summary(&self) {
        info!("Run summary:");
        for table in self.tables() {
            info!("  {:<16} {:>8} rows in {} files", table.table, table.rows, table.files.len());
        }
    }
}

/// Read every file matching `pattern`, failing when nothing matches.
async fn scan<T: serde::de::DeserializeOwned>(
    input: &StorageBackend,
    pattern: &GlobPattern,
) -> Result<(Vec<T>, usize), EtlError> {
    let scan = read_records::<T>(input, pattern).await?;
    if scan.files.is_empty() {
        return Err(EtlError::NoInput {
            pattern: pattern.to_string(),
            root: input.describe(),
        });
    }
    Ok((scan.records, scan.files.len()))
}

/// Build the songs and artists tables from the song catalog.
pub async fn process_songs(
    session: &mut Session,
    source: &Source,
    output: &Location,
) -> Result<StageReport, EtlError> {
    let start = Instant::now();
    let input = session.open(&source.root)?;
    let out = session.open_output(output)?;

    let (records, input_files) = scan::<SongRecord>(&input, &source.song_data).await?;
    let records = session.register(SONG_DATA_TABLE, records);

    let songs = songs_table(&records);
    let artists = artists_table(&records);

    let tables = vec![
        write_star_table(&out, &songs).await?,
        write_star_table(&out, &artists).await?,
    ];

    info!(
        files = input_files,
        records = records.len(),
        songs = songs.len(),
        artists = artists.len(),
        "Song data processed in {:.1}s",
        start.elapsed().as_secs_f64()
    );
    Ok(StageReport {
        input_files,
        input_records: records.len(),
        tables,
    })
}

/// Build users, time and songplays from the activity logs.
///
/// Needs `song_data_table` in the session and `songs_table` in `output`, so
/// [`process_songs`] must have run first.
pub async fn process_logs(
    session: &mut Session,
    source: &Source,
    output: &Location,
) -> Result<StageReport, EtlError> {
    let start = Instant::now();
    let input = session.open(&source.root)?;
    let out = session.open_output(output)?;

    let (events, input_files) = scan::<LogEvent>(&input, &source.log_data).await?;
    let input_records = events.len();
    let plays: Vec<LogEvent> = events.into_iter().filter(LogEvent::is_next_song).collect();
    let plays = session.register(LOG_DATA_TABLE, plays);

    let catalog = session.relation::<SongRecord>(SONG_DATA_TABLE)?;

    let users = users_table(&plays);
    let time = time_table(&plays);
    let mut tables = vec![
        write_star_table(&out, &users).await?,
        write_star_table(&out, &time).await?,
    ];

    let songs = read_songs(&out).await?;
    if songs.is_empty() {
        warn!("songs_table is empty, no songplays can match");
    }
    let songplays = songplays_table(&plays, &songs, &catalog);
    tables.push(write_star_table(&out, &songplays).await?);

    info!(
        files = input_files,
        events = input_records,
        plays = plays.len(),
        users = users.len(),
        timestamps = time.len(),
        songplays = songplays.len(),
        "Log data processed in {:.1}s",
        start.elapsed().as_secs_f64()
    );
    Ok(StageReport {
        input_files,
        input_records,
        tables,
    })
}

/// Run the whole job: session, song stage, log stage, stop.
pub async fn run(config: &JobConfig) -> Result<RunReport, EtlError> {
    let start = Instant::now();
    let source = Source::from_config(&config.paths)?;
    let output = Location::parse(&config.paths.output)?;
    info!(input = %source.root, output = %output, "Starting ETL");

    let mut session = Session::create(&config.aws)?;
    let songs = process_songs(&mut session, &source, &output).await?;
    let logs = process_logs(&mut session, &source, &output).await?;
    session.stop();

    let report = RunReport { songs, logs };
    report.log_summary();
    info!("ETL finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_from_default_paths() {
        let source = Source::from_config(&PathsConfig::default()).unwrap();
        assert!(source.root.is_remote());
        assert!(!source.song_data.has_wildcards());
        assert!(source.log_data.has_wildcards());
        assert_eq!(source.log_data.literal_prefix(), "log_data");
    }

    #[test]
    fn report_lookup_by_table() {
        let report = StageReport {
            input_files: 1,
            input_records: 3,
            tables: vec![TableWrite {
                table: "songs_table".into(),
                rows: 3,
                files: vec![],
            }],
        };
        assert_eq!(report.rows("songs_table"), Some(3));
        assert_eq!(report.rows("users_table"), None);
    }
}
