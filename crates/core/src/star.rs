//! Rows of the star schema written by the job.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Dimension: one row per song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub song_id: String,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub year: Option<i64>,
    pub duration: Option<f64>,
}

/// Dimension: one row per artist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub artist_id: String,
    pub artist_name: Option<String>,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
}

/// Dimension: one row per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

/// Dimension: calendar breakdown of one event timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRow {
    pub start_time: DateTime<Utc>,
    pub hour: i32,
    /// Day of month, 1-based.
    pub day: i32,
    /// ISO-8601 week of year.
    pub week: i32,
    pub month: i32,
    pub year: i32,
    /// 1 = Sunday ... 7 = Saturday.
    pub weekday: i32,
}

impl TimeRow {
    /// Decompose an epoch-milliseconds timestamp (UTC).
    ///
    /// Returns `None` when the value is outside chrono's representable range.
    pub fn from_millis(ts: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_millis(ts).map(Self::from_datetime)
    }

    pub fn from_datetime(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            hour: start_time.hour() as i32,
            day: start_time.day() as i32,
            week: start_time.iso_week().week() as i32,
            month: start_time.month() as i32,
            year: start_time.year(),
            weekday: start_time.weekday().number_from_sunday() as i32,
        }
    }
}

/// Fact: one play of a known song.
///
/// The time fields are `None` when the event carried no timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Songplay {
    pub songplay_id: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub month: Option<i32>,
    pub year: Option<i32>,
    pub user_id: Option<String>,
    pub level: Option<String>,
    pub song_id: String,
    pub artist_id: Option<String>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}
