//! Raw input rows as they appear in the song and log JSON files.
//!
//! Every field is optional: a missing key and an explicit `null` both
//! deserialize to `None`, and keys not listed here are ignored.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Page value marking a song actually being played.
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// One record of the song catalog (`song_data/**.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongRecord {
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub year: Option<i64>,
    pub duration: Option<f64>,
    pub num_songs: Option<i64>,
}

/// One user-activity event (`log_data/*/*/*.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogEvent {
    pub artist: Option<String>,
    pub auth: Option<String>,
    pub first_name: Option<String>,
    pub gender: Option<String>,
    pub item_in_session: Option<i64>,
    pub last_name: Option<String>,
    pub length: Option<f64>,
    pub level: Option<String>,
    pub location: Option<String>,
    pub method: Option<String>,
    pub page: Option<String>,
    pub registration: Option<f64>,
    pub session_id: Option<i64>,
    pub song: Option<String>,
    pub status: Option<i64>,
    /// Milliseconds since the Unix epoch.
    pub ts: Option<i64>,
    pub user_agent: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub user_id: Option<String>,
}

impl LogEvent {
    pub fn is_next_song(&self) -> bool {
        self.page.as_deref() == Some(NEXT_SONG_PAGE)
    }
}

/// Accept a JSON string or number, keeping the textual form.
///
/// `userId` is a string in the published logs but numeric in some exports.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_record_from_catalog_json() {
        let json = r#"{"num_songs": 1, "artist_id": "ARJIE2Y1187B994AB7", "artist_latitude": null,
            "artist_longitude": null, "artist_location": "", "artist_name": "Line Renaud",
            "song_id": "SOUPIRU12A6D4FA1E1", "title": "Der Kleine Dompfaff", "duration": 152.92036, "year": 0}"#;
        let rec: SongRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.song_id.as_deref(), Some("SOUPIRU12A6D4FA1E1"));
        assert_eq!(rec.artist_name.as_deref(), Some("Line Renaud"));
        assert_eq!(rec.artist_latitude, None);
        assert_eq!(rec.year, Some(0));
        assert_eq!(rec.num_songs, Some(1));
    }

    #[test]
    fn log_event_camel_case_keys() {
        let json = r#"{"artist":"Des'ree","auth":"Logged In","firstName":"Kaylee","gender":"F",
            "itemInSession":1,"lastName":"Summers","length":246.30812,"level":"free",
            "location":"Phoenix-Mesa-Scottsdale, AZ","method":"PUT","page":"NextSong",
            "registration":1540344794796.0,"sessionId":139,"song":"You Gotta Be","status":200,
            "ts":1541106106796,"userAgent":"Mozilla/5.0","userId":"8"}"#;
        let ev: LogEvent = serde_json::from_str(json).unwrap();
        assert!(ev.is_next_song());
        assert_eq!(ev.first_name.as_deref(), Some("Kaylee"));
        assert_eq!(ev.session_id, Some(139));
        assert_eq!(ev.ts, Some(1541106106796));
        assert_eq!(ev.user_id.as_deref(), Some("8"));
    }

    #[test]
    fn numeric_user_id_is_kept_as_text() {
        let ev: LogEvent = serde_json::from_str(r#"{"userId": 42, "page": "Home"}"#).unwrap();
        assert_eq!(ev.user_id.as_deref(), Some("42"));
        assert!(!ev.is_next_song());
    }

    #[test]
    fn missing_and_null_fields_are_none() {
        let ev: LogEvent = serde_json::from_str(r#"{"userId": null}"#).unwrap();
        assert_eq!(ev, LogEvent::default());
    }

    #[test]
    fn wrong_user_id_type_is_rejected() {
        assert!(serde_json::from_str::<LogEvent>(r#"{"userId": [1]}"#).is_err());
    }
}
