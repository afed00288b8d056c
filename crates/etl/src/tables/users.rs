use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use sparkify_core::{LogEvent, User};

use super::StarTable;

/// One row per non-null user_id, in order of first appearance.
///
/// Attributes come from the user's latest event (greatest ts, later input
/// position on ties), so a free → paid upgrade yields `level = "paid"`.
pub fn users_table(events: &[LogEvent]) -> Vec<User> {
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, &LogEvent> = HashMap::new();

    for event in events {
        let Some(user_id) = event.user_id.as_deref() else {
            continue;
        };
        match latest.get_mut(user_id) {
            Some(current) => {
                if event.ts >= current.ts {
                    *current = event;
                }
            }
            None => {
                order.push(user_id);
                latest.insert(user_id, event);
            }
        }
    }

    order
        .into_iter()
        .map(|user_id| {
            let event = latest[user_id];
            User {
                user_id: user_id.to_string(),
                first_name: event.first_name.clone(),
                last_name: event.last_name.clone(),
                gender: event.gender.clone(),
                level: event.level.clone(),
            }
        })
        .collect()
}

impl StarTable for User {
    const NAME: &'static str = "users_table";
    const PARTITION_BY: &'static [&'static str] = &[];

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("user_id", DataType::Utf8, false),
            Field::new("first_name", DataType::Utf8, true),
            Field::new("last_name", DataType::Utf8, true),
            Field::new("gender", DataType::Utf8, true),
            Field::new("level", DataType::Utf8, true),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch, ArrowError> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.user_id.as_str()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.first_name.as_deref()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.last_name.as_deref()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.gender.as_deref()))),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| r.level.as_deref()))),
        ];
        RecordBatch::try_new(Self::schema(), columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(user_id: Option<&str>, level: &str, ts: i64) -> LogEvent {
        LogEvent {
            user_id: user_id.map(str::to_string),
            first_name: Some("Lily".into()),
            last_name: Some("Koch".into()),
            gender: Some("F".into()),
            level: Some(level.into()),
            ts: Some(ts),
            page: Some("NextSong".into()),
            ..Default::default()
        }
    }

    #[test]
    fn users_are_unique() {
        let users = users_table(&[
            event(Some("15"), "free", 1),
            event(Some("8"), "free", 2),
            event(None, "free", 3),
            event(Some("15"), "free", 4),
        ]);
        let ids: Vec<&str> = users.iter().map(|u| u.user_id.as_str()).collect();
        assert_eq!(ids, vec!["15", "8"]);
    }

    #[test]
    fn latest_level_wins() {
        let users = users_table(&[
            event(Some("15"), "paid", 20),
            event(Some("15"), "free", 10),
            event(Some("15"), "paid", 30),
        ]);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].level.as_deref(), Some("paid"));

        let downgraded = users_table(&[event(Some("15"), "paid", 1), event(Some("15"), "free", 2)]);
        assert_eq!(downgraded[0].level.as_deref(), Some("free"));
    }

    #[test]
    fn batch_has_one_row_per_user() {
        let users = users_table(&[event(Some("1"), "free", 1), event(Some("2"), "paid", 1)]);
        let batch = User::to_batch(&users).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema(), User::schema());
    }
}
