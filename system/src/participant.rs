use crate::{now, Color, CursorPosition, RelayError, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One user's presence inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: UserId,
    pub username: String,
    pub color: Color,
    pub last_active: Timestamp,
    #[serde(default)]
    pub cursor_position: CursorPosition,
    /// Client-defined fields carried along by `user-update`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Participant {
    pub fn new(user_id: UserId, username: String) -> Self {
        Self {
            user_id,
            username,
            color: Color::random(),
            last_active: now(),
            cursor_position: CursorPosition::default(),
            extra: Map::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = now();
    }

    /// Shallow-merges `fields` into this record and stamps `last_active`.
    /// Either every field applies or none does.
    pub fn merge(&mut self, fields: &Map<String, Value>) -> Result<(), RelayError> {
        let mut merged = self.clone();
        for (key, value) in fields {
            match key.as_str() {
                // identity and activity stamp are owned by the relay
                "userId" | "lastActive" => {}
                "username" => merged.username = parse_field(key, value)?,
                "color" => merged.color = parse_field(key, value)?,
                "cursorPosition" => merged.cursor_position = parse_field(key, value)?,
                _ => {
                    merged.extra.insert(key.clone(), value.clone());
                }
            }
        }
        merged.touch();
        *self = merged;
        Ok(())
    }
}

fn parse_field<T: serde::de::DeserializeOwned>(key: &str, value: &Value) -> Result<T, RelayError> {
    serde_json::from_value(value.clone()).map_err(|err| RelayError::InvalidField {
        field: key.to_owned(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn it_merges_known_and_unknown_fields() {
        let mut participant = Participant::new("u1".into(), "alice".into());
        let color = participant.color.clone();

        participant
            .merge(&fields(json!({
                "userId": "someone-else",
                "username": "alice2",
                "cursorPosition": { "x": 3.0, "y": 4.5 },
                "status": "editing"
            })))
            .expect("");

        assert_eq!(participant.user_id, "u1");
        assert_eq!(participant.username, "alice2");
        assert_eq!(participant.color, color);
        assert_eq!(participant.cursor_position, CursorPosition { x: 3.0, y: 4.5 });
        assert_eq!(participant.extra.get("status"), Some(&json!("editing")));
    }

    #[test]
    fn it_stamps_last_active() {
        let mut participant = Participant::new("u1".into(), "alice".into());
        let before = participant.last_active;
        participant.merge(&Map::new()).expect("");
        assert!(participant.last_active >= before);
    }

    #[test]
    fn it_rejects_mistyped_fields_without_partial_application() {
        let mut participant = Participant::new("u1".into(), "alice".into());
        let original = participant.clone();

        let result = participant.merge(&fields(json!({
            "cursorPosition": "top-left",
            "username": "bob"
        })));

        match result {
            Err(RelayError::InvalidField { field, .. }) => assert_eq!(field, "cursorPosition"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(participant, original);
    }

    #[test]
    fn it_serializes_camel_case_with_extra_fields_inline() {
        let mut participant = Participant::new("u1".into(), "alice".into());
        participant.extra.insert("role".into(), json!("editor"));

        let value = serde_json::to_value(&participant).expect("");
        assert_eq!(value["userId"], json!("u1"));
        assert_eq!(value["cursorPosition"], json!({ "x": 0.0, "y": 0.0 }));
        assert_eq!(value["role"], json!("editor"));
        assert!(value.get("extra").is_none());
    }
}
