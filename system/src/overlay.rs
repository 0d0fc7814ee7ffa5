use crate::OverlayId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A positioned, timed visual element. Everything except `id` is opaque to
/// the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub id: OverlayId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Overlay {
    /// Shallow merge. `id` is never overwritten.
    pub fn merge(&mut self, updates: &Map<String, Value>) {
        for (key, value) in updates {
            if key == "id" {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
    }
}

impl From<&Overlay> for Value {
    fn from(overlay: &Overlay) -> Self {
        let mut record = overlay.fields.clone();
        record.insert("id".to_owned(), Value::String(overlay.id.clone()));
        Value::Object(record)
    }
}
