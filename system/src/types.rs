use rand::Rng;
use serde::{Deserialize, Serialize};

pub type ConnectionId = u32;
pub type SessionId = String;
pub type UserId = String;
pub type OverlayId = String;
pub type Timestamp = chrono::DateTime<chrono::Utc>;

pub fn now() -> Timestamp {
    chrono::Utc::now()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// Hex color in `#rrggbb` form. Clients may overwrite it with any string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    pub fn random() -> Self {
        let rgb: u32 = rand::thread_rng().gen_range(0..=0x00ff_ffff);
        Color(format!("#{:06x}", rgb))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
