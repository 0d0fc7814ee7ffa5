pub mod activity;
mod error;
mod message;
mod overlay;
mod participant;
mod session_document;
mod types;

pub use activity::{ActivityKind, ActivityRecord};
pub use error::*;
pub use message::*;
pub use overlay::*;
pub use participant::*;
pub use session_document::*;
pub use types::*;

pub extern crate chrono;
pub extern crate serde;
pub extern crate serde_json;
