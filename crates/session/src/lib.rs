//! Durable conversation persistence, one JSON file per session.

mod store;

pub use store::{Session, SessionStore, SessionSummary, PLACEHOLDER_TITLE};
