pub mod context;
pub mod entity;
pub mod error;
pub mod store;

pub use context::{Principal, Scope};
pub use entity::*;
pub use error::StoreError;
pub use store::{DataStore, MemoryStore, MAX_PAGE};
