//! HTTP surface of the investor-portal assistant: session CRUD, the
//! chat turn endpoint (SSE), and approval decisions.

pub mod api;
pub mod principal;
pub mod router;
pub mod state;
