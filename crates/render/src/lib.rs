//! Presentation mapping for tool outputs.
//!
//! Tools return heterogeneous JSON; the UI renders a small fixed set
//! of primitives. A [`RenderRegistry`] maps tool name to a mapper that
//! reshapes the raw output into one primitive. Every mismatch falls
//! back soft to a raw-payload view; rendering never fails a
//! conversation.

mod primitives;
mod registry;

pub use primitives::{AlertSeverity, BadgeItem, Metric, RenderSpec};
pub use registry::{RenderRegistry, ToolOutputMapper};
