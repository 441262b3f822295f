//! Portal tools exposed to the model.
//!
//! Read-only tools (lookups, summaries, search) never require
//! approval. Mutating tools always set `needs_approval` and append an
//! audit record after a successful mutation; an audit append failure
//! is logged but does not fail the call, while a mutation failure
//! fails the whole call.

mod client_lookup;
mod client_status;
mod document_read;
mod document_search;
mod notification_create;
mod offer_list;
mod portfolio_summary;
mod property_lookup;
mod report_save;
mod send_email;
mod send_message;

pub use client_lookup::ClientLookupTool;
pub use client_status::ClientStatusTool;
pub use document_read::DocumentReadTool;
pub use document_search::DocumentSearchTool;
pub use notification_create::NotificationCreateTool;
pub use offer_list::OfferListTool;
pub use portfolio_summary::PortfolioSummaryTool;
pub use property_lookup::PropertyLookupTool;
pub use report_save::ReportSaveTool;
pub use send_email::SendEmailTool;
pub use send_message::SendMessageTool;

use immo_core::{ActivityEntry, DataStore};
use tracing::warn;

use crate::tool::ToolContext;

/// Log-after-mutate: the mutation already succeeded, so a failing
/// audit append must not fail the call.
pub(crate) async fn record_activity(context: &ToolContext, entry: ActivityEntry) {
    let action = entry.action;
    if let Err(e) = context.store.append_activity(entry).await {
        warn!(action = %action, error = %e, "audit append failed after successful mutation");
    }
}

/// Uniform denial payload for privileged tools called without the
/// elevated scope. Registry selection alone is never trusted.
pub(crate) fn admin_required(context: &ToolContext) -> Option<crate::tool::ToolResult> {
    if context.principal.is_admin() {
        None
    } else {
        Some(crate::tool::ToolResult::failure(
            "Keine Berechtigung: Administratorrechte erforderlich",
        ))
    }
}
