//! Outbound email boundary.
//!
//! The agent core sends email through the [`Mailer`] trait only:
//! recipient, subject, body — fire-and-forget, with success or failure
//! reported synchronously. [`SmtpMailer`] delivers via SMTP;
//! [`MemoryMailer`] captures messages for tests.

pub mod email;
pub mod traits;

pub use email::SmtpMailer;
pub use traits::{Mailer, MemoryMailer, NotifyError, OutboundEmail};
