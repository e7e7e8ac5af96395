//! The transactional email gateway, seen from the workflow's side.
//!
//! Best-effort: a send failure is logged by the router and never rolls back
//! the withdrawal or blocks other recipients.

use std::future::Future;

/// Abstraction over an external email gateway.
///
/// The contract is intentionally opaque: (address, subject, HTML body) in,
/// success or failure out. Implementations live near the transport they use
/// (e.g. the HTTP client in `retiro-api`).
pub trait Mailer: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn send<'a>(
    &'a self,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
