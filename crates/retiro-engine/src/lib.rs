//! The withdrawal workflow engine: state machine service + notification
//! router.
//!
//! [`WithdrawalService`] owns the request lifecycle and invokes the
//! attendance reconciler inside the store's creation transaction; the
//! [`router`] module computes each event's audience fresh at dispatch time
//! and fans notifications out over two independent best-effort channels.
//! Generic over any [`retiro_core::store::RetiroStore`] and
//! [`retiro_core::mailer::Mailer`].

pub mod router;
pub mod service;

pub use router::DispatchSummary;
pub use service::{CreateWithdrawal, WithdrawalService};

#[cfg(test)]
mod tests;
