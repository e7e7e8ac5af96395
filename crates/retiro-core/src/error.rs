//! Error taxonomy for the withdrawal workflow.
//!
//! Validation and state-machine errors are policy outcomes and map to 4xx at
//! the API layer; [`Error::Transaction`] is a store-level fault and maps to
//! 5xx. Delivery failures are not represented here at all — they are logged
//! by the notification router and never reach the caller.

use thiserror::Error;
use uuid::Uuid;

use crate::withdrawal::WithdrawalState;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid {field}: {reason}")]
  Validation {
    field:  &'static str,
    reason: String,
  },

  #[error("student not found: {0}")]
  StudentNotFound(Uuid),

  #[error("withdrawal not found: {0}")]
  WithdrawalNotFound(Uuid),

  #[error("invalid state transition: {from} -> {to}")]
  InvalidStateTransition {
    from: WithdrawalState,
    to:   WithdrawalState,
  },

  /// Deletion is only allowed while a request is still pending; anything
  /// later belongs to the approval audit trail.
  #[error("withdrawal {id} is {state}; only pending requests may be deleted")]
  NotDeletable {
    id:    Uuid,
    state: WithdrawalState,
  },

  /// The atomic withdrawal + attendance unit (or any other store write)
  /// could not commit. The withdrawal must be treated as not created.
  #[error("storage failure: {0}")]
  Transaction(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
    Self::Validation { field, reason: reason.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
