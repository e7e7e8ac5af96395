//! Withdrawal ("retiro") — an early-departure request and its state machine.
//!
//! The allowed edges are `Pending → Authorized → Completed` and
//! `Pending → Rejected`, nothing else. Every request enters at `Pending`
//! regardless of who created it, so the approval audit trail is uniform even
//! when an administrator types the request in on behalf of a walk-in
//! guardian.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalState {
  Pending,
  Authorized,
  Rejected,
  Completed,
}

impl WithdrawalState {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Authorized => "authorized",
      Self::Rejected => "rejected",
      Self::Completed => "completed",
    }
  }

  /// Whether `self → to` is an allowed edge of the state machine.
  pub fn can_transition_to(self, to: Self) -> bool {
    matches!(
      (self, to),
      (Self::Pending, Self::Authorized)
        | (Self::Pending, Self::Rejected)
        | (Self::Authorized, Self::Completed)
    )
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Rejected | Self::Completed)
  }
}

impl std::fmt::Display for WithdrawalState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Origin ──────────────────────────────────────────────────────────────────

/// Who or what channel initiated the request. Informational; it never grants
/// an implicit initial approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalOrigin {
  GuardianRequest,
  StaffReport,
  Administrative,
  Emergency,
}

impl WithdrawalOrigin {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::GuardianRequest => "guardian_request",
      Self::StaffReport => "staff_report",
      Self::Administrative => "administrative",
      Self::Emergency => "emergency",
    }
  }
}

// ─── Category ────────────────────────────────────────────────────────────────

/// A looked-up reason type, upserted into a reference table by unique name so
/// two concurrent requests for a brand-new category cannot race into
/// duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalCategory {
  pub category_id: Uuid,
  pub name:        String,
}

// ─── Withdrawal ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
  pub withdrawal_id:       Uuid,
  pub student_id:          Uuid,
  pub institution_id:      Uuid,
  pub section_id:          Uuid,
  pub date:                NaiveDate,
  pub time:                NaiveTime,
  pub category:            String,
  pub origin:              WithdrawalOrigin,
  pub state:               WithdrawalState,
  pub contact_medium:      Option<String>,
  pub guardian_contacted:  Option<String>,
  /// Name of the adult authorized to collect the student, if one was named.
  pub guardian_authorized: Option<String>,
  /// The administrative actor who authorized or rejected the request.
  pub verified_by:         Option<Uuid>,
  pub rejection_reason:    Option<String>,
  pub notes:               Option<String>,
  pub created_by:          Uuid,
  pub created_at:          DateTime<Utc>,
}

/// Input to [`crate::store::RetiroStore::create_withdrawal`]. There is no
/// state field: the store always persists `Pending`.
#[derive(Debug, Clone)]
pub struct NewWithdrawal {
  pub student_id:          Uuid,
  pub institution_id:      Uuid,
  pub section_id:          Uuid,
  pub date:                NaiveDate,
  pub time:                NaiveTime,
  pub category_id:         Uuid,
  pub origin:              WithdrawalOrigin,
  pub contact_medium:      Option<String>,
  pub guardian_contacted:  Option<String>,
  pub guardian_authorized: Option<String>,
  pub notes:               Option<String>,
  pub created_by:          Uuid,
}

/// A guarded state update: applied only if the row is still in `from`.
#[derive(Debug, Clone)]
pub struct StateTransition {
  pub from:        WithdrawalState,
  pub to:          WithdrawalState,
  pub verified_by: Option<Uuid>,
  pub reason:      Option<String>,
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// The workflow events that fan out notifications. `Completed` is a physical
/// hand-off confirmation and notifies nobody, so it is not in this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalEvent {
  Created,
  Authorized,
  Rejected,
}
