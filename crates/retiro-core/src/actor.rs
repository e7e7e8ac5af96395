//! Actor identity — who is performing a workflow operation.
//!
//! The id and role arrive from the platform's identity provider on every
//! call. The router trusts the role for audience decisions; the state
//! machine does not — a new request is PENDING whoever created it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of roles that interact with the withdrawal workflow.
/// Adding a role forces a compile-time decision in the notification router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
  /// A legal guardian ("apoderado") of one or more students.
  Guardian,
  /// Teaching staff assigned to class sections.
  Teacher,
  /// Auxiliary staff (inspectors, assistants) who may report departures.
  Auxiliary,
  /// Administrative staff; the only role that authorizes or rejects.
  Admin,
}

impl ActorRole {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Guardian => "guardian",
      Self::Teacher => "teacher",
      Self::Auxiliary => "auxiliary",
      Self::Admin => "admin",
    }
  }

  pub fn is_staff(self) -> bool {
    matches!(self, Self::Teacher | Self::Auxiliary | Self::Admin)
  }
}

impl std::str::FromStr for ActorRole {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "guardian" => Ok(Self::Guardian),
      "teacher" => Ok(Self::Teacher),
      "auxiliary" => Ok(Self::Auxiliary),
      "admin" => Ok(Self::Admin),
      other => Err(format!("unknown actor role: {other:?}")),
    }
  }
}

impl std::fmt::Display for ActorRole {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// An authenticated caller, as supplied by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub user_id: Uuid,
  pub role:    ActorRole,
}

impl Actor {
  pub fn new(user_id: Uuid, role: ActorRole) -> Self { Self { user_id, role } }
}
