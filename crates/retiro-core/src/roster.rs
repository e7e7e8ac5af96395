//! Roster types — users, students, and the relations the notification
//! router resolves at dispatch time.
//!
//! User and student CRUD belongs to the surrounding platform; this crate
//! only defines the shapes the workflow reads (and the minimal write inputs
//! the store needs so an institution can be seeded).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::ActorRole;

/// A platform user. `email` is optional; recipients without one simply never
/// receive the email channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
  pub user_id:        Uuid,
  pub institution_id: Uuid,
  pub role:           ActorRole,
  pub full_name:      String,
  pub email:          Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
  pub institution_id: Uuid,
  pub role:           ActorRole,
  pub full_name:      String,
  pub email:          Option<String>,
}

/// A student belongs to exactly one institution and one class section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
  pub student_id:     Uuid,
  pub institution_id: Uuid,
  pub section_id:     Uuid,
  pub full_name:      String,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
  pub institution_id: Uuid,
  pub section_id:     Uuid,
  pub full_name:      String,
}

/// A guardian as related to one particular student. `titular` marks the
/// primary, authorization-capable guardian.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guardian {
  pub user:    UserAccount,
  pub titular: bool,
}
