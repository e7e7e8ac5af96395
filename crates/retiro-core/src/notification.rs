//! In-app notification records.
//!
//! Append-only: one record per (event, recipient) pair, written by the
//! notification router. Read-flag toggling happens elsewhere in the
//! platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub recipient_id:    Uuid,
  pub title:           String,
  pub body:            String,
  pub category:        String,
  pub read:            bool,
  /// Deep link into the platform UI, e.g. `/retiros/<id>`.
  pub link:            Option<String>,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::RetiroStore::append_notification`].
/// `notification_id`, `read`, and `created_at` are set by the store.
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub recipient_id: Uuid,
  pub title:        String,
  pub body:         String,
  pub category:     String,
  pub link:         Option<String>,
}
