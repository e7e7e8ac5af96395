//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, dates are `YYYY-MM-DD`, times are
//! `HH:MM:SS`. Enums are stored as their `as_str` discriminants. UUIDs are
//! stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use retiro_core::{
  actor::ActorRole,
  attendance::{AttendanceRecord, AttendanceStatus},
  notification::Notification,
  roster::{Student, UserAccount},
  withdrawal::{Withdrawal, WithdrawalOrigin, WithdrawalState},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Timestamps, dates, wall-clock times ─────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(e.to_string()))
}

pub fn encode_time(t: NaiveTime) -> String { t.format("%H:%M:%S").to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, "%H:%M:%S")
    .map_err(|e| Error::Decode(e.to_string()))
}

// ─── Enum discriminants ──────────────────────────────────────────────────────

pub fn decode_role(s: &str) -> Result<ActorRole> {
  s.parse().map_err(Error::Decode)
}

pub fn decode_state(s: &str) -> Result<WithdrawalState> {
  match s {
    "pending" => Ok(WithdrawalState::Pending),
    "authorized" => Ok(WithdrawalState::Authorized),
    "rejected" => Ok(WithdrawalState::Rejected),
    "completed" => Ok(WithdrawalState::Completed),
    other => Err(Error::Decode(format!("unknown withdrawal state: {other:?}"))),
  }
}

pub fn decode_origin(s: &str) -> Result<WithdrawalOrigin> {
  match s {
    "guardian_request" => Ok(WithdrawalOrigin::GuardianRequest),
    "staff_report" => Ok(WithdrawalOrigin::StaffReport),
    "administrative" => Ok(WithdrawalOrigin::Administrative),
    "emergency" => Ok(WithdrawalOrigin::Emergency),
    other => Err(Error::Decode(format!("unknown withdrawal origin: {other:?}"))),
  }
}

pub fn decode_status(s: &str) -> Result<AttendanceStatus> {
  match s {
    "absent" => Ok(AttendanceStatus::Absent),
    "late" => Ok(AttendanceStatus::Late),
    "present" => Ok(AttendanceStatus::Present),
    other => Err(Error::Decode(format!("unknown attendance status: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:        String,
  pub institution_id: String,
  pub role:           String,
  pub full_name:      String,
  pub email:          Option<String>,
}

impl RawUser {
  pub fn into_user(self) -> Result<UserAccount> {
    Ok(UserAccount {
      user_id:        decode_uuid(&self.user_id)?,
      institution_id: decode_uuid(&self.institution_id)?,
      role:           decode_role(&self.role)?,
      full_name:      self.full_name,
      email:          self.email,
    })
  }
}

pub struct RawStudent {
  pub student_id:     String,
  pub institution_id: String,
  pub section_id:     String,
  pub full_name:      String,
}

impl RawStudent {
  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      student_id:     decode_uuid(&self.student_id)?,
      institution_id: decode_uuid(&self.institution_id)?,
      section_id:     decode_uuid(&self.section_id)?,
      full_name:      self.full_name,
    })
  }
}

/// A `withdrawals` row joined with its category name.
pub struct RawWithdrawal {
  pub withdrawal_id:       String,
  pub student_id:          String,
  pub institution_id:      String,
  pub section_id:          String,
  pub date:                String,
  pub time:                String,
  pub category:            String,
  pub origin:              String,
  pub state:               String,
  pub contact_medium:      Option<String>,
  pub guardian_contacted:  Option<String>,
  pub guardian_authorized: Option<String>,
  pub verified_by:         Option<String>,
  pub rejection_reason:    Option<String>,
  pub notes:               Option<String>,
  pub created_by:          String,
  pub created_at:          String,
}

impl RawWithdrawal {
  pub fn into_withdrawal(self) -> Result<Withdrawal> {
    Ok(Withdrawal {
      withdrawal_id:       decode_uuid(&self.withdrawal_id)?,
      student_id:          decode_uuid(&self.student_id)?,
      institution_id:      decode_uuid(&self.institution_id)?,
      section_id:          decode_uuid(&self.section_id)?,
      date:                decode_date(&self.date)?,
      time:                decode_time(&self.time)?,
      category:            self.category,
      origin:              decode_origin(&self.origin)?,
      state:               decode_state(&self.state)?,
      contact_medium:      self.contact_medium,
      guardian_contacted:  self.guardian_contacted,
      guardian_authorized: self.guardian_authorized,
      verified_by:         self
        .verified_by
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      rejection_reason:    self.rejection_reason,
      notes:               self.notes,
      created_by:          decode_uuid(&self.created_by)?,
      created_at:          decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawAttendance {
  pub attendance_id: String,
  pub student_id:    String,
  pub date:          String,
  pub status:        String,
  pub observation:   String,
  pub recorded_by:   String,
  pub recorded_at:   String,
}

impl RawAttendance {
  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      attendance_id: decode_uuid(&self.attendance_id)?,
      student_id:    decode_uuid(&self.student_id)?,
      date:          decode_date(&self.date)?,
      status:        decode_status(&self.status)?,
      observation:   self.observation,
      recorded_by:   decode_uuid(&self.recorded_by)?,
      recorded_at:   decode_dt(&self.recorded_at)?,
    })
  }
}

pub struct RawNotification {
  pub notification_id: String,
  pub recipient_id:    String,
  pub title:           String,
  pub body:            String,
  pub category:        String,
  pub read:            bool,
  pub link:            Option<String>,
  pub created_at:      String,
}

impl RawNotification {
  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      recipient_id:    decode_uuid(&self.recipient_id)?,
      title:           self.title,
      body:            self.body,
      category:        self.category,
      read:            self.read,
      link:            self.link,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}
