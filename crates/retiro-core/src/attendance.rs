//! Daily attendance records and the withdrawal reconciler.
//!
//! A withdrawal's departure time determines what the student's attendance
//! record for that day should say. The mapping is a pure function here; the
//! upsert itself happens inside the store's withdrawal transaction.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike as _, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minutes past midnight for the nominal school-day start (08:30).
const DAY_START_MINUTES: u32 = 8 * 60 + 30;
/// Minutes past midnight for the end of the lateness grace window (10:00).
const GRACE_END_MINUTES: u32 = 10 * 60;

/// The status code written into a daily attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
  /// Departed before the school day started; never effectively attended.
  Absent,
  /// Departed during the grace window; partial attendance.
  Late,
  /// Departed after the grace window; attended, then left authorized.
  Present,
}

impl AttendanceStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Absent => "absent",
      Self::Late => "late",
      Self::Present => "present",
    }
  }
}

/// Map a departure time to the attendance status it implies.
///
/// Both boundaries belong to the upper bracket: exactly 08:30 is `Late`,
/// exactly 10:00 is `Present`.
pub fn status_for_departure(departure: NaiveTime) -> AttendanceStatus {
  let minutes = departure.hour() * 60 + departure.minute();
  if minutes < DAY_START_MINUTES {
    AttendanceStatus::Absent
  } else if minutes < GRACE_END_MINUTES {
    AttendanceStatus::Late
  } else {
    AttendanceStatus::Present
  }
}

/// The observation written alongside a reconciled status. Always embeds the
/// literal departure time so an auditor can see the record was touched by a
/// withdrawal, even when the status itself was overwritten.
pub fn observation_for_departure(
  departure: NaiveTime,
  status: AttendanceStatus,
) -> String {
  let gloss = match status {
    AttendanceStatus::Absent => "no alcanzó a asistir",
    AttendanceStatus::Late => "asistencia parcial",
    AttendanceStatus::Present => "asistió y se retiró autorizado",
  };
  format!("Retiro anticipado a las {} ({gloss})", departure.format("%H:%M"))
}

/// One logical attendance record per (student, calendar date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub attendance_id: Uuid,
  pub student_id:    Uuid,
  pub date:          NaiveDate,
  pub status:        AttendanceStatus,
  pub observation:   String,
  pub recorded_by:   Uuid,
  pub recorded_at:   DateTime<Utc>,
}

/// Input to the find-or-create attendance upsert. Applying the same upsert
/// twice leaves exactly one record carrying the second call's values.
#[derive(Debug, Clone)]
pub struct AttendanceUpsert {
  pub student_id:  Uuid,
  pub date:        NaiveDate,
  pub status:      AttendanceStatus,
  pub observation: String,
  pub recorded_by: Uuid,
}

impl AttendanceUpsert {
  /// Build the upsert a withdrawal at `departure` implies.
  pub fn from_departure(
    student_id: Uuid,
    date: NaiveDate,
    departure: NaiveTime,
    recorded_by: Uuid,
  ) -> Self {
    let status = status_for_departure(departure);
    Self {
      student_id,
      date,
      status,
      observation: observation_for_departure(departure, status),
      recorded_by,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
  }

  #[test]
  fn before_day_start_is_absent() {
    assert_eq!(status_for_departure(at(7, 0)), AttendanceStatus::Absent);
    assert_eq!(status_for_departure(at(8, 29)), AttendanceStatus::Absent);
  }

  #[test]
  fn day_start_boundary_is_late() {
    assert_eq!(status_for_departure(at(8, 30)), AttendanceStatus::Late);
    assert_eq!(status_for_departure(at(9, 59)), AttendanceStatus::Late);
  }

  #[test]
  fn grace_end_boundary_is_present() {
    assert_eq!(status_for_departure(at(10, 0)), AttendanceStatus::Present);
    assert_eq!(status_for_departure(at(15, 45)), AttendanceStatus::Present);
  }

  #[test]
  fn observation_embeds_literal_departure_time() {
    let obs = observation_for_departure(at(9, 5), AttendanceStatus::Late);
    assert!(obs.contains("09:05"), "observation: {obs}");
  }
}
