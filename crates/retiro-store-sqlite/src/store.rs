//! [`SqliteStore`] — the SQLite implementation of [`RetiroStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use retiro_core::{
  attendance::{AttendanceRecord, AttendanceUpsert},
  notification::{NewNotification, Notification},
  roster::{Guardian, NewStudent, NewUser, Student, UserAccount},
  store::{RetiroStore, WithdrawalQuery},
  withdrawal::{
    NewWithdrawal, StateTransition, Withdrawal, WithdrawalCategory,
    WithdrawalState,
  },
};

use crate::{
  encode::{
    RawAttendance, RawNotification, RawStudent, RawUser, RawWithdrawal,
    encode_date, encode_dt, encode_time, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Shared SQL fragments ────────────────────────────────────────────────────

/// Withdrawal rows are always read joined with their category name.
const WITHDRAWAL_SELECT: &str = "
  SELECT w.withdrawal_id, w.student_id, w.institution_id, w.section_id,
         w.date, w.time, c.name, w.origin, w.state,
         w.contact_medium, w.guardian_contacted, w.guardian_authorized,
         w.verified_by, w.rejection_reason, w.notes,
         w.created_by, w.created_at
  FROM withdrawals w
  JOIN withdrawal_categories c ON c.category_id = w.category_id";

fn raw_withdrawal_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawWithdrawal> {
  Ok(RawWithdrawal {
    withdrawal_id:       row.get(0)?,
    student_id:          row.get(1)?,
    institution_id:      row.get(2)?,
    section_id:          row.get(3)?,
    date:                row.get(4)?,
    time:                row.get(5)?,
    category:            row.get(6)?,
    origin:              row.get(7)?,
    state:               row.get(8)?,
    contact_medium:      row.get(9)?,
    guardian_contacted:  row.get(10)?,
    guardian_authorized: row.get(11)?,
    verified_by:         row.get(12)?,
    rejection_reason:    row.get(13)?,
    notes:               row.get(14)?,
    created_by:          row.get(15)?,
    created_at:          row.get(16)?,
  })
}

fn raw_user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawUser> {
  Ok(RawUser {
    user_id:        row.get(0)?,
    institution_id: row.get(1)?,
    role:           row.get(2)?,
    full_name:      row.get(3)?,
    email:          row.get(4)?,
  })
}

fn query_withdrawal(
  conn: &rusqlite::Connection,
  id: &str,
) -> rusqlite::Result<Option<RawWithdrawal>> {
  conn
    .query_row(
      &format!("{WITHDRAWAL_SELECT} WHERE w.withdrawal_id = ?1"),
      rusqlite::params![id],
      raw_withdrawal_from_row,
    )
    .optional()
}

/// Find-or-create on the (student_id, date) unique key; the second writer
/// overwrites status, observation, and recorder, never duplicates the row.
fn apply_attendance_upsert(
  conn: &rusqlite::Connection,
  attendance_id: &str,
  student_id: &str,
  date: &str,
  status: &str,
  observation: &str,
  recorded_by: &str,
  recorded_at: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO attendance (
       attendance_id, student_id, date, status,
       observation, recorded_by, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     ON CONFLICT (student_id, date) DO UPDATE SET
       status      = excluded.status,
       observation = excluded.observation,
       recorded_by = excluded.recorded_by,
       recorded_at = excluded.recorded_at",
    rusqlite::params![
      attendance_id,
      student_id,
      date,
      status,
      observation,
      recorded_by,
      recorded_at,
    ],
  )?;
  Ok(())
}

fn query_attendance(
  conn: &rusqlite::Connection,
  student_id: &str,
  date: &str,
) -> rusqlite::Result<Option<RawAttendance>> {
  conn
    .query_row(
      "SELECT attendance_id, student_id, date, status,
              observation, recorded_by, recorded_at
       FROM attendance WHERE student_id = ?1 AND date = ?2",
      rusqlite::params![student_id, date],
      |row| {
        Ok(RawAttendance {
          attendance_id: row.get(0)?,
          student_id:    row.get(1)?,
          date:          row.get(2)?,
          status:        row.get(3)?,
          observation:   row.get(4)?,
          recorded_by:   row.get(5)?,
          recorded_at:   row.get(6)?,
        })
      },
    )
    .optional()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Retiro store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── RetiroStore impl ────────────────────────────────────────────────────────

impl RetiroStore for SqliteStore {
  type Error = Error;

  // ── Roster ────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<UserAccount> {
    let user = UserAccount {
      user_id:        Uuid::new_v4(),
      institution_id: input.institution_id,
      role:           input.role,
      full_name:      input.full_name,
      email:          input.email,
    };

    let id_str   = encode_uuid(user.user_id);
    let inst_str = encode_uuid(user.institution_id);
    let role_str = user.role.as_str().to_owned();
    let name     = user.full_name.clone();
    let email    = user.email.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, institution_id, role, full_name, email)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, inst_str, role_str, name, email],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<UserAccount>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, institution_id, role, full_name, email
               FROM users WHERE user_id = ?1",
              rusqlite::params![id_str],
              raw_user_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn add_student(&self, input: NewStudent) -> Result<Student> {
    let student = Student {
      student_id:     Uuid::new_v4(),
      institution_id: input.institution_id,
      section_id:     input.section_id,
      full_name:      input.full_name,
    };

    let id_str      = encode_uuid(student.student_id);
    let inst_str    = encode_uuid(student.institution_id);
    let section_str = encode_uuid(student.section_id);
    let name        = student.full_name.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO students (student_id, institution_id, section_id, full_name)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, inst_str, section_str, name],
        )?;
        Ok(())
      })
      .await?;

    Ok(student)
  }

  async fn get_student(&self, id: Uuid) -> Result<Option<Student>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawStudent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT student_id, institution_id, section_id, full_name
               FROM students WHERE student_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawStudent {
                  student_id:     row.get(0)?,
                  institution_id: row.get(1)?,
                  section_id:     row.get(2)?,
                  full_name:      row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStudent::into_student).transpose()
  }

  async fn link_guardian(
    &self,
    user_id: Uuid,
    student_id: Uuid,
    titular: bool,
  ) -> Result<()> {
    let user_str    = encode_uuid(user_id);
    let student_str = encode_uuid(student_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO guardian_links (user_id, student_id, titular)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (user_id, student_id) DO UPDATE SET
             titular = excluded.titular",
          rusqlite::params![user_str, student_str, titular],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn assign_teacher(&self, user_id: Uuid, section_id: Uuid) -> Result<()> {
    let user_str    = encode_uuid(user_id);
    let section_str = encode_uuid(section_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO section_teachers (user_id, section_id)
           VALUES (?1, ?2)
           ON CONFLICT (user_id, section_id) DO NOTHING",
          rusqlite::params![user_str, section_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn guardians_of(&self, student_id: Uuid) -> Result<Vec<Guardian>> {
    let student_str = encode_uuid(student_id);

    let raws: Vec<(RawUser, bool)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT u.user_id, u.institution_id, u.role, u.full_name, u.email,
                  g.titular
           FROM users u
           JOIN guardian_links g ON g.user_id = u.user_id
           WHERE g.student_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![student_str], |row| {
            Ok((raw_user_from_row(row)?, row.get::<_, bool>(5)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, titular)| Ok(Guardian { user: raw.into_user()?, titular }))
      .collect()
  }

  async fn teachers_of(&self, section_id: Uuid) -> Result<Vec<UserAccount>> {
    let section_str = encode_uuid(section_id);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT u.user_id, u.institution_id, u.role, u.full_name, u.email
           FROM users u
           JOIN section_teachers st ON st.user_id = u.user_id
           WHERE st.section_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![section_str], raw_user_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn admins_of(&self, institution_id: Uuid) -> Result<Vec<UserAccount>> {
    let inst_str = encode_uuid(institution_id);

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id, institution_id, role, full_name, email
           FROM users WHERE institution_id = ?1 AND role = 'admin'",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![inst_str], raw_user_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  // ── Reference data ────────────────────────────────────────────────────────

  async fn upsert_category(&self, name: &str) -> Result<WithdrawalCategory> {
    let candidate_id = encode_uuid(Uuid::new_v4());
    let name_owned   = name.to_owned();

    let (id_str, name_str): (String, String) = self
      .conn
      .call(move |conn| {
        // Insert-or-ignore then read back, all under the same connection, so
        // two concurrent upserts of a brand-new name converge on one row.
        conn.execute(
          "INSERT INTO withdrawal_categories (category_id, name)
           VALUES (?1, ?2)
           ON CONFLICT (name) DO NOTHING",
          rusqlite::params![candidate_id, name_owned],
        )?;
        let row = conn.query_row(
          "SELECT category_id, name FROM withdrawal_categories WHERE name = ?1",
          rusqlite::params![name_owned],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(row)
      })
      .await?;

    Ok(WithdrawalCategory {
      category_id: crate::encode::decode_uuid(&id_str)?,
      name:        name_str,
    })
  }

  // ── Withdrawals ───────────────────────────────────────────────────────────

  async fn create_withdrawal(
    &self,
    input: NewWithdrawal,
    attendance: AttendanceUpsert,
  ) -> Result<Withdrawal> {
    let withdrawal_id = Uuid::new_v4();
    let created_at    = Utc::now();

    let w_id_str      = encode_uuid(withdrawal_id);
    let student_str   = encode_uuid(input.student_id);
    let inst_str      = encode_uuid(input.institution_id);
    let section_str   = encode_uuid(input.section_id);
    let date_str      = encode_date(input.date);
    let time_str      = encode_time(input.time);
    let category_str  = encode_uuid(input.category_id);
    let origin_str    = input.origin.as_str().to_owned();
    let created_by    = encode_uuid(input.created_by);
    let created_str   = encode_dt(created_at);

    let att_id_str    = encode_uuid(Uuid::new_v4());
    let att_date_str  = encode_date(attendance.date);
    let att_status    = attendance.status.as_str().to_owned();
    let att_obs       = attendance.observation.clone();
    let att_by_str    = encode_uuid(attendance.recorded_by);
    let att_at_str    = encode_dt(created_at);
    let att_student   = encode_uuid(attendance.student_id);

    let raw: RawWithdrawal = self
      .conn
      .call(move |conn| {
        // The atomic unit: withdrawal insert + attendance upsert commit
        // together or not at all.
        let tx = conn.transaction()?;

        tx.execute(
          "INSERT INTO withdrawals (
             withdrawal_id, student_id, institution_id, section_id,
             date, time, category_id, origin, state,
             contact_medium, guardian_contacted, guardian_authorized,
             verified_by, rejection_reason, notes, created_by, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending',
                     ?9, ?10, ?11, NULL, NULL, ?12, ?13, ?14)",
          rusqlite::params![
            w_id_str,
            student_str,
            inst_str,
            section_str,
            date_str,
            time_str,
            category_str,
            origin_str,
            input.contact_medium,
            input.guardian_contacted,
            input.guardian_authorized,
            input.notes,
            created_by,
            created_str,
          ],
        )?;

        apply_attendance_upsert(
          &tx,
          &att_id_str,
          &att_student,
          &att_date_str,
          &att_status,
          &att_obs,
          &att_by_str,
          &att_at_str,
        )?;

        tx.commit()?;

        let raw = query_withdrawal(conn, &w_id_str)?.ok_or_else(|| {
          tokio_rusqlite::Error::Rusqlite(rusqlite::Error::QueryReturnedNoRows)
        })?;
        Ok(raw)
      })
      .await?;

    raw.into_withdrawal()
  }

  async fn get_withdrawal(&self, id: Uuid) -> Result<Option<Withdrawal>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawWithdrawal> = self
      .conn
      .call(move |conn| Ok(query_withdrawal(conn, &id_str)?))
      .await?;

    raw.map(RawWithdrawal::into_withdrawal).transpose()
  }

  async fn list_withdrawals(
    &self,
    query: &WithdrawalQuery,
  ) -> Result<Vec<Withdrawal>> {
    let student_str = query.student_id.map(encode_uuid);
    let date_str    = query.date.map(encode_date);
    let state_str   = query.state.map(|s| s.as_str().to_owned());

    let raws: Vec<RawWithdrawal> = self
      .conn
      .call(move |conn| {
        let mut conds:  Vec<String> = vec![];
        let mut params: Vec<String> = vec![];

        if let Some(s) = student_str {
          params.push(s);
          conds.push(format!("w.student_id = ?{}", params.len()));
        }
        if let Some(d) = date_str {
          params.push(d);
          conds.push(format!("w.date = ?{}", params.len()));
        }
        if let Some(s) = state_str {
          params.push(s);
          conds.push(format!("w.state = ?{}", params.len()));
        }

        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!("WHERE {}", conds.join(" AND "))
        };

        let sql = format!(
          "{WITHDRAWAL_SELECT} {where_clause} ORDER BY w.created_at DESC"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(params.iter()),
            raw_withdrawal_from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawWithdrawal::into_withdrawal).collect()
  }

  async fn transition_withdrawal(
    &self,
    id: Uuid,
    transition: StateTransition,
  ) -> Result<Option<Withdrawal>> {
    let id_str       = encode_uuid(id);
    let from_str     = transition.from.as_str().to_owned();
    let to_str       = transition.to.as_str().to_owned();
    let verifier_str = transition.verified_by.map(encode_uuid);
    let reason       = transition.reason;

    let raw: Option<RawWithdrawal> = self
      .conn
      .call(move |conn| {
        // Compare-and-set: zero affected rows means the row moved (or never
        // existed) and the transition loses.
        let changed = conn.execute(
          "UPDATE withdrawals SET
             state            = ?1,
             verified_by      = COALESCE(?2, verified_by),
             rejection_reason = COALESCE(?3, rejection_reason)
           WHERE withdrawal_id = ?4 AND state = ?5",
          rusqlite::params![to_str, verifier_str, reason, id_str, from_str],
        )?;

        if changed == 0 {
          return Ok(None);
        }
        Ok(query_withdrawal(conn, &id_str)?)
      })
      .await?;

    raw.map(RawWithdrawal::into_withdrawal).transpose()
  }

  async fn delete_withdrawal(
    &self,
    id: Uuid,
    from: WithdrawalState,
  ) -> Result<bool> {
    let id_str   = encode_uuid(id);
    let from_str = from.as_str().to_owned();

    let deleted = self
      .conn
      .call(move |conn| {
        let rows = conn.execute(
          "DELETE FROM withdrawals WHERE withdrawal_id = ?1 AND state = ?2",
          rusqlite::params![id_str, from_str],
        )?;
        Ok(rows > 0)
      })
      .await?;

    Ok(deleted)
  }

  // ── Attendance ────────────────────────────────────────────────────────────

  async fn upsert_attendance(
    &self,
    upsert: AttendanceUpsert,
  ) -> Result<AttendanceRecord> {
    let att_id_str  = encode_uuid(Uuid::new_v4());
    let student_str = encode_uuid(upsert.student_id);
    let date_str    = encode_date(upsert.date);
    let status_str  = upsert.status.as_str().to_owned();
    let observation = upsert.observation.clone();
    let by_str      = encode_uuid(upsert.recorded_by);
    let at_str      = encode_dt(Utc::now());

    let raw: RawAttendance = self
      .conn
      .call(move |conn| {
        apply_attendance_upsert(
          conn,
          &att_id_str,
          &student_str,
          &date_str,
          &status_str,
          &observation,
          &by_str,
          &at_str,
        )?;
        let raw = query_attendance(conn, &student_str, &date_str)?
          .ok_or_else(|| {
            tokio_rusqlite::Error::Rusqlite(
              rusqlite::Error::QueryReturnedNoRows,
            )
          })?;
        Ok(raw)
      })
      .await?;

    raw.into_record()
  }

  async fn attendance_for(
    &self,
    student_id: Uuid,
    date: NaiveDate,
  ) -> Result<Option<AttendanceRecord>> {
    let student_str = encode_uuid(student_id);
    let date_str    = encode_date(date);

    let raw: Option<RawAttendance> = self
      .conn
      .call(move |conn| Ok(query_attendance(conn, &student_str, &date_str)?))
      .await?;

    raw.map(RawAttendance::into_record).transpose()
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn append_notification(
    &self,
    input: NewNotification,
  ) -> Result<Notification> {
    let notification = Notification {
      notification_id: Uuid::new_v4(),
      recipient_id:    input.recipient_id,
      title:           input.title,
      body:            input.body,
      category:        input.category,
      read:            false,
      link:            input.link,
      created_at:      Utc::now(),
    };

    let id_str    = encode_uuid(notification.notification_id);
    let recip_str = encode_uuid(notification.recipient_id);
    let title     = notification.title.clone();
    let body      = notification.body.clone();
    let category  = notification.category.clone();
    let link      = notification.link.clone();
    let at_str    = encode_dt(notification.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notifications (
             notification_id, recipient_id, title, body,
             category, read, link, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
          rusqlite::params![id_str, recip_str, title, body, category, link, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(notification)
  }

  async fn notifications_for(
    &self,
    recipient_id: Uuid,
  ) -> Result<Vec<Notification>> {
    let recip_str = encode_uuid(recipient_id);

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT notification_id, recipient_id, title, body,
                  category, read, link, created_at
           FROM notifications
           WHERE recipient_id = ?1
           ORDER BY created_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![recip_str], |row| {
            Ok(RawNotification {
              notification_id: row.get(0)?,
              recipient_id:    row.get(1)?,
              title:           row.get(2)?,
              body:            row.get(3)?,
              category:        row.get(4)?,
              read:            row.get(5)?,
              link:            row.get(6)?,
              created_at:      row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawNotification::into_notification)
      .collect()
  }
}
