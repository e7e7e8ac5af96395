//! The `RetiroStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `retiro-store-sqlite`).
//! Higher layers (`retiro-engine`, `retiro-api`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  attendance::{AttendanceRecord, AttendanceUpsert},
  notification::{NewNotification, Notification},
  roster::{Guardian, NewStudent, NewUser, Student, UserAccount},
  withdrawal::{
    NewWithdrawal, StateTransition, Withdrawal, WithdrawalCategory,
    WithdrawalState,
  },
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`RetiroStore::list_withdrawals`].
#[derive(Debug, Clone, Default)]
pub struct WithdrawalQuery {
  pub student_id: Option<Uuid>,
  pub date:       Option<NaiveDate>,
  pub state:      Option<WithdrawalState>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relational store backing the withdrawal workflow.
///
/// The one compound operation is [`create_withdrawal`]: the withdrawal
/// insert and the attendance upsert commit in a single transaction, or not
/// at all. State changes are compare-and-set so concurrent authorizers
/// cannot both win.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
///
/// [`create_withdrawal`]: RetiroStore::create_withdrawal
pub trait RetiroStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Roster ────────────────────────────────────────────────────────────

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<UserAccount, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<UserAccount>, Self::Error>> + Send + '_;

  fn add_student(
    &self,
    input: NewStudent,
  ) -> impl Future<Output = Result<Student, Self::Error>> + Send + '_;

  fn get_student(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Student>, Self::Error>> + Send + '_;

  /// Associate a guardian user with a student. Idempotent per pair; the
  /// titular flag of an existing link is updated in place.
  fn link_guardian(
    &self,
    user_id: Uuid,
    student_id: Uuid,
    titular: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Assign a teacher to a class section. Idempotent per pair.
  fn assign_teacher(
    &self,
    user_id: Uuid,
    section_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// All guardians of a student, with their titular flags.
  fn guardians_of(
    &self,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Guardian>, Self::Error>> + Send + '_;

  /// All teaching staff assigned to a class section.
  fn teachers_of(
    &self,
    section_id: Uuid,
  ) -> impl Future<Output = Result<Vec<UserAccount>, Self::Error>> + Send + '_;

  /// All administrative-role users of an institution.
  fn admins_of(
    &self,
    institution_id: Uuid,
  ) -> impl Future<Output = Result<Vec<UserAccount>, Self::Error>> + Send + '_;

  // ── Reference data ────────────────────────────────────────────────────

  /// Find-or-create a withdrawal category by unique name. Safe to call
  /// concurrently for the same name; exactly one row results.
  fn upsert_category<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<WithdrawalCategory, Self::Error>> + Send + 'a;

  // ── Withdrawals ───────────────────────────────────────────────────────

  /// Persist a withdrawal in state `Pending` and apply the attendance
  /// upsert, atomically. If either write fails, neither is committed.
  fn create_withdrawal(
    &self,
    input: NewWithdrawal,
    attendance: AttendanceUpsert,
  ) -> impl Future<Output = Result<Withdrawal, Self::Error>> + Send + '_;

  fn get_withdrawal(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Withdrawal>, Self::Error>> + Send + '_;

  fn list_withdrawals<'a>(
    &'a self,
    query: &'a WithdrawalQuery,
  ) -> impl Future<Output = Result<Vec<Withdrawal>, Self::Error>> + Send + 'a;

  /// Apply a guarded state transition. Returns the updated withdrawal, or
  /// `None` if the row was not in `transition.from` (including when it does
  /// not exist) — the caller decides how to surface that.
  fn transition_withdrawal(
    &self,
    id: Uuid,
    transition: StateTransition,
  ) -> impl Future<Output = Result<Option<Withdrawal>, Self::Error>> + Send + '_;

  /// Delete a withdrawal, guarded on it still being in `from`. Returns
  /// whether a row was deleted.
  fn delete_withdrawal(
    &self,
    id: Uuid,
    from: WithdrawalState,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Attendance ────────────────────────────────────────────────────────

  /// Find-or-create the (student, date) attendance record outside any
  /// withdrawal transaction. Used by the regular attendance-taking path.
  fn upsert_attendance(
    &self,
    upsert: AttendanceUpsert,
  ) -> impl Future<Output = Result<AttendanceRecord, Self::Error>> + Send + '_;

  fn attendance_for(
    &self,
    student_id: Uuid,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Append one in-app notification record.
  fn append_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// All notifications for a recipient, newest first.
  fn notifications_for(
    &self,
    recipient_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;
}
