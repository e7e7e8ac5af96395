//! Workflow tests for `WithdrawalService` and the notification router,
//! against an in-memory SQLite store and a recording mailer.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use retiro_core::{
  Error,
  actor::{Actor, ActorRole},
  attendance::AttendanceStatus,
  mailer::Mailer,
  roster::{NewStudent, NewUser, Student, UserAccount},
  store::RetiroStore,
  withdrawal::{Withdrawal, WithdrawalOrigin, WithdrawalState},
};
use retiro_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{CreateWithdrawal, WithdrawalService};

// ─── Test mailer ─────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("gateway refused mail to {0}")]
struct Refused(String);

/// Records every accepted send; refuses addresses listed in `fail_for`.
#[derive(Default)]
struct RecordingMailer {
  fail_for: Option<String>,
  sent:     Mutex<Vec<(String, String, String)>>,
}

impl RecordingMailer {
  fn sent_to(&self, address: &str) -> usize {
    self
      .sent
      .lock()
      .unwrap()
      .iter()
      .filter(|(to, _, _)| to == address)
      .count()
  }

  fn last_html_to(&self, address: &str) -> Option<String> {
    self
      .sent
      .lock()
      .unwrap()
      .iter()
      .rev()
      .find(|(to, _, _)| to == address)
      .map(|(_, _, html)| html.clone())
  }
}

impl Mailer for RecordingMailer {
  type Error = Refused;

  async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), Refused> {
    if self.fail_for.as_deref() == Some(to) {
      return Err(Refused(to.to_string()));
    }
    self
      .sent
      .lock()
      .unwrap()
      .push((to.to_string(), subject.to_string(), html_body.to_string()));
    Ok(())
  }
}

// ─── World setup ─────────────────────────────────────────────────────────────

/// One institution with student S, guardians G1 (titular) and G2, teacher T
/// assigned to S's section, and admin A. Everyone has an email on file.
struct World {
  service: WithdrawalService<SqliteStore, RecordingMailer>,
  store:   Arc<SqliteStore>,
  mailer:  Arc<RecordingMailer>,
  student: Student,
  g1:      UserAccount,
  g2:      UserAccount,
  teacher: UserAccount,
  admin:   UserAccount,
}

async fn world_with_mailer(mailer: RecordingMailer) -> World {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let mailer = Arc::new(mailer);
  let inst = Uuid::new_v4();

  let user = async |role: ActorRole, name: &str, email: &str| {
    store
      .add_user(NewUser {
        institution_id: inst,
        role,
        full_name: name.into(),
        email: Some(email.into()),
      })
      .await
      .unwrap()
  };

  let g1 = user(ActorRole::Guardian, "G1", "g1@example.com").await;
  let g2 = user(ActorRole::Guardian, "G2", "g2@example.com").await;
  let teacher = user(ActorRole::Teacher, "T", "t@example.com").await;
  let admin = user(ActorRole::Admin, "A", "a@example.com").await;

  let student = store
    .add_student(NewStudent {
      institution_id: inst,
      section_id:     Uuid::new_v4(),
      full_name:      "Sofía Rojas".into(),
    })
    .await
    .unwrap();

  store.link_guardian(g1.user_id, student.student_id, true).await.unwrap();
  store.link_guardian(g2.user_id, student.student_id, false).await.unwrap();
  store.assign_teacher(teacher.user_id, student.section_id).await.unwrap();

  World {
    service: WithdrawalService::new(Arc::clone(&store), Arc::clone(&mailer)),
    store,
    mailer,
    student,
    g1,
    g2,
    teacher,
    admin,
  }
}

async fn world() -> World { world_with_mailer(RecordingMailer::default()).await }

fn request(student_id: Uuid, time: &str, origin: WithdrawalOrigin) -> CreateWithdrawal {
  CreateWithdrawal {
    student_id,
    date: "2025-06-12".into(),
    time: time.into(),
    category: "consulta médica".into(),
    origin,
    section_id: None,
    contact_medium: None,
    guardian_contacted: None,
    guardian_authorized: None,
    notes: None,
  }
}

fn guardian(w: &World) -> Actor { Actor::new(w.g1.user_id, ActorRole::Guardian) }
fn teacher(w: &World) -> Actor { Actor::new(w.teacher.user_id, ActorRole::Teacher) }
fn admin(w: &World) -> Actor { Actor::new(w.admin.user_id, ActorRole::Admin) }

/// Number of in-app notifications for `user` whose title matches.
async fn titled(w: &World, user: &UserAccount, title: &str) -> usize {
  w.store
    .notifications_for(user.user_id)
    .await
    .unwrap()
    .iter()
    .filter(|n| n.title == title)
    .count()
}

async fn create(w: &World, actor: Actor, time: &str) -> Withdrawal {
  let origin = match actor.role {
    ActorRole::Guardian => WithdrawalOrigin::GuardianRequest,
    ActorRole::Admin => WithdrawalOrigin::Administrative,
    _ => WithdrawalOrigin::StaffReport,
  };
  w.service
    .create(actor, request(w.student.student_id, time, origin))
    .await
    .unwrap()
}

// ─── Creation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn created_request_is_pending_regardless_of_actor_role() {
  let w = world().await;

  for actor in [guardian(&w), teacher(&w), admin(&w)] {
    let created = create(&w, actor, "11:00").await;
    assert_eq!(created.state, WithdrawalState::Pending);
  }
}

#[tokio::test]
async fn create_rejects_malformed_time_without_side_effects() {
  let w = world().await;

  let err = w
    .service
    .create(guardian(&w), request(w.student.student_id, "9:00", WithdrawalOrigin::GuardianRequest))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation { field: "time", .. }));

  // No withdrawal, no attendance, no notifications.
  let date = NaiveDate::from_ymd_opt(2025, 6, 12).unwrap();
  assert!(w
    .store
    .attendance_for(w.student.student_id, date)
    .await
    .unwrap()
    .is_none());
  assert!(w.store.notifications_for(w.teacher.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_rejects_malformed_date() {
  let w = world().await;
  let mut input = request(w.student.student_id, "09:00", WithdrawalOrigin::GuardianRequest);
  input.date = "12/06/2025".into();

  let err = w.service.create(guardian(&w), input).await.unwrap_err();
  assert!(matches!(err, Error::Validation { field: "date", .. }));
}

#[tokio::test]
async fn create_unknown_student_is_not_found() {
  let w = world().await;
  let missing = Uuid::new_v4();

  let err = w
    .service
    .create(guardian(&w), request(missing, "09:00", WithdrawalOrigin::GuardianRequest))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::StudentNotFound(id) if id == missing));
}

#[tokio::test]
async fn create_resolves_section_from_student() {
  let w = world().await;
  let created = create(&w, guardian(&w), "11:00").await;
  assert_eq!(created.section_id, w.student.section_id);
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn guardian_create_at_0900_reconciles_late_and_notifies_staff_only() {
  let w = world().await;

  let created = create(&w, guardian(&w), "09:00").await;
  assert_eq!(created.state, WithdrawalState::Pending);

  let date = NaiveDate::from_ymd_opt(2025, 6, 12).unwrap();
  let att = w
    .store
    .attendance_for(w.student.student_id, date)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(att.status, AttendanceStatus::Late);
  assert!(att.observation.contains("09:00"));

  let title = "Nueva solicitud de retiro";
  assert_eq!(titled(&w, &w.teacher, title).await, 1);
  assert_eq!(titled(&w, &w.admin, title).await, 1);
  assert_eq!(titled(&w, &w.g1, title).await, 0);
  assert_eq!(titled(&w, &w.g2, title).await, 0);

  // Email mirrors the in-app audience.
  assert_eq!(w.mailer.sent_to("t@example.com"), 1);
  assert_eq!(w.mailer.sent_to("a@example.com"), 1);
  assert_eq!(w.mailer.sent_to("g1@example.com"), 0);
}

#[tokio::test]
async fn staff_create_notifies_guardians_and_admins_not_teachers() {
  let w = world().await;

  create(&w, teacher(&w), "09:00").await;

  let title = "Nueva solicitud de retiro";
  assert_eq!(titled(&w, &w.g1, title).await, 1);
  assert_eq!(titled(&w, &w.g2, title).await, 1);
  assert_eq!(titled(&w, &w.admin, title).await, 1);
  assert_eq!(titled(&w, &w.teacher, title).await, 0);
}

// ─── Approval flow ───────────────────────────────────────────────────────────

#[tokio::test]
async fn authorize_notifies_creator_and_guardians_excluding_actor() {
  let w = world().await;

  let created = create(&w, guardian(&w), "09:00").await;
  let updated = w
    .service
    .authorize(created.withdrawal_id, admin(&w))
    .await
    .unwrap();
  assert_eq!(updated.state, WithdrawalState::Authorized);
  assert_eq!(updated.verified_by, Some(w.admin.user_id));

  let title = "Retiro autorizado";
  // G1 is both the creator and a guardian — deduplicated to one.
  assert_eq!(titled(&w, &w.g1, title).await, 1);
  assert_eq!(titled(&w, &w.g2, title).await, 1);
  assert_eq!(titled(&w, &w.admin, title).await, 0, "actor is suppressed");
  assert_eq!(titled(&w, &w.teacher, title).await, 0);
}

#[tokio::test]
async fn reject_carries_reason_into_notification_body() {
  let w = world().await;

  let created = create(&w, guardian(&w), "09:00").await;
  let updated = w
    .service
    .reject(created.withdrawal_id, admin(&w), Some("sin apoderado titular".into()))
    .await
    .unwrap();
  assert_eq!(updated.state, WithdrawalState::Rejected);
  assert_eq!(updated.rejection_reason.as_deref(), Some("sin apoderado titular"));

  let inbox = w.store.notifications_for(w.g2.user_id).await.unwrap();
  let rejection = inbox
    .iter()
    .find(|n| n.title == "Retiro rechazado")
    .expect("guardian notified of rejection");
  assert!(rejection.body.contains("sin apoderado titular"));
}

#[tokio::test]
async fn rejection_reason_markup_is_escaped_in_email_html() {
  let w = world().await;

  let created = create(&w, guardian(&w), "09:00").await;
  w.service
    .reject(
      created.withdrawal_id,
      admin(&w),
      Some("<b>sin permiso</b> & sin titular".into()),
    )
    .await
    .unwrap();

  let html = w
    .mailer
    .last_html_to("g2@example.com")
    .expect("guardian emailed on rejection");
  assert!(html.contains("&lt;b&gt;sin permiso&lt;/b&gt; &amp; sin titular"));
  assert!(!html.contains("<b>"));
}

#[tokio::test]
async fn authorize_non_pending_fails_and_dispatches_nothing() {
  let w = world().await;

  let created = create(&w, guardian(&w), "09:00").await;
  w.service.authorize(created.withdrawal_id, admin(&w)).await.unwrap();

  let err = w
    .service
    .authorize(created.withdrawal_id, admin(&w))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidStateTransition { from: WithdrawalState::Authorized, to: WithdrawalState::Authorized }
  ));

  // Exactly the one authorized event was delivered, not two.
  assert_eq!(titled(&w, &w.g1, "Retiro autorizado").await, 1);
}

#[tokio::test]
async fn reject_completed_fails_and_dispatches_nothing() {
  let w = world().await;

  let created = create(&w, guardian(&w), "09:00").await;
  w.service.authorize(created.withdrawal_id, admin(&w)).await.unwrap();
  let done = w.service.complete(created.withdrawal_id).await.unwrap();
  assert_eq!(done.state, WithdrawalState::Completed);

  let err = w
    .service
    .reject(created.withdrawal_id, admin(&w), None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidStateTransition { from: WithdrawalState::Completed, .. }
  ));

  for user in [&w.g1, &w.g2, &w.teacher, &w.admin] {
    assert_eq!(titled(&w, user, "Retiro rechazado").await, 0);
  }
}

#[tokio::test]
async fn complete_requires_authorized() {
  let w = world().await;
  let created = create(&w, guardian(&w), "09:00").await;

  let err = w.service.complete(created.withdrawal_id).await.unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidStateTransition { from: WithdrawalState::Pending, to: WithdrawalState::Completed }
  ));
}

#[tokio::test]
async fn transition_on_missing_withdrawal_is_not_found() {
  let w = world().await;
  let missing = Uuid::new_v4();

  let err = w.service.authorize(missing, admin(&w)).await.unwrap_err();
  assert!(matches!(err, Error::WithdrawalNotFound(id) if id == missing));
}

// ─── Deletion ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_allowed_only_while_pending() {
  let w = world().await;

  let pending = create(&w, guardian(&w), "09:00").await;
  w.service.delete(pending.withdrawal_id).await.unwrap();
  assert!(w
    .store
    .get_withdrawal(pending.withdrawal_id)
    .await
    .unwrap()
    .is_none());

  let kept = create(&w, guardian(&w), "10:30").await;
  w.service.authorize(kept.withdrawal_id, admin(&w)).await.unwrap();
  let err = w.service.delete(kept.withdrawal_id).await.unwrap_err();
  assert!(matches!(
    err,
    Error::NotDeletable { state: WithdrawalState::Authorized, .. }
  ));
}

// ─── Delivery isolation ──────────────────────────────────────────────────────

#[tokio::test]
async fn one_failed_email_does_not_block_other_recipients() {
  let w = world_with_mailer(RecordingMailer {
    fail_for: Some("g1@example.com".into()),
    ..RecordingMailer::default()
  })
  .await;

  let created = create(&w, guardian(&w), "09:00").await;
  w.service.authorize(created.withdrawal_id, admin(&w)).await.unwrap();

  // G1's email was refused; G1 still got the in-app record and G2 got both.
  assert_eq!(w.mailer.sent_to("g1@example.com"), 0);
  assert_eq!(titled(&w, &w.g1, "Retiro autorizado").await, 1);
  assert_eq!(w.mailer.sent_to("g2@example.com"), 1);
  assert_eq!(titled(&w, &w.g2, "Retiro autorizado").await, 1);
}

#[tokio::test]
async fn empty_audience_is_tolerated() {
  // An institution with no admins and a student with no guardians: a
  // staff-created request has nobody to notify, which is fine.
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let mailer = Arc::new(RecordingMailer::default());
  let inst = Uuid::new_v4();

  let t = store
    .add_user(NewUser {
      institution_id: inst,
      role:           ActorRole::Teacher,
      full_name:      "T".into(),
      email:          None,
    })
    .await
    .unwrap();
  let student = store
    .add_student(NewStudent {
      institution_id: inst,
      section_id:     Uuid::new_v4(),
      full_name:      "S".into(),
    })
    .await
    .unwrap();

  let service = WithdrawalService::new(Arc::clone(&store), mailer);
  let created = service
    .create(
      Actor::new(t.user_id, ActorRole::Teacher),
      request(student.student_id, "09:00", WithdrawalOrigin::StaffReport),
    )
    .await
    .unwrap();
  assert_eq!(created.state, WithdrawalState::Pending);
}
