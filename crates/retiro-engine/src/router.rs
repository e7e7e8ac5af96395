//! Audience resolution and two-channel notification fan-out.
//!
//! The audience is computed fresh from the roster at dispatch time, so
//! guardian and teacher changes between creation and approval are always
//! reflected. Delivery is best-effort: each recipient's in-app write and
//! email are independent tasks, every failure is logged per recipient per
//! channel, and nothing here can fail the workflow call that triggered it.

use std::{collections::HashSet, sync::Arc};

use tokio::task::JoinSet;
use tracing::warn;

use retiro_core::{
  actor::{Actor, ActorRole},
  mailer::Mailer,
  notification::NewNotification,
  roster::UserAccount,
  store::RetiroStore,
  withdrawal::{Withdrawal, WithdrawalEvent},
};

/// In-app notification category for all withdrawal events.
const CATEGORY: &str = "retiro";

// ─── Audience ────────────────────────────────────────────────────────────────

/// Compute the recipient set for `event`, deduplicated by user id.
///
/// A guardian-created request needs staff sign-off, so it notifies the
/// section's teachers plus the institution's administrators. A staff- or
/// admin-created request needs a guardian's (or another admin's)
/// counter-approval, so it notifies the student's guardians plus the
/// administrators. Outcome events go to the original creator and all
/// guardians. The acting user never receives their own event.
pub async fn resolve_audience<S: RetiroStore>(
  store: &S,
  event: WithdrawalEvent,
  withdrawal: &Withdrawal,
  actor: Actor,
) -> Result<Vec<UserAccount>, S::Error> {
  let mut audience: Vec<UserAccount> = match event {
    WithdrawalEvent::Created => match actor.role {
      ActorRole::Guardian => {
        let mut a = store.teachers_of(withdrawal.section_id).await?;
        a.extend(store.admins_of(withdrawal.institution_id).await?);
        a
      }
      ActorRole::Teacher | ActorRole::Auxiliary | ActorRole::Admin => {
        let mut a: Vec<UserAccount> = store
          .guardians_of(withdrawal.student_id)
          .await?
          .into_iter()
          .map(|g| g.user)
          .collect();
        a.extend(store.admins_of(withdrawal.institution_id).await?);
        a
      }
    },
    WithdrawalEvent::Authorized | WithdrawalEvent::Rejected => {
      let mut a = Vec::new();
      if let Some(creator) = store.get_user(withdrawal.created_by).await? {
        a.push(creator);
      }
      a.extend(
        store
          .guardians_of(withdrawal.student_id)
          .await?
          .into_iter()
          .map(|g| g.user),
      );
      a
    }
  };

  // One notification per user per event, even when a recipient appears in
  // several role groups; and never the actor themselves.
  let mut seen = HashSet::new();
  audience.retain(|u| u.user_id != actor.user_id && seen.insert(u.user_id));
  Ok(audience)
}

// ─── Content ─────────────────────────────────────────────────────────────────

fn event_content(event: WithdrawalEvent, withdrawal: &Withdrawal) -> (String, String) {
  let when = format!(
    "{} a las {}",
    withdrawal.date.format("%d-%m-%Y"),
    withdrawal.time.format("%H:%M"),
  );
  match event {
    WithdrawalEvent::Created => (
      "Nueva solicitud de retiro".to_string(),
      format!("Se registró una solicitud de retiro anticipado para el {when}."),
    ),
    WithdrawalEvent::Authorized => (
      "Retiro autorizado".to_string(),
      format!("El retiro del {when} fue autorizado."),
    ),
    WithdrawalEvent::Rejected => {
      let mut body = format!("El retiro del {when} fue rechazado.");
      if let Some(reason) = &withdrawal.rejection_reason {
        body.push_str(&format!(" Motivo: {reason}"));
      }
      ("Retiro rechazado".to_string(), body)
    }
  }
}

/// Notification bodies carry free text (category names, rejection reasons),
/// which must not end up as live markup in recipients' HTML email.
fn escape_html(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      _ => out.push(c),
    }
  }
  out
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// Tally of one fan-out. Failure counts feed the log line only; no caller
/// branches on them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchSummary {
  pub recipients:     usize,
  pub inapp_failures: usize,
  pub email_attempts: usize,
  pub email_failures: usize,
}

/// Fan `event` out to its audience: one in-app record per recipient, plus
/// one email when an address is on file. Each recipient runs as its own
/// task; a failed channel for one recipient never blocks another.
pub async fn dispatch<S, M>(
  store: &Arc<S>,
  mailer: &Arc<M>,
  event: WithdrawalEvent,
  withdrawal: &Withdrawal,
  actor: Actor,
) -> DispatchSummary
where
  S: RetiroStore + 'static,
  M: Mailer + 'static,
{
  let audience =
    match resolve_audience(store.as_ref(), event, withdrawal, actor).await {
      Ok(a) => a,
      Err(e) => {
        warn!(
          withdrawal = %withdrawal.withdrawal_id,
          error = %e,
          "audience resolution failed; event not delivered"
        );
        return DispatchSummary::default();
      }
    };

  let mut summary = DispatchSummary {
    recipients: audience.len(),
    ..DispatchSummary::default()
  };
  if audience.is_empty() {
    // E.g. a student with no guardians on file. Nothing to do.
    return summary;
  }

  let (title, body) = event_content(event, withdrawal);
  let link = format!("/retiros/{}", withdrawal.withdrawal_id);

  let mut tasks = JoinSet::new();
  for recipient in audience {
    let store = Arc::clone(store);
    let mailer = Arc::clone(mailer);
    let title = title.clone();
    let body = body.clone();
    let link = link.clone();

    tasks.spawn(async move {
      let mut inapp_failed = false;
      let mut email_attempted = false;
      let mut email_failed = false;

      if let Err(e) = store
        .append_notification(NewNotification {
          recipient_id: recipient.user_id,
          title:        title.clone(),
          body:         body.clone(),
          category:     CATEGORY.to_string(),
          link:         Some(link),
        })
        .await
      {
        warn!(
          recipient = %recipient.user_id,
          error = %e,
          "in-app notification write failed"
        );
        inapp_failed = true;
      }

      if let Some(address) = &recipient.email {
        email_attempted = true;
        let html = format!("<p>{}</p>", escape_html(&body));
        if let Err(e) = mailer.send(address, &title, &html).await {
          warn!(
            recipient = %recipient.user_id,
            error = %e,
            "transactional email failed"
          );
          email_failed = true;
        }
      }

      (inapp_failed, email_attempted, email_failed)
    });
  }

  while let Some(joined) = tasks.join_next().await {
    match joined {
      Ok((inapp_failed, email_attempted, email_failed)) => {
        summary.inapp_failures += usize::from(inapp_failed);
        summary.email_attempts += usize::from(email_attempted);
        summary.email_failures += usize::from(email_failed);
      }
      Err(e) => warn!(error = %e, "notification task panicked"),
    }
  }

  summary
}
