//! JSON REST API for the Retiro withdrawal workflow.
//!
//! Exposes an axum [`Router`] backed by any [`retiro_core::store::RetiroStore`]
//! and [`retiro_core::mailer::Mailer`] via [`retiro_engine::WithdrawalService`].
//! Transport concerns (TLS, the auth proxy that populates the identity
//! headers) are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", retiro_api::api_router(service.clone()))
//! ```

pub mod actor;
pub mod attendance;
pub mod error;
pub mod mailer;
pub mod withdrawals;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use retiro_core::{mailer::Mailer, store::RetiroStore};
use retiro_engine::WithdrawalService;

pub use error::ApiError;
pub use mailer::GatewayMailer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` (with
/// `RETIRO_`-prefixed environment overrides).
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// POST endpoint of the transactional email gateway; emails are skipped
  /// entirely when unset.
  pub mail_gateway_url: Option<String>,
  pub mail_sender:      Option<String>,
}

impl ServerConfig {
  /// Build the mailer this configuration asks for.
  pub fn mailer(&self) -> GatewayMailer {
    match (&self.mail_gateway_url, &self.mail_sender) {
      (Some(url), Some(sender)) => GatewayMailer::http(url, sender),
      _ => GatewayMailer::disabled(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, M>(service: Arc<WithdrawalService<S, M>>) -> Router<()>
where
  S: RetiroStore + 'static,
  M: Mailer + 'static,
{
  Router::new()
    // Withdrawals
    .route(
      "/withdrawals",
      get(withdrawals::list::<S, M>).post(withdrawals::create::<S, M>),
    )
    .route(
      "/withdrawals/{id}",
      get(withdrawals::get_one::<S, M>).delete(withdrawals::delete_one::<S, M>),
    )
    .route("/withdrawals/{id}/authorize", post(withdrawals::authorize::<S, M>))
    .route("/withdrawals/{id}/reject", post(withdrawals::reject::<S, M>))
    .route("/withdrawals/{id}/complete", post(withdrawals::complete::<S, M>))
    // Attendance
    .route("/attendance", get(attendance::get_for_day::<S, M>))
    .layer(TraceLayer::new_for_http())
    .with_state(service)
}

// ─── Integration tests ────────────────────────────────────────────────────────
