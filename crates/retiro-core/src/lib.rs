//! Core types and trait definitions for the Retiro early-departure workflow.
//!
//! Domain model only: no HTTP, no database. The [`store::RetiroStore`] and
//! [`mailer::Mailer`] traits are the seams the backend crates implement.

// Native `async fn` in traits; the advisory lint about `Send` bounds on the
// returned futures does not apply to how these traits are consumed.
#![allow(async_fn_in_trait)]

pub mod actor;
pub mod attendance;
pub mod error;
pub mod mailer;
pub mod notification;
pub mod roster;
pub mod store;
pub mod withdrawal;

pub use error::{Error, Result};
