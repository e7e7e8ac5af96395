//! [`GatewayMailer`] — the HTTP email-gateway client.
//!
//! The gateway contract is a single POST of `{from, to, subject, html}`;
//! any non-2xx response is a delivery failure. When no gateway is
//! configured, sends are skipped and logged at debug.

use retiro_core::mailer::Mailer;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MailerError {
  #[error("mail gateway error: {0}")]
  Http(#[from] reqwest::Error),
}

pub struct HttpMailer {
  client:   reqwest::Client,
  endpoint: String,
  sender:   String,
}

/// The concrete mailer the server runs with.
pub enum GatewayMailer {
  Http(HttpMailer),
  Disabled,
}

impl GatewayMailer {
  pub fn http(endpoint: impl Into<String>, sender: impl Into<String>) -> Self {
    Self::Http(HttpMailer {
      client:   reqwest::Client::new(),
      endpoint: endpoint.into(),
      sender:   sender.into(),
    })
  }

  pub fn disabled() -> Self { Self::Disabled }

  pub fn is_enabled(&self) -> bool { matches!(self, Self::Http(_)) }
}

impl Mailer for GatewayMailer {
  type Error = MailerError;

  async fn send(
    &self,
    to: &str,
    subject: &str,
    html_body: &str,
  ) -> Result<(), MailerError> {
    match self {
      Self::Http(m) => {
        m.client
          .post(&m.endpoint)
          .json(&json!({
            "from": m.sender,
            "to": to,
            "subject": subject,
            "html": html_body,
          }))
          .send()
          .await?
          .error_for_status()?;
        Ok(())
      }
      Self::Disabled => {
        debug!(%to, "mail gateway disabled; email skipped");
        Ok(())
      }
    }
  }
}
