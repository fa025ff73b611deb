//! Completion email notifier.
//!
//! When a volunteer marks an incident complete the reporter gets an email
//! with YES/NO links back to the verify endpoint. Delivery is best effort:
//! the notifier reports what happened but never fails the caller.

use std::time::Duration;

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use safetracker_common::{AppError, AppResult, config::SmtpConfig};
use serde::Serialize;

/// Sender identity used when an incident has no volunteer.
pub const FALLBACK_VOLUNTEER_EMAIL: &str = "volunteer@example.com";
/// Sender name used when an incident has no volunteer.
pub const FALLBACK_VOLUNTEER_NAME: &str = "Volunteer";

/// What happened to a completion email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Accepted by the SMTP relay.
    Sent,
    /// Real delivery failed or is not configured; the message was logged instead.
    FailedSimulated,
    /// Nobody to send to.
    Skipped,
}

/// Delivery outcome returned alongside the completion response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Outcome.
    pub status: DeliveryStatus,
    /// Why delivery failed, for `failed_simulated`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why nothing was sent, for `skipped`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DeliveryReport {
    /// Delivered.
    #[must_use]
    pub const fn sent() -> Self {
        Self {
            status: DeliveryStatus::Sent,
            error: None,
            reason: None,
        }
    }

    /// Delivery failed and the message was logged instead.
    #[must_use]
    pub fn failed_simulated(error: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::FailedSimulated,
            error: Some(error.into()),
            reason: None,
        }
    }

    /// Nothing was sent.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Skipped,
            error: None,
            reason: Some(reason.into()),
        }
    }
}

/// Everything needed to tell a reporter their incident was completed.
#[derive(Debug, Clone)]
pub struct CompletionNotice {
    /// Incident the links refer to.
    pub incident_id: i32,
    /// Incident title for the subject and body.
    pub incident_title: String,
    /// Recipient.
    pub reporter_email: String,
    /// Reply-To address.
    pub volunteer_email: String,
    /// Sender display name.
    pub volunteer_name: String,
}

/// Sends completion notices.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notice. Must not fail; problems are reported in-band.
    async fn notify_completion(&self, notice: &CompletionNotice) -> DeliveryReport;
}

struct SmtpRelay {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    timeout: Duration,
}

/// SMTP-backed notifier. Without SMTP configuration every notice is
/// simulated in the log.
pub struct SmtpNotifier {
    relay: Option<SmtpRelay>,
    verify_base_url: String,
}

impl SmtpNotifier {
    /// Build a notifier from optional SMTP settings.
    ///
    /// `server_url` is the public base URL the verify links point at.
    pub fn new(smtp: Option<&SmtpConfig>, server_url: &str) -> AppResult<Self> {
        let relay = match smtp {
            Some(cfg) => {
                let timeout = Duration::from_secs(cfg.timeout_secs);
                let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
                    .map_err(|e| AppError::Config(format!("Invalid SMTP relay: {e}")))?
                    .port(cfg.port)
                    .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
                    .timeout(Some(timeout))
                    .build();
                Some(SmtpRelay {
                    transport,
                    from_address: cfg.from_address.clone(),
                    timeout,
                })
            }
            None => None,
        };

        Ok(Self {
            relay,
            verify_base_url: format!(
                "{}/api/users/incidents",
                server_url.trim_end_matches('/')
            ),
        })
    }

    /// A notifier that only logs.
    #[must_use]
    pub fn disabled(server_url: &str) -> Self {
        Self {
            relay: None,
            verify_base_url: format!(
                "{}/api/users/incidents",
                server_url.trim_end_matches('/')
            ),
        }
    }

    /// Link the reporter follows to answer yes or no.
    #[must_use]
    pub fn verify_link(&self, incident_id: i32, choice: &str) -> String {
        format!("{}/{incident_id}/verify?choice={choice}", self.verify_base_url)
    }

    fn simulate(&self, notice: &CompletionNotice, error: String) -> DeliveryReport {
        tracing::warn!(
            incident_id = notice.incident_id,
            from = %notice.volunteer_email,
            to = %notice.reporter_email,
            yes_link = %self.verify_link(notice.incident_id, "yes"),
            no_link = %self.verify_link(notice.incident_id, "no"),
            %error,
            "Email simulation: real sending failed"
        );
        DeliveryReport::failed_simulated(error)
    }

    fn build_message(&self, relay: &SmtpRelay, notice: &CompletionNotice) -> AppResult<Message> {
        let from = Mailbox::new(
            Some(notice.volunteer_name.clone()),
            relay
                .from_address
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid from address: {e}")))?,
        );
        let reply_to: Mailbox = notice
            .volunteer_email
            .parse()
            .map_err(|e| AppError::BadRequest(format!("Invalid volunteer email: {e}")))?;
        let to: Mailbox = notice
            .reporter_email
            .parse()
            .map_err(|e| AppError::BadRequest(format!("Invalid reporter email: {e}")))?;

        Message::builder()
            .from(from)
            .reply_to(reply_to)
            .to(to)
            .subject(completion_subject(&notice.incident_title))
            .header(ContentType::TEXT_HTML)
            .body(self.render_body(notice))
            .map_err(|e| AppError::Internal(format!("Failed to build email: {e}")))
    }

    fn render_body(&self, notice: &CompletionNotice) -> String {
        let yes_link = self.verify_link(notice.incident_id, "yes");
        let no_link = self.verify_link(notice.incident_id, "no");
        let volunteer = escape_html(&notice.volunteer_name);
        let volunteer_email = escape_html(&notice.volunteer_email);
        let title = escape_html(&notice.incident_title);

        format!(
            r#"<html>
  <body style="font-family: Arial, sans-serif; padding: 20px;">
    <h2 style="color: #333;">Incident Completion Confirmation</h2>
    <p>Hello,</p>
    <p>The volunteer <b>{volunteer}</b> ({volunteer_email}) has marked your incident '<b>{title}</b>' as COMPLETED.</p>
    <p>Please confirm if the request has been fulfilled:</p>
    <div style="margin: 20px 0;">
      <a href="{yes_link}" style="background-color: #28a745; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px; margin-right: 10px;">YES (Close Request)</a>
      <a href="{no_link}" style="background-color: #dc3545; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px;">NO (Not Done)</a>
    </div>
    <p>If you select NO, the request will remain awaiting confirmation.</p>
    <p>Stay Safe,<br>SafeTracker Team</p>
  </body>
</html>"#
        )
    }
}

#[async_trait::async_trait]
impl Notifier for SmtpNotifier {
    async fn notify_completion(&self, notice: &CompletionNotice) -> DeliveryReport {
        let Some(relay) = &self.relay else {
            return self.simulate(notice, "SMTP is not configured".to_string());
        };

        let message = match self.build_message(relay, notice) {
            Ok(message) => message,
            Err(e) => return self.simulate(notice, e.to_string()),
        };

        match tokio::time::timeout(relay.timeout, relay.transport.send(message)).await {
            Ok(Ok(_)) => {
                tracing::info!(
                    incident_id = notice.incident_id,
                    to = %notice.reporter_email,
                    "Completion email sent"
                );
                DeliveryReport::sent()
            }
            Ok(Err(e)) => self.simulate(
                notice,
                AppError::ExternalService(format!("SMTP delivery failed: {e}")).to_string(),
            ),
            Err(_) => self.simulate(
                notice,
                AppError::ExternalService(format!(
                    "SMTP delivery timed out after {}s",
                    relay.timeout.as_secs()
                ))
                .to_string(),
            ),
        }
    }
}

/// Subject line of the completion email.
#[must_use]
pub fn completion_subject(title: &str) -> String {
    format!("SafeTracker: Incident Completed '{title}'")
}

/// Minimal escaping for text interpolated into HTML.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
