use crate::config::Smtp;
use anyhow::{Context, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// Transactional email sender. When the SMTP section is absent from the
/// config the mailer is a logged no-op, matching the service's best-effort
/// notification semantics.
pub struct Mailer {
    transport: Option<SmtpTransport>,
    sender: Option<String>,
}

impl Mailer {
    pub fn new(cfg: Option<&Smtp>) -> Result<Self> {
        let Some(smtp) = cfg else {
            tracing::warn!("smtp not configured, approval emails will be skipped");
            return Ok(Mailer {
                transport: None,
                sender: None,
            });
        };

        let transport = SmtpTransport::starttls_relay(&smtp.host)
            .context("failed to build smtp transport")?
            .port(smtp.port)
            .credentials(Credentials::new(
                smtp.sender.clone(),
                smtp.password.clone(),
            ))
            .build();

        Ok(Mailer {
            transport: Some(transport),
            sender: Some(smtp.sender.clone()),
        })
    }

    /// Notify an uploader that their book went live. Returns whether the
    /// message was handed to the SMTP server; failures are logged, never
    /// propagated, since moderation must not fail on a mail error.
    pub async fn send_approval(&self, recipient: &str, book_title: &str) -> bool {
        let (Some(transport), Some(sender)) = (&self.transport, &self.sender) else {
            tracing::warn!("email credentials not configured, skipping notification");
            return false;
        };

        let message = match build_approval_message(sender, recipient, book_title) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("failed to build approval email: {:#}", e);
                return false;
            }
        };

        let transport = transport.clone();
        let recipient = recipient.to_string();
        let result =
            tokio::task::spawn_blocking(move || transport.send(&message)).await;

        match result {
            Ok(Ok(_)) => {
                tracing::info!("approval email sent to {}", recipient);
                true
            }
            Ok(Err(e)) => {
                tracing::error!("failed to send approval email to {}: {}", recipient, e);
                false
            }
            Err(e) => {
                tracing::error!("mail task panicked: {}", e);
                false
            }
        }
    }
}

fn build_approval_message(sender: &str, recipient: &str, book_title: &str) -> Result<Message> {
    let from: Mailbox = sender.parse().context("invalid sender address")?;
    let to: Mailbox = recipient.parse().context("invalid recipient address")?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(format!(
            "Your LibroVault Book '{}' has been Approved!",
            book_title
        ))
        .body(format!(
            "Congratulations!\n\nYour book '{}' has been approved by the Admin and is now \
             available on LibroVault.\n\nYou can check it on the website.\n\nThank you for \
             your contribution!",
            book_title
        ))
        .context("failed to assemble email")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_message_builds() {
        let msg = build_approval_message("sender@example.com", "reader@example.com", "Dune");
        assert!(msg.is_ok());
    }

    #[test]
    fn test_invalid_recipient_is_an_error() {
        let msg = build_approval_message("sender@example.com", "not-an-address", "Dune");
        assert!(msg.is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_mailer_skips_quietly() {
        let mailer = Mailer::new(None).unwrap();
        assert!(!mailer.send_approval("reader@example.com", "Dune").await);
    }
}
