use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, Message},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};

use crate::config::SmtpConfig;
use crate::shared::models::{DisagreementKind, DocumentKind};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(String),
    #[error("Failed to build email: {0}")]
    Build(String),
    #[error("Failed to send email: {0}")]
    Transport(String),
}

/// Outbound mail seam. The SMTP implementation is swapped for an in-memory
/// double in pipeline tests.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let email = Message::builder()
            .from(
                self.config
                    .from
                    .parse()
                    .map_err(|e| MailError::Address(format!("from: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| MailError::Address(format!("to: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;

        let mailer = if let (Some(user), Some(pass)) =
            (self.config.user.clone(), self.config.pass.clone())
        {
            let creds = Credentials::new(user, pass);
            SmtpTransport::relay(&self.config.host)
                .map_err(|e| MailError::Transport(e.to_string()))?
                .credentials(creds)
                .build()
        } else {
            SmtpTransport::builder_dangerous(&self.config.host).build()
        };

        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        result.map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(())
    }
}

pub fn warning_subject(kind: DisagreementKind) -> &'static str {
    match kind {
        DisagreementKind::UserDeletion => "Your account is scheduled for deletion",
        DisagreementKind::ChurchDeletion => "Your church is scheduled for deletion",
    }
}

pub fn warning_body(
    kind: DisagreementKind,
    document: DocumentKind,
    deadline_at: DateTime<Utc>,
    recipient_name: Option<&str>,
    app_url: &str,
) -> String {
    let greeting = match recipient_name {
        Some(name) => format!("Hello {name},"),
        None => "Hello,".to_string(),
    };
    let consequence = match kind {
        DisagreementKind::UserDeletion => {
            "your account will be permanently deleted and your profile anonymized"
        }
        DisagreementKind::ChurchDeletion => {
            "your church and its member data will be permanently removed"
        }
    };

    format!(
        r#"{}

You declined the updated {} on file for your account. As a result,
{} on {}.

If this was a mistake, you can keep your account by accepting the current
document before the deadline:
{}/legal

No further action is needed if you want the deletion to proceed.

Best regards,
The ChurchServer Team"#,
        greeting,
        document_title(document),
        consequence,
        deadline_at.format("%B %e, %Y"),
        app_url
    )
}

fn document_title(document: DocumentKind) -> &'static str {
    match document {
        DocumentKind::TermsOfService => "Terms of Service",
        DocumentKind::PrivacyPolicy => "Privacy Policy",
        DocumentKind::Dpa => "Data Processing Agreement",
        DocumentKind::ChurchAdminTerms => "Church Admin Terms",
    }
}
