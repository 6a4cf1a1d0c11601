// src/mail.rs

//! Invitation e-mails. Delivery is best-effort: callers log failures and move on.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use url::Url;

use crate::config::MailConfig;

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// What one invitation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub recipient_email: String,
    pub survey_title: String,
    pub access_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail dispatch is not configured")]
    Disabled,
    #[error("invalid invitation link: {0}")]
    Link(#[from] url::ParseError),
    #[error("mail transport failed: {0}")]
    Transport(String),
    #[error("mail service rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound invitation channel.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_invitation(&self, invitation: &Invitation) -> Result<(), MailError>;
}

/// Link a respondent follows: `{base}/survey/{key}`.
pub fn invitation_link(base: &Url, access_key: &str) -> Result<Url, MailError> {
    let mut link = base.clone();
    link.path_segments_mut()
        .map_err(|_| MailError::Link(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .push("survey")
        .push(access_key);
    Ok(link)
}

pub fn invitation_subject(survey_title: &str) -> String {
    format!("Invitation à participer au sondage : {}", survey_title)
}

/// HTML body of the invitation. Title and key are escaped; the link is already
/// percent-encoded by `Url`.
pub fn invitation_html(invitation: &Invitation, link: &Url) -> String {
    let title = ammonia::clean_text(&invitation.survey_title);
    let key = ammonia::clean_text(&invitation.access_key);
    let href = link.as_str();
    format!(
        r#"<div style="font-family: Arial, sans-serif; line-height: 1.5; color: #333;">
  <h2 style="color: #0000FF;">Bonjour,</h2>
  <p>Vous avez été invité à participer au sondage intitulé : <strong>{title}</strong>.</p>
  <p>Votre clé unique pour accéder au sondage est : <span style="font-weight: bold; color: #0000FF;">{key}</span></p>
  <p>Cliquez sur le lien suivant pour répondre au sondage : <a href="{href}" style="color: #0000FF; text-decoration: none;">Accéder au sondage</a></p>
  <p>Merci,<br>L'équipe.</p>
</div>"#
    )
}

/// Sends invitations through Brevo's transactional e-mail API.
pub struct BrevoMailer {
    client: reqwest::Client,
    api_key: String,
    sender_email: String,
    sender_name: String,
    public_base_url: Url,
}

impl BrevoMailer {
    pub fn new(api_key: String, config: &MailConfig, public_base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            sender_email: config.sender_email.clone(),
            sender_name: config.sender_name.clone(),
            public_base_url,
        }
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send_invitation(&self, invitation: &Invitation) -> Result<(), MailError> {
        let link = invitation_link(&self.public_base_url, &invitation.access_key)?;

        let body = json!({
            "sender": { "name": self.sender_name, "email": self.sender_email },
            "to": [{ "email": invitation.recipient_email }],
            "subject": invitation_subject(&invitation.survey_title),
            "htmlContent": invitation_html(invitation, &link),
        });

        let response = self
            .client
            .post(BREVO_SEND_URL)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!("Invitation sent to {}", invitation.recipient_email);
        Ok(())
    }
}

/// Used when no mail API key is configured. Keys stay unsent.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send_invitation(&self, invitation: &Invitation) -> Result<(), MailError> {
        tracing::debug!(
            "Mail disabled, not sending invitation to {}",
            invitation.recipient_email
        );
        Err(MailError::Disabled)
    }
}

/// Picks the Brevo mailer when an API key is configured.
pub fn mailer_from_config(config: &MailConfig, public_base_url: &Url) -> Arc<dyn Mailer> {
    match &config.brevo_api_key {
        Some(api_key) => Arc::new(BrevoMailer::new(api_key.clone(), config, public_base_url.clone())),
        None => Arc::new(DisabledMailer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation(title: &str) -> Invitation {
        Invitation {
            recipient_email: "a@x.com".to_string(),
            survey_title: title.to_string(),
            access_key: "0c1d2e3f".to_string(),
        }
    }

    #[test]
    fn test_link_appends_survey_and_key() {
        let base = Url::parse("https://echo.example.com").unwrap();
        assert_eq!(
            invitation_link(&base, "abc").unwrap().as_str(),
            "https://echo.example.com/survey/abc"
        );

        let nested = Url::parse("https://echo.example.com/app/").unwrap();
        assert_eq!(
            invitation_link(&nested, "abc").unwrap().as_str(),
            "https://echo.example.com/app/survey/abc"
        );
    }

    #[test]
    fn test_html_escapes_title() {
        let base = Url::parse("https://echo.example.com").unwrap();
        let invite = invitation("<script>alert(1)</script>");
        let link = invitation_link(&base, &invite.access_key).unwrap();
        let html = invitation_html(&invite, &link);

        assert!(!html.contains("<script>"));
        assert!(html.contains("0c1d2e3f"));
        assert!(html.contains("survey/0c1d2e3f"));
    }

    #[tokio::test]
    async fn test_disabled_mailer_reports_disabled() {
        let result = DisabledMailer.send_invitation(&invitation("Priorités")).await;
        assert!(matches!(result, Err(MailError::Disabled)));
    }
}
