use crate::domain::{DomainError, DomainResult, MailMessage, MailSender};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Mail relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub relay_url: String,
    pub from_address: String,
    pub request_timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: "http://localhost:8025/api/send".to_string(),
            from_address: "noreply@lorafleet.local".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Mail sender that posts messages to an HTTP relay
#[derive(Clone)]
pub struct HttpMailSender {
    client: Client,
    config: MailConfig,
}

impl HttpMailSender {
    pub fn new(config: MailConfig) -> DomainResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DomainError::MailDelivery(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl MailSender for HttpMailSender {
    async fn send_mail(&self, message: MailMessage) -> DomainResult<()> {
        debug!(to = %message.to, subject = %message.subject, "Sending mail through relay");

        let request = RelayRequest {
            from: &self.config.from_address,
            to: &message.to,
            subject: &message.subject,
            html: &message.html_body,
        };

        let response = self
            .client
            .post(&self.config.relay_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::MailDelivery(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::MailDelivery(format!(
                "relay returned status {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}
