use crate::domain::result::DomainResult;
use async_trait::async_trait;

/// One outbound notification mail
#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Sender trait for alarm notifications
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_mail(&self, message: MailMessage) -> DomainResult<()>;
}
