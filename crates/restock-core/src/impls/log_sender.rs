//! LogEmailSender - 送信の代わりにログを出す

use async_trait::async_trait;
use tracing::info;

use crate::domain::EmailMessage;
use crate::error::SendError;
use crate::ports::EmailSender;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), SendError> {
        info!(to = %message.to, subject = %message.subject, "email sent (log only)");
        Ok(())
    }
}
