//! EmailSender port - 実際のメール送信
//!
//! 送信の成否についてこのクレートは何も仮定しない（リトライもしない）。

use async_trait::async_trait;

use crate::domain::EmailMessage;
use crate::error::SendError;

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), SendError>;
}
