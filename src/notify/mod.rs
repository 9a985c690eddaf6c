//! Notification sinks
//!
//! Messages are rendered by [`message`] and handed to a
//! [`NotificationSink`] as plain text.

pub mod line;
pub mod message;

pub use line::LineNotifier;
pub use message::{render_prediction, render_result};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Notification errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Messaging API rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Empty message")]
    EmptyMessage,
}

/// Broadcast channel for rendered messages
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn broadcast(&self, message: &str) -> Result<(), NotifyError>;
}

/// Sink that only writes messages to the log (dry runs, no token)
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn broadcast(&self, message: &str) -> Result<(), NotifyError> {
        if message.trim().is_empty() {
            return Err(NotifyError::EmptyMessage);
        }
        info!("[dry-run] broadcast:\n{}", message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_accepts_message() {
        assert!(LogNotifier.broadcast("hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_log_notifier_rejects_empty() {
        assert!(matches!(
            LogNotifier.broadcast("  ").await,
            Err(NotifyError::EmptyMessage)
        ));
    }
}
