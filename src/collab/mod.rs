//! Contracts for the external collaborators the core depends on.
//!
//! The core owns none of these services; it only defines the shapes it
//! needs. Any implementation honoring the contracts can sit behind
//! them: a real pose model, a speech stack, a hosted judgment service,
//! a transactional mailer.

use tokio::sync::mpsc;

use crate::domain::{Classification, DeviceId, JudgedVerdict, NotificationPayload};
use crate::Result;

/// Source of classification ticks for one device's sensor feed.
///
/// Delivery is best-effort and periodic; the stream may stall. Silence
/// carries no information and must not be read as a safe tick.
#[async_trait::async_trait]
pub trait ClassificationSource: Send + Sync {
    /// Subscribe to the tick stream for a device.
    async fn subscribe(&self, device: &DeviceId) -> Result<mpsc::Receiver<Classification>>;
}

/// Voice dialogue with the subject: one prompt out, one transcript in.
#[async_trait::async_trait]
pub trait DialogueService: Send + Sync {
    /// Speak a prompt; resolves when playback completes.
    async fn speak(&self, text: &str) -> Result<()>;

    /// Listen for a single utterance; an error covers both recognition
    /// failure and timeout.
    async fn listen(&self) -> Result<String>;
}

/// Maps a transcript to a structured safety verdict.
///
/// May fail or time out; callers must fall back to
/// [`crate::judgment::KeywordPolicy`] so a session always terminates.
#[async_trait::async_trait]
pub trait JudgmentService: Send + Sync {
    /// Judge a transcript.
    async fn judge(&self, transcript: &str) -> Result<JudgedVerdict>;
}

/// Sends the actual notification message.
///
/// Fire-and-forget from the core's perspective: a failure is logged by
/// the caller and never retried synchronously.
#[async_trait::async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Dispatch one notification to the target address.
    async fn send(&self, target: &str, payload: &NotificationPayload) -> Result<()>;
}

/// Dispatcher that writes notifications to the log instead of sending
/// them anywhere. Useful for development and headless deployments.
pub struct LogNotifier;

#[async_trait::async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn send(&self, target: &str, payload: &NotificationPayload) -> Result<()> {
        tracing::info!(
            target_address = target,
            group = %payload.group,
            device = %payload.device,
            confidence = payload.confidence,
            "notification: {}",
            payload.summary()
        );
        Ok(())
    }
}
