//! Per-device status records replicated through the shared store.

use chrono::{DateTime, Utc};

/// Latest committed safety state of a device's subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DeviceState {
    /// Subject confirmed or presumed safe.
    Safe,
    /// Confirmed fall incident.
    Fall,
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Safe => write!(f, "SAFE"),
            DeviceState::Fall => write!(f, "FALL"),
        }
    }
}

/// One device's latest status, keyed by `(group, device)` in the store.
///
/// Only the owning device's confirmation machine writes this record;
/// `updated_at` is assigned by the store and is non-decreasing per
/// device.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeviceStatusRecord {
    /// Committed safety state.
    pub state: DeviceState,
    /// Confidence in the committed state, 0..=100.
    pub confidence: u8,
    /// Store-assigned write timestamp, non-decreasing per device.
    pub updated_at: DateTime<Utc>,
    /// How the verdict was reached, if a confirmation session ran.
    pub incident_reason: Option<String>,
    /// What was spoken back to the subject, if anything.
    pub incident_verdict_message: Option<String>,
    /// What the subject said, if anything was heard.
    pub subject_utterance: Option<String>,
}

impl DeviceStatusRecord {
    /// A safe record with no incident detail, written from the idle
    /// debounce path.
    pub fn safe(confidence: u8) -> Self {
        Self {
            state: DeviceState::Safe,
            confidence: confidence.min(100),
            updated_at: Utc::now(),
            incident_reason: None,
            incident_verdict_message: None,
            subject_utterance: None,
        }
    }

    /// A record finalizing a confirmation session.
    pub fn incident(
        state: DeviceState,
        confidence: u8,
        reason: impl Into<String>,
        verdict_message: impl Into<String>,
        utterance: Option<String>,
    ) -> Self {
        Self {
            state,
            confidence: confidence.min(100),
            updated_at: Utc::now(),
            incident_reason: Some(reason.into()),
            incident_verdict_message: Some(verdict_message.into()),
            subject_utterance: utterance,
        }
    }

    /// True if this record marks a confirmed fall.
    pub fn is_fall(&self) -> bool {
        self.state == DeviceState::Fall
    }
}
