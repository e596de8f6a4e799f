//! Notification payloads handed to the dispatch collaborator.

use chrono::{DateTime, Utc};

use super::{DeviceId, DeviceStatusRecord, GroupId};

/// Everything a notification needs to carry about a fall incident:
/// which device saw it, how confident it was, how the verdict was
/// reached, and what the subject said.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NotificationPayload {
    /// Group in alert.
    pub group: GroupId,
    /// Representative device for the incident.
    pub device: DeviceId,
    /// Confidence of the fall record, 0..=100.
    pub confidence: u8,
    /// How the verdict was reached, if a confirmation session ran.
    pub reason: Option<String>,
    /// What the subject said, if anything was heard.
    pub utterance: Option<String>,
    /// When the fall record was written.
    pub occurred_at: DateTime<Utc>,
}

impl NotificationPayload {
    /// Build a payload from the representative device's record.
    pub fn from_record(group: GroupId, device: DeviceId, record: &DeviceStatusRecord) -> Self {
        Self {
            group,
            device,
            confidence: record.confidence,
            reason: record.incident_reason.clone(),
            utterance: record.subject_utterance.clone(),
            occurred_at: record.updated_at,
        }
    }

    /// One-line summary for message bodies and logs.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "Fall detected by device {} ({}% confidence) at {}",
            self.device,
            self.confidence,
            self.occurred_at.format("%H:%M:%S"),
        );
        if let Some(reason) = &self.reason {
            line.push_str(&format!("; {reason}"));
        }
        if let Some(utterance) = &self.utterance {
            line.push_str(&format!("; subject said: \"{utterance}\""));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeviceState;

    #[test]
    fn test_payload_carries_record_detail() {
        let record = DeviceStatusRecord::incident(
            DeviceState::Fall,
            100,
            "no response to repeated prompts",
            "contacting your caregiver",
            Some("...".to_string()),
        );
        let payload = NotificationPayload::from_record(
            GroupId::new("home"),
            DeviceId::new("cam-1"),
            &record,
        );

        assert_eq!(payload.confidence, 100);
        assert_eq!(
            payload.reason.as_deref(),
            Some("no response to repeated prompts")
        );
        let summary = payload.summary();
        assert!(summary.contains("cam-1"));
        assert!(summary.contains("no response"));
    }
}
