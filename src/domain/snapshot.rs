//! Full-group snapshots delivered by the store's watch stream.

use std::collections::HashMap;

use super::{DeviceId, DeviceStatusRecord, GroupId, GroupSettings};

/// The complete observable state of one group: every device's latest
/// status record plus the group settings.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GroupSnapshot {
    /// Group this snapshot describes.
    pub group: GroupId,
    /// Latest record per device.
    pub records: HashMap<DeviceId, DeviceStatusRecord>,
    /// Current group settings.
    pub settings: GroupSettings,
}

impl GroupSnapshot {
    /// An empty snapshot for a group with no records yet.
    pub fn empty(group: GroupId) -> Self {
        Self {
            group,
            records: HashMap::new(),
            settings: GroupSettings::default(),
        }
    }

    /// True if any device in the group reports a fall.
    pub fn in_alert(&self) -> bool {
        self.records.values().any(|r| r.is_fall())
    }

    /// The representative fall record for logging and notification:
    /// the FALL record with the highest confidence, ties broken by
    /// device id so the choice is deterministic.
    pub fn representative_fall(&self) -> Option<(&DeviceId, &DeviceStatusRecord)> {
        self.records
            .iter()
            .filter(|(_, r)| r.is_fall())
            .max_by(|(a_id, a), (b_id, b)| {
                a.confidence.cmp(&b.confidence).then(b_id.cmp(a_id))
            })
    }
}
