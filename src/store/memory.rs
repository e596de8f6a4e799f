//! In-memory status store backed by a broadcast channel per group.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::domain::{DeviceId, DeviceStatusRecord, GroupId, GroupSettings, GroupSnapshot};
use crate::Result;

use super::StatusStore;

const BROADCAST_CAPACITY: usize = 256;

/// In-memory realization of [`StatusStore`].
///
/// Cheap to clone; all clones share the same state. Every committed
/// write re-broadcasts the full group snapshot, so watchers only ever
/// see the latest state per device and a missed intermediate snapshot
/// is harmless.
#[derive(Clone, Default)]
pub struct MemoryStatusStore {
    inner: Arc<RwLock<HashMap<GroupId, GroupState>>>,
}

struct GroupState {
    records: HashMap<DeviceId, DeviceStatusRecord>,
    settings: GroupSettings,
    tx: broadcast::Sender<GroupSnapshot>,
}

impl GroupState {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            records: HashMap::new(),
            settings: GroupSettings::default(),
            tx,
        }
    }

    fn snapshot(&self, group: &GroupId) -> GroupSnapshot {
        GroupSnapshot {
            group: group.clone(),
            records: self.records.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl MemoryStatusStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_group<R>(&self, group: &GroupId, f: impl FnOnce(&mut GroupState) -> R) -> R {
        let mut groups = self.inner.write();
        let state = groups.entry(group.clone()).or_insert_with(GroupState::new);
        f(state)
    }

    fn publish(state: &GroupState, group: &GroupId) {
        // No subscribers is fine; the snapshot is still readable.
        let _ = state.tx.send(state.snapshot(group));
    }
}

#[async_trait::async_trait]
impl StatusStore for MemoryStatusStore {
    async fn write_status(
        &self,
        group: &GroupId,
        device: &DeviceId,
        mut record: DeviceStatusRecord,
    ) -> Result<()> {
        self.with_group(group, |state| {
            // Store-assigned timestamp, non-decreasing per device even
            // if the wall clock steps backwards.
            let now = Utc::now();
            record.updated_at = match state.records.get(device) {
                Some(previous) => now.max(previous.updated_at),
                None => now,
            };
            tracing::debug!(
                group = %group,
                device = %device,
                state = %record.state,
                confidence = record.confidence,
                "status write committed"
            );
            state.records.insert(device.clone(), record);
            Self::publish(state, group);
        });
        Ok(())
    }

    async fn write_settings(&self, group: &GroupId, settings: GroupSettings) -> Result<()> {
        self.with_group(group, |state| {
            state.settings = settings;
            Self::publish(state, group);
        });
        Ok(())
    }

    async fn read_group(&self, group: &GroupId) -> Result<GroupSnapshot> {
        Ok(self.with_group(group, |state| state.snapshot(group)))
    }

    fn watch(&self, group: &GroupId) -> broadcast::Receiver<GroupSnapshot> {
        self.with_group(group, |state| state.tx.subscribe())
    }
}
