//! Shared status store contract and the in-memory implementation.
//!
//! The store is the sole synchronization point between device
//! confirmation machines and group monitors: devices write their own
//! status record, monitors watch full-group snapshots. Semantics are
//! last-write-wins per key with no cross-key transactions; propagation
//! of the latest write per key is at-least-once.

mod memory;

pub use memory::MemoryStatusStore;

use tokio::sync::broadcast;

use crate::domain::{DeviceId, DeviceStatusRecord, GroupId, GroupSettings, GroupSnapshot};
use crate::Result;

/// Contract for the shared, multi-reader/multi-writer status store.
#[async_trait::async_trait]
pub trait StatusStore: Send + Sync {
    /// Write a device's latest status record. The store assigns
    /// `updated_at`, keeping it non-decreasing per device.
    async fn write_status(
        &self,
        group: &GroupId,
        device: &DeviceId,
        record: DeviceStatusRecord,
    ) -> Result<()>;

    /// Overwrite the group settings. Last writer wins.
    async fn write_settings(&self, group: &GroupId, settings: GroupSettings) -> Result<()>;

    /// Read the current full-group snapshot.
    async fn read_group(&self, group: &GroupId) -> Result<GroupSnapshot>;

    /// Subscribe to full-group snapshots, one per committed write.
    fn watch(&self, group: &GroupId) -> broadcast::Receiver<GroupSnapshot>;
}
