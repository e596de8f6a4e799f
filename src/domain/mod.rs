//! Domain types for the fallwatch system.
//!
//! The domain is deliberately small: status records written by devices,
//! group settings shared across a group, snapshots delivered by the
//! store, and the verdict/classification values exchanged with the
//! external collaborators.

pub mod classification;
pub mod event;
pub mod ids;
pub mod notification;
pub mod settings;
pub mod snapshot;
pub mod status;
pub mod verdict;

pub use classification::Classification;
pub use event::{DeviceEvent, DevicePhase};
pub use ids::{DeviceId, GroupId};
pub use notification::NotificationPayload;
pub use settings::GroupSettings;
pub use snapshot::GroupSnapshot;
pub use status::{DeviceState, DeviceStatusRecord};
pub use verdict::{JudgedVerdict, Verdict};
