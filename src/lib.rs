//! # Fallwatch
//!
//! Fall confirmation and alert aggregation for camera-based home
//! monitoring.
//!
//! Fallwatch watches a stream of human-activity classifications from
//! one or more camera devices, decides whether an observed fall is a
//! real emergency via a voice confirmation dialogue, and notifies a
//! responsible party at most once per incident even when several
//! devices and a central monitor all observe the same incident
//! concurrently.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          fallwatch                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  per device                          per group               │
//! │  ┌────────────────────┐              ┌───────────────────┐   │
//! │  │ ConfirmationMachine│              │   GroupMonitor    │   │
//! │  │  Idle → Asking →   │              │  snapshot reducer │   │
//! │  │  Listening →       │              │  + CAS throttle   │   │
//! │  │  Judging → Cooldown│              └─────────▲─────────┘   │
//! │  └─────────┬──────────┘                        │ watch()     │
//! │            │ write_status()                    │             │
//! │            └──────────────► StatusStore ───────┘             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two state machines never communicate directly; the shared
//! status store is the system's sole synchronization point. The pose
//! model, the speech stack, the judgment service, and the notification
//! transport are external collaborators behind the traits in
//! [`collab`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fallwatch::{
//!     GroupId, GroupMonitor, LogNotifier, MemoryStatusStore, MonitorConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> fallwatch::Result<()> {
//!     let store = Arc::new(MemoryStatusStore::new());
//!     let group = GroupId::new("living-room");
//!
//!     let monitor = Arc::new(GroupMonitor::new(
//!         MonitorConfig::default(),
//!         group.clone(),
//!         store.clone(),
//!         Arc::new(LogNotifier),
//!     ));
//!     monitor.save_settings("caregiver@example.com").await?;
//!
//!     monitor.run().await
//! }
//! ```

#![warn(missing_docs)]

pub mod collab;
pub mod config;
pub mod device;
pub mod domain;
pub mod judgment;
pub mod monitor;
pub mod store;

pub use collab::{
    ClassificationSource, DialogueService, JudgmentService, LogNotifier, NotificationDispatcher,
};
pub use config::{DeviceConfig, DeviceConfigBuilder, MonitorConfig, MonitorConfigBuilder};
pub use device::{Command, ConfirmationMachine, DeviceAgent, DeviceHandle};
pub use domain::{
    Classification, DeviceEvent, DeviceId, DevicePhase, DeviceState, DeviceStatusRecord, GroupId,
    GroupSettings, GroupSnapshot, JudgedVerdict, NotificationPayload, Verdict,
};
pub use judgment::KeywordPolicy;
pub use monitor::{GroupMonitor, ThrottleGate};
pub use store::{MemoryStatusStore, StatusStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for fallwatch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Unified error type for fallwatch operations.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Classification source error
    #[error("Classification error: {0}")]
    Classification(String),

    /// Dialogue (speech) collaborator error
    #[error("Dialogue error: {0}")]
    Dialogue(String),

    /// Judgment collaborator error
    #[error("Judgment error: {0}")]
    Judgment(String),

    /// Shared status store error
    #[error("Store error: {0}")]
    Store(String),

    /// Notification dispatch error
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain invariant violation
    #[error("Domain error: {0}")]
    Domain(String),
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Classification, ClassificationSource, ConfirmationMachine, DeviceAgent, DeviceConfig,
        DeviceEvent, DeviceHandle, DeviceId, DevicePhase, DeviceState, DeviceStatusRecord,
        DialogueService, GroupId, GroupMonitor, GroupSettings, GroupSnapshot, JudgedVerdict,
        JudgmentService, KeywordPolicy, LogNotifier, MemoryStatusStore, MonitorConfig,
        NotificationDispatcher, NotificationPayload, Result, StatusStore, Verdict, WatchError,
    };
}
