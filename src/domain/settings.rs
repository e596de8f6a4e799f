//! Group-wide notification settings.

use crate::{Result, WatchError};

/// Notification settings shared by every device and monitor in a group.
///
/// One record per group; concurrent edits are last-writer-wins with no
/// merge semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GroupSettings {
    /// Destination for fall notifications. `None` disables dispatch
    /// without disabling alert detection or logging.
    pub notify_target: Option<String>,
}

impl GroupSettings {
    /// Settings with no notification target configured.
    pub fn unset() -> Self {
        Self::default()
    }

    /// Settings with a validated notification target.
    ///
    /// The target must look like an address (contain `'@'`); anything
    /// else is rejected before it can silently swallow notifications.
    pub fn with_target(target: impl Into<String>) -> Result<Self> {
        let target = target.into();
        if !target.contains('@') {
            return Err(WatchError::Config(format!(
                "notify target '{target}' is not a valid address"
            )));
        }
        Ok(Self {
            notify_target: Some(target),
        })
    }

    /// True if a notification target is configured.
    pub fn has_target(&self) -> bool {
        self.notify_target.is_some()
    }
}
