//! Configuration for the device confirmation machine and the group
//! monitor.

use std::time::Duration;

/// Configuration for a device's confirmation machine.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Labels the pose model uses for a fall.
    pub fall_labels: Vec<String>,
    /// Minimum model confidence for a candidate fall (0.0-1.0).
    pub fall_confidence_threshold: f64,
    /// Re-prompts allowed after the first prompt before a forced
    /// DANGER verdict.
    pub max_retries: u32,
    /// Budget for each speak, listen, and judge call.
    pub prompt_timeout: Duration,
    /// Quiet period after a SAFE verdict.
    pub safe_cooldown: Duration,
    /// Quiet period after a DANGER verdict.
    pub alert_cooldown: Duration,
    /// Confirmation prompt spoken to the subject.
    pub prompt_text: String,
    /// Capacity of the device event broadcast channel.
    pub event_capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            fall_labels: vec!["Fall".to_string()],
            fall_confidence_threshold: 0.90,
            max_retries: 2,
            prompt_timeout: Duration::from_secs(10),
            safe_cooldown: Duration::from_secs(180),
            alert_cooldown: Duration::from_secs(60),
            prompt_text: "Are you okay?".to_string(),
            event_capacity: 64,
        }
    }
}

impl DeviceConfig {
    /// Create a new configuration builder.
    pub fn builder() -> DeviceConfigBuilder {
        DeviceConfigBuilder::default()
    }
}

/// Builder for [`DeviceConfig`].
#[derive(Debug, Default)]
pub struct DeviceConfigBuilder {
    config: DeviceConfig,
}

impl DeviceConfigBuilder {
    /// Set the fall label set.
    pub fn fall_labels(mut self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.fall_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the candidate-fall confidence threshold.
    pub fn fall_confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.fall_confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the retry budget.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the per-call collaborator timeout.
    pub fn prompt_timeout(mut self, timeout: Duration) -> Self {
        self.config.prompt_timeout = timeout;
        self
    }

    /// Set the quiet period after a SAFE verdict.
    pub fn safe_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.safe_cooldown = cooldown;
        self
    }

    /// Set the quiet period after a DANGER verdict.
    pub fn alert_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.alert_cooldown = cooldown;
        self
    }

    /// Set the confirmation prompt text.
    pub fn prompt_text(mut self, text: impl Into<String>) -> Self {
        self.config.prompt_text = text.into();
        self
    }

    /// Set the device event channel capacity. Clamped to at least 1.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.max(1);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> DeviceConfig {
        self.config
    }
}

/// Configuration for a group monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Minimum interval between two notifications for the group.
    pub notify_cooldown: Duration,
    /// Minimum interval between alert log lines while the alert
    /// persists.
    pub log_throttle: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            notify_cooldown: Duration::from_secs(60),
            log_throttle: Duration::from_secs(3),
        }
    }
}

impl MonitorConfig {
    /// Create a new configuration builder.
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }
}

/// Builder for [`MonitorConfig`].
#[derive(Debug, Default)]
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    /// Set the notification throttle window.
    pub fn notify_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.notify_cooldown = cooldown;
        self
    }

    /// Set the alert log throttle.
    pub fn log_throttle(mut self, throttle: Duration) -> Self {
        self.config.log_throttle = throttle;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> MonitorConfig {
        self.config
    }
}
