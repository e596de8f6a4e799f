//! Device-side status events for display layers.
//!
//! The confirmation machine itself holds all state; a view layer is a
//! plain subscriber of these events and carries no logic of its own.

use chrono::{DateTime, Utc};

use super::DeviceId;

/// The externally visible phase of a device's confirmation machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DevicePhase {
    /// Watching classification ticks.
    Idle,
    /// Speaking the confirmation prompt.
    Asking,
    /// Waiting for the subject's response.
    Listening,
    /// Interpreting the response.
    Judging,
    /// Quiet period after a SAFE verdict.
    CooldownSafe,
    /// Quiet period after a DANGER verdict.
    CooldownAlert,
}

impl DevicePhase {
    /// A short status line a display can show as-is. The device always
    /// has a current line, even mid-failure.
    pub fn status_line(&self) -> &'static str {
        match self {
            DevicePhase::Idle => "monitoring",
            DevicePhase::Asking => "checking on subject",
            DevicePhase::Listening => "waiting for response",
            DevicePhase::Judging => "interpreting response",
            DevicePhase::CooldownSafe => "confirmed safe, resting",
            DevicePhase::CooldownAlert => "alert raised, standing by",
        }
    }
}

/// One phase change on a device, broadcast to display subscribers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeviceEvent {
    /// Device the event belongs to.
    pub device: DeviceId,
    /// Phase entered.
    pub phase: DevicePhase,
    /// Display text for the phase.
    pub message: String,
    /// When the phase was entered.
    pub at: DateTime<Utc>,
}

impl DeviceEvent {
    /// Build an event for a phase change.
    pub fn phase_change(device: DeviceId, phase: DevicePhase) -> Self {
        Self {
            device,
            phase,
            message: phase.status_line().to_string(),
            at: Utc::now(),
        }
    }
}
