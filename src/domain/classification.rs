//! Classification ticks produced by the pose model.

/// One classification tick from a device's pose model.
///
/// Ticks arrive best-effort and may stall; a missing tick carries no
/// information (silence is not a safe reading).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Classification {
    /// Class label emitted by the model (e.g. "Fall", "Standing").
    pub label: String,
    /// Model confidence in 0.0..=1.0.
    pub confidence: f64,
}

impl Classification {
    /// Create a classification tick, clamping confidence into 0..=1.
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Confidence as an integer percentage (0..=100).
    pub fn confidence_percent(&self) -> u8 {
        (self.confidence * 100.0).round() as u8
    }
}
