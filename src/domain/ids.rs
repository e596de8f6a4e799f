//! Opaque identifiers for groups and devices.
//!
//! Identifiers are generated by the setup flow outside this crate and
//! treated as opaque strings here. `generate()` mints a fresh random id
//! for tests and ad-hoc deployments.

use uuid::Uuid;

/// Identifies a group of devices sharing one monitor and one
/// notification target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct GroupId(String);

impl GroupId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a single camera device within a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(GroupId::generate(), GroupId::generate());
        assert_ne!(DeviceId::generate(), DeviceId::generate());
    }

    #[test]
    fn test_display_matches_inner_string() {
        let group = GroupId::generate();
        assert_eq!(group.to_string(), group.as_str());

        let device = DeviceId::new("cam-1");
        assert_eq!(device.to_string(), "cam-1");
    }
}
