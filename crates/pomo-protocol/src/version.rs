//! Protocol versioning for safe upgrades.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Protocol version spoken between `pomo` clients and `pomod`.
///
/// `major.minor`: a major bump breaks the wire format, a minor bump only adds
/// message types or optional fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl ProtocolVersion {
    pub const CURRENT: ProtocolVersion = ProtocolVersion { major: 1, minor: 0 };

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Parses a `"major.minor"` string.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidFormat(s.to_string());

        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        let major = major.parse::<u16>().map_err(|_| invalid())?;
        let minor = minor.parse::<u16>().map_err(|_| invalid())?;

        Ok(Self { major, minor })
    }

    /// Majors must match; any minor within that major is accepted.
    pub fn is_compatible_with(&self, other: &ProtocolVersion) -> bool {
        self.major == other.major
    }

    /// Like `is_compatible_with`, as a `Result` for handshake code.
    pub fn check_compatible(&self, other: &ProtocolVersion) -> Result<(), VersionError> {
        if self.is_compatible_with(other) {
            Ok(())
        } else {
            Err(VersionError::Incompatible {
                got: other.to_string(),
                expected: self.to_string(),
            })
        }
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version format: {0}")]
    InvalidFormat(String),

    #[error("Incompatible version: got {got}, expected {expected}")]
    Incompatible { got: String, expected: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        assert_eq!(ProtocolVersion::parse("1.3").unwrap(), ProtocolVersion::new(1, 3));
        assert!(ProtocolVersion::parse("1").is_err());
        assert!(ProtocolVersion::parse("1.0.0").is_err());
        assert!(ProtocolVersion::parse("one.zero").is_err());
    }

    #[test]
    fn test_minor_bumps_are_compatible() {
        let current = ProtocolVersion::CURRENT;
        assert!(current.check_compatible(&ProtocolVersion::new(1, 7)).is_ok());

        let err = current.check_compatible(&ProtocolVersion::new(2, 0)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Incompatible version: got 2.0, expected 1.0"
        );
    }
}
