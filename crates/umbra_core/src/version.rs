//! Version types: manifest schema versions and shadow protocol versions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ShadowError;

/// Semantic version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    /// Major component; bumps are incompatible
    pub major: u64,
    /// Minor component; bumps add optional fields
    pub minor: u64,
    /// Patch component
    pub patch: u64,
}

impl Version {
    /// Create a new version
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse from string
    ///
    /// # Errors
    ///
    /// Returns error if format is invalid
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(VersionError::InvalidFormat(s.to_string()));
        }

        let component = |part: &str| {
            part.parse::<u64>()
                .map_err(|_| VersionError::InvalidComponent(part.to_string()))
        };

        Ok(Self {
            major: component(parts[0])?,
            minor: component(parts[1])?,
            patch: component(parts[2])?,
        })
    }

    /// Whether a reader at `self` understands documents written at `other`
    ///
    /// Same major, and not newer in minor.
    #[must_use]
    pub const fn can_read(&self, other: &Version) -> bool {
        self.major == other.major && other.minor <= self.minor
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Version-related errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// Invalid format
    #[error("Invalid version format: {0}")]
    InvalidFormat(String),
    /// Invalid component
    #[error("Invalid version component: {0}")]
    InvalidComponent(String),
}

/// Shadow protocol version
///
/// The reconstructor dispatches on this tag. New protocols are new variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShadowVersion {
    /// Random local Pauli-basis shadows
    #[serde(rename = "v0")]
    V0,
    /// v0 with per-snapshot readout correction through an inverse confusion matrix
    #[serde(rename = "v1")]
    V1,
}

impl ShadowVersion {
    /// Tag as written to manifests
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::V0 => "v0",
            Self::V1 => "v1",
        }
    }

    /// Whether this protocol consumes a confusion matrix
    #[must_use]
    pub const fn is_noise_aware(&self) -> bool {
        matches!(self, Self::V1)
    }
}

impl Default for ShadowVersion {
    fn default() -> Self {
        Self::V0
    }
}

impl fmt::Display for ShadowVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShadowVersion {
    type Err = ShadowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v0" => Ok(Self::V0),
            "v1" => Ok(Self::V1),
            other => Err(ShadowError::UnsupportedShadowVersion(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
        assert_eq!(format!("{}", v), "1.2.3");
    }

    #[test]
    fn test_version_parse_error() {
        assert!(matches!(
            Version::parse("1.2"),
            Err(VersionError::InvalidFormat(_))
        ));
        assert!(matches!(
            Version::parse("a.b.c"),
            Err(VersionError::InvalidComponent(_))
        ));
    }

    #[test]
    fn test_version_can_read() {
        let reader = Version::new(1, 0, 0);
        assert!(reader.can_read(&Version::new(1, 0, 7)));
        assert!(!reader.can_read(&Version::new(1, 1, 0)));
        assert!(!reader.can_read(&Version::new(2, 0, 0)));
        assert!(!reader.can_read(&Version::new(0, 9, 0)));
    }

    #[test]
    fn test_shadow_version_tags() {
        assert_eq!("v0".parse::<ShadowVersion>().unwrap(), ShadowVersion::V0);
        assert_eq!("v1".parse::<ShadowVersion>().unwrap(), ShadowVersion::V1);
        assert!(matches!(
            "v2".parse::<ShadowVersion>(),
            Err(ShadowError::UnsupportedShadowVersion(_))
        ));
        assert!(ShadowVersion::V1.is_noise_aware());
        assert!(!ShadowVersion::V0.is_noise_aware());
    }

    #[test]
    fn test_shadow_version_serde() {
        let json = serde_json::to_string(&ShadowVersion::V1).unwrap();
        assert_eq!(json, "\"v1\"");
        assert!(serde_json::from_str::<ShadowVersion>("\"v9\"").is_err());
    }
}
