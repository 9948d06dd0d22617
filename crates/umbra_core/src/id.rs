//! Experiment identifiers.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ShadowError;

/// Experiment identifier - keys one estimate() run and every artifact it writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExperimentId(Uuid);

impl ExperimentId {
    /// Create a new random ExperimentId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from UUID bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// File stem used for artifacts belonging to this experiment
    #[must_use]
    pub fn file_stem(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for ExperimentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exp_{}", self.0)
    }
}

impl FromStr for ExperimentId {
    type Err = ShadowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("exp_").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| ShadowError::config("experiment_id", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        assert_ne!(ExperimentId::new(), ExperimentId::new());
    }

    #[test]
    fn test_id_display_roundtrip() {
        let id = ExperimentId::new();
        let s = id.to_string();
        assert!(s.starts_with("exp_"));
        assert_eq!(s.parse::<ExperimentId>().unwrap(), id);
    }

    #[test]
    fn test_id_file_stem() {
        let id = ExperimentId::from_bytes([7u8; 16]);
        assert_eq!(id.file_stem(), "07070707070707070707070707070707");
    }

    #[test]
    fn test_id_parse_invalid() {
        assert!("exp_not-a-uuid".parse::<ExperimentId>().is_err());
    }
}
