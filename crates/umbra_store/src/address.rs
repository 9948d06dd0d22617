//! Content addressing for stored artifacts.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use umbra_core::{Hash, ShadowError, ShadowResult};

/// Content address combining hash and algorithm
///
/// Serialized as `"<algorithm>:<hex>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentAddress {
    /// Hash of the content
    pub hash: Hash,
    /// Algorithm used to compute the hash
    pub algorithm: AddressAlgorithm,
}

impl ContentAddress {
    /// Create a new content address
    #[must_use]
    pub const fn new(hash: Hash, algorithm: AddressAlgorithm) -> Self {
        Self { hash, algorithm }
    }

    /// Compute content address for data using default algorithm
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self::compute_with(data, AddressAlgorithm::Blake3)
    }

    /// Compute content address with a chosen algorithm
    #[must_use]
    pub fn compute_with(data: &[u8], algorithm: AddressAlgorithm) -> Self {
        Self {
            hash: algorithm.hash(data),
            algorithm,
        }
    }

    /// Whether `data` hashes to this address
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        self.algorithm.hash(data) == self.hash
    }

    /// Parse from string representation
    ///
    /// # Errors
    ///
    /// Returns error if format is invalid
    pub fn parse(s: &str) -> ShadowResult<Self> {
        let (algorithm, hex) = s
            .split_once(':')
            .ok_or_else(|| ShadowError::config("address", format!("'{}' is not <algorithm>:<hex>", s)))?;
        let algorithm = AddressAlgorithm::parse(algorithm)?;
        let hash = Hash::from_hex(hex).map_err(|e| ShadowError::config("address", e.to_string()))?;
        Ok(Self { hash, algorithm })
    }

    /// Convert to string representation
    #[must_use]
    pub fn as_str(&self) -> String {
        format!("{}:{}", self.algorithm.as_str(), self.hash.to_hex())
    }

    /// Get algorithm
    #[must_use]
    pub const fn algorithm(&self) -> AddressAlgorithm {
        self.algorithm
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.hash.to_hex())
    }
}

impl FromStr for ContentAddress {
    type Err = ShadowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ContentAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for ContentAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Address algorithm for content hashing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressAlgorithm {
    /// BLAKE3 (default)
    #[default]
    Blake3,
    /// SHA-256
    Sha256,
}

impl AddressAlgorithm {
    /// Parse algorithm from string
    ///
    /// # Errors
    ///
    /// Returns error if algorithm is unknown
    pub fn parse(s: &str) -> ShadowResult<Self> {
        match s {
            "blake3" => Ok(Self::Blake3),
            "sha256" => Ok(Self::Sha256),
            other => Err(ShadowError::config(
                "algorithm",
                format!("unknown hash algorithm '{}'", other),
            )),
        }
    }

    /// Get string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }

    /// Compute hash of data using this algorithm
    #[must_use]
    pub fn hash(&self, data: &[u8]) -> Hash {
        match self {
            Self::Blake3 => Hash::compute(data),
            Self::Sha256 => {
                use sha2::Digest;
                let digest = sha2::Sha256::new().chain_update(data).finalize();
                Hash::from_bytes(digest.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_and_verify() {
        let addr = ContentAddress::compute(b"snapshots");
        assert_eq!(addr.algorithm(), AddressAlgorithm::Blake3);
        assert!(addr.verify(b"snapshots"));
        assert!(!addr.verify(b"snapshotz"));
    }

    #[test]
    fn test_sha256_differs_from_blake3() {
        let a = ContentAddress::compute_with(b"x", AddressAlgorithm::Sha256);
        let b = ContentAddress::compute(b"x");
        assert_ne!(a.hash, b.hash);
        assert!(a.verify(b"x"));
        // Known SHA-256 of "abc"
        let abc = ContentAddress::compute_with(b"abc", AddressAlgorithm::Sha256);
        assert_eq!(
            abc.hash.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        let addr = ContentAddress::compute(b"hello");
        let parsed: ContentAddress = addr.to_string().parse().unwrap();
        assert_eq!(parsed, addr);
        assert!(addr.as_str().starts_with("blake3:"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ContentAddress::parse("invalid").is_err());
        assert!(ContentAddress::parse("md5:abcd").is_err());
        assert!(ContentAddress::parse("blake3:zz").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let addr = ContentAddress::compute(b"hello");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: ContentAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
