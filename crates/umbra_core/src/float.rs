//! Serde helpers for floats that may be non-finite.
//!
//! JSON has no NaN. Undefined estimates are written as `null` and read back as NaN.

use serde::{Deserialize, Deserializer, Serializer};

/// Serialize a float, writing `null` for NaN and infinities
///
/// # Errors
///
/// Propagates serializer errors
pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

/// Deserialize a float, mapping `null` to NaN
///
/// # Errors
///
/// Propagates deserializer errors
pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Bitwise float equality, treating NaN as equal to NaN
#[must_use]
pub fn bit_eq(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits()
}
