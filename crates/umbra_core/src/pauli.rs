//! Pauli strings, measurement bases and observables.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{ShadowError, ShadowResult};

/// Single-qubit Pauli operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    /// Identity
    I,
    /// Pauli X
    X,
    /// Pauli Y
    Y,
    /// Pauli Z
    Z,
}

impl Symbol {
    /// Parse a single character
    ///
    /// # Errors
    ///
    /// Returns error for anything but I, X, Y, Z (either case)
    pub fn from_char(c: char) -> ShadowResult<Self> {
        match c.to_ascii_uppercase() {
            'I' => Ok(Self::I),
            'X' => Ok(Self::X),
            'Y' => Ok(Self::Y),
            'Z' => Ok(Self::Z),
            other => Err(ShadowError::InvalidPauli {
                reason: format!("unknown Pauli symbol '{}'", other),
            }),
        }
    }

    /// Character form
    #[must_use]
    pub const fn as_char(&self) -> char {
        match self {
            Self::I => 'I',
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
        }
    }

    /// Measurement basis this symbol is diagonal in, `None` for identity
    #[must_use]
    pub const fn basis(&self) -> Option<MeasurementBasis> {
        match self {
            Self::I => None,
            Self::X => Some(MeasurementBasis::X),
            Self::Y => Some(MeasurementBasis::Y),
            Self::Z => Some(MeasurementBasis::Z),
        }
    }

    /// Whether two single-qubit Paulis anticommute
    #[must_use]
    pub fn anticommutes_with(&self, other: &Symbol) -> bool {
        *self != Self::I && *other != Self::I && self != other
    }
}

/// Basis a single qubit was measured in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeasurementBasis {
    /// X eigenbasis
    X,
    /// Y eigenbasis
    Y,
    /// Z (computational) eigenbasis
    Z,
}

impl MeasurementBasis {
    /// All bases in sampling order
    pub const ALL: [MeasurementBasis; 3] = [Self::X, Self::Y, Self::Z];

    /// Parse a single character
    ///
    /// # Errors
    ///
    /// Returns error for anything but X, Y, Z (either case)
    pub fn from_char(c: char) -> ShadowResult<Self> {
        match c.to_ascii_uppercase() {
            'X' => Ok(Self::X),
            'Y' => Ok(Self::Y),
            'Z' => Ok(Self::Z),
            other => Err(ShadowError::InvalidSnapshot {
                reason: format!("unknown measurement basis '{}'", other),
            }),
        }
    }

    /// Character form
    #[must_use]
    pub const fn as_char(&self) -> char {
        match self {
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
        }
    }

    /// Position in [`MeasurementBasis::ALL`]
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// The Pauli symbol diagonal in this basis
    #[must_use]
    pub const fn symbol(&self) -> Symbol {
        match self {
            Self::X => Symbol::X,
            Self::Y => Symbol::Y,
            Self::Z => Symbol::Z,
        }
    }
}

/// Tensor product of single-qubit Paulis, qubit 0 first
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PauliString(Vec<Symbol>);

impl PauliString {
    /// Create from symbols
    ///
    /// # Errors
    ///
    /// Returns error if empty
    pub fn new(symbols: Vec<Symbol>) -> ShadowResult<Self> {
        if symbols.is_empty() {
            return Err(ShadowError::InvalidPauli {
                reason: "empty Pauli string".to_string(),
            });
        }
        Ok(Self(symbols))
    }

    /// Parse from a string such as `"ZZI"`
    ///
    /// # Errors
    ///
    /// Returns error on empty input or unknown symbols
    pub fn parse(s: &str) -> ShadowResult<Self> {
        let symbols = s
            .chars()
            .map(Symbol::from_char)
            .collect::<ShadowResult<Vec<_>>>()?;
        Self::new(symbols)
    }

    /// Identity on `n` qubits
    #[must_use]
    pub fn identity(n: usize) -> Self {
        Self(vec![Symbol::I; n.max(1)])
    }

    /// Number of qubits
    #[must_use]
    pub fn num_qubits(&self) -> usize {
        self.0.len()
    }

    /// Symbols, qubit 0 first
    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.0
    }

    /// Number of non-identity factors
    #[must_use]
    pub fn weight(&self) -> usize {
        self.0.iter().filter(|s| **s != Symbol::I).count()
    }

    /// Qubits carrying a non-identity factor
    #[must_use]
    pub fn support(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, s)| **s != Symbol::I)
            .map(|(q, _)| q)
            .collect()
    }

    /// Whether every factor is identity
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.weight() == 0
    }

    /// Whether two strings of equal length commute
    ///
    /// They commute iff the number of positions where both are non-identity
    /// and different is even. Strings of different length never commute.
    #[must_use]
    pub fn commutes_with(&self, other: &PauliString) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        let anticommuting = self
            .0
            .iter()
            .zip(&other.0)
            .filter(|(a, b)| a.anticommutes_with(b))
            .count();
        anticommuting % 2 == 0
    }
}

impl fmt::Display for PauliString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for symbol in &self.0 {
            write!(f, "{}", symbol.as_char())?;
        }
        Ok(())
    }
}

impl FromStr for PauliString {
    type Err = ShadowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PauliString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PauliString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A weighted Pauli string `coefficient * P_1 ⊗ ... ⊗ P_n`
///
/// Equality and hashing follow [`Observable::key`], so two observables built
/// separately from the same string and coefficient are interchangeable as
/// result lookup keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observable {
    /// Pauli factors
    pub pauli_string: PauliString,
    /// Real scalar weight
    pub coefficient: f64,
}

impl Observable {
    /// Create with coefficient 1
    #[must_use]
    pub fn new(pauli_string: PauliString) -> Self {
        Self {
            pauli_string,
            coefficient: 1.0,
        }
    }

    /// Parse a Pauli string with coefficient 1
    ///
    /// # Errors
    ///
    /// Returns error if the string is not a valid Pauli string
    pub fn parse(s: &str) -> ShadowResult<Self> {
        Ok(Self::new(PauliString::parse(s)?))
    }

    /// Set coefficient
    #[must_use]
    pub fn with_coefficient(mut self, coefficient: f64) -> Self {
        self.coefficient = coefficient;
        self
    }

    /// Canonical lookup key `"{coefficient}*{pauli_string}"`
    #[must_use]
    pub fn key(&self) -> String {
        format!("{:?}*{}", self.coefficient, self.pauli_string)
    }

    /// Number of qubits
    #[must_use]
    pub fn num_qubits(&self) -> usize {
        self.pauli_string.num_qubits()
    }

    /// Check this observable acts on exactly `num_qubits` qubits
    ///
    /// # Errors
    ///
    /// Returns `QubitCountMismatch` otherwise
    pub fn check_width(&self, num_qubits: usize) -> ShadowResult<()> {
        if self.num_qubits() != num_qubits {
            return Err(ShadowError::QubitCountMismatch {
                context: format!("observable {}", self.key()),
                expected: num_qubits,
                actual: self.num_qubits(),
            });
        }
        Ok(())
    }

    /// Whether two observables commute
    #[must_use]
    pub fn commutes_with(&self, other: &Observable) -> bool {
        self.pauli_string.commutes_with(&other.pauli_string)
    }
}

impl PartialEq for Observable {
    fn eq(&self, other: &Self) -> bool {
        self.pauli_string == other.pauli_string
            && self.coefficient.to_bits() == other.coefficient.to_bits()
    }
}

impl Eq for Observable {}

impl Hash for Observable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pauli_string.hash(state);
        self.coefficient.to_bits().hash(state);
    }
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Greedy partition into mutually commuting groups
///
/// Diagnostic only; shadow estimation never needs it. Returns indices into
/// `observables`, groups in first-seen order.
#[must_use]
pub fn commutation_groups(observables: &[Observable]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, obs) in observables.iter().enumerate() {
        let slot = groups
            .iter_mut()
            .find(|group| group.iter().all(|&j| observables[j].commutes_with(obs)));
        match slot {
            Some(group) => group.push(i),
            None => groups.push(vec![i]),
        }
    }
    groups
}
