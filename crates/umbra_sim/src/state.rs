//! Dense state vectors for a handful of qubits.
//!
//! Amplitude index bit `i` is qubit `i`, the same convention as
//! `Snapshot::outcome_index`.

use nalgebra::Complex;
use umbra_core::{MeasurementBasis, ShadowError, ShadowResult};

type C64 = Complex<f64>;

/// Largest register the simulator accepts
pub const MAX_QUBITS: usize = 16;

/// Pure state on `num_qubits` qubits
#[derive(Debug, Clone, PartialEq)]
pub struct StateVector {
    num_qubits: usize,
    amplitudes: Vec<C64>,
}

impl StateVector {
    /// Computational basis state `index`
    ///
    /// # Panics
    ///
    /// Panics if `num_qubits` is zero or above [`MAX_QUBITS`], or `index` is
    /// out of range
    #[must_use]
    pub fn basis_state(num_qubits: usize, index: usize) -> Self {
        assert!((1..=MAX_QUBITS).contains(&num_qubits), "unsupported register size");
        let dim = 1usize << num_qubits;
        assert!(index < dim, "basis index out of range");
        let mut amplitudes = vec![C64::new(0.0, 0.0); dim];
        amplitudes[index] = C64::new(1.0, 0.0);
        Self {
            num_qubits,
            amplitudes,
        }
    }

    /// `(|0…0⟩ + |1…1⟩)/√2`
    #[must_use]
    pub fn ghz(num_qubits: usize) -> Self {
        let mut state = Self::basis_state(num_qubits, 0);
        let amp = C64::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);
        let last = state.amplitudes.len() - 1;
        state.amplitudes[0] = amp;
        state.amplitudes[last] = amp;
        state
    }

    /// Product of `|+⟩` on every qubit
    #[must_use]
    pub fn plus(num_qubits: usize) -> Self {
        let dim = 1usize << num_qubits;
        let mut state = Self::basis_state(num_qubits, 0);
        let amp = C64::new(1.0 / (dim as f64).sqrt(), 0.0);
        state.amplitudes.iter_mut().for_each(|a| *a = amp);
        state
    }

    /// Build from raw amplitudes, normalizing them
    ///
    /// # Errors
    ///
    /// Returns error if the length is not a power of two or the norm is zero
    pub fn from_amplitudes(amplitudes: Vec<C64>) -> ShadowResult<Self> {
        let dim = amplitudes.len();
        if dim < 2 || !dim.is_power_of_two() || dim > 1 << MAX_QUBITS {
            return Err(ShadowError::config(
                "amplitudes",
                format!("{} amplitudes is not a supported register", dim),
            ));
        }
        let norm = amplitudes.iter().map(C64::norm_sqr).sum::<f64>().sqrt();
        if norm.is_nan() || norm <= 0.0 {
            return Err(ShadowError::config("amplitudes", "state has zero norm"));
        }
        Ok(Self {
            num_qubits: dim.trailing_zeros() as usize,
            amplitudes: amplitudes.into_iter().map(|a| a / norm).collect(),
        })
    }

    /// Number of qubits
    #[must_use]
    pub const fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Amplitudes
    #[must_use]
    pub fn amplitudes(&self) -> &[C64] {
        &self.amplitudes
    }

    fn apply(&mut self, qubit: usize, gate: [[C64; 2]; 2]) {
        let mask = 1usize << qubit;
        for i in 0..self.amplitudes.len() {
            if i & mask != 0 {
                continue;
            }
            let j = i | mask;
            let (a, b) = (self.amplitudes[i], self.amplitudes[j]);
            self.amplitudes[i] = gate[0][0] * a + gate[0][1] * b;
            self.amplitudes[j] = gate[1][0] * a + gate[1][1] * b;
        }
    }

    /// Outcome probabilities after measuring qubit `i` in `bases[i]`
    ///
    /// X measurements apply H, Y measurements apply H·S†, so the `+1`
    /// eigenstate of the measured Pauli reads as bit 0.
    #[must_use]
    pub fn probabilities_in(&self, bases: &[MeasurementBasis]) -> Vec<f64> {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let hadamard = [
            [C64::new(h, 0.0), C64::new(h, 0.0)],
            [C64::new(h, 0.0), C64::new(-h, 0.0)],
        ];
        let s_dagger = [
            [C64::new(1.0, 0.0), C64::new(0.0, 0.0)],
            [C64::new(0.0, 0.0), C64::new(0.0, -1.0)],
        ];

        let mut rotated = self.clone();
        for (qubit, basis) in bases.iter().enumerate() {
            match basis {
                MeasurementBasis::Z => {}
                MeasurementBasis::X => rotated.apply(qubit, hadamard),
                MeasurementBasis::Y => {
                    rotated.apply(qubit, s_dagger);
                    rotated.apply(qubit, hadamard);
                }
            }
        }
        rotated.amplitudes.iter().map(C64::norm_sqr).collect()
    }
}
