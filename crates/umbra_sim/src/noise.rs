//! Readout noise and a calibration backend that suffers from it.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use umbra_calibrate::CalibrationBackend;

/// Independent per-qubit bit-flip probabilities at readout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadoutNoise {
    /// Probability of reading 1 after preparing 0, per qubit
    pub p01: Vec<f64>,
    /// Probability of reading 0 after preparing 1, per qubit
    pub p10: Vec<f64>,
}

impl ReadoutNoise {
    /// Perfect readout
    #[must_use]
    pub fn none(num_qubits: usize) -> Self {
        Self::uniform(num_qubits, 0.0, 0.0)
    }

    /// Same flip probabilities on every qubit
    #[must_use]
    pub fn uniform(num_qubits: usize, p01: f64, p10: f64) -> Self {
        Self {
            p01: vec![p01; num_qubits],
            p10: vec![p10; num_qubits],
        }
    }

    /// Number of qubits covered
    #[must_use]
    pub fn num_qubits(&self) -> usize {
        self.p01.len().min(self.p10.len())
    }

    /// Read `bit` of `qubit` through the noisy channel
    ///
    /// Qubits outside the model read perfectly. A random number is drawn for
    /// every call so streams stay aligned whatever the probabilities are.
    pub fn read<R: Rng>(&self, qubit: usize, bit: u8, rng: &mut R) -> u8 {
        let u: f64 = rng.r#gen();
        let flip = match bit {
            0 => self.p01.get(qubit).copied().unwrap_or(0.0),
            _ => self.p10.get(qubit).copied().unwrap_or(0.0),
        };
        if u < flip { bit ^ 1 } else { bit }
    }

    /// Analytic confusion matrix over `qubits`, row-major `C[measured][prepared]`
    #[must_use]
    pub fn confusion_matrix(&self, qubits: &[usize]) -> Vec<f64> {
        let dim = 1usize << qubits.len();
        let mut matrix = vec![0.0; dim * dim];
        for measured in 0..dim {
            for prepared in 0..dim {
                matrix[measured * dim + prepared] = qubits
                    .iter()
                    .enumerate()
                    .map(|(j, &q)| {
                        let p = (prepared >> j) & 1;
                        let m = (measured >> j) & 1;
                        let p01 = self.p01.get(q).copied().unwrap_or(0.0);
                        let p10 = self.p10.get(q).copied().unwrap_or(0.0);
                        match (p, m) {
                            (0, 0) => 1.0 - p01,
                            (0, _) => p01,
                            (_, 0) => p10,
                            _ => 1.0 - p10,
                        }
                    })
                    .product();
            }
        }
        matrix
    }
}

/// Calibration backend that prepares basis states exactly and reads them
/// through [`ReadoutNoise`]
#[derive(Debug, Clone)]
pub struct NoisyReadoutBackend {
    noise: ReadoutNoise,
    rng: ChaCha8Rng,
    requests: usize,
}

impl NoisyReadoutBackend {
    /// Create a backend
    #[must_use]
    pub fn new(noise: ReadoutNoise, seed: u64) -> Self {
        Self {
            noise,
            rng: ChaCha8Rng::seed_from_u64(seed),
            requests: 0,
        }
    }

    /// Backend with perfect readout
    #[must_use]
    pub fn ideal(num_qubits: usize) -> Self {
        Self::new(ReadoutNoise::none(num_qubits), 0)
    }

    /// Number of prepare-and-measure requests served
    #[must_use]
    pub const fn requests(&self) -> usize {
        self.requests
    }
}

impl CalibrationBackend for NoisyReadoutBackend {
    fn prepare_and_measure(
        &mut self,
        qubits: &[usize],
        prepared: usize,
        shots: u32,
    ) -> Result<Vec<usize>, String> {
        if prepared >= 1usize << qubits.len() {
            return Err(format!(
                "basis state {} does not exist on {} qubits",
                prepared,
                qubits.len()
            ));
        }
        self.requests += 1;
        let outcomes = (0..shots)
            .map(|_| {
                qubits.iter().enumerate().fold(0usize, |acc, (j, &q)| {
                    let bit = ((prepared >> j) & 1) as u8;
                    let read = self.noise.read(q, bit, &mut self.rng);
                    acc | (usize::from(read) << j)
                })
            })
            .collect();
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ideal_backend_is_exact() {
        let mut backend = NoisyReadoutBackend::ideal(3);
        let outcomes = backend.prepare_and_measure(&[0, 2], 3, 50).unwrap();
        assert!(outcomes.iter().all(|&o| o == 3));
        assert_eq!(backend.requests(), 1);
        assert!(backend.prepare_and_measure(&[0], 2, 1).is_err());
    }

    #[test]
    fn test_flip_rates_are_respected() {
        let mut backend = NoisyReadoutBackend::new(ReadoutNoise::uniform(1, 0.1, 0.3), 5);
        let zeros = backend.prepare_and_measure(&[0], 0, 20_000).unwrap();
        let ones = backend.prepare_and_measure(&[0], 1, 20_000).unwrap();
        let p01 = zeros.iter().filter(|&&o| o == 1).count() as f64 / 20_000.0;
        let p10 = ones.iter().filter(|&&o| o == 0).count() as f64 / 20_000.0;
        assert!((p01 - 0.1).abs() < 0.015);
        assert!((p10 - 0.3).abs() < 0.015);
    }

    #[test]
    fn test_analytic_matrix_is_column_stochastic() {
        let noise = ReadoutNoise {
            p01: vec![0.02, 0.05],
            p10: vec![0.04, 0.08],
        };
        let matrix = noise.confusion_matrix(&[1, 0]);
        for prepared in 0..4 {
            let column: f64 = (0..4).map(|m| matrix[m * 4 + prepared]).sum();
            assert!((column - 1.0).abs() < 1e-12);
        }
        // Prepared |00⟩ read back perfectly: (1 - p01[1]) * (1 - p01[0])
        assert!((matrix[0] - 0.95 * 0.98).abs() < 1e-12);
    }

    #[test]
    fn test_same_seed_same_outcomes() {
        let noise = ReadoutNoise::uniform(2, 0.2, 0.2);
        let a = NoisyReadoutBackend::new(noise.clone(), 9).prepare_and_measure(&[0, 1], 1, 100);
        let b = NoisyReadoutBackend::new(noise, 9).prepare_and_measure(&[0, 1], 1, 100);
        assert_eq!(a, b);
    }
}
