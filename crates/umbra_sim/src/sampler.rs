//! Seeded randomized-basis snapshot sampling.

use std::collections::HashMap;

use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;
use umbra_core::{MeasurementBasis, ShadowResult, Snapshot, SnapshotBatch};

use crate::noise::ReadoutNoise;
use crate::state::StateVector;

/// Draw `shots` snapshots with uniformly random local Pauli bases
///
/// # Errors
///
/// Returns error only if snapshot construction fails, which indicates a bug
pub fn sample_snapshots(state: &StateVector, shots: usize, seed: u64) -> ShadowResult<SnapshotBatch> {
    sample(state, shots, seed, None)
}

/// Like [`sample_snapshots`], with every outcome bit read through `noise`
///
/// # Errors
///
/// Returns error only if snapshot construction fails, which indicates a bug
pub fn sample_noisy_snapshots(
    state: &StateVector,
    shots: usize,
    seed: u64,
    noise: &ReadoutNoise,
) -> ShadowResult<SnapshotBatch> {
    sample(state, shots, seed, Some(noise))
}

fn sample(
    state: &StateVector,
    shots: usize,
    seed: u64,
    noise: Option<&ReadoutNoise>,
) -> ShadowResult<SnapshotBatch> {
    let n = state.num_qubits();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let basis_choice = Uniform::new(0, MeasurementBasis::ALL.len());
    // 3^n basis settings at most; each distribution is computed once
    let mut cumulative: HashMap<Vec<MeasurementBasis>, Vec<f64>> = HashMap::new();

    let mut snapshots = Vec::with_capacity(shots);
    for _ in 0..shots {
        let bases: Vec<MeasurementBasis> = (0..n)
            .map(|_| MeasurementBasis::ALL[basis_choice.sample(&mut rng)])
            .collect();
        let cdf = cumulative.entry(bases.clone()).or_insert_with(|| {
            let mut running = 0.0;
            state
                .probabilities_in(&bases)
                .into_iter()
                .map(|p| {
                    running += p;
                    running
                })
                .collect()
        });

        let u: f64 = rng.r#gen();
        let index = cdf
            .iter()
            .position(|&c| u < c)
            .unwrap_or_else(|| last_supported(cdf));

        let outcome: Vec<u8> = (0..n)
            .map(|q| {
                let bit = ((index >> q) & 1) as u8;
                match noise {
                    Some(noise) => noise.read(q, bit, &mut rng),
                    None => bit,
                }
            })
            .collect();
        snapshots.push(Snapshot::new(bases, outcome)?);
    }

    debug!(shots, qubits = n, settings = cumulative.len(), "sampled snapshots");
    SnapshotBatch::new(n, snapshots)
}

/// Last index carrying probability; rounding can leave `u` above the final sum
fn last_supported(cdf: &[f64]) -> usize {
    let total = cdf.last().copied().unwrap_or(0.0);
    cdf.iter().position(|&c| c >= total).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reproducible() {
        let state = StateVector::ghz(3);
        let a = sample_snapshots(&state, 200, 42).unwrap();
        let b = sample_snapshots(&state, 200, 42).unwrap();
        assert_eq!(a, b);
        let c = sample_snapshots(&state, 200, 43).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_ghz_z_outcomes_are_correlated() {
        let batch = sample_snapshots(&StateVector::ghz(3), 2000, 1).unwrap();
        let mut seen = 0;
        for snapshot in batch.iter().filter(|s| s.basis_string() == "ZZZ") {
            seen += 1;
            let o = snapshot.outcome_string();
            assert!(o == "000" || o == "111", "unexpected {}", o);
        }
        assert!(seen > 30);
    }

    #[test]
    fn test_bases_roughly_uniform() {
        let batch = sample_snapshots(&StateVector::plus(2), 3000, 7).unwrap();
        let mut counts = [0usize; 3];
        for s in &batch {
            counts[s.basis()[0].index()] += 1;
        }
        assert!(counts.iter().all(|&c| (800..1200).contains(&c)));
    }

    #[test]
    fn test_noise_flips_bits() {
        let state = StateVector::basis_state(1, 0);
        let noisy = sample_noisy_snapshots(&state, 3000, 3, &ReadoutNoise::uniform(1, 0.25, 0.0)).unwrap();
        let z_ones = noisy
            .iter()
            .filter(|s| s.basis_string() == "Z")
            .map(|s| f64::from(s.outcome()[0]))
            .collect::<Vec<_>>();
        let rate = z_ones.iter().sum::<f64>() / z_ones.len() as f64;
        assert!((rate - 0.25).abs() < 0.05);
    }

    #[test]
    fn test_last_supported() {
        assert_eq!(last_supported(&[0.5, 1.0, 1.0]), 1);
        assert_eq!(last_supported(&[]), 0);
    }

    proptest! {
        #[test]
        fn prop_basis_state_z_outcome_exact(index in 0usize..8, seed in any::<u64>()) {
            let state = StateVector::basis_state(3, index);
            let batch = sample_snapshots(&state, 50, seed).unwrap();
            for s in batch.iter().filter(|s| s.basis_string() == "ZZZ") {
                prop_assert_eq!(s.outcome_index(&[0, 1, 2]).unwrap(), index);
            }
        }
    }
}
