//! Execution backend seen by the calibrator.

/// Prepares computational basis states and measures them
///
/// `prepared` and every returned outcome are indices over `qubits`, with
/// `qubits[j]` at bit `j`. One outcome is returned per shot.
pub trait CalibrationBackend {
    /// Prepare `prepared` on `qubits` and measure it `shots` times
    ///
    /// # Errors
    ///
    /// Returns a backend-specific message on failure
    fn prepare_and_measure(
        &mut self,
        qubits: &[usize],
        prepared: usize,
        shots: u32,
    ) -> Result<Vec<usize>, String>;
}

impl<F> CalibrationBackend for F
where
    F: FnMut(&[usize], usize, u32) -> Result<Vec<usize>, String>,
{
    fn prepare_and_measure(
        &mut self,
        qubits: &[usize],
        prepared: usize,
        shots: u32,
    ) -> Result<Vec<usize>, String> {
        self(qubits, prepared, shots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_backend() {
        let mut calls = 0;
        let mut backend = |_: &[usize], prepared: usize, shots: u32| {
            calls += 1;
            Ok::<_, String>(vec![prepared; shots as usize])
        };
        let outcomes = backend.prepare_and_measure(&[0, 1], 2, 4).unwrap();
        assert_eq!(outcomes, vec![2, 2, 2, 2]);
        drop(backend);
        assert_eq!(calls, 1);
    }
}
