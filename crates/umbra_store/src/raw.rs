//! Columnar raw-outcome store.
//!
//! One file per experiment: a 4-byte magic followed by a postcard body of
//! parallel columns `shot_id`, `basis`, `outcome`. Rows are written in the
//! order snapshots were taken and shot ids increase strictly, so a reader
//! rebuilds the identical snapshot pool.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use umbra_core::{ShadowError, ShadowResult, Snapshot, SnapshotBatch};

use crate::address::{AddressAlgorithm, ContentAddress};

/// Leading bytes of every raw-outcome file
pub const RAW_MAGIC: &[u8; 4] = b"UMRO";

/// Columnar layout version
pub const RAW_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RawColumns {
    format_version: u32,
    num_qubits: u32,
    shot_id: Vec<u64>,
    basis: Vec<String>,
    outcome: Vec<String>,
}

/// Append-only writer for the columnar layout
#[derive(Debug)]
pub struct RawOutcomeWriter {
    num_qubits: usize,
    next_shot: u64,
    columns: RawColumns,
}

impl RawOutcomeWriter {
    /// Start an empty store for `num_qubits`-qubit snapshots
    #[must_use]
    pub fn new(num_qubits: usize) -> Self {
        Self {
            num_qubits,
            next_shot: 0,
            columns: RawColumns {
                format_version: RAW_FORMAT_VERSION,
                num_qubits: num_qubits as u32,
                shot_id: Vec::new(),
                basis: Vec::new(),
                outcome: Vec::new(),
            },
        }
    }

    /// Append one snapshot, returning its shot id
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot width differs from the store's
    pub fn append(&mut self, snapshot: &Snapshot) -> ShadowResult<u64> {
        if snapshot.num_qubits() != self.num_qubits {
            return Err(ShadowError::QubitCountMismatch {
                context: format!("raw outcome shot {}", self.next_shot),
                expected: self.num_qubits,
                actual: snapshot.num_qubits(),
            });
        }
        let shot = self.next_shot;
        self.columns.shot_id.push(shot);
        self.columns.basis.push(snapshot.basis_string());
        self.columns.outcome.push(snapshot.outcome_string());
        self.next_shot += 1;
        Ok(shot)
    }

    /// Append every snapshot of a batch in order
    ///
    /// # Errors
    ///
    /// Returns error on the first width mismatch
    pub fn extend(&mut self, batch: &SnapshotBatch) -> ShadowResult<()> {
        for snapshot in batch {
            self.append(snapshot)?;
        }
        Ok(())
    }

    /// Rows written so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.shot_id.len()
    }

    /// Whether nothing has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.shot_id.is_empty()
    }

    /// Encode the store
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn finish(self) -> ShadowResult<Vec<u8>> {
        let mut bytes = RAW_MAGIC.to_vec();
        bytes.extend(postcard::to_allocvec(&self.columns)?);
        Ok(bytes)
    }

    /// Encode and write to `path`, returning the content address and size
    ///
    /// The file appears under its final name only once fully written.
    ///
    /// # Errors
    ///
    /// Returns error on encoding or filesystem failure
    pub fn write_to(self, path: &Path, algorithm: AddressAlgorithm) -> ShadowResult<(ContentAddress, u64)> {
        let rows = self.len();
        let bytes = self.finish()?;
        let address = ContentAddress::compute_with(&bytes, algorithm);
        write_atomic(path, &bytes)?;
        debug!(path = %path.display(), rows, %address, "wrote raw outcome store");
        Ok((address, bytes.len() as u64))
    }
}

/// Verified reads of raw-outcome files
pub struct RawOutcomeStore;

impl RawOutcomeStore {
    /// Read and verify the store at `path`
    ///
    /// # Errors
    ///
    /// `RawDataNotFound` if the file is absent, `RawDataCorrupt` if its hash
    /// differs from `expected` or its content is not a well-formed store
    pub fn read(path: &Path, expected: &ContentAddress) -> ShadowResult<SnapshotBatch> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ShadowError::RawDataNotFound {
                path: path.to_path_buf(),
            },
            _ => ShadowError::Io {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        let corrupt = |reason: String| ShadowError::RawDataCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        if !expected.verify(&bytes) {
            let actual = ContentAddress::compute_with(&bytes, expected.algorithm());
            warn!(path = %path.display(), %expected, %actual, "raw outcome hash mismatch");
            return Err(corrupt(format!(
                "content hash mismatch: expected {}, found {}",
                expected, actual
            )));
        }

        decode(&bytes).map_err(corrupt)
    }

    /// Decode a store without hash verification
    ///
    /// # Errors
    ///
    /// Returns the reason the bytes are not a well-formed store
    pub fn decode(bytes: &[u8]) -> Result<SnapshotBatch, String> {
        decode(bytes)
    }
}

fn decode(bytes: &[u8]) -> Result<SnapshotBatch, String> {
    let body = bytes
        .strip_prefix(RAW_MAGIC.as_slice())
        .ok_or_else(|| "missing raw outcome magic".to_string())?;
    let columns: RawColumns = postcard::from_bytes(body).map_err(|e| format!("undecodable: {}", e))?;

    if columns.format_version != RAW_FORMAT_VERSION {
        return Err(format!("unknown layout version {}", columns.format_version));
    }
    let rows = columns.shot_id.len();
    if columns.basis.len() != rows || columns.outcome.len() != rows {
        return Err(format!(
            "column lengths differ: shot_id {}, basis {}, outcome {}",
            rows,
            columns.basis.len(),
            columns.outcome.len()
        ));
    }
    if let Some(pair) = columns.shot_id.windows(2).find(|w| w[1] <= w[0]) {
        return Err(format!("shot ids not increasing at {} -> {}", pair[0], pair[1]));
    }

    let num_qubits = columns.num_qubits as usize;
    let snapshots = columns
        .basis
        .iter()
        .zip(&columns.outcome)
        .zip(&columns.shot_id)
        .map(|((basis, outcome), shot)| {
            let snapshot =
                Snapshot::parse(basis, outcome).map_err(|e| format!("shot {}: {}", shot, e))?;
            if snapshot.num_qubits() != num_qubits {
                return Err(format!(
                    "shot {} has {} qubits, store declares {}",
                    shot,
                    snapshot.num_qubits(),
                    num_qubits
                ));
            }
            Ok(snapshot)
        })
        .collect::<Result<Vec<_>, String>>()?;

    SnapshotBatch::new(num_qubits, snapshots).map_err(|e| e.to_string())
}

/// Write through a sibling temporary file and rename into place
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> ShadowResult<()> {
    let io_err = |e: std::io::Error| ShadowError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("partial");
    fs::write(&tmp, bytes).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn batch() -> SnapshotBatch {
        SnapshotBatch::from_snapshots(vec![
            Snapshot::parse("ZZZ", "000").unwrap(),
            Snapshot::parse("XYZ", "101").unwrap(),
            Snapshot::parse("YYX", "011").unwrap(),
        ])
        .unwrap()
    }

    fn write(dir: &TempDir) -> (std::path::PathBuf, ContentAddress) {
        let path = dir.path().join("raw").join("exp.umr");
        let mut writer = RawOutcomeWriter::new(3);
        writer.extend(&batch()).unwrap();
        let (address, size) = writer.write_to(&path, AddressAlgorithm::Blake3).unwrap();
        assert_eq!(size, fs::metadata(&path).unwrap().len());
        (path, address)
    }

    #[test]
    fn test_write_read_preserves_order() {
        let dir = TempDir::new().unwrap();
        let (path, address) = write(&dir);
        let read = RawOutcomeStore::read(&path, &address).unwrap();
        assert_eq!(read, batch());
        assert!(!path.with_extension("partial").exists());
    }

    #[test]
    fn test_shot_ids_increase() {
        let mut writer = RawOutcomeWriter::new(1);
        let s = Snapshot::parse("X", "1").unwrap();
        assert_eq!(writer.append(&s).unwrap(), 0);
        assert_eq!(writer.append(&s).unwrap(), 1);
        assert_eq!(writer.len(), 2);
        assert!(writer.append(&Snapshot::parse("XX", "11").unwrap()).is_err());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let address = ContentAddress::compute(b"");
        let err = RawOutcomeStore::read(&dir.path().join("nope.umr"), &address).unwrap_err();
        assert!(matches!(err, ShadowError::RawDataNotFound { .. }));
    }

    #[test]
    fn test_tampered_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let (path, address) = write(&dir);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        fs::write(&path, bytes).unwrap();

        let err = RawOutcomeStore::read(&path, &address).unwrap_err();
        match err {
            ShadowError::RawDataCorrupt { reason, .. } => assert!(reason.contains("hash mismatch")),
            other => panic!("expected corrupt, got {:?}", other),
        }
    }

    #[test]
    fn test_undecodable_with_matching_hash_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.umr");
        fs::write(&path, b"not a store").unwrap();
        let address = ContentAddress::compute(b"not a store");
        let err = RawOutcomeStore::read(&path, &address).unwrap_err();
        assert!(matches!(err, ShadowError::RawDataCorrupt { .. }));
    }

    #[test]
    fn test_decode_rejects_bad_columns() {
        let encode = |columns: &RawColumns| {
            let mut bytes = RAW_MAGIC.to_vec();
            bytes.extend(postcard::to_allocvec(columns).unwrap());
            bytes
        };

        let unordered = RawColumns {
            format_version: RAW_FORMAT_VERSION,
            num_qubits: 1,
            shot_id: vec![1, 0],
            basis: vec!["X".into(), "Z".into()],
            outcome: vec!["0".into(), "1".into()],
        };
        assert!(decode(&encode(&unordered)).unwrap_err().contains("not increasing"));

        let ragged = RawColumns {
            format_version: RAW_FORMAT_VERSION,
            num_qubits: 2,
            shot_id: vec![0],
            basis: vec!["X".into()],
            outcome: vec!["0".into()],
        };
        assert!(decode(&encode(&ragged)).unwrap_err().contains("store declares"));

        let short = RawColumns {
            format_version: RAW_FORMAT_VERSION,
            num_qubits: 1,
            shot_id: vec![0, 1],
            basis: vec!["X".into()],
            outcome: vec!["0".into()],
        };
        assert!(decode(&encode(&short)).unwrap_err().contains("column lengths"));
    }

    #[test]
    fn test_sha256_addressing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exp.umr");
        let mut writer = RawOutcomeWriter::new(3);
        writer.extend(&batch()).unwrap();
        let (address, _) = writer.write_to(&path, AddressAlgorithm::Sha256).unwrap();
        assert_eq!(address.algorithm(), AddressAlgorithm::Sha256);
        assert_eq!(RawOutcomeStore::read(&path, &address).unwrap(), batch());
    }
}
