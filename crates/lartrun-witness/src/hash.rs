use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::WitnessError;

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex_bytes(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

/// Hash of the program file, as recorded in `programhash`.
pub fn sha256_hex_file(path: &Path) -> Result<String, WitnessError> {
    fs::read(path)
        .map(|bytes| sha256_hex_bytes(&bytes))
        .map_err(|source| WitnessError::Hash {
            path: path.to_path_buf(),
            source,
        })
}
