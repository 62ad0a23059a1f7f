//! SHA256 verification of release archives
//!
//! Xray-core publishes a `<asset>.dgst` file next to every archive with
//! lines such as `SHA2-256= <hex>`.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Result of hash verification
#[derive(Debug, Clone)]
pub struct HashResult {
    /// The computed hash (lowercase hex)
    pub computed: String,
    /// The expected hash (lowercase hex)
    pub expected: String,
    /// Whether they match
    pub matches: bool,
}

/// Compute SHA256 hash of a file
pub fn compute_file_hash(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;

    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file's SHA256 hash against expected value
pub fn verify_file_hash(path: &Path, expected_hash: &str) -> io::Result<HashResult> {
    let computed = compute_file_hash(path)?;
    let expected = expected_hash.trim().to_lowercase();
    let matches = computed == expected;

    log::info!(
        "Hash verification for {}: computed={}, expected={}, matches={}",
        path.display(),
        computed.chars().take(16).collect::<String>(),
        expected.chars().take(16).collect::<String>(),
        matches
    );

    Ok(HashResult {
        computed,
        expected,
        matches,
    })
}

/// Pull the SHA2-256 value out of a `.dgst` file
pub fn parse_dgst_sha256(dgst: &str) -> Option<String> {
    dgst.lines().find_map(|line| {
        let (algo, value) = line.split_once('=')?;
        if algo.trim().eq_ignore_ascii_case("SHA2-256") || algo.trim().eq_ignore_ascii_case("SHA256") {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_lowercase())
        } else {
            None
        }
    })
}
