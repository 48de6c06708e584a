use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Number of hex characters in an asset fingerprint.
pub const FINGERPRINT_LEN: usize = 32;

/// Computes the fingerprint of `data`: SHA-256, hex-encoded, truncated to
/// [`FINGERPRINT_LEN`] characters.
pub fn fingerprint_bytes(data: &[u8]) -> String {
    let mut hex = hex::encode(Sha256::digest(data));
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// Streams a file through SHA-256 and returns its fingerprint.
pub fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(FINGERPRINT_LEN);
    Ok(hex)
}
