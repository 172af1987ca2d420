//! SHA1 helpers shared by the downloader and the pre-launch checks.

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};
use std::io::Read;
use std::path::Path;

/// Compute the lowercase hex SHA1 of a file, streaming it from disk
pub fn calculate_sha1(path: &Path) -> Result<String> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read {:?}", path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hex SHA1 of an in-memory buffer
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// True when `path` exists and, if a hash is given, its content matches it.
/// Unreadable files count as not matching.
pub fn file_matches(path: &Path, expected_sha1: Option<&str>) -> bool {
    if !path.is_file() {
        return false;
    }
    match expected_sha1 {
        Some(expected) => match calculate_sha1(path) {
            Ok(actual) => actual.eq_ignore_ascii_case(expected),
            Err(e) => {
                log::debug!("Hash check failed for {:?}: {:#}", path, e);
                false
            }
        },
        None => true,
    }
}
