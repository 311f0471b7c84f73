use std::fs::File;
use std::io::Read;
use std::path::Path;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Chunk size used when streaming files and downloads.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Digest algorithms published by the artifact hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// Maven Central `.sha1` sidecar files.
    Sha1,
    /// GitHub release asset digests.
    Sha256,
}

/// A digest an artifact is expected to have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    pub algorithm: DigestAlgorithm,
    pub hex: String,
}

impl ExpectedDigest {
    /// Parses the body of a sidecar digest file.
    ///
    /// Some publishers append the file name after the hash, so only the first token is kept.
    pub fn from_sidecar(algorithm: DigestAlgorithm, body: &str) -> Option<ExpectedDigest> {
        let hex = body.split_whitespace().next()?;
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(ExpectedDigest {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Parses a prefixed digest such as `sha256:ab12...`.
    pub fn from_prefixed(value: &str) -> Option<ExpectedDigest> {
        let (algorithm, hex) = if let Some(hex) = value.strip_prefix("sha256:") {
            (DigestAlgorithm::Sha256, hex)
        } else if let Some(hex) = value.strip_prefix("sha1:") {
            (DigestAlgorithm::Sha1, hex)
        } else {
            return None;
        };
        ExpectedDigest::from_sidecar(algorithm, hex)
    }

    /// Case-insensitive comparison against a computed hex digest.
    pub fn matches(&self, actual: &str) -> bool {
        self.hex.eq_ignore_ascii_case(actual.trim())
    }
}

/// Streams `reader` through `D` in fixed-size chunks and returns the lowercase hex digest.
pub fn digest_reader<D: Digest, R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Computes the digest of the file at `path`.
pub fn file_digest<P: AsRef<Path>>(path: P, algorithm: DigestAlgorithm) -> std::io::Result<String> {
    let file = File::open(path)?;
    match algorithm {
        DigestAlgorithm::Sha1 => digest_reader::<Sha1, _>(file),
        DigestAlgorithm::Sha256 => digest_reader::<Sha256, _>(file),
    }
}

/// `true` when the file exists and its digest equals `expected`.
pub fn file_matches<P: AsRef<Path>>(path: P, expected: &ExpectedDigest) -> bool {
    file_digest(path, expected.algorithm)
        .map(|actual| expected.matches(&actual))
        .unwrap_or(false)
}
