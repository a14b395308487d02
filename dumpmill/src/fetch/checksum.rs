//! SHA-256 verification of downloaded archives.
//!
//! Dump publishers list a SHA-256 digest next to each archive. When the
//! caller supplies one, the assembled file is hashed in a streaming pass
//! and a mismatch fails the download.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::error::{FetchError, FetchResult};
use super::http::BLOCK_SIZE;

/// Hash a file's contents with SHA-256.
///
/// Returns the lowercase hexadecimal digest. The file is read in blocks,
/// so archives larger than memory hash fine.
pub fn sha256_file(path: &Path) -> FetchResult<String> {
    let mut file = File::open(path).map_err(|e| FetchError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| FetchError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify a file against an expected SHA-256 digest.
///
/// The comparison ignores hex case, since published digests appear in
/// both conventions.
pub fn verify_sha256(path: &Path, expected: &str) -> FetchResult<()> {
    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(FetchError::ChecksumMismatch {
            filename: path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // SHA-256 of "dumpmill"
    const DUMPMILL_SHA256: &str =
        "b5112398b371443c7beb83b6dcdffdc74624a3e4714c00b0ad6c7d5b6d770937";

    #[test]
    fn test_sha256_known_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.bin");
        fs::write(&path, b"dumpmill").unwrap();

        assert_eq!(sha256_file(&path).unwrap(), DUMPMILL_SHA256);
    }

    #[test]
    fn test_sha256_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.bin");
        fs::write(&path, b"").unwrap();

        // SHA-256 of the empty string
        assert_eq!(
            sha256_file(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_missing_file() {
        let result = sha256_file(Path::new("/nonexistent/archive.xml.gz"));
        assert!(matches!(result, Err(FetchError::ReadFailed { .. })));
    }

    #[test]
    fn test_sha256_spans_multiple_blocks() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("large.bin");
        fs::write(&path, vec![0x42u8; BLOCK_SIZE * 2 + 17]).unwrap();

        let first = sha256_file(&path).unwrap();
        let second = sha256_file(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_verify_accepts_match() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.bin");
        fs::write(&path, b"dumpmill").unwrap();

        assert!(verify_sha256(&path, DUMPMILL_SHA256).is_ok());
    }

    #[test]
    fn test_verify_ignores_hex_case() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.bin");
        fs::write(&path, b"dumpmill").unwrap();

        assert!(verify_sha256(&path, &DUMPMILL_SHA256.to_uppercase()).is_ok());
    }

    #[test]
    fn test_verify_rejects_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.bin");
        fs::write(&path, b"not the expected bytes").unwrap();

        let result = verify_sha256(&path, DUMPMILL_SHA256);
        match result {
            Err(FetchError::ChecksumMismatch {
                filename,
                expected,
                actual,
            }) => {
                assert_eq!(filename, "data.bin");
                assert_eq!(expected, DUMPMILL_SHA256);
                assert_ne!(actual, expected);
            }
            other => panic!("expected ChecksumMismatch, got {:?}", other),
        }
    }
}
