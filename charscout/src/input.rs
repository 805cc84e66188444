use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::errors::{ScanError, ScanResult};

/// Reads the whole file at `path` into an immutable buffer shared by all workers
pub fn load_buffer(path: &Path) -> ScanResult<Arc<[u8]>> {
    let bytes = std::fs::read(path).map_err(|e| ScanError::from_io(path, e))?;
    if bytes.is_empty() {
        return Err(ScanError::EmptyInput(path.to_path_buf()));
    }
    debug!("Loaded {} bytes from {}", bytes.len(), path.display());
    Ok(Arc::from(bytes))
}

/// Parses the byte to count. Exactly one byte is accepted.
pub fn parse_target(arg: &str) -> ScanResult<u8> {
    match arg.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(ScanError::invalid_target(format!(
            "character to count must be a single byte, got {:?}",
            arg
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_buffer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, "aabcaabcaa").unwrap();

        let buffer = load_buffer(&path).unwrap();
        assert_eq!(&buffer[..], b"aabcaabcaa");
    }

    #[test]
    fn test_load_empty_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();

        assert!(matches!(load_buffer(&path), Err(ScanError::EmptyInput(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.txt");
        assert!(matches!(load_buffer(&path), Err(ScanError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("a").unwrap(), b'a');
        assert_eq!(parse_target("\n").unwrap(), b'\n');
        assert!(matches!(parse_target(""), Err(ScanError::InvalidTarget(_))));
        assert!(matches!(parse_target("ab"), Err(ScanError::InvalidTarget(_))));
        // Two bytes in UTF-8
        assert!(matches!(parse_target("é"), Err(ScanError::InvalidTarget(_))));
    }
}
