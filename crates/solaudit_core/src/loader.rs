//! crates/solaudit_core/src/loader.rs
//!
//! Turns uploaded file bytes into a validated `ContractSource`.

use crate::domain::ContractSource;

/// The contract-source extension accepted on upload. Bare filenames
/// (pasted code) carry no extension and are accepted as-is.
const CONTRACT_EXTENSION: &str = "sol";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("contract source is empty")]
    EmptyInput,
    #[error("unsupported file type '{0}', expected a .sol file")]
    UnsupportedFile(String),
    #[error("contract is {size} bytes, which exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("contract file is not valid UTF-8: {0}")]
    InvalidEncoding(String),
}

/// Decodes and validates an uploaded contract. No side effects; the
/// returned value is immutable for the rest of the session.
pub fn load(bytes: &[u8], filename: &str, max_bytes: usize) -> Result<ContractSource, LoadError> {
    if let Some(extension) = extension_of(filename) {
        if !extension.eq_ignore_ascii_case(CONTRACT_EXTENSION) {
            return Err(LoadError::UnsupportedFile(filename.to_string()));
        }
    }

    if bytes.len() > max_bytes {
        return Err(LoadError::PayloadTooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|e| LoadError::InvalidEncoding(e.to_string()))?
        .to_string();

    if text.trim().is_empty() {
        return Err(LoadError::EmptyInput);
    }

    Ok(ContractSource {
        name: filename.to_string(),
        size_bytes: bytes.len(),
        text,
    })
}

fn extension_of(filename: &str) -> Option<&str> {
    let basename = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match basename.rsplit_once('.') {
        Some(("", _)) => None, // dotfiles like ".env" have no extension
        Some((_, ext)) => Some(ext),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"pragma solidity ^0.8.20;\ncontract Example {}\n";

    #[test]
    fn loads_a_valid_sol_file() {
        let source = load(SAMPLE, "Example.sol", 1024).unwrap();
        assert_eq!(source.name, "Example.sol");
        assert_eq!(source.size_bytes, SAMPLE.len());
        assert!(source.text.contains("contract Example"));
    }

    #[test]
    fn rejects_empty_and_whitespace_only_input() {
        assert!(matches!(load(b"", "a.sol", 1024), Err(LoadError::EmptyInput)));
        assert!(matches!(
            load(b"  \n\t ", "a.sol", 1024),
            Err(LoadError::EmptyInput)
        ));
    }

    #[test]
    fn rejects_foreign_extensions_but_accepts_bare_names() {
        assert!(matches!(
            load(SAMPLE, "notes.txt", 1024),
            Err(LoadError::UnsupportedFile(_))
        ));
        // Pasted code arrives without a file extension.
        assert!(load(SAMPLE, "pasted-contract", 1024).is_ok());
        // Extension matching is case-insensitive.
        assert!(load(SAMPLE, "Example.SOL", 1024).is_ok());
    }

    #[test]
    fn rejects_oversized_input_with_both_sizes() {
        match load(SAMPLE, "a.sol", 10) {
            Err(LoadError::PayloadTooLarge { size, limit }) => {
                assert_eq!(size, SAMPLE.len());
                assert_eq!(limit, 10);
            }
            other => panic!("expected PayloadTooLarge, got {:?}", other.map(|s| s.name)),
        }
    }

    #[test]
    fn rejects_non_utf8_bytes() {
        assert!(matches!(
            load(&[0xff, 0xfe, 0x00], "a.sol", 1024),
            Err(LoadError::InvalidEncoding(_))
        ));
    }
}
