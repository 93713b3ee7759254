use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of arbitrary bytes. Used for source-file content
/// hashes and, truncated, for index-entry directory names.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Short content-addressed key for an index entry's on-disk directory,
/// derived from the project-relative path (not the file's contents).
pub fn entry_key(relative_path: &str) -> String {
    let full = sha256_hex(relative_path.as_bytes());
    full[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }

    #[test]
    fn test_entry_key_stable() {
        let a = entry_key("src/lib.rs");
        let b = entry_key("src/lib.rs");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_entry_key_distinguishes_paths() {
        assert_ne!(entry_key("src/lib.rs"), entry_key("src/main.rs"));
    }
}
