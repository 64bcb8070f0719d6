//! Blake3 hashing utilities for change detection.
//!
//! Manifest and lock input hashes are built with [`Fingerprint`], which
//! length-prefixes every field so that `("ab", "c")` and `("a", "bc")`
//! never collide.

/// Compute Blake3 hash of data
pub fn blake3_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex().to_string()
}

/// Incremental hash over labelled fields
#[derive(Debug, Clone, Default)]
pub struct Fingerprint {
    hasher: blake3::Hasher,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one labelled value
    pub fn field(&mut self, label: &str, value: &str) -> &mut Self {
        self.write(label.as_bytes());
        self.write(value.as_bytes());
        self
    }

    /// Mark the start of a section (group, package) so boundaries are hashed
    pub fn section(&mut self, name: &str) -> &mut Self {
        self.write(b"\x00section");
        self.write(name.as_bytes());
        self
    }

    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    /// Hex digest of everything fed so far
    pub fn finish(&self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_hash() {
        let hash = blake3_hash(b"hello world");

        // 32 bytes = 64 hex chars
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, blake3_hash(b"hello world"));
    }

    #[test]
    fn test_fingerprint_field_boundaries() {
        let mut left = Fingerprint::new();
        left.field("ab", "c");
        let mut right = Fingerprint::new();
        right.field("a", "bc");
        assert_ne!(left.finish(), right.finish());
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let build = || {
            let mut fp = Fingerprint::new();
            fp.section("default").field("requests", "^2.31");
            fp.finish()
        };
        assert_eq!(build(), build());
    }
}
