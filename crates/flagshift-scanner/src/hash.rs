//! Content hashing for change detection

use std::fmt::{self, Display, Formatter};

/// Blake3 hash of a file's contents
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute Blake3 hash of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// Check whether `content` differs from the hashed content
    #[inline]
    #[must_use]
    pub fn differs_from(&self, content: &[u8]) -> bool {
        Self::compute(content) != *self
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short())
    }
}

impl serde::Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_detects_changes() {
        let hash = ContentHash::compute(b"Statsig.checkGate('a')");
        assert!(!hash.differs_from(b"Statsig.checkGate('a')"));
        assert!(hash.differs_from(b"Statsig.checkGate('b')"));
        assert_eq!(hash.short().len(), 16);
        assert_eq!(hash.to_string().len(), 64);
    }
}
