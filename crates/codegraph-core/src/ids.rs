// ABOUTME: Deterministic identity hashing for the three-id Function scheme and for edges.
// ABOUTME: All ids are stable hashes over semantically meaningful inputs, never random.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hashes the given parts (joined with a separator byte that cannot appear in any part)
/// down to a u64. Used for every id in the system so that re-running analysis over
/// unchanged inputs reproduces identical ids.
pub fn stable_hash(parts: &[&str]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]); // unit separator, won't occur in identifiers or paths
    }
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[0..8].try_into().expect("digest has at least 8 bytes"))
}

macro_rules! stable_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            pub fn from_parts(parts: &[&str]) -> Self {
                Self(stable_hash(parts))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:016x}", self.0)
            }
        }
    };
}

stable_id!(
    FunctionId,
    "A function's physical id: stable within a snapshot for the same source text and location."
);
stable_id!(
    SemanticId,
    "Role-based hash of a function's qualified name and signature shape; stable across non-behavioral edits."
);
stable_id!(
    ContentId,
    "Hash of a function's normalized body text; changes iff the body changes."
);
stable_id!(EdgeId, "Deterministic hash of a call edge's identity tuple.");
stable_id!(TypeId, "A type definition's stable id.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_parts_hash_identically() {
        let a = FunctionId::from_parts(&["salt", "/src/a.ts", "1", "0", "free-function"]);
        let b = FunctionId::from_parts(&["salt", "/src/a.ts", "1", "0", "free-function"]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_parts_hash_differently() {
        let a = FunctionId::from_parts(&["salt", "/src/a.ts", "1", "0", "free-function"]);
        let b = FunctionId::from_parts(&["salt", "/src/a.ts", "2", "0", "free-function"]);
        assert_ne!(a, b);
    }

    #[test]
    fn separator_prevents_boundary_collisions() {
        // Without a separator, ("ab", "c") and ("a", "bc") would hash identically.
        let a = stable_hash(&["ab", "c"]);
        let b = stable_hash(&["a", "bc"]);
        assert_ne!(a, b);
    }
}
