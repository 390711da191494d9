use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// 32-byte Blake3 digest. Identifies blocks and transaction payloads.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, CoreError> {
        let bytes: [u8; 32] = slice
            .try_into()
            .map_err(|_| CoreError::InvalidDigestLength(slice.len()))?;
        Ok(Hash(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        Self::from_slice(&hex::decode(s)?)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl FromStr for Hash {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn hash_blake3(data: &[u8]) -> Hash {
    Hash(*blake3::hash(data).as_bytes())
}

/// Binary merkle root over `leaves`; an odd node is paired with itself.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    match leaves {
        [] => Hash::ZERO,
        [single] => *single,
        _ => {
            let mut level = leaves.to_vec();
            while level.len() > 1 {
                level = level
                    .chunks(2)
                    .map(|pair| {
                        let left = pair[0];
                        let right = pair.get(1).copied().unwrap_or(left);
                        let mut hasher = blake3::Hasher::new();
                        hasher.update(&left.0);
                        hasher.update(&right.0);
                        Hash(*hasher.finalize().as_bytes())
                    })
                    .collect();
            }
            level[0]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(hash_blake3(b"block"), hash_blake3(b"block"));
        assert_ne!(hash_blake3(b"block"), hash_blake3(b"other"));
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(matches!(
            Hash::from_slice(&[1u8; 31]),
            Err(CoreError::InvalidDigestLength(31))
        ));
    }

    #[test]
    fn test_parse_hex() {
        let hash = hash_blake3(b"parse me");
        let parsed: Hash = hash.to_hex().parse().unwrap();
        assert_eq!(parsed, hash);
        assert!("zz".parse::<Hash>().is_err());
    }

    #[test]
    fn test_merkle_root_shapes() {
        assert_eq!(merkle_root(&[]), Hash::ZERO);

        let leaf = hash_blake3(b"only");
        assert_eq!(merkle_root(&[leaf]), leaf);

        let leaves: Vec<Hash> = (0u8..3).map(|i| hash_blake3(&[i])).collect();
        let root = merkle_root(&leaves);
        assert_ne!(root, Hash::ZERO);
        // order matters
        let reversed: Vec<Hash> = leaves.iter().rev().copied().collect();
        assert_ne!(merkle_root(&reversed), root);
    }
}
