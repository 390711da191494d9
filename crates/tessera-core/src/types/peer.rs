use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::PublicKey;

/// Network location plus identity of a remote node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub address: String,
    pub public_key: PublicKey,
}

impl Peer {
    pub fn new(address: impl Into<String>, public_key: PublicKey) -> Self {
        Peer {
            address: address.into(),
            public_key,
        }
    }

    /// Absolute URL for `path` on this peer.
    pub fn url(&self, path: &str) -> String {
        let base = self.address.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{base}{path}")
        } else {
            format!("http://{base}{path}")
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", &self.public_key.to_hex()[..8], self.address)
    }
}
