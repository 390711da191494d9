use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::crypto::{hash_blake3, sign, verify, Hash, KeyPair, PublicKey, Sig};
use crate::error::CoreError;
use crate::serialize;
use crate::types::amount::Amount;

/// Account identifier of the form `name@domain`
pub type AccountId = String;

/// Ledger commands a transaction can carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    AddAssetQuantity {
        asset_id: String,
        amount: Amount,
    },
    TransferAsset {
        src_account_id: AccountId,
        dest_account_id: AccountId,
        asset_id: String,
        description: String,
        amount: Amount,
    },
    CreateAccount {
        account_name: String,
        domain_id: String,
        public_key: PublicKey,
    },
    SetAccountQuorum {
        account_id: AccountId,
        quorum: u32,
    },
    AddSignatory {
        account_id: AccountId,
        public_key: PublicKey,
    },
}

/// The unsigned part of a transaction. Its digest is the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub creator_account_id: AccountId,
    /// Milliseconds since the Unix epoch
    pub created_time: u64,
    /// Distinct signatures required before the transaction may be ordered
    pub quorum: u32,
    pub commands: Vec<Command>,
}

impl TransactionPayload {
    pub fn fingerprint(&self) -> Result<Hash, CoreError> {
        Ok(hash_blake3(&serialize::to_bytes(self)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub public_key: PublicKey,
    pub signature: Sig,
}

impl SignatureEntry {
    /// Check the signature against a payload fingerprint.
    pub fn verify(&self, fingerprint: &Hash) -> Result<(), CoreError> {
        verify(&self.public_key, fingerprint.as_bytes(), &self.signature)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub payload: TransactionPayload,
    pub signatures: Vec<SignatureEntry>,
}

impl Transaction {
    pub fn new(payload: TransactionPayload) -> Self {
        Transaction {
            payload,
            signatures: Vec::new(),
        }
    }

    pub fn fingerprint(&self) -> Result<Hash, CoreError> {
        self.payload.fingerprint()
    }

    pub fn quorum(&self) -> u32 {
        self.payload.quorum
    }

    /// Add a signature by `keypair`. Signing twice with the same key keeps one entry.
    pub fn sign(mut self, keypair: &KeyPair) -> Result<Self, CoreError> {
        let fingerprint = self.fingerprint()?;
        if !self.is_signed_by(&keypair.public) {
            self.signatures.push(SignatureEntry {
                public_key: keypair.public,
                signature: sign(&keypair.secret, fingerprint.as_bytes()),
            });
        }
        Ok(self)
    }

    pub fn is_signed_by(&self, key: &PublicKey) -> bool {
        self.signatures.iter().any(|entry| entry.public_key == *key)
    }

    /// Distinct signers whose signatures verify against the fingerprint
    pub fn valid_signers(&self) -> Result<BTreeSet<PublicKey>, CoreError> {
        let fingerprint = self.fingerprint()?;
        Ok(self
            .signatures
            .iter()
            .filter(|entry| entry.verify(&fingerprint).is_ok())
            .map(|entry| entry.public_key)
            .collect())
    }

    pub fn is_fully_signed(&self) -> Result<bool, CoreError> {
        let quorum = self.payload.quorum as usize;
        Ok(quorum > 0 && self.valid_signers()?.len() >= quorum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(quorum: u32) -> TransactionPayload {
        TransactionPayload {
            creator_account_id: "admin@test".to_string(),
            created_time: 1_700_000_000_000,
            quorum,
            commands: vec![Command::AddAssetQuantity {
                asset_id: "coin#test".to_string(),
                amount: "20000.0".parse().unwrap(),
            }],
        }
    }

    #[test]
    fn test_fingerprint_ignores_signatures() {
        let kp = KeyPair::generate();
        let unsigned = Transaction::new(payload(1));
        let signed = unsigned.clone().sign(&kp).unwrap();
        assert_eq!(unsigned.fingerprint().unwrap(), signed.fingerprint().unwrap());
    }

    #[test]
    fn test_fingerprint_commits_to_quorum() {
        assert_ne!(
            payload(1).fingerprint().unwrap(),
            payload(2).fingerprint().unwrap()
        );
    }

    #[test]
    fn test_signing_twice_keeps_one_entry() {
        let kp = KeyPair::generate();
        let tx = Transaction::new(payload(2))
            .sign(&kp)
            .unwrap()
            .sign(&kp)
            .unwrap();
        assert_eq!(tx.signatures.len(), 1);
        assert!(!tx.is_fully_signed().unwrap());
    }

    #[test]
    fn test_forged_signature_is_not_counted() {
        let alice = KeyPair::generate();
        let mallory = KeyPair::generate();
        let mut tx = Transaction::new(payload(2)).sign(&alice).unwrap();
        tx.signatures.push(SignatureEntry {
            public_key: mallory.public,
            signature: sign(&mallory.secret, b"not the fingerprint"),
        });

        assert_eq!(tx.valid_signers().unwrap().len(), 1);
        assert!(!tx.is_fully_signed().unwrap());

        let tx = tx.sign(&KeyPair::generate()).unwrap();
        assert!(tx.is_fully_signed().unwrap());
    }
}
