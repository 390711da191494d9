use std::collections::{HashMap, HashSet};

use tessera_core::{AccountId, Hash, PublicKey, SignatureEntry, TransactionPayload};

use crate::error::MstError;

/// Decides whether a partial signature may join a pending transaction.
pub trait SignatureValidator: Send + Sync {
    fn validate(
        &self,
        payload: &TransactionPayload,
        fingerprint: &Hash,
        entry: &SignatureEntry,
    ) -> Result<(), MstError>;
}

/// Ed25519 proof check, optionally restricted to known account signatories.
///
/// Accounts missing from the signatory map accept any signer with a valid
/// proof.
#[derive(Debug, Clone, Default)]
pub struct Ed25519Validator {
    signatories: HashMap<AccountId, HashSet<PublicKey>>,
}

impl Ed25519Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signatories(signatories: HashMap<AccountId, HashSet<PublicKey>>) -> Self {
        Ed25519Validator { signatories }
    }

    pub fn add_signatory(&mut self, account: impl Into<AccountId>, key: PublicKey) {
        self.signatories.entry(account.into()).or_default().insert(key);
    }
}

impl SignatureValidator for Ed25519Validator {
    fn validate(
        &self,
        payload: &TransactionPayload,
        fingerprint: &Hash,
        entry: &SignatureEntry,
    ) -> Result<(), MstError> {
        if let Some(allowed) = self.signatories.get(&payload.creator_account_id) {
            if !allowed.contains(&entry.public_key) {
                return Err(MstError::UnauthorizedSigner {
                    signer: entry.public_key,
                    account: payload.creator_account_id.clone(),
                });
            }
        }
        entry
            .verify(fingerprint)
            .map_err(|_| MstError::InvalidSignature(entry.public_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Command, KeyPair, Transaction};

    fn signed(keypair: &KeyPair) -> (TransactionPayload, Hash, SignatureEntry) {
        let tx = Transaction::new(TransactionPayload {
            creator_account_id: "alice@wonderland".to_string(),
            created_time: 10,
            quorum: 2,
            commands: vec![Command::SetAccountQuorum {
                account_id: "alice@wonderland".to_string(),
                quorum: 2,
            }],
        })
        .sign(keypair)
        .unwrap();
        let fingerprint = tx.fingerprint().unwrap();
        (tx.payload, fingerprint, tx.signatures[0])
    }

    #[test]
    fn test_valid_proof_accepted() {
        let keypair = KeyPair::generate();
        let (payload, fingerprint, entry) = signed(&keypair);
        assert!(Ed25519Validator::new()
            .validate(&payload, &fingerprint, &entry)
            .is_ok());
    }

    #[test]
    fn test_forged_proof_rejected() {
        let keypair = KeyPair::generate();
        let (payload, fingerprint, mut entry) = signed(&keypair);
        entry.public_key = KeyPair::generate().public;

        let result = Ed25519Validator::new().validate(&payload, &fingerprint, &entry);
        assert!(matches!(result, Err(MstError::InvalidSignature(_))));
    }

    #[test]
    fn test_signer_outside_signatory_set_rejected() {
        let allowed = KeyPair::generate();
        let stranger = KeyPair::generate();
        let mut validator = Ed25519Validator::new();
        validator.add_signatory("alice@wonderland", allowed.public);

        let (payload, fingerprint, entry) = signed(&stranger);
        let result = validator.validate(&payload, &fingerprint, &entry);
        assert!(matches!(result, Err(MstError::UnauthorizedSigner { .. })));

        let (payload, fingerprint, entry) = signed(&allowed);
        assert!(validator.validate(&payload, &fingerprint, &entry).is_ok());
    }
}
