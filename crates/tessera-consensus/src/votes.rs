use std::collections::{BTreeMap, HashSet};

use tessera_core::{verify, Hash, PublicKey, Sig, SignatureEntry};
use tracing::debug;

use crate::error::ConsensusError;
use crate::net::VerifyResponse;

/// `2f + 1` where `f = (n - 1) / 3` faulty validators are tolerated
pub fn vote_threshold(validators: usize) -> usize {
    let faulty = validators.saturating_sub(1) / 3;
    2 * faulty + 1
}

/// Collects validator signatures over one block hash
pub struct VoteCollector {
    block_hash: Hash,
    validators: HashSet<PublicKey>,
    threshold: usize,
    votes: BTreeMap<PublicKey, Sig>,
}

impl VoteCollector {
    pub fn new(block_hash: Hash, validators: &[PublicKey]) -> Self {
        VoteCollector {
            block_hash,
            validators: validators.iter().copied().collect(),
            threshold: vote_threshold(validators.len()),
            votes: BTreeMap::new(),
        }
    }

    /// Count an accepting verify response. Returns whether the threshold
    /// is now met.
    pub fn add_vote(&mut self, response: &VerifyResponse) -> Result<bool, ConsensusError> {
        if response.block_hash != self.block_hash {
            return Err(ConsensusError::InvalidVote(format!(
                "{} voted for block {}",
                response.responder,
                response.block_hash.short()
            )));
        }
        let vote = response.vote().ok_or_else(|| {
            ConsensusError::InvalidVote(format!(
                "{} rejected: {}",
                response.responder,
                response.reason.as_deref().unwrap_or("no reason given")
            ))
        })?;
        self.add_signature(vote)
    }

    pub fn add_signature(&mut self, entry: SignatureEntry) -> Result<bool, ConsensusError> {
        if !self.validators.contains(&entry.public_key) {
            return Err(ConsensusError::ValidatorNotFound(entry.public_key.to_hex()));
        }
        verify(&entry.public_key, self.block_hash.as_bytes(), &entry.signature)?;

        if self.votes.contains_key(&entry.public_key) {
            debug!("Duplicate vote from {}", entry.public_key);
            return Ok(self.has_quorum());
        }
        self.votes.insert(entry.public_key, entry.signature);
        debug!(
            "Vote from {}, total: {}/{}",
            entry.public_key,
            self.votes.len(),
            self.threshold
        );
        Ok(self.has_quorum())
    }

    pub fn has_quorum(&self) -> bool {
        self.votes.len() >= self.threshold
    }

    pub fn count(&self) -> usize {
        self.votes.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn signatures(&self) -> Vec<SignatureEntry> {
        self.votes
            .iter()
            .map(|(public_key, signature)| SignatureEntry {
                public_key: *public_key,
                signature: *signature,
            })
            .collect()
    }
}

/// Gather accepting responses until the vote threshold over `validators`
/// is reached. Invalid or rejecting responses are skipped.
pub fn collect_votes(
    block_hash: Hash,
    validators: &[PublicKey],
    responses: impl IntoIterator<Item = VerifyResponse>,
) -> Result<Vec<SignatureEntry>, ConsensusError> {
    let mut collector = VoteCollector::new(block_hash, validators);
    for response in responses {
        match collector.add_vote(&response) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => debug!("Discarding vote: {}", e),
        }
    }

    if collector.has_quorum() {
        Ok(collector.signatures())
    } else {
        Err(ConsensusError::InsufficientVotes {
            have: collector.count(),
            need: collector.threshold(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{hash_blake3, sign, KeyPair};

    fn accept(keypair: &KeyPair, hash: Hash) -> VerifyResponse {
        VerifyResponse::accept(keypair.public, hash, sign(&keypair.secret, hash.as_bytes()))
    }

    #[test]
    fn test_threshold() {
        assert_eq!(vote_threshold(1), 1);
        assert_eq!(vote_threshold(3), 1);
        assert_eq!(vote_threshold(4), 3);
        assert_eq!(vote_threshold(7), 5);
        assert_eq!(vote_threshold(10), 7);
    }

    #[test]
    fn test_collects_until_threshold() {
        let keys: Vec<KeyPair> = (0..4).map(|_| KeyPair::generate()).collect();
        let validators: Vec<PublicKey> = keys.iter().map(|k| k.public).collect();
        let hash = hash_blake3(b"block");

        let responses = vec![
            accept(&keys[0], hash),
            VerifyResponse::reject(keys[1].public, hash, "stale"),
            accept(&keys[2], hash),
            accept(&keys[3], hash),
        ];
        let votes = collect_votes(hash, &validators, responses).unwrap();
        assert_eq!(votes.len(), 3);
    }

    #[test]
    fn test_duplicate_and_foreign_votes_not_counted() {
        let keys: Vec<KeyPair> = (0..4).map(|_| KeyPair::generate()).collect();
        let validators: Vec<PublicKey> = keys.iter().map(|k| k.public).collect();
        let outsider = KeyPair::generate();
        let hash = hash_blake3(b"block");

        let mut collector = VoteCollector::new(hash, &validators);
        assert!(!collector.add_vote(&accept(&keys[0], hash)).unwrap());
        assert!(!collector.add_vote(&accept(&keys[0], hash)).unwrap());
        assert!(matches!(
            collector.add_vote(&accept(&outsider, hash)),
            Err(ConsensusError::ValidatorNotFound(_))
        ));
        assert!(matches!(
            collector.add_vote(&accept(&keys[1], hash_blake3(b"other"))),
            Err(ConsensusError::InvalidVote(_))
        ));
        assert_eq!(collector.count(), 1);

        let result = collect_votes(hash, &validators, vec![accept(&keys[0], hash)]);
        assert!(matches!(
            result,
            Err(ConsensusError::InsufficientVotes { have: 1, need: 3 })
        ));
    }
}
