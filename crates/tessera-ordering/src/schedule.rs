use std::sync::atomic::{AtomicU64, Ordering};

use tessera_core::PublicKey;

/// Round-robin proposer selection over an ordered validator set
#[derive(Debug)]
pub struct ProposerSchedule {
    local: PublicKey,
    validators: Vec<PublicKey>,
    round: AtomicU64,
}

impl ProposerSchedule {
    pub fn new(local: PublicKey, validators: Vec<PublicKey>) -> Self {
        ProposerSchedule {
            local,
            validators,
            round: AtomicU64::new(1),
        }
    }

    /// A schedule in which this node proposes every round
    pub fn solo(local: PublicKey) -> Self {
        Self::new(local, vec![local])
    }

    pub fn local(&self) -> PublicKey {
        self.local
    }

    pub fn validators(&self) -> &[PublicKey] {
        &self.validators
    }

    pub fn current_round(&self) -> u64 {
        self.round.load(Ordering::Acquire)
    }

    pub fn advance_round(&self, round: u64) {
        self.round.store(round, Ordering::Release);
    }

    pub fn proposer_for(&self, round: u64) -> Option<PublicKey> {
        if self.validators.is_empty() {
            return None;
        }
        let index = (round as usize) % self.validators.len();
        self.validators.get(index).copied()
    }

    pub fn is_proposer(&self, round: u64) -> bool {
        self.proposer_for(round) == Some(self.local)
    }

    pub fn is_local_proposer(&self) -> bool {
        self.is_proposer(self.current_round())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::KeyPair;

    #[test]
    fn test_round_robin() {
        let keys: Vec<PublicKey> = (0..3).map(|_| KeyPair::generate().public).collect();
        let schedule = ProposerSchedule::new(keys[1], keys.clone());

        assert_eq!(schedule.current_round(), 1);
        assert!(schedule.is_local_proposer());
        assert!(!schedule.is_proposer(2));
        assert!(schedule.is_proposer(4));
        assert_eq!(schedule.proposer_for(3), Some(keys[0]));

        schedule.advance_round(2);
        assert!(!schedule.is_local_proposer());
    }

    #[test]
    fn test_empty_validator_set_never_proposes() {
        let schedule = ProposerSchedule::new(KeyPair::generate().public, Vec::new());
        assert_eq!(schedule.proposer_for(1), None);
        assert!(!schedule.is_local_proposer());
    }
}
