use tessera_core::Transaction;

/// Late validation applied to every transaction as it leaves the queue.
/// `Err` carries the reason the transaction is dropped.
pub trait TransactionValidator: Send + Sync {
    fn validate(&self, tx: &Transaction) -> Result<(), String>;
}

/// Accepts transactions that still carry a quorum of valid signatures
#[derive(Debug, Default, Clone, Copy)]
pub struct QuorumValidator;

impl TransactionValidator for QuorumValidator {
    fn validate(&self, tx: &Transaction) -> Result<(), String> {
        match tx.is_fully_signed() {
            Ok(true) => Ok(()),
            Ok(false) => Err(format!("fewer than {} valid signatures", tx.quorum())),
            Err(e) => Err(e.to_string()),
        }
    }
}
