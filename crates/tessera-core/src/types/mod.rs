pub mod amount;
pub mod asset;
pub mod block;
pub mod peer;
pub mod transaction;

pub use amount::Amount;
pub use asset::Asset;
pub use block::{Block, BlockPayload};
pub use peer::Peer;
pub use transaction::{AccountId, Command, SignatureEntry, Transaction, TransactionPayload};
