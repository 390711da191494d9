//! Fluent, single-use builders for ledger objects.
//!
//! Every settable field may be set once; setting it again is a
//! [`BuildError::DuplicateField`]. `build()` borrows the builder, so one
//! builder can produce any number of equal, independent values, and it
//! reports every missing field at once.

pub mod asset;
pub mod command;
pub mod error;
pub mod fields;
pub mod transaction;

pub use asset::AssetBuilder;
pub use command::{CommandBuilder, CommandKind};
pub use error::BuildError;
pub use fields::FieldSet;
pub use transaction::TransactionBuilder;
