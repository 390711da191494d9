//! Tessera Ordering - batching of fully signed transactions
//!
//! This crate provides the ordering gateway, which turns a FIFO queue of
//! transactions into batches and proposals on size or time triggers.

pub mod batch;
pub mod error;
pub mod gateway;
pub mod schedule;
pub mod validator;

pub use batch::{Batch, DroppedTransaction, FlushReport, Proposal};
pub use error::OrderingError;
pub use gateway::{OrderingConfig, OrderingGateway};
pub use schedule::ProposerSchedule;
pub use validator::{QuorumValidator, TransactionValidator};
