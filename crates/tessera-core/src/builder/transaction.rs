use crate::builder::error::BuildError;
use crate::builder::fields::FieldSet;
use crate::types::{AccountId, Command, Transaction, TransactionPayload};

const BUILDER: &str = "Transaction";
const FIELDS: &[&str] = &["creator_account_id", "created_time", "quorum", "commands"];

/// Builds an unsigned [`Transaction`]; sign the result with
/// [`Transaction::sign`].
///
/// Each field is set once. A rejected setter leaves the builder as it was.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    fields: FieldSet,
    creator_account_id: AccountId,
    created_time: u64,
    quorum: u32,
    commands: Vec<Command>,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionBuilder {
    pub fn new() -> Self {
        TransactionBuilder {
            fields: FieldSet::new(BUILDER, FIELDS),
            creator_account_id: AccountId::new(),
            created_time: 0,
            quorum: 0,
            commands: Vec::new(),
        }
    }

    pub fn creator_account_id(
        &mut self,
        account_id: impl Into<AccountId>,
    ) -> Result<&mut Self, BuildError> {
        self.fields.mark("creator_account_id")?;
        self.creator_account_id = account_id.into();
        Ok(self)
    }

    pub fn created_time(&mut self, millis: u64) -> Result<&mut Self, BuildError> {
        self.fields.mark("created_time")?;
        self.created_time = millis;
        Ok(self)
    }

    pub fn quorum(&mut self, quorum: u32) -> Result<&mut Self, BuildError> {
        self.fields.mark("quorum")?;
        self.quorum = quorum;
        Ok(self)
    }

    pub fn commands(&mut self, commands: Vec<Command>) -> Result<&mut Self, BuildError> {
        self.fields.mark("commands")?;
        self.commands = commands;
        Ok(self)
    }

    pub fn build(&self) -> Result<Transaction, BuildError> {
        self.fields.ensure_complete()?;

        if !matches!(self.creator_account_id.split_once('@'), Some((name, domain)) if !name.is_empty() && !domain.is_empty())
        {
            return Err(invalid("creator_account_id", "expected name@domain"));
        }
        if self.quorum == 0 {
            return Err(invalid("quorum", "quorum must be at least 1"));
        }
        if self.commands.is_empty() {
            return Err(invalid("commands", "at least one command is required"));
        }

        Ok(Transaction::new(TransactionPayload {
            creator_account_id: self.creator_account_id.clone(),
            created_time: self.created_time,
            quorum: self.quorum,
            commands: self.commands.clone(),
        }))
    }
}

fn invalid(field: &'static str, reason: &str) -> BuildError {
    BuildError::InvalidField {
        builder: BUILDER,
        field,
        reason: reason.to_string(),
    }
}
