use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::builder::error::BuildError;
use crate::builder::fields::FieldSet;
use crate::crypto::PublicKey;
use crate::types::{Amount, Command};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    AddAssetQuantity,
    TransferAsset,
    CreateAccount,
    SetAccountQuorum,
    AddSignatory,
}

impl CommandKind {
    pub const ALL: [CommandKind; 5] = [
        CommandKind::AddAssetQuantity,
        CommandKind::TransferAsset,
        CommandKind::CreateAccount,
        CommandKind::SetAccountQuorum,
        CommandKind::AddSignatory,
    ];

    fn spec(self) -> &'static CommandSpec {
        &COMMAND_SPECS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn required_fields(self) -> &'static [&'static str] {
        self.spec().fields
    }
}

/// Field values collected by a [`CommandBuilder`], keyed by canonical name.
struct FieldValues<'a> {
    builder: &'static str,
    values: &'a BTreeMap<&'static str, String>,
}

impl FieldValues<'_> {
    fn text(&self, field: &'static str) -> Result<String, BuildError> {
        self.values
            .get(field)
            .cloned()
            .ok_or(BuildError::UnsetFields {
                builder: self.builder,
                fields: vec![field],
            })
    }

    fn account_id(&self, field: &'static str) -> Result<String, BuildError> {
        let value = self.text(field)?;
        match value.split_once('@') {
            Some((name, domain)) if !name.is_empty() && !domain.is_empty() => Ok(value),
            _ => Err(self.invalid(field, "expected name@domain")),
        }
    }

    fn amount(&self, field: &'static str) -> Result<Amount, BuildError> {
        let amount = self
            .text(field)?
            .parse::<Amount>()
            .map_err(|e| self.invalid(field, e.to_string()))?;
        if amount.is_zero() {
            return Err(self.invalid(field, "amount must be positive"));
        }
        Ok(amount)
    }

    fn public_key(&self, field: &'static str) -> Result<PublicKey, BuildError> {
        PublicKey::from_hex(&self.text(field)?).map_err(|e| self.invalid(field, e.to_string()))
    }

    fn quorum(&self, field: &'static str) -> Result<u32, BuildError> {
        match self.text(field)?.parse::<u32>() {
            Ok(0) => Err(self.invalid(field, "quorum must be at least 1")),
            Ok(quorum) => Ok(quorum),
            Err(e) => Err(self.invalid(field, e.to_string())),
        }
    }

    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> BuildError {
        BuildError::InvalidField {
            builder: self.builder,
            field,
            reason: reason.into(),
        }
    }
}

/// One row of the dispatch table: the shape of a command variant.
struct CommandSpec {
    name: &'static str,
    fields: &'static [&'static str],
    assemble: fn(&FieldValues<'_>) -> Result<Command, BuildError>,
}

fn assemble_add_asset_quantity(v: &FieldValues<'_>) -> Result<Command, BuildError> {
    Ok(Command::AddAssetQuantity {
        asset_id: v.text("asset_id")?,
        amount: v.amount("amount")?,
    })
}

fn assemble_transfer_asset(v: &FieldValues<'_>) -> Result<Command, BuildError> {
    Ok(Command::TransferAsset {
        src_account_id: v.account_id("src_account_id")?,
        dest_account_id: v.account_id("dest_account_id")?,
        asset_id: v.text("asset_id")?,
        description: v.text("description")?,
        amount: v.amount("amount")?,
    })
}

fn assemble_create_account(v: &FieldValues<'_>) -> Result<Command, BuildError> {
    Ok(Command::CreateAccount {
        account_name: v.text("account_name")?,
        domain_id: v.text("domain_id")?,
        public_key: v.public_key("public_key")?,
    })
}

fn assemble_set_account_quorum(v: &FieldValues<'_>) -> Result<Command, BuildError> {
    Ok(Command::SetAccountQuorum {
        account_id: v.account_id("account_id")?,
        quorum: v.quorum("quorum")?,
    })
}

fn assemble_add_signatory(v: &FieldValues<'_>) -> Result<Command, BuildError> {
    Ok(Command::AddSignatory {
        account_id: v.account_id("account_id")?,
        public_key: v.public_key("public_key")?,
    })
}

/// Indexed by `CommandKind as usize`.
static COMMAND_SPECS: [CommandSpec; 5] = [
    CommandSpec {
        name: "AddAssetQuantity",
        fields: &["asset_id", "amount"],
        assemble: assemble_add_asset_quantity,
    },
    CommandSpec {
        name: "TransferAsset",
        fields: &[
            "src_account_id",
            "dest_account_id",
            "asset_id",
            "description",
            "amount",
        ],
        assemble: assemble_transfer_asset,
    },
    CommandSpec {
        name: "CreateAccount",
        fields: &["account_name", "domain_id", "public_key"],
        assemble: assemble_create_account,
    },
    CommandSpec {
        name: "SetAccountQuorum",
        fields: &["account_id", "quorum"],
        assemble: assemble_set_account_quorum,
    },
    CommandSpec {
        name: "AddSignatory",
        fields: &["account_id", "public_key"],
        assemble: assemble_add_signatory,
    },
];

/// Builds one [`Command`] variant from string-valued fields. A field set
/// twice is rejected and the first value kept.
///
/// ```
/// use tessera_core::builder::{CommandBuilder, CommandKind};
///
/// let command = CommandBuilder::new(CommandKind::AddAssetQuantity)
///     .set("asset_id", "coin#test")?
///     .set("amount", "20000.0")?
///     .build()?;
/// # Ok::<(), tessera_core::builder::BuildError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    kind: CommandKind,
    fields: FieldSet,
    values: BTreeMap<&'static str, String>,
}

impl CommandBuilder {
    pub fn new(kind: CommandKind) -> Self {
        let spec = kind.spec();
        CommandBuilder {
            kind,
            fields: FieldSet::new(spec.name, spec.fields),
            values: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn set(
        &mut self,
        field: &str,
        value: impl Into<String>,
    ) -> Result<&mut Self, BuildError> {
        let name = self.fields.mark(field)?;
        self.values.insert(name, value.into());
        Ok(self)
    }

    pub fn build(&self) -> Result<Command, BuildError> {
        self.fields.ensure_complete()?;
        let spec = self.kind.spec();
        (spec.assemble)(&FieldValues {
            builder: spec.name,
            values: &self.values,
        })
    }
}
