use std::path::Path;

use anyhow::{anyhow, Result};
use tessera_core::builder::{CommandBuilder, CommandKind, TransactionBuilder};
use tessera_core::{now_millis, KeyPair, SecretKey, Transaction};
use tracing::info;

fn command_kind(name: &str) -> Result<CommandKind> {
    CommandKind::ALL
        .into_iter()
        .find(|kind| kind.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            let known: Vec<_> = CommandKind::ALL.iter().map(|k| k.name()).collect();
            anyhow!("unknown command '{}', expected one of {}", name, known.join(", "))
        })
}

/// Build and sign a single-command transaction.
pub fn build_transaction(
    creator: &str,
    quorum: u32,
    command: &str,
    fields: &[String],
    secrets: &[String],
) -> Result<Transaction> {
    let mut builder = CommandBuilder::new(command_kind(command)?);
    for field in fields {
        let (name, value) = field
            .split_once('=')
            .ok_or_else(|| anyhow!("field '{}' is not NAME=VALUE", field))?;
        builder.set(name, value)?;
    }

    let mut tx = TransactionBuilder::new()
        .creator_account_id(creator)?
        .created_time(now_millis())?
        .quorum(quorum)?
        .commands(vec![builder.build()?])?
        .build()?;

    for secret in secrets {
        let keypair = KeyPair::from_secret(SecretKey::from_hex(secret)?);
        tx = tx.sign(&keypair)?;
    }
    Ok(tx)
}

pub fn handle_txgen(
    creator: &str,
    quorum: u32,
    command: &str,
    fields: &[String],
    secrets: &[String],
    out: &Path,
) -> Result<()> {
    let tx = build_transaction(creator, quorum, command, fields, secrets)?;
    let fingerprint = tx.fingerprint()?;
    std::fs::write(out, serde_json::to_string_pretty(&tx)?)?;

    info!("Transaction {} written to {:?}", fingerprint, out);
    println!("Fingerprint: {}", fingerprint.to_hex());
    println!(
        "Signatures:  {}/{}",
        tx.signatures.len(),
        tx.quorum()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_signed_transfer() {
        let keypair = KeyPair::generate();
        let tx = build_transaction(
            "alice@test",
            1,
            "transferasset",
            &[
                "src_account_id=alice@test".to_string(),
                "dest_account_id=bob@test".to_string(),
                "asset_id=coin#test".to_string(),
                "description=rent".to_string(),
                "amount=10.5".to_string(),
            ],
            &[keypair.secret.to_hex()],
        )
        .unwrap();

        assert!(tx.is_fully_signed().unwrap());
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(build_transaction("alice@test", 1, "Mint", &[], &[]).is_err());
    }

    #[test]
    fn test_malformed_field_rejected() {
        let result = build_transaction(
            "alice@test",
            1,
            "AddAssetQuantity",
            &["asset_id".to_string()],
            &[],
        );
        assert!(result.is_err());
    }
}
