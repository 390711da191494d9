use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tessera - a BFT ledger node
#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Tessera node and utilities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a Tessera node
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Initialize a new node configuration
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Generate a new keypair
    Keygen {
        /// Output file for secret key
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show node status
    Status {
        /// RPC endpoint
        #[arg(short, long, default_value = "http://127.0.0.1:8080")]
        endpoint: String,
    },

    /// Submit a transaction
    Tx {
        /// RPC endpoint
        #[arg(short, long, default_value = "http://127.0.0.1:8080")]
        endpoint: String,

        /// Transaction JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Build a transaction with a single command and sign it
    Txgen {
        /// Creator account (name@domain)
        #[arg(long)]
        creator: String,

        /// Signatures required before the transaction can be ordered
        #[arg(long, default_value = "1")]
        quorum: u32,

        /// Command name, e.g. TransferAsset
        #[arg(long)]
        command: String,

        /// Command field as name=value, repeatable
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,

        /// Signer secret key hex, repeatable
        #[arg(long = "secret")]
        secrets: Vec<String>,

        /// Output file (JSON)
        #[arg(short, long)]
        out: PathBuf,
    },
}
