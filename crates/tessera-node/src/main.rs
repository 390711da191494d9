use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tessera_node::{generate_sample_config, Node, NodeConfig};
use tessera_rpc::{StatusResponse, SubmitResponse};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;
mod txgen;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_node(config).await?;
        }
        Commands::Init { output } => {
            init_config(output)?;
        }
        Commands::Keygen { output } => {
            generate_keypair(output)?;
        }
        Commands::Status { endpoint } => {
            show_status(&endpoint).await?;
        }
        Commands::Tx { endpoint, file } => {
            submit_transaction(&endpoint, file).await?;
        }
        Commands::Txgen {
            creator,
            quorum,
            command,
            fields,
            secrets,
            out,
        } => {
            txgen::handle_txgen(&creator, quorum, &command, &fields, &secrets, &out)?;
        }
    }

    Ok(())
}

/// Run a Tessera node
async fn run_node(config_path: PathBuf) -> Result<()> {
    info!("Loading configuration from {:?}", config_path);

    let config = if config_path.exists() {
        NodeConfig::load(&config_path)?
    } else {
        error!(
            "Configuration file not found: {:?}. Run 'tessera init' to create one.",
            config_path
        );
        return Err(anyhow::anyhow!("Configuration file not found"));
    };

    let node = Node::new(config)?;
    node.run().await?;

    Ok(())
}

/// Initialize a new configuration file
fn init_config(output: PathBuf) -> Result<()> {
    info!("Generating sample configuration");

    let config = generate_sample_config();
    config.save(&output)?;

    info!("Configuration saved to {:?}", output);
    if let Some(key) = config.validators.first() {
        info!("Validator public key: {}", key);
    }

    println!("\nConfiguration file created: {}", output.display());
    println!("Add peers and validators to join a network.");
    println!("\nTo start the node, run:");
    println!("  tessera run --config {}", output.display());

    Ok(())
}

/// Generate a new keypair
fn generate_keypair(output: Option<PathBuf>) -> Result<()> {
    let keypair = tessera_core::KeyPair::generate();

    println!("public_key: {}", keypair.public.to_hex());
    match output {
        Some(path) => {
            std::fs::write(&path, keypair.secret.to_hex())?;
            info!("Secret key written to {:?}", path);
        }
        None => println!("secret_key: {}", keypair.secret.to_hex()),
    }

    Ok(())
}

/// Show node status
async fn show_status(endpoint: &str) -> Result<()> {
    let url = format!("{}/status", endpoint.trim_end_matches('/'));
    let response = reqwest::get(&url).await?;

    if !response.status().is_success() {
        error!("Failed to get status: {}", response.status());
        return Ok(());
    }

    let status: StatusResponse = response.json().await?;
    println!("Node:        {}", status.public_key);
    println!("Height:      {}", status.height);
    println!(
        "Top block:   {}",
        status.top_hash.as_deref().unwrap_or("-")
    );
    println!("Round:       {}", status.round);
    println!("Peers:       {}", status.peers);
    println!("Pending MST: {}", status.pending_mst);
    println!("Queued:      {}", status.queue_len);

    Ok(())
}

/// Submit a transaction read from a JSON file
async fn submit_transaction(endpoint: &str, file: PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(&file)?;
    let tx: tessera_core::Transaction = serde_json::from_str(&content)?;

    let url = format!("{}/tx", endpoint.trim_end_matches('/'));
    let response = reqwest::Client::new().post(&url).json(&tx).send().await?;

    if response.status().is_success() {
        let result: SubmitResponse = response.json().await?;
        println!("{} {:?}", result.fingerprint, result.status);
        for reason in result.rejected {
            println!("  rejected signature: {}", reason);
        }
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("Failed to submit transaction ({}): {}", status, body);
    }

    Ok(())
}
