use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tessera_consensus::ProbeConfig;
use tessera_core::{KeyPair, Peer, PublicKey, SecretKey};
use tessera_mst::MstConfig;
use tessera_ordering::OrderingConfig;

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node data directory
    pub data_dir: PathBuf,

    /// Keep committed blocks in `data_dir` across restarts
    pub persist_blocks: bool,

    /// RPC bind address
    pub rpc_addr: SocketAddr,

    /// Enable WebSocket
    pub enable_ws: bool,

    /// Node secret key (hex)
    pub node_key: Option<String>,

    /// Ordered validator public keys (hex); proposers rotate through it
    pub validators: Vec<String>,

    /// Peers to register at startup
    pub peers: Vec<PeerConfig>,

    /// MST entry lifetime without new signatures, in milliseconds
    pub mst_ttl_ms: u64,

    /// MST expiry check period in milliseconds
    pub mst_purge_interval_ms: u64,

    /// Transactions per batch
    pub max_batch_size: usize,

    /// Longest wait between batches in milliseconds
    pub flush_interval_ms: u64,

    /// Ordering queue length that triggers a backlog warning
    pub queue_warn_threshold: usize,

    /// Bound on a single verify request in milliseconds
    pub verify_timeout_ms: u64,

    /// Bound on a single gossip delivery in milliseconds
    pub gossip_timeout_ms: u64,

    /// Liveness probes before a peer is given up
    pub probe_attempts: u32,

    /// Pause between failed probes in milliseconds
    pub probe_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub pubkey: String,
    pub address: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let mst = MstConfig::default();
        let ordering = OrderingConfig::default();
        let probe = ProbeConfig::default();
        NodeConfig {
            data_dir: PathBuf::from("./tessera-data"),
            persist_blocks: true,
            rpc_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_ws: true,
            node_key: None,
            validators: Vec::new(),
            peers: Vec::new(),
            mst_ttl_ms: mst.ttl.as_millis() as u64,
            mst_purge_interval_ms: mst.purge_interval.as_millis() as u64,
            max_batch_size: ordering.max_batch_size,
            flush_interval_ms: ordering.flush_interval.as_millis() as u64,
            queue_warn_threshold: ordering.queue_warn_threshold,
            verify_timeout_ms: 2_000,
            gossip_timeout_ms: 2_000,
            probe_attempts: probe.attempts,
            probe_backoff_ms: probe.backoff.as_millis() as u64,
        }
    }
}

impl NodeConfig {
    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn keypair(&self) -> Result<KeyPair> {
        let hex = self
            .node_key
            .as_deref()
            .ok_or_else(|| anyhow!("node_key is not set"))?;
        Ok(KeyPair::from_secret(SecretKey::from_hex(hex)?))
    }

    pub fn validator_keys(&self) -> Result<Vec<PublicKey>> {
        self.validators
            .iter()
            .map(|s| PublicKey::from_hex(s).map_err(|e| anyhow!("validator {}: {}", s, e)))
            .collect()
    }

    pub fn peer_list(&self) -> Result<Vec<Peer>> {
        self.peers
            .iter()
            .map(|peer| {
                let key = PublicKey::from_hex(&peer.pubkey)
                    .map_err(|e| anyhow!("peer {}: {}", peer.address, e))?;
                Ok(Peer::new(peer.address.clone(), key))
            })
            .collect()
    }

    pub fn mst_config(&self) -> MstConfig {
        MstConfig {
            ttl: Duration::from_millis(self.mst_ttl_ms),
            purge_interval: Duration::from_millis(self.mst_purge_interval_ms),
            ..MstConfig::default()
        }
    }

    pub fn ordering_config(&self) -> OrderingConfig {
        OrderingConfig {
            max_batch_size: self.max_batch_size,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            queue_warn_threshold: self.queue_warn_threshold,
            ..OrderingConfig::default()
        }
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            attempts: self.probe_attempts,
            backoff: Duration::from_millis(self.probe_backoff_ms),
            timeout: Duration::from_millis(self.gossip_timeout_ms),
        }
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn gossip_timeout(&self) -> Duration {
        Duration::from_millis(self.gossip_timeout_ms)
    }
}

/// Generate a single-validator configuration with a fresh key
pub fn generate_sample_config() -> NodeConfig {
    let keypair = KeyPair::generate();

    NodeConfig {
        node_key: Some(keypair.secret.to_hex()),
        validators: vec![keypair.public.to_hex()],
        ..NodeConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert!(config.node_key.is_none());
        assert!(config.keypair().is_err());
        assert_eq!(config.max_batch_size, 100);
    }

    #[test]
    fn test_sample_config() {
        let config = generate_sample_config();
        let keypair = config.keypair().unwrap();
        assert_eq!(config.validator_keys().unwrap(), vec![keypair.public]);
        assert!(config.peer_list().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = generate_sample_config();
        config.peers.push(PeerConfig {
            pubkey: KeyPair::generate().public.to_hex(),
            address: "127.0.0.1:9001".to_string(),
        });
        config.save(&path).unwrap();

        let loaded = NodeConfig::load(&path).unwrap();
        assert_eq!(loaded.node_key, config.node_key);
        assert_eq!(loaded.peer_list().unwrap().len(), 1);
        assert_eq!(loaded.ordering_config().max_batch_size, config.max_batch_size);
    }

    #[test]
    fn test_bad_validator_key_rejected() {
        let mut config = generate_sample_config();
        config.validators.push("not-hex".to_string());
        assert!(config.validator_keys().is_err());
    }
}
