use crate::context::{Commitment, ConnectionConfig};
use crate::record::RecordIdentity;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

const DEFAULT_CLUSTER_URL: &str = "http://127.0.0.1:8899";
const DEFAULT_PROGRAM_ID: &str = "GifPrtL1111111111111111111111111111111111111";
const DEFAULT_RECORD_ADDRESS: &str = "GifRec11111111111111111111111111111111111111";

/// Application configuration, read once at startup. The record identity is
/// pre-provisioned opaque text; this layer never parses it.
pub struct Config {
    pub cluster_url: String,
    pub commitment: Commitment,
    pub program_id: String,
    pub record_address: String,
    pub wallet_dir: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self {
            cluster_url: load_or_default("GIFPORT_CLUSTER_URL", DEFAULT_CLUSTER_URL),
            commitment: load_commitment("GIFPORT_COMMITMENT"),
            program_id: load_or_default("GIFPORT_PROGRAM_ID", DEFAULT_PROGRAM_ID),
            record_address: load_or_default("GIFPORT_RECORD_ADDRESS", DEFAULT_RECORD_ADDRESS),
            wallet_dir: default_wallet_dir("GIFPORT_WALLET_DIR"),
        }
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            cluster_url: self.cluster_url.clone(),
            commitment: self.commitment,
        }
    }

    pub fn record_identity(&self) -> RecordIdentity {
        RecordIdentity {
            program_id: self.program_id.clone(),
            record_address: self.record_address.clone(),
        }
    }
}

fn load_or_default(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            info!("{key} not set, using default: {default}");
            default.to_string()
        }
    }
}

fn load_commitment(key: &str) -> Commitment {
    match env::var(key) {
        Ok(value) => match value.parse() {
            Ok(commitment) => commitment,
            Err(err) => {
                warn!("invalid {key} value ({err}), falling back to processed");
                Commitment::default()
            }
        },
        Err(_) => {
            info!("{key} not set, using default: processed");
            Commitment::default()
        }
    }
}

fn default_wallet_dir(key: &str) -> PathBuf {
    if let Some(dir) = env::var_os(key) {
        return PathBuf::from(dir);
    }
    home_dir().join(".gifport").join("wallet")
}

fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}
