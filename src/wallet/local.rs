use crate::wallet::{Address, ConnectOpts, WalletCapability, WalletError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// File-backed wallet capability. Stands in for a browser-injected provider:
/// the wallet directory is the "installed extension", the trust marker is the
/// per-origin approval a real provider would remember.
///
/// Layout under the wallet directory:
///   identity.json   public identity (created on first approved connect)
///   trusted         marker enabling silent restore on later launches
pub struct LocalKeyWallet {
    dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredIdentity {
    address: Address,
}

impl LocalKeyWallet {
    /// The capability is present only if the user provisioned the wallet
    /// directory. Detection is a pure read, done once at startup.
    pub fn discover(dir: &Path) -> Option<Self> {
        if dir.is_dir() {
            Some(Self {
                dir: dir.to_path_buf(),
            })
        } else {
            None
        }
    }

    fn identity_path(&self) -> PathBuf {
        self.dir.join("identity.json")
    }

    fn trust_marker_path(&self) -> PathBuf {
        self.dir.join("trusted")
    }

    fn trusted(&self) -> bool {
        self.trust_marker_path().exists()
    }

    fn read_identity(&self) -> Result<Option<Address>, WalletError> {
        let path = self.identity_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)
            .map_err(|err| WalletError::Transport(format!("failed to read {}: {err}", path.display())))?;
        let stored: StoredIdentity = serde_json::from_slice(&data)
            .map_err(|err| WalletError::Transport(format!("failed to parse {}: {err}", path.display())))?;
        Ok(Some(stored.address))
    }

    fn create_identity(&self) -> Result<Address, WalletError> {
        let address = generate_address();
        let stored = StoredIdentity {
            address: address.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&stored)
            .map_err(|err| WalletError::Transport(format!("failed to encode identity: {err}")))?;
        write_atomic(&self.identity_path(), &bytes)
            .map_err(|err| WalletError::Transport(format!("failed to persist identity: {err}")))?;
        Ok(address)
    }

    fn remember_trust(&self) -> Result<(), WalletError> {
        write_atomic(&self.trust_marker_path(), b"trusted\n")
            .map_err(|err| WalletError::Transport(format!("failed to persist trust marker: {err}")))
    }
}

#[async_trait]
impl WalletCapability for LocalKeyWallet {
    fn is_recognized_provider(&self) -> bool {
        true
    }

    async fn connect(&self, opts: ConnectOpts) -> Result<Address, WalletError> {
        if opts.only_if_trusted {
            if !self.trusted() {
                return Err(WalletError::NotTrusted);
            }
            return match self.read_identity()? {
                Some(address) => Ok(address),
                // Trust marker without an identity is a half-provisioned
                // wallet; treat it as nothing to restore.
                None => Err(WalletError::NotTrusted),
            };
        }

        let address = match self.read_identity()? {
            Some(address) => address,
            None => self.create_identity()?,
        };
        self.remember_trust()?;
        Ok(address)
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        // Trust survives a disconnect, as it does for a browser provider.
        Ok(())
    }
}

fn generate_address() -> Address {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    let mut hasher = DefaultHasher::new();
    nanos.hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    let head = hasher.finish();
    head.hash(&mut hasher);
    let tail = hasher.finish();
    Address::new(format!("Gp{head:016x}{tail:016x}"))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes)?;
    match fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if path.exists() {
                fs::remove_file(path)?;
                fs::rename(&tmp_path, path)?;
                Ok(())
            } else {
                Err(rename_err)
            }
        }
    }
}
