use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod local;

/// Public address of the current signing identity. Treated as opaque text;
/// this layer never parses or derives key material from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for status displays, e.g. `GpAb12..f9Xz`.
    pub fn abbreviated(&self) -> String {
        if self.0.len() <= 10 {
            return self.0.clone();
        }
        format!("{}..{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no wallet capability present in this environment")]
    CapabilityAbsent,

    #[error("wallet session is not connected")]
    NotConnected,

    #[error("connect request declined by the user")]
    UserRejected,

    #[error("this origin has not previously been trusted")]
    NotTrusted,

    #[error("wallet transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectOpts {
    /// Silent probe: succeed only if the user previously approved this
    /// origin, never prompt.
    pub only_if_trusted: bool,
}

/// Session lifecycle as observed by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unknown,
    Disconnected,
    Connecting,
    Connected,
}

/// External signing capability, the desktop analog of a browser-injected
/// wallet provider. Implementations hold the key material; this crate only
/// ever sees the public address.
#[async_trait]
pub trait WalletCapability: Send + Sync {
    /// Providers that do not identify themselves are ignored by detection.
    fn is_recognized_provider(&self) -> bool;

    async fn connect(&self, opts: ConnectOpts) -> Result<Address, WalletError>;

    async fn disconnect(&self) -> Result<(), WalletError>;
}

/// Tracks the presence of a wallet capability and the current connection.
///
/// `capability_present` is decided once at construction and never changes for
/// the lifetime of the session; `connected == true` implies an address is
/// held.
pub struct WalletSession {
    capability: Option<Arc<dyn WalletCapability>>,
    address: Option<Address>,
}

impl WalletSession {
    /// Detects whether a usable capability was provided. Unrecognized
    /// providers are discarded here, not at call time.
    pub fn detect(capability: Option<Arc<dyn WalletCapability>>) -> Self {
        let capability = capability.filter(|c| c.is_recognized_provider());
        Self {
            capability,
            address: None,
        }
    }

    pub fn capability_present(&self) -> bool {
        self.capability.is_some()
    }

    pub fn connected(&self) -> bool {
        self.address.is_some()
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// Silent reconnect, run once per launch. `Ok(None)` means "no prior
    /// session" and is an expected outcome, not a failure.
    pub async fn try_restore(&mut self) -> Result<Option<Address>, WalletError> {
        let capability = self.capability.as_ref().ok_or(WalletError::CapabilityAbsent)?;
        match capability
            .connect(ConnectOpts {
                only_if_trusted: true,
            })
            .await
        {
            Ok(address) => {
                self.address = Some(address.clone());
                Ok(Some(address))
            }
            Err(WalletError::NotTrusted) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Interactive connect; prompts the user through the capability.
    pub async fn connect_explicit(&mut self) -> Result<Address, WalletError> {
        let capability = self.capability.as_ref().ok_or(WalletError::CapabilityAbsent)?;
        let address = capability.connect(ConnectOpts::default()).await?;
        self.address = Some(address.clone());
        Ok(address)
    }

    /// Clears the local session identity. Idempotent; a failed capability
    /// disconnect still drops the local address.
    pub async fn disconnect(&mut self) {
        if let Some(capability) = self.capability.as_ref() {
            if let Err(err) = capability.disconnect().await {
                tracing::warn!("wallet disconnect reported: {err}");
            }
        }
        self.address = None;
    }
}
