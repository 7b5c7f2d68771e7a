use crate::wallet::{Address, WalletError, WalletSession};
use std::fmt;
use std::str::FromStr;

/// Durability level requested when reading or writing remote state.
/// `Processed` is the default: the fastest, least durable acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Commitment {
    #[default]
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(format!("unknown commitment level: {other}")),
        }
    }
}

/// Static description of the target network endpoint.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub cluster_url: String,
    pub commitment: Commitment,
}

/// Endpoint + commitment + the signing identity of the current session,
/// bundled for RecordClient calls.
///
/// The signer is immutable once derived; callers must derive a fresh context
/// after every connect/disconnect transition rather than cache one across
/// sessions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub endpoint: String,
    pub commitment: Commitment,
    pub signer: Address,
}

impl RequestContext {
    /// Fails fast when there is nothing to sign with: no capability, or a
    /// session that never connected.
    pub fn derive(
        connection: &ConnectionConfig,
        session: &WalletSession,
    ) -> Result<Self, WalletError> {
        if !session.capability_present() {
            return Err(WalletError::CapabilityAbsent);
        }
        let signer = session.address().ok_or(WalletError::NotConnected)?.clone();
        Ok(Self {
            endpoint: connection.cluster_url.clone(),
            commitment: connection.commitment,
            signer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::tests::MockWallet;
    use crate::wallet::WalletSession;
    use std::sync::Arc;

    fn devnet() -> ConnectionConfig {
        ConnectionConfig {
            cluster_url: "http://127.0.0.1:8899".to_string(),
            commitment: Commitment::default(),
        }
    }

    #[test]
    fn commitment_parses_the_fixed_set() {
        assert_eq!("processed".parse::<Commitment>().unwrap(), Commitment::Processed);
        assert_eq!("confirmed".parse::<Commitment>().unwrap(), Commitment::Confirmed);
        assert_eq!("finalized".parse::<Commitment>().unwrap(), Commitment::Finalized);
        assert!("durable".parse::<Commitment>().is_err());
        assert_eq!(Commitment::default(), Commitment::Processed);
    }

    #[test]
    fn derive_without_capability_fails() {
        let session = WalletSession::detect(None);
        let err = RequestContext::derive(&devnet(), &session).expect_err("nothing to sign with");
        assert!(matches!(err, WalletError::CapabilityAbsent));
    }

    #[tokio::test]
    async fn derive_requires_a_connected_session() {
        let mut session = WalletSession::detect(Some(Arc::new(MockWallet::new("Addr1"))));
        let err = RequestContext::derive(&devnet(), &session).expect_err("not connected yet");
        assert!(matches!(err, WalletError::NotConnected));

        session.connect_explicit().await.expect("approve");
        let context = RequestContext::derive(&devnet(), &session).expect("connected");
        assert_eq!(context.signer.as_str(), "Addr1");
        assert_eq!(context.commitment, Commitment::Processed);
    }
}
