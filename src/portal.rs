use crate::context::{ConnectionConfig, RequestContext};
use crate::event::AppEvent;
use crate::record::rpc::ProgramRpc;
use crate::record::{EntryId, RecordClient, RecordError, RecordIdentity};
use crate::wallet::{SessionStatus, WalletError, WalletSession};
use std::future::Future;
use std::sync::mpsc;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Drives wallet-session and record operations on the tokio runtime and
/// reports outcomes to the UI over the event channel.
///
/// Every mutation is an awaited two-step sequence: submit, then refetch. The
/// refetch result is authoritative and always replaces UI state; concurrent
/// actions are not queued or deduplicated, the most recent fetch wins.
#[derive(Clone)]
pub struct PortalClient {
    connection: ConnectionConfig,
    identity: RecordIdentity,
    rpc: Arc<dyn ProgramRpc>,
    session: Arc<RwLock<WalletSession>>,
    capability_present: bool,
    tx: mpsc::Sender<AppEvent>,
    runtime_handle: Handle,
}

impl PortalClient {
    pub fn new(
        connection: ConnectionConfig,
        identity: RecordIdentity,
        rpc: Arc<dyn ProgramRpc>,
        session: WalletSession,
        tx: mpsc::Sender<AppEvent>,
        runtime_handle: Handle,
    ) -> Self {
        let capability_present = session.capability_present();
        Self {
            connection,
            identity,
            rpc,
            session: Arc::new(RwLock::new(session)),
            capability_present,
            tx,
            runtime_handle,
        }
    }

    pub fn capability_present(&self) -> bool {
        self.capability_present
    }

    /// Silent session restore, run once at startup. Finding no prior session
    /// is an ordinary outcome; only capability/transport problems surface.
    pub fn start(&self) {
        let portal = self.clone();
        self.runtime_handle.spawn(async move {
            if !portal.capability_present {
                let _ = portal
                    .tx
                    .send(AppEvent::StatusChanged(SessionStatus::Disconnected));
                let _ = portal.tx.send(AppEvent::PortalError(
                    WalletError::CapabilityAbsent.to_string(),
                ));
                return;
            }

            let restored = portal.session.write().await.try_restore().await;
            match restored {
                Ok(Some(address)) => {
                    info!(address = %address, "restored wallet session");
                    let _ = portal.tx.send(AppEvent::WalletConnected(address));
                    portal.refetch().await;
                }
                Ok(None) => {
                    info!("no previously trusted wallet session");
                    let _ = portal
                        .tx
                        .send(AppEvent::StatusChanged(SessionStatus::Disconnected));
                }
                Err(err) => {
                    warn!("session restore failed: {err}");
                    let _ = portal
                        .tx
                        .send(AppEvent::StatusChanged(SessionStatus::Disconnected));
                    let _ = portal.tx.send(AppEvent::PortalError(err.to_string()));
                }
            }
        });
    }

    /// Interactive connect. On approval the session address becomes the
    /// signing identity and the record is fetched once.
    pub fn connect(&self) {
        let portal = self.clone();
        self.runtime_handle.spawn(async move {
            let _ = portal
                .tx
                .send(AppEvent::StatusChanged(SessionStatus::Connecting));
            let result = portal.session.write().await.connect_explicit().await;
            match result {
                Ok(address) => {
                    info!(address = %address, "wallet connected");
                    let _ = portal.tx.send(AppEvent::WalletConnected(address));
                    portal.refetch().await;
                }
                Err(err) => {
                    warn!("wallet connect failed: {err}");
                    let _ = portal
                        .tx
                        .send(AppEvent::StatusChanged(SessionStatus::Disconnected));
                    let _ = portal.tx.send(AppEvent::PortalError(err.to_string()));
                }
            }
        });
    }

    pub fn disconnect(&self) {
        let portal = self.clone();
        self.runtime_handle.spawn(async move {
            portal.session.write().await.disconnect().await;
            info!("wallet disconnected");
            let _ = portal
                .tx
                .send(AppEvent::StatusChanged(SessionStatus::Disconnected));
        });
    }

    pub fn initialize_record(&self) {
        self.spawn_mutation("initialize", |client| async move {
            client.initialize_record().await
        });
    }

    pub fn append_entry(&self, content: String) {
        self.spawn_mutation("append", move |client| async move {
            client.append_entry(&content).await.map(|_| ())
        });
    }

    pub fn vote_entry(&self, id: EntryId) {
        self.spawn_mutation("vote", move |client| async move {
            client.vote_entry(&id).await
        });
    }

    /// Builds a fresh request context for this call; contexts are never
    /// cached across connect/disconnect transitions.
    async fn signed_client(&self) -> Result<RecordClient, WalletError> {
        let session = self.session.read().await;
        let context = RequestContext::derive(&self.connection, &session)?;
        Ok(RecordClient::new(
            context,
            self.identity.clone(),
            Arc::clone(&self.rpc),
        ))
    }

    async fn refetch(&self) {
        let client = match self.signed_client().await {
            Ok(client) => client,
            Err(err) => {
                let _ = self.tx.send(AppEvent::PortalError(err.to_string()));
                return;
            }
        };
        match client.fetch_record().await {
            Ok(state) => {
                let _ = self.tx.send(AppEvent::RecordFetched(state));
            }
            Err(err) => {
                warn!("record fetch failed: {err}");
                let _ = self.tx.send(AppEvent::RecordUnavailable(err.to_string()));
            }
        }
    }

    fn spawn_mutation<F, Fut>(&self, operation: &'static str, run: F)
    where
        F: FnOnce(RecordClient) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), RecordError>> + Send + 'static,
    {
        let portal = self.clone();
        self.runtime_handle.spawn(async move {
            let client = match portal.signed_client().await {
                Ok(client) => client,
                Err(err) => {
                    let _ = portal
                        .tx
                        .send(AppEvent::PortalError(format!("{operation} failed: {err}")));
                    return;
                }
            };

            match run(client).await {
                // Mutate, then resynchronize; two awaited steps so the
                // refetch can never race ahead of its own mutation.
                Ok(()) => portal.refetch().await,
                Err(err) => {
                    warn!("{operation} failed: {err}");
                    let resync = matches!(
                        err,
                        RecordError::AlreadyInitialized | RecordError::NotFound(_)
                    );
                    let _ = portal
                        .tx
                        .send(AppEvent::PortalError(format!("{operation} failed: {err}")));
                    // Remote-signaled conditions mean our view is stale.
                    if resync {
                        portal.refetch().await;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Commitment;
    use crate::record::sim::SimProgram;
    use crate::record::RecordState;
    use crate::wallet::tests::MockWallet;
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    fn next_event(rx: &Receiver<AppEvent>) -> AppEvent {
        rx.recv_timeout(Duration::from_secs(5))
            .expect("event should arrive")
    }

    fn assert_no_event(rx: &Receiver<AppEvent>) {
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    fn portal_over(
        wallet: Option<MockWallet>,
    ) -> (PortalClient, Receiver<AppEvent>, Arc<SimProgram>) {
        let (tx, rx) = mpsc::channel();
        let sim = Arc::new(SimProgram::new());
        let session = WalletSession::detect(
            wallet.map(|w| Arc::new(w) as Arc<dyn crate::wallet::WalletCapability>),
        );
        let portal = PortalClient::new(
            ConnectionConfig {
                cluster_url: "http://127.0.0.1:8899".to_string(),
                commitment: Commitment::Processed,
            },
            RecordIdentity {
                program_id: "GifPrtL1111111111111111111111111111111111111".to_string(),
                record_address: "GifRec11111111111111111111111111111111111111".to_string(),
            },
            Arc::clone(&sim) as Arc<dyn ProgramRpc>,
            session,
            tx,
            Handle::current(),
        );
        (portal, rx, sim)
    }

    fn fetched_entries(event: AppEvent) -> Vec<crate::record::Entry> {
        match event {
            AppEvent::RecordFetched(RecordState::Present { entries }) => entries,
            other => panic!("expected a populated record fetch, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fresh_session_walkthrough_from_connect_to_first_vote() {
        let (portal, rx, _sim) = portal_over(Some(MockWallet::new("Addr1")));

        // No prior trust: silent restore finds nothing.
        portal.start();
        assert!(matches!(
            next_event(&rx),
            AppEvent::StatusChanged(SessionStatus::Disconnected)
        ));

        portal.connect();
        assert!(matches!(
            next_event(&rx),
            AppEvent::StatusChanged(SessionStatus::Connecting)
        ));
        match next_event(&rx) {
            AppEvent::WalletConnected(address) => assert_eq!(address.as_str(), "Addr1"),
            other => panic!("expected connect, got {other:?}"),
        }
        match next_event(&rx) {
            AppEvent::RecordFetched(state) => assert!(state.is_absent()),
            other => panic!("expected absent record, got {other:?}"),
        }

        portal.initialize_record();
        assert!(fetched_entries(next_event(&rx)).is_empty());

        portal.append_entry("http://x/a.gif".to_string());
        let entries = fetched_entries(next_event(&rx));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "http://x/a.gif");
        assert_eq!(entries[0].vote_count, 0);
        let id = entries[0].id.clone();

        portal.vote_entry(id);
        let entries = fetched_entries(next_event(&rx));
        assert_eq!(entries[0].vote_count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn previously_trusted_session_restores_silently_and_fetches_once() {
        let (portal, rx, sim) = portal_over(Some(MockWallet::new("Addr2").trusted()));

        portal.start();
        match next_event(&rx) {
            AppEvent::WalletConnected(address) => assert_eq!(address.as_str(), "Addr2"),
            other => panic!("expected silent restore, got {other:?}"),
        }
        assert!(matches!(
            next_event(&rx),
            AppEvent::RecordFetched(RecordState::Absent)
        ));
        assert_no_event(&rx);
        assert_eq!(sim.call_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_capability_reports_and_stays_disconnected() {
        let (portal, rx, sim) = portal_over(None);

        portal.start();
        assert!(matches!(
            next_event(&rx),
            AppEvent::StatusChanged(SessionStatus::Disconnected)
        ));
        assert!(matches!(next_event(&rx), AppEvent::PortalError(_)));
        assert_eq!(sim.call_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn declined_connect_returns_to_disconnected() {
        let (portal, rx, _sim) = portal_over(Some(MockWallet::new("Addr1").rejecting()));

        portal.connect();
        assert!(matches!(
            next_event(&rx),
            AppEvent::StatusChanged(SessionStatus::Connecting)
        ));
        assert!(matches!(
            next_event(&rx),
            AppEvent::StatusChanged(SessionStatus::Disconnected)
        ));
        match next_event(&rx) {
            AppEvent::PortalError(message) => assert!(message.contains("declined")),
            other => panic!("expected a surfaced rejection, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transport_failure_on_mutation_surfaces_without_a_refetch() {
        let (portal, rx, sim) = portal_over(Some(MockWallet::new("Addr1")));

        portal.connect();
        next_event(&rx); // connecting
        next_event(&rx); // connected
        next_event(&rx); // initial fetch (absent)
        portal.initialize_record();
        next_event(&rx); // refetch after init

        sim.fail_transport
            .store(true, std::sync::atomic::Ordering::SeqCst);
        portal.append_entry("http://x/a.gif".to_string());
        assert!(matches!(next_event(&rx), AppEvent::PortalError(_)));
        assert_no_event(&rx);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn already_initialized_surfaces_and_resynchronizes() {
        let (portal, rx, _sim) = portal_over(Some(MockWallet::new("Addr1")));

        portal.connect();
        next_event(&rx); // connecting
        next_event(&rx); // connected
        next_event(&rx); // initial fetch
        portal.initialize_record();
        next_event(&rx); // refetch after init

        portal.initialize_record();
        match next_event(&rx) {
            AppEvent::PortalError(message) => assert!(message.contains("already initialized")),
            other => panic!("expected already-initialized, got {other:?}"),
        }
        assert!(fetched_entries(next_event(&rx)).is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disconnect_clears_the_session() {
        let (portal, rx, _sim) = portal_over(Some(MockWallet::new("Addr1")));

        portal.connect();
        next_event(&rx); // connecting
        next_event(&rx); // connected
        next_event(&rx); // initial fetch

        portal.disconnect();
        assert!(matches!(
            next_event(&rx),
            AppEvent::StatusChanged(SessionStatus::Disconnected)
        ));

        // Signing operations now fail fast; no request reaches the program.
        portal.append_entry("http://x/a.gif".to_string());
        match next_event(&rx) {
            AppEvent::PortalError(message) => assert!(message.contains("not connected")),
            other => panic!("expected fail-fast, got {other:?}"),
        }
    }
}
