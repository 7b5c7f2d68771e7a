use crate::record::RecordState;
use crate::wallet::{Address, SessionStatus};

/// Events delivered from async portal tasks to the UI thread.
#[derive(Debug, Clone)]
pub enum AppEvent {
    StatusChanged(SessionStatus),
    WalletConnected(Address),
    /// Authoritative record snapshot; always replaces whatever the UI holds.
    RecordFetched(RecordState),
    /// Fetch or decode failed: current record state is unknown.
    RecordUnavailable(String),
    /// A wallet or mutation operation failed; the state machine stays put.
    PortalError(String),
}
