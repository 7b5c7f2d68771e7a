use crate::context::RequestContext;
use crate::wallet::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod rpc;

use rpc::ProgramRpc;

/// Identifier assigned by the remote program, never client-side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One user-submitted item within the shared record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: EntryId,
    pub content: String,
    pub author: Address,
    pub vote_count: u64,
}

/// The remote record's list-valued state. `Absent` means the record was
/// never created and is distinct from an empty entry list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    Absent,
    Present { entries: Vec<Entry> },
}

impl RecordState {
    pub fn is_absent(&self) -> bool {
        matches!(self, RecordState::Absent)
    }

    pub fn entries(&self) -> Option<&[Entry]> {
        match self {
            RecordState::Absent => None,
            RecordState::Present { entries } => Some(entries),
        }
    }
}

/// Fixed identity of the shared record and the program serving it. Opaque
/// configuration; never parsed by this layer.
#[derive(Debug, Clone)]
pub struct RecordIdentity {
    pub program_id: String,
    pub record_address: String,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record already initialized")]
    AlreadyInitialized,

    #[error("entry not found: {0}")]
    NotFound(EntryId),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("failed to decode record state: {0}")]
    Decode(String),
}

/// Typed façade over the remote program; the only component in the crate
/// that performs remote calls. Stateless between calls.
pub struct RecordClient {
    context: RequestContext,
    identity: RecordIdentity,
    rpc: Arc<dyn ProgramRpc>,
}

impl RecordClient {
    pub fn new(context: RequestContext, identity: RecordIdentity, rpc: Arc<dyn ProgramRpc>) -> Self {
        Self {
            context,
            identity,
            rpc,
        }
    }

    /// Read-only query for the fixed record. A missing record resolves to
    /// `RecordState::Absent`; only transport and decode problems are errors.
    pub async fn fetch_record(&self) -> Result<RecordState, RecordError> {
        self.rpc.fetch(&self.context, &self.identity).await
    }

    /// One-time creation of the record, funded and authorized by the current
    /// session's address. The remote program signals `AlreadyInitialized`
    /// when the record exists; nothing is detected locally.
    pub async fn initialize_record(&self) -> Result<(), RecordError> {
        self.rpc
            .initialize(&self.context, &self.identity, &self.context.signer)
            .await
    }

    /// Appends an entry authored by the current session. The id comes back
    /// from the remote program.
    pub async fn append_entry(&self, content: &str) -> Result<EntryId, RecordError> {
        if content.trim().is_empty() {
            return Err(RecordError::InvalidInput("entry content must not be empty"));
        }
        self.rpc
            .append(&self.context, &self.identity, content, &self.context.signer)
            .await
    }

    /// Increments the vote count of one entry by exactly one.
    pub async fn vote_entry(&self, id: &EntryId) -> Result<(), RecordError> {
        self.rpc.vote(&self.context, &self.identity, id).await
    }
}

#[cfg(test)]
pub(crate) mod sim {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory stand-in for the deployed program, honoring its observable
    /// semantics: one record, remote-assigned ids, remote-signaled
    /// conditions.
    pub(crate) struct SimProgram {
        state: Mutex<SimState>,
        pub fail_transport: AtomicBool,
        pub remote_calls: AtomicUsize,
    }

    #[derive(Default)]
    struct SimState {
        initialized: bool,
        next_id: u64,
        entries: Vec<Entry>,
    }

    impl SimProgram {
        pub fn new() -> Self {
            Self {
                state: Mutex::new(SimState::default()),
                fail_transport: AtomicBool::new(false),
                remote_calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.remote_calls.load(Ordering::SeqCst)
        }

        fn record_call(&self) -> Result<(), RecordError> {
            self.remote_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_transport.load(Ordering::SeqCst) {
                return Err(RecordError::Transport("simulated network failure".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ProgramRpc for SimProgram {
        async fn fetch(
            &self,
            _context: &RequestContext,
            _identity: &RecordIdentity,
        ) -> Result<RecordState, RecordError> {
            self.record_call()?;
            let state = self.state.lock().expect("sim state poisoned");
            if !state.initialized {
                return Ok(RecordState::Absent);
            }
            Ok(RecordState::Present {
                entries: state.entries.clone(),
            })
        }

        async fn initialize(
            &self,
            _context: &RequestContext,
            _identity: &RecordIdentity,
            _authority: &Address,
        ) -> Result<(), RecordError> {
            self.record_call()?;
            let mut state = self.state.lock().expect("sim state poisoned");
            if state.initialized {
                return Err(RecordError::AlreadyInitialized);
            }
            state.initialized = true;
            Ok(())
        }

        async fn append(
            &self,
            _context: &RequestContext,
            _identity: &RecordIdentity,
            content: &str,
            author: &Address,
        ) -> Result<EntryId, RecordError> {
            self.record_call()?;
            let mut state = self.state.lock().expect("sim state poisoned");
            if !state.initialized {
                return Err(RecordError::Transport("record does not exist".to_string()));
            }
            let id = EntryId::new(format!("entry-{}", state.next_id));
            state.next_id += 1;
            state.entries.push(Entry {
                id: id.clone(),
                content: content.to_string(),
                author: author.clone(),
                vote_count: 0,
            });
            Ok(id)
        }

        async fn vote(
            &self,
            _context: &RequestContext,
            _identity: &RecordIdentity,
            id: &EntryId,
        ) -> Result<(), RecordError> {
            self.record_call()?;
            let mut state = self.state.lock().expect("sim state poisoned");
            match state.entries.iter_mut().find(|entry| &entry.id == id) {
                Some(entry) => {
                    entry.vote_count += 1;
                    Ok(())
                }
                None => Err(RecordError::NotFound(id.clone())),
            }
        }
    }
}
