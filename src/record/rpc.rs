use crate::context::RequestContext;
use crate::record::{Entry, EntryId, RecordError, RecordIdentity, RecordState};
use crate::wallet::Address;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// The remote program's RPC surface. The program itself is an opaque
/// collaborator; only this call shape and its signaled conditions are fixed.
#[async_trait]
pub trait ProgramRpc: Send + Sync {
    async fn fetch(
        &self,
        context: &RequestContext,
        identity: &RecordIdentity,
    ) -> Result<RecordState, RecordError>;

    async fn initialize(
        &self,
        context: &RequestContext,
        identity: &RecordIdentity,
        authority: &Address,
    ) -> Result<(), RecordError>;

    async fn append(
        &self,
        context: &RequestContext,
        identity: &RecordIdentity,
        content: &str,
        author: &Address,
    ) -> Result<EntryId, RecordError>;

    async fn vote(
        &self,
        context: &RequestContext,
        identity: &RecordIdentity,
        id: &EntryId,
    ) -> Result<(), RecordError>;
}

/// Remote-signaled condition codes.
pub const CODE_NOT_FOUND: i64 = -32001;
pub const CODE_ALREADY_INITIALIZED: i64 = -32002;

/// JSON-RPC 2.0 transport to the configured cluster endpoint. Every request
/// carries the session's commitment level; failures are surfaced, never
/// retried here.
pub struct JsonRpcProgram {
    http: reqwest::Client,
    request_seq: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

enum RpcFailure {
    Remote { code: i64, message: String },
    Transport(String),
    Decode(String),
}

impl JsonRpcProgram {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            request_seq: AtomicU64::new(1),
        }
    }

    async fn call(
        &self,
        context: &RequestContext,
        method: &str,
        params: Value,
    ) -> Result<Value, RpcFailure> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.request_seq.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&context.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| RpcFailure::Transport(format!("{method}: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcFailure::Transport(format!(
                "{method}: endpoint returned {status}"
            )));
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|err| RpcFailure::Decode(format!("{method}: malformed rpc envelope: {err}")))?;

        if let Some(error) = envelope.error {
            return Err(RpcFailure::Remote {
                code: error.code,
                message: error.message,
            });
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }

    fn base_params(context: &RequestContext, identity: &RecordIdentity) -> Value {
        json!({
            "program": identity.program_id,
            "record": identity.record_address,
            "commitment": context.commitment.as_str(),
        })
    }
}

impl Default for JsonRpcProgram {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgramRpc for JsonRpcProgram {
    async fn fetch(
        &self,
        context: &RequestContext,
        identity: &RecordIdentity,
    ) -> Result<RecordState, RecordError> {
        let params = Self::base_params(context, identity);
        match self.call(context, "fetch", params).await {
            Ok(result) => decode_record(result),
            // The remote may report a missing record either way; both mean
            // pre-initialization state, not a fault.
            Err(RpcFailure::Remote {
                code: CODE_NOT_FOUND,
                ..
            }) => Ok(RecordState::Absent),
            Err(failure) => Err(failure.into_record_error()),
        }
    }

    async fn initialize(
        &self,
        context: &RequestContext,
        identity: &RecordIdentity,
        authority: &Address,
    ) -> Result<(), RecordError> {
        let mut params = Self::base_params(context, identity);
        params["authority"] = json!(authority.as_str());
        params["fundingSource"] = json!(authority.as_str());
        match self.call(context, "initialize", params).await {
            Ok(_) => Ok(()),
            Err(RpcFailure::Remote {
                code: CODE_ALREADY_INITIALIZED,
                ..
            }) => Err(RecordError::AlreadyInitialized),
            Err(failure) => Err(failure.into_record_error()),
        }
    }

    async fn append(
        &self,
        context: &RequestContext,
        identity: &RecordIdentity,
        content: &str,
        author: &Address,
    ) -> Result<EntryId, RecordError> {
        let mut params = Self::base_params(context, identity);
        params["content"] = json!(content);
        params["author"] = json!(author.as_str());
        let result = self
            .call(context, "append", params)
            .await
            .map_err(RpcFailure::into_record_error)?;
        decode_entry_id(result)
    }

    async fn vote(
        &self,
        context: &RequestContext,
        identity: &RecordIdentity,
        id: &EntryId,
    ) -> Result<(), RecordError> {
        let mut params = Self::base_params(context, identity);
        params["id"] = json!(id.as_str());
        match self.call(context, "vote", params).await {
            Ok(_) => Ok(()),
            Err(RpcFailure::Remote {
                code: CODE_NOT_FOUND,
                ..
            }) => Err(RecordError::NotFound(id.clone())),
            Err(failure) => Err(failure.into_record_error()),
        }
    }
}

impl RpcFailure {
    fn into_record_error(self) -> RecordError {
        match self {
            RpcFailure::Remote { code, message } => {
                RecordError::Transport(format!("remote error {code}: {message}"))
            }
            RpcFailure::Transport(message) => RecordError::Transport(message),
            RpcFailure::Decode(message) => RecordError::Decode(message),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordAccount {
    entries: Vec<Entry>,
}

/// A null result means the record does not exist yet; anything else must
/// match the expected account shape.
fn decode_record(result: Value) -> Result<RecordState, RecordError> {
    if result.is_null() {
        return Ok(RecordState::Absent);
    }
    let account: RecordAccount = serde_json::from_value(result)
        .map_err(|err| RecordError::Decode(format!("unexpected record shape: {err}")))?;
    Ok(RecordState::Present {
        entries: account.entries,
    })
}

fn decode_entry_id(result: Value) -> Result<EntryId, RecordError> {
    match result {
        Value::String(id) => Ok(EntryId::new(id)),
        other => match other.get("id").and_then(Value::as_str) {
            Some(id) => Ok(EntryId::new(id)),
            None => Err(RecordError::Decode(
                "append result carried no entry id".to_string(),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_fetch_result_decodes_to_absent() {
        let state = decode_record(Value::Null).expect("null is a valid outcome");
        assert!(state.is_absent());
    }

    #[test]
    fn populated_fetch_result_decodes_entries_in_order() {
        let result = json!({
            "entries": [
                { "id": "entry-0", "content": "http://x/a.gif", "author": "Addr1", "voteCount": 2 },
                { "id": "entry-1", "content": "http://x/b.gif", "author": "Addr2", "voteCount": 0 },
            ]
        });
        let state = decode_record(result).expect("well-formed account");
        let entries = state.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id.as_str(), "entry-0");
        assert_eq!(entries[0].vote_count, 2);
        assert_eq!(entries[1].author.as_str(), "Addr2");
    }

    #[test]
    fn malformed_fetch_result_is_a_decode_failure() {
        let err = decode_record(json!({ "gifs": [] })).expect_err("wrong shape");
        assert!(matches!(err, RecordError::Decode(_)));
    }

    #[test]
    fn entry_id_decodes_from_string_or_object_results() {
        assert_eq!(
            decode_entry_id(json!("entry-7")).unwrap(),
            EntryId::new("entry-7")
        );
        assert_eq!(
            decode_entry_id(json!({ "id": "entry-8" })).unwrap(),
            EntryId::new("entry-8")
        );
        assert!(matches!(
            decode_entry_id(json!(42)),
            Err(RecordError::Decode(_))
        ));
    }
}
