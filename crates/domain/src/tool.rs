//! Canonical tool-call and tool-outcome types.
//!
//! The LLM stream parser normalizes whatever shape the provider emits into
//! [`ToolCall`] before anything reaches the coordinator, so the coordinator
//! never branches on alternate field spellings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Error message recorded for tools that did not finish before the batch
/// deadline. The UI matches on this string to offer a targeted retry.
pub const TIMEOUT_MESSAGE: &str = "Tool execution timeout";

/// Placeholder message for an index whose result went missing.
pub const PENDING_MESSAGE: &str = "no result available";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolCall — the canonical descriptor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One tool invocation as recognized from the incoming LLM stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Upstream correlation token. Preserved verbatim when present —
    /// required for replying to the LLM's tool-call protocol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Tool identifier (e.g. "os-write").
    pub name: String,
    /// Parsed arguments payload. Opaque to the coordinator.
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: None,
            name: name.into(),
            arguments,
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    /// Normalize a raw provider-shaped tool call into the canonical form.
    ///
    /// Providers disagree on key names ("name" vs "tool_name", "arguments"
    /// vs "args" vs "input"), so this is the single place that tolerates
    /// the inconsistency. A call with no recognizable name is malformed —
    /// no retry can fix it, so it raises instead of being absorbed.
    pub fn from_raw(raw: &Value) -> Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| Error::MalformedCall("tool call is not an object".into()))?;

        let name = ["name", "tool_name", "tool", "function"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::MalformedCall("missing tool name".into()))?;

        let arguments = ["arguments", "args", "input", "parameters"]
            .iter()
            .find_map(|k| obj.get(*k))
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        // Arguments delivered as a JSON-encoded string get one decode pass.
        let arguments = match arguments {
            Value::String(s) if !s.trim().is_empty() => {
                serde_json::from_str(&s).unwrap_or(Value::String(s))
            }
            Value::String(_) => Value::Object(Default::default()),
            other => other,
        };

        let call_id = ["id", "call_id", "tool_call_id"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::to_owned);

        Ok(Self {
            call_id,
            name: name.to_owned(),
            arguments,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Status machines
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-tool state machine: `queued → running → (complete | error | timeout)`.
/// The only transition that skips `running` is `queued → error` when the
/// dispatch itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Queued,
    Running,
    Complete,
    Error,
    Timeout,
}

impl ToolStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Timeout)
    }
}

/// Execution-level status for one LLM turn's whole tool batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Tool calls may still be arriving from the stream.
    Streaming,
    /// The stream has finished; waiting for dispatched tools to complete.
    WaitingCompletion,
    Complete,
    Timeout,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Timeout)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolOutcome — what the waiter hands back, one per index
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Error,
    /// Defensive placeholder: the index was dispatched but no result was
    /// ever stored. Should not occur under correct invariants.
    Pending,
}

/// Result payload for one tool call, keyed by `(execution_id, tool_index)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn success(value: Value) -> Self {
        Self {
            status: OutcomeStatus::Success,
            value: Some(value),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            value: None,
            error: Some(message.into()),
        }
    }

    /// Synthesized for indices that did not finish before the batch deadline.
    pub fn timeout() -> Self {
        Self::failure(TIMEOUT_MESSAGE)
    }

    /// Placeholder for an index whose stored result is missing.
    pub fn pending() -> Self {
        Self {
            status: OutcomeStatus::Pending,
            value: None,
            error: Some(PENDING_MESSAGE.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// Distinguishes a batch-timeout synthesis from an ordinary tool error.
    pub fn is_timeout(&self) -> bool {
        self.status == OutcomeStatus::Error && self.error.as_deref() == Some(TIMEOUT_MESSAGE)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
