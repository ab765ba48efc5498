//! Execution state — the per-turn snapshot persisted in the key-value store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use wf_domain::tool::{ExecutionStatus, ToolStatus};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-tool metadata
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMeta {
    pub name: String,
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub queued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution snapshot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One execution = all tool calls triggered by one LLM turn.
///
/// Counts are monotonically non-decreasing; `completed_count` must never
/// exceed `dispatched_count` at any observable point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    pub dispatched_count: u32,
    pub completed_count: u32,
    /// Unknown until the upstream stream signals it has no more calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_count: Option<u32>,
    /// Tool metadata by index. A BTreeMap keeps snapshots index-ordered
    /// and tolerates sparse fallback indices.
    pub tools: BTreeMap<u32, ToolMeta>,
    pub started_at: DateTime<Utc>,
}

impl ExecutionState {
    pub fn new(execution_id: Uuid) -> Self {
        Self {
            execution_id,
            status: ExecutionStatus::Streaming,
            dispatched_count: 0,
            completed_count: 0,
            tool_count: None,
            tools: BTreeMap::new(),
            started_at: Utc::now(),
        }
    }

    /// Completion rule: every dispatched tool has completed, and the batch
    /// is known to be non-empty — or the stream finalized at zero tools.
    /// While `tool_count` is known, dispatch must have caught up to it
    /// (the stream may still be appending until then).
    pub fn is_complete(&self) -> bool {
        if self.completed_count < self.dispatched_count {
            return false;
        }
        match self.tool_count {
            Some(count) => self.dispatched_count >= count,
            None => self.dispatched_count > 0,
        }
    }

    /// `completed_count <= dispatched_count` — violations are a bug.
    pub fn counts_consistent(&self) -> bool {
        self.completed_count <= self.dispatched_count
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
