//! Conversation flow log — the "tools" entry and its reconciliation rules.
//!
//! The flow is an append-only list of structured entries rendered live by
//! the UI. This subsystem owns exactly one entry kind (`type=tools`); all
//! other entries belong to the rest of the conversation pipeline and pass
//! through as opaque JSON.
//!
//! Every mutation is whole-flow read-modify-write: reload, clone, locate
//! the most recent tools entry for the execution by scanning from the end
//! (a conversation can hold multiple tool batches), mutate, write the
//! whole structure back. There is no locking across writers — concurrent
//! updates are last-write-wins on the whole blob, so mutations must be
//! idempotent and the critical section kept short.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use wf_domain::tool::{ToolStatus, TIMEOUT_MESSAGE};
use wf_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Entry-level status. Mirrors the execution status but is independently
/// settable — the flow can be marked `timeout` while a straggler tool is
/// still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Streaming,
    Complete,
    Timeout,
}

impl FlowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Timeout)
    }
}

/// Discriminant for the typed arm of [`FlowEntry`]. Serializes as
/// `"type": "tools"`, which is what untagged deserialization keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolsTag {
    Tools,
}

/// One tool's UI-facing snapshot inside the tools array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSlot {
    pub index: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    pub arguments: Value,
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The flow entry this subsystem owns: one per execution (tool batch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsEntry {
    #[serde(rename = "type")]
    pub kind: ToolsTag,
    pub execution_id: Uuid,
    pub status: FlowStatus,
    /// Sparse, index-addressed array. Holes are `None` while entries are
    /// still arriving out of order. Invariant: `len() >= max index + 1`.
    pub tools: Vec<Option<ToolSlot>>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ToolsEntry {
    pub fn new(execution_id: Uuid) -> Self {
        Self {
            kind: ToolsTag::Tools,
            execution_id,
            status: FlowStatus::Streaming,
            tools: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Record a tool at `index`, growing the array with null placeholders
    /// as needed. Re-recording the same index is harmless (overwrite).
    pub fn record_tool(&mut self, slot: ToolSlot) {
        let idx = slot.index as usize;
        if self.tools.len() <= idx {
            self.tools.resize(idx + 1, None);
        }
        self.tools[idx] = Some(slot);
    }

    /// Apply a status transition to the tool at `index`.
    ///
    /// Idempotent: re-applying the same transition is a no-op, and a
    /// terminal status is never downgraded by a late duplicate (e.g. a
    /// straggler completing after the batch was marked timeout).
    /// Returns false when the slot does not exist.
    pub fn set_tool_status(
        &mut self,
        index: u32,
        status: ToolStatus,
        error: Option<String>,
    ) -> bool {
        let Some(Some(slot)) = self.tools.get_mut(index as usize) else {
            return false;
        };
        if slot.status.is_terminal() && slot.status != status {
            tracing::debug!(
                index,
                current = ?slot.status,
                attempted = ?status,
                "ignoring status update on terminal tool slot"
            );
            return true;
        }
        slot.status = status;
        if error.is_some() {
            slot.error = error;
        }
        true
    }

    /// Set the entry-level status, stamping `completed_at` the first time
    /// a terminal status is applied. Idempotent.
    pub fn set_status(&mut self, status: FlowStatus) {
        self.status = status;
        if status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Mark every non-terminal slot as timed out and the entry as timeout.
    /// Returns the indices that were synthesized.
    pub fn mark_timeout(&mut self) -> Vec<u32> {
        let mut synthesized = Vec::new();
        for slot in self.tools.iter_mut().flatten() {
            if !slot.status.is_terminal() {
                slot.status = ToolStatus::Timeout;
                slot.error = Some(TIMEOUT_MESSAGE.into());
                synthesized.push(slot.index);
            }
        }
        self.set_status(FlowStatus::Timeout);
        synthesized
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Flow — the whole per-message structure
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One entry in the flow. Untagged: anything that parses as a tools entry
/// is ours, everything else stays opaque and round-trips untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlowEntry {
    Tools(ToolsEntry),
    Other(Value),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flow {
    pub entries: Vec<FlowEntry>,
}

impl Flow {
    pub fn push_tools_entry(&mut self, entry: ToolsEntry) {
        self.entries.push(FlowEntry::Tools(entry));
    }

    /// Most recent tools entry for `execution_id`, scanning from the end.
    pub fn latest_tools_entry(&self, execution_id: &Uuid) -> Option<&ToolsEntry> {
        self.entries.iter().rev().find_map(|e| match e {
            FlowEntry::Tools(t) if t.execution_id == *execution_id => Some(t),
            _ => None,
        })
    }

    pub fn latest_tools_entry_mut(&mut self, execution_id: &Uuid) -> Option<&mut ToolsEntry> {
        self.entries.iter_mut().rev().find_map(|e| match e {
            FlowEntry::Tools(t) if t.execution_id == *execution_id => Some(t),
            _ => None,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FlowStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Record store holding the per-message flow. Whole-document replace only —
/// no partial-field update exists at this boundary.
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Load a fresh copy of the record's flow.
    async fn reload(&self, record_id: &str) -> Result<Flow>;

    /// Replace the record's entire flow, bumping its update timestamp.
    async fn replace_flow(
        &self,
        record_id: &str,
        flow: Flow,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemoryFlowStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct FlowRecord {
    flow: Flow,
    updated_at: DateTime<Utc>,
}

/// In-memory flow record store for tests and embedded use.
#[derive(Default)]
pub struct MemoryFlowStore {
    records: RwLock<HashMap<String, FlowRecord>>,
}

impl MemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record (the conversation pipeline normally does this
    /// before any tool batch exists).
    pub fn create(&self, record_id: &str) {
        self.records.write().insert(
            record_id.to_owned(),
            FlowRecord {
                flow: Flow::default(),
                updated_at: Utc::now(),
            },
        );
    }

    pub fn updated_at(&self, record_id: &str) -> Option<DateTime<Utc>> {
        self.records.read().get(record_id).map(|r| r.updated_at)
    }
}

#[async_trait]
impl FlowStore for MemoryFlowStore {
    async fn reload(&self, record_id: &str) -> Result<Flow> {
        self.records
            .read()
            .get(record_id)
            .map(|r| r.flow.clone())
            .ok_or_else(|| Error::FlowRecordNotFound(record_id.to_owned()))
    }

    async fn replace_flow(
        &self,
        record_id: &str,
        flow: Flow,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(record_id)
            .ok_or_else(|| Error::FlowRecordNotFound(record_id.to_owned()))?;
        record.flow = flow;
        record.updated_at = updated_at;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slot(index: u32, name: &str) -> ToolSlot {
        ToolSlot {
            index,
            name: name.into(),
            call_id: None,
            arguments: json!({}),
            status: ToolStatus::Queued,
            error: None,
        }
    }

    #[test]
    fn record_tool_grows_with_holes() {
        let mut entry = ToolsEntry::new(Uuid::new_v4());
        entry.record_tool(slot(2, "b"));
        assert_eq!(entry.tools.len(), 3);
        assert!(entry.tools[0].is_none());
        assert!(entry.tools[1].is_none());
        assert_eq!(entry.tools[2].as_ref().unwrap().name, "b");

        // Out-of-order arrival fills the hole without shifting anything.
        entry.record_tool(slot(0, "a"));
        assert_eq!(entry.tools.len(), 3);
        assert_eq!(entry.tools[0].as_ref().unwrap().name, "a");
    }

    #[test]
    fn set_tool_status_is_idempotent() {
        let mut entry = ToolsEntry::new(Uuid::new_v4());
        entry.record_tool(slot(0, "a"));

        assert!(entry.set_tool_status(0, ToolStatus::Complete, None));
        let once = entry.clone();
        assert!(entry.set_tool_status(0, ToolStatus::Complete, None));

        // Double-apply leaves the observable state unchanged.
        assert_eq!(
            serde_json::to_value(&entry.tools).unwrap(),
            serde_json::to_value(&once.tools).unwrap()
        );
        assert_eq!(entry.tools.len(), once.tools.len());
    }

    #[test]
    fn terminal_status_is_not_downgraded() {
        let mut entry = ToolsEntry::new(Uuid::new_v4());
        entry.record_tool(slot(0, "a"));
        entry.set_tool_status(0, ToolStatus::Timeout, Some(TIMEOUT_MESSAGE.into()));

        // Straggler completes after the batch timed out — ignored.
        entry.set_tool_status(0, ToolStatus::Complete, None);
        assert_eq!(entry.tools[0].as_ref().unwrap().status, ToolStatus::Timeout);
    }

    #[test]
    fn set_tool_status_missing_slot() {
        let mut entry = ToolsEntry::new(Uuid::new_v4());
        assert!(!entry.set_tool_status(5, ToolStatus::Running, None));
    }

    #[test]
    fn mark_timeout_only_touches_non_terminal_slots() {
        let mut entry = ToolsEntry::new(Uuid::new_v4());
        entry.record_tool(slot(0, "a"));
        entry.record_tool(slot(1, "b"));
        entry.record_tool(slot(2, "c"));
        entry.set_tool_status(0, ToolStatus::Complete, None);
        entry.set_tool_status(1, ToolStatus::Error, Some("boom".into()));

        let synthesized = entry.mark_timeout();
        assert_eq!(synthesized, vec![2]);
        assert_eq!(entry.status, FlowStatus::Timeout);
        assert_eq!(entry.tools[0].as_ref().unwrap().status, ToolStatus::Complete);
        assert_eq!(entry.tools[2].as_ref().unwrap().status, ToolStatus::Timeout);
        assert!(entry.completed_at.is_some());
    }

    #[test]
    fn set_status_stamps_completed_at_once() {
        let mut entry = ToolsEntry::new(Uuid::new_v4());
        entry.set_status(FlowStatus::Complete);
        let first = entry.completed_at.unwrap();
        entry.set_status(FlowStatus::Complete);
        assert_eq!(entry.completed_at.unwrap(), first);
    }

    #[test]
    fn latest_entry_scans_from_end() {
        let exec_a = Uuid::new_v4();
        let exec_b = Uuid::new_v4();

        let mut flow = Flow::default();
        flow.push_tools_entry(ToolsEntry::new(exec_a));
        flow.entries
            .push(FlowEntry::Other(json!({ "type": "text", "content": "hi" })));
        flow.push_tools_entry(ToolsEntry::new(exec_b));

        // A second batch for exec_a appended later wins the scan.
        let mut second = ToolsEntry::new(exec_a);
        second.record_tool(slot(0, "later"));
        flow.push_tools_entry(second);

        let found = flow.latest_tools_entry(&exec_a).unwrap();
        assert_eq!(found.tools.len(), 1);
        assert!(flow.latest_tools_entry(&exec_b).unwrap().tools.is_empty());
        assert!(flow.latest_tools_entry(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn foreign_entries_round_trip_untouched() {
        let mut flow = Flow::default();
        flow.entries.push(FlowEntry::Other(
            json!({ "type": "text", "content": "hello", "nested": { "k": [1, 2] } }),
        ));
        flow.push_tools_entry(ToolsEntry::new(Uuid::new_v4()));

        let json = serde_json::to_string(&flow).unwrap();
        let back: Flow = serde_json::from_str(&json).unwrap();

        assert_eq!(back.entries.len(), 2);
        match &back.entries[0] {
            FlowEntry::Other(v) => assert_eq!(v["nested"]["k"][1], 2),
            FlowEntry::Tools(_) => panic!("text entry parsed as tools"),
        }
        assert!(matches!(back.entries[1], FlowEntry::Tools(_)));
    }

    #[tokio::test]
    async fn memory_store_reload_and_replace() {
        let store = MemoryFlowStore::new();
        store.create("msg-1");

        let mut flow = store.reload("msg-1").await.unwrap();
        flow.push_tools_entry(ToolsEntry::new(Uuid::new_v4()));
        let stamp = Utc::now();
        store.replace_flow("msg-1", flow, stamp).await.unwrap();

        let back = store.reload("msg-1").await.unwrap();
        assert_eq!(back.entries.len(), 1);
        assert_eq!(store.updated_at("msg-1"), Some(stamp));
    }

    #[tokio::test]
    async fn memory_store_missing_record() {
        let store = MemoryFlowStore::new();
        assert!(matches!(
            store.reload("ghost").await,
            Err(Error::FlowRecordNotFound(_))
        ));
        assert!(store
            .replace_flow("ghost", Flow::default(), Utc::now())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn reload_returns_a_deep_copy() {
        let store = MemoryFlowStore::new();
        store.create("msg-1");

        let mut copy = store.reload("msg-1").await.unwrap();
        copy.push_tools_entry(ToolsEntry::new(Uuid::new_v4()));

        // Mutating the copy does not affect the stored record.
        assert!(store.reload("msg-1").await.unwrap().entries.is_empty());
    }
}
