//! Incremental tool-execution coordination for the WebForge runtime.
//!
//! An LLM turn emits tool calls progressively; this crate assigns each a
//! stable index, executes it (inline or via a worker pool, possibly while
//! more calls are still arriving), tracks per-tool and batch completion,
//! reconciles everything with the conversation's live-rendered flow log,
//! and notifies UI subscribers best-effort.
//!
//! Entry point: [`ExecutionCoordinator`], wired against the collaborator
//! traits in [`kv`], [`flowlog`], [`executor`], [`broadcast`], and
//! [`hooks`]. In-memory implementations of the store traits ship for
//! tests and embedded use.

pub mod broadcast;
mod coordinator;
pub mod execution;
pub mod executor;
pub mod flowlog;
pub mod hooks;
pub mod kv;
mod worker;

pub use coordinator::{Collaborators, ExecutionCoordinator};
pub use wf_domain::config::{CoordinatorConfig, DispatchMode};
pub use wf_domain::tool::{OutcomeStatus, ToolCall, ToolOutcome, ToolStatus};
