//! Execution coordinator — owns the lifecycle of one LLM turn's tool batch.
//!
//! Tool-call fragments arrive one at a time from the stream parser. Each
//! dispatch atomically allocates an index, records the call in the flow
//! log and the execution snapshot, and hands the call off for execution
//! (inline or via the worker queue). Completion is detected by counting:
//! once every dispatched tool has recorded an outcome (and the stream has
//! signaled it is finished), the waiter finalizes the batch; a wall-clock
//! deadline converts stragglers into synthesized timeout results.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use uuid::Uuid;

use wf_domain::config::{CoordinatorConfig, DispatchMode};
use wf_domain::tool::{ExecutionStatus, ToolCall, ToolOutcome, ToolStatus};
use wf_domain::{Error, Result};

use crate::broadcast::{Broadcaster, NotificationBus, ToolNotification};
use crate::execution::{ExecutionState, ToolMeta};
use crate::executor::ToolExecutor;
use crate::flowlog::{FlowStatus, FlowStore, ToolSlot, ToolsEntry};
use crate::hooks::BatchHooks;
use crate::kv::{counter_key, result_key, state_key, KeyValueStore};
use crate::worker::{spawn_workers, ToolJob};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Collaborators
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// External collaborators the coordinator is wired against.
#[derive(Clone)]
pub struct Collaborators {
    pub kv: Arc<dyn KeyValueStore>,
    pub flow: Arc<dyn FlowStore>,
    pub executor: Arc<dyn ToolExecutor>,
    pub bus: Arc<dyn NotificationBus>,
    pub hooks: Arc<dyn BatchHooks>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runtime context (shared with the worker pool)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) struct RuntimeCtx {
    pub(crate) kv: Arc<dyn KeyValueStore>,
    pub(crate) flow: Arc<dyn FlowStore>,
    pub(crate) executor: Arc<dyn ToolExecutor>,
    pub(crate) hooks: Arc<dyn BatchHooks>,
    pub(crate) broadcaster: Broadcaster,
    pub(crate) config: CoordinatorConfig,
    pub(crate) record_id: String,
    /// Serializes this process's snapshot read-modify-writes per execution.
    /// The store stays the source of truth; this guard only prevents our
    /// own concurrent dispatchers/completions from clobbering each other.
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
    /// Completion wakeups, one per execution being waited on.
    watchers: Mutex<HashMap<Uuid, Arc<Notify>>>,
}

impl RuntimeCtx {
    pub(crate) fn lock_for(&self, execution_id: &Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(*execution_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    pub(crate) fn watcher_for(&self, execution_id: &Uuid) -> Arc<Notify> {
        self.watchers
            .lock()
            .entry(*execution_id)
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Non-inserting lookups for completion paths. Once an execution is
    /// released, stragglers must not repopulate the registries — the
    /// entries would outlive the execution for the coordinator's whole
    /// per-message lifetime.
    fn existing_lock(&self, execution_id: &Uuid) -> Option<Arc<tokio::sync::Mutex<()>>> {
        self.locks.lock().get(execution_id).cloned()
    }

    fn existing_watcher(&self, execution_id: &Uuid) -> Option<Arc<Notify>> {
        self.watchers.lock().get(execution_id).cloned()
    }

    /// Drop in-process entries for a finished execution. Store keys are
    /// left to expire by TTL.
    fn release(&self, execution_id: &Uuid) {
        self.locks.lock().remove(execution_id);
        self.watchers.lock().remove(execution_id);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ExecutionCoordinator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One coordinator per conversation message: it owns the flow record the
/// message's tool entries live in. Multiple executions (tool batches) can
/// run through the same coordinator over the turn's tool loops.
pub struct ExecutionCoordinator {
    ctx: Arc<RuntimeCtx>,
    /// Present in queued mode. Workers exit when this sender drops.
    queue: Option<mpsc::UnboundedSender<ToolJob>>,
}

impl ExecutionCoordinator {
    pub fn new(
        record_id: impl Into<String>,
        collaborators: Collaborators,
        config: CoordinatorConfig,
    ) -> Self {
        let record_id = record_id.into();
        let ctx = Arc::new(RuntimeCtx {
            kv: collaborators.kv,
            flow: collaborators.flow,
            executor: collaborators.executor,
            hooks: collaborators.hooks,
            broadcaster: Broadcaster::new(collaborators.bus, &record_id),
            config,
            record_id,
            locks: Mutex::new(HashMap::new()),
            watchers: Mutex::new(HashMap::new()),
        });

        let queue = match ctx.config.dispatch_mode {
            DispatchMode::Inline => None,
            DispatchMode::Queued => Some(spawn_workers(ctx.clone(), ctx.config.workers)),
        };

        Self { ctx, queue }
    }

    // ── initialize_execution ─────────────────────────────────────────

    /// Start a fresh execution: write the initial snapshot and append an
    /// empty tools entry to the flow. No tool count is known yet.
    pub async fn initialize_execution(&self) -> Result<Uuid> {
        let execution_id = Uuid::new_v4();
        let state = ExecutionState::new(execution_id);
        store_state(&self.ctx, &state).await?;

        let mut flow = self.ctx.flow.reload(&self.ctx.record_id).await?;
        flow.push_tools_entry(ToolsEntry::new(execution_id));
        self.ctx
            .flow
            .replace_flow(&self.ctx.record_id, flow, Utc::now())
            .await?;

        tracing::debug!(
            %execution_id,
            record_id = %self.ctx.record_id,
            "execution initialized"
        );
        Ok(execution_id)
    }

    // ── dispatch_tool ────────────────────────────────────────────────

    /// Register one tool call as it is recognized from the stream and hand
    /// it off for execution. Safe to call concurrently from multiple tasks.
    /// Returns the allocated index for later correlation.
    pub async fn dispatch_tool(&self, execution_id: Uuid, call: ToolCall) -> Result<u32> {
        if call.name.is_empty() {
            return Err(Error::MalformedCall("empty tool name".into()));
        }

        let index = self.allocate_index(&execution_id).await?;

        // Record metadata into the snapshot under the write guard.
        {
            let guard = self.ctx.lock_for(&execution_id);
            let _g = guard.lock().await;
            let mut state = load_state(&self.ctx, &execution_id)
                .await?
                .ok_or(Error::ExecutionNotFound(execution_id))?;
            state.tools.insert(
                index,
                ToolMeta {
                    name: call.name.clone(),
                    status: ToolStatus::Queued,
                    call_id: call.call_id.clone(),
                    queued_at: Utc::now(),
                    error: None,
                },
            );
            state.dispatched_count += 1;
            store_state(&self.ctx, &state).await?;
        }

        mutate_flow(&self.ctx, &execution_id, |entry| {
            entry.record_tool(ToolSlot {
                index,
                name: call.name.clone(),
                call_id: call.call_id.clone(),
                arguments: call.arguments.clone(),
                status: ToolStatus::Queued,
                error: None,
            });
        })
        .await?;

        tracing::debug!(%execution_id, index, tool = %call.name, "tool dispatched");
        self.ctx
            .broadcaster
            .emit(ToolNotification::tool(execution_id, index, ToolStatus::Queued))
            .await;

        // Hand off. Inline runs the tool to completion before returning;
        // queued returns as soon as the job is enqueued.
        match self.ctx.config.dispatch_mode {
            DispatchMode::Inline => {
                run_tool(
                    &self.ctx,
                    ToolJob {
                        execution_id,
                        index,
                        call,
                    },
                )
                .await;
            }
            DispatchMode::Queued => {
                let job = ToolJob {
                    execution_id,
                    index,
                    call,
                };
                if let Some(queue) = &self.queue {
                    if let Err(e) = queue.send(job) {
                        // Worker pool is gone — the one transition that
                        // skips `running`.
                        tracing::warn!(%execution_id, index, error = %e, "work queue closed; recording dispatch failure");
                        record_outcome(
                            &self.ctx,
                            execution_id,
                            index,
                            ToolOutcome::failure("work queue closed"),
                        )
                        .await;
                    }
                }
            }
        }

        Ok(index)
    }

    /// Allocate the next tool index via the store's atomic counter, with a
    /// defensive conflict check against the cached snapshot. Conflicts
    /// (counter reset after TTL expiry, clock skew) probe linearly forward,
    /// then fall back to a timestamp-derived index. Correctness over
    /// elegance; every fallback is an anomaly worth logging.
    async fn allocate_index(&self, execution_id: &Uuid) -> Result<u32> {
        let ctx = &self.ctx;
        let raw = ctx
            .kv
            .incr(&counter_key(execution_id), 1, 0, ctx.config.execution_ttl())
            .await?;
        let candidate = raw.saturating_sub(1).max(0) as u32;

        let state = load_state(ctx, execution_id)
            .await?
            .ok_or(Error::ExecutionNotFound(*execution_id))?;
        if !state.tools.contains_key(&candidate) {
            return Ok(candidate);
        }

        tracing::warn!(
            %execution_id,
            candidate,
            "index allocation conflict; probing forward"
        );
        for offset in 1..=ctx.config.probe_window {
            let probe = candidate.saturating_add(offset);
            if !state.tools.contains_key(&probe) {
                tracing::warn!(%execution_id, probe, "allocated probed index");
                return Ok(probe);
            }
        }

        let fallback = (Utc::now().timestamp_millis().unsigned_abs() % u32::MAX as u64) as u32;
        tracing::warn!(%execution_id, fallback, "probe window exhausted; allocated timestamp-derived index");
        Ok(fallback)
    }

    // ── finalize_tool_count ──────────────────────────────────────────

    /// The stream has no more tool calls for this turn. Records the final
    /// count and wakes waiters so completion can short-circuit — it does
    /// not by itself complete the execution.
    pub async fn finalize_tool_count(&self, execution_id: Uuid, count: u32) -> Result<()> {
        {
            let guard = self.ctx.lock_for(&execution_id);
            let _g = guard.lock().await;
            let mut state = load_state(&self.ctx, &execution_id)
                .await?
                .ok_or(Error::ExecutionNotFound(execution_id))?;
            state.tool_count = Some(count);
            state.status = ExecutionStatus::WaitingCompletion;
            store_state(&self.ctx, &state).await?;
        }
        tracing::debug!(%execution_id, count, "tool count finalized");
        if let Some(watcher) = self.ctx.existing_watcher(&execution_id) {
            watcher.notify_waiters();
        }
        Ok(())
    }

    // ── await_all_dispatched ─────────────────────────────────────────

    /// Wait until every dispatched tool has completed, then finalize and
    /// return outcomes ordered by index. On `timeout`, incomplete indices
    /// come back as synthesized timeout errors. If the execution state
    /// disappears mid-wait (TTL expiry), returns best-effort partial
    /// results rather than an error — the LLM loop needs something to
    /// continue the conversation.
    /// [`Self::await_all_dispatched`] with the configured default deadline
    /// (`wait_timeout_sec`).
    pub async fn await_all(&self, execution_id: Uuid) -> Result<Vec<ToolOutcome>> {
        self.await_all_dispatched(execution_id, self.ctx.config.wait_timeout())
            .await
    }

    pub async fn await_all_dispatched(
        &self,
        execution_id: Uuid,
        timeout: Duration,
    ) -> Result<Vec<ToolOutcome>> {
        let ctx = &self.ctx;
        let deadline = Instant::now() + timeout;
        let watcher = ctx.watcher_for(&execution_id);
        let mut last_dispatched: u32 = 0;

        loop {
            match load_state(ctx, &execution_id).await? {
                None => {
                    tracing::warn!(
                        %execution_id,
                        last_dispatched,
                        "execution state lost mid-wait; returning partial results"
                    );
                    let results =
                        collect_outcomes(ctx, &execution_id, last_dispatched, false).await;
                    ctx.release(&execution_id);
                    return Ok(results);
                }
                Some(state) => {
                    if !state.counts_consistent() {
                        tracing::error!(
                            %execution_id,
                            dispatched = state.dispatched_count,
                            completed = state.completed_count,
                            "completed_count exceeds dispatched_count"
                        );
                    }
                    last_dispatched = last_dispatched.max(state.dispatched_count);
                    if state.is_complete() {
                        return Ok(self.finalize(execution_id, &state).await);
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(self.finalize_timeout(execution_id, last_dispatched).await);
            }

            // Notification-driven wait with a fixed re-check fallback: a
            // completion wakes us immediately, the interval catches any
            // wakeup lost between the state check and `notified()`.
            let nap = ctx.config.check_interval().min(deadline - now);
            let _ = tokio::time::timeout(nap, watcher.notified()).await;
        }
    }

    /// Natural completion: mark the flow entry complete, collect outcomes,
    /// fire the all-success hook, release in-process state.
    async fn finalize(&self, execution_id: Uuid, state: &ExecutionState) -> Vec<ToolOutcome> {
        let ctx = &self.ctx;

        if let Err(e) = mutate_flow(ctx, &execution_id, |entry| {
            entry.set_status(FlowStatus::Complete);
        })
        .await
        {
            tracing::warn!(%execution_id, error = %e, "failed to mark flow entry complete");
        }
        set_snapshot_status(ctx, &execution_id, ExecutionStatus::Complete).await;

        let results = collect_outcomes(ctx, &execution_id, state.dispatched_count, true).await;

        // All-success is only consumed by the downstream trigger (e.g. a
        // deploy); the coordinator performs no deployment itself.
        if !results.is_empty() && results.iter().all(ToolOutcome::is_success) {
            if let Err(e) = ctx.hooks.batch_succeeded(execution_id).await {
                tracing::warn!(%execution_id, error = %e, "batch-success hook failed");
            }
        }

        ctx.broadcaster
            .emit(ToolNotification::execution(
                execution_id,
                ExecutionStatus::Complete,
            ))
            .await;
        ctx.release(&execution_id);
        tracing::debug!(%execution_id, tools = results.len(), "execution complete");
        results
    }

    /// Deadline elapsed: synthesize timeout results for indices without a
    /// stored outcome and mark the flow entry `timeout`. Running tools are
    /// not interrupted — a late result may overwrite a synthesized one
    /// (last write to the result key wins), which is tolerated.
    async fn finalize_timeout(&self, execution_id: Uuid, dispatched: u32) -> Vec<ToolOutcome> {
        let ctx = &self.ctx;
        tracing::warn!(
            %execution_id,
            dispatched,
            "batch deadline elapsed; synthesizing timeout results"
        );

        let mut results = Vec::with_capacity(dispatched as usize);
        for index in 0..dispatched {
            let existing = match ctx.kv.get(&result_key(&execution_id, index)).await {
                Ok(v) => v.and_then(|v| serde_json::from_value::<ToolOutcome>(v).ok()),
                Err(e) => {
                    tracing::warn!(%execution_id, index, error = %e, "result lookup failed during timeout");
                    None
                }
            };
            match existing {
                Some(outcome) => results.push(outcome),
                None => {
                    let synthesized = ToolOutcome::timeout();
                    if let Ok(v) = serde_json::to_value(&synthesized) {
                        if let Err(e) = ctx
                            .kv
                            .set(&result_key(&execution_id, index), v, ctx.config.result_ttl())
                            .await
                        {
                            tracing::warn!(%execution_id, index, error = %e, "failed to store synthesized timeout result");
                        }
                    }
                    results.push(synthesized);
                }
            }
        }

        if let Err(e) = mutate_flow(ctx, &execution_id, |entry| {
            entry.mark_timeout();
        })
        .await
        {
            tracing::warn!(%execution_id, error = %e, "failed to mark flow entry timeout");
        }
        set_snapshot_status(ctx, &execution_id, ExecutionStatus::Timeout).await;

        ctx.broadcaster
            .emit(ToolNotification::execution(
                execution_id,
                ExecutionStatus::Timeout,
            ))
            .await;
        ctx.release(&execution_id);
        results
    }

    // ── get_execution_state ──────────────────────────────────────────

    /// Current snapshot, or `None` once the state has expired.
    pub async fn get_execution_state(
        &self,
        execution_id: &Uuid,
    ) -> Result<Option<ExecutionState>> {
        load_state(&self.ctx, execution_id).await
    }

    /// Executions with live in-process registry entries. Diagnostic:
    /// finished executions must not linger here.
    pub fn tracked_executions(&self) -> usize {
        self.ctx
            .locks
            .lock()
            .len()
            .max(self.ctx.watchers.lock().len())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool execution (shared by inline dispatch and the worker pool)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one dispatched tool: mark running, execute, record the outcome.
/// Infallible from the caller's perspective — tool failures become error
/// outcomes and bookkeeping failures are logged.
pub(crate) async fn run_tool(ctx: &RuntimeCtx, job: ToolJob) {
    let ToolJob {
        execution_id,
        index,
        call,
    } = job;

    set_tool_running(ctx, &execution_id, index).await;
    ctx.broadcaster
        .emit(ToolNotification::tool(execution_id, index, ToolStatus::Running))
        .await;

    let outcome = match ctx.executor.execute(&call.name, &call.arguments).await {
        Ok(value) => ToolOutcome::success(value),
        Err(e) => {
            tracing::warn!(%execution_id, index, tool = %call.name, error = %e, "tool execution failed");
            ToolOutcome::failure(e.to_string())
        }
    };

    record_outcome(ctx, execution_id, index, outcome).await;
}

async fn set_tool_running(ctx: &RuntimeCtx, execution_id: &Uuid, index: u32) {
    {
        // A transient guard when the execution was already released: a
        // straggler has no peers left to race against.
        let guard = ctx.existing_lock(execution_id).unwrap_or_default();
        let _g = guard.lock().await;
        match load_state(ctx, execution_id).await {
            Ok(Some(mut state)) => {
                if let Some(meta) = state.tools.get_mut(&index) {
                    meta.status = ToolStatus::Running;
                }
                if let Err(e) = store_state(ctx, &state).await {
                    tracing::warn!(%execution_id, index, error = %e, "failed to store running status");
                }
            }
            Ok(None) => {
                tracing::warn!(%execution_id, index, "execution state gone before tool started")
            }
            Err(e) => tracing::warn!(%execution_id, index, error = %e, "state load failed"),
        }
    }

    if let Err(e) = mutate_flow(ctx, execution_id, |entry| {
        entry.set_tool_status(index, ToolStatus::Running, None);
    })
    .await
    {
        tracing::warn!(%execution_id, index, error = %e, "failed to mark tool running in flow");
    }
}

/// Store the outcome, update flow + snapshot, bump `completed_count`
/// exactly once, wake waiters, broadcast the terminal status.
pub(crate) async fn record_outcome(
    ctx: &RuntimeCtx,
    execution_id: Uuid,
    index: u32,
    outcome: ToolOutcome,
) {
    let tool_status = if outcome.is_success() {
        ToolStatus::Complete
    } else {
        ToolStatus::Error
    };

    match serde_json::to_value(&outcome) {
        Ok(v) => {
            if let Err(e) = ctx
                .kv
                .set(&result_key(&execution_id, index), v, ctx.config.result_ttl())
                .await
            {
                tracing::warn!(%execution_id, index, error = %e, "failed to store tool result");
            }
        }
        Err(e) => tracing::warn!(%execution_id, index, error = %e, "failed to serialize tool result"),
    }

    if let Err(e) = mutate_flow(ctx, &execution_id, |entry| {
        entry.set_tool_status(index, tool_status, outcome.error.clone());
    })
    .await
    {
        tracing::warn!(%execution_id, index, error = %e, "failed to update flow tool status");
    }

    {
        let guard = ctx.existing_lock(&execution_id).unwrap_or_default();
        let _g = guard.lock().await;
        match load_state(ctx, &execution_id).await {
            Ok(Some(mut state)) => {
                state.completed_count += 1;
                if let Some(meta) = state.tools.get_mut(&index) {
                    meta.status = tool_status;
                    meta.error = outcome.error.clone();
                }
                if !state.counts_consistent() {
                    tracing::error!(
                        %execution_id,
                        dispatched = state.dispatched_count,
                        completed = state.completed_count,
                        "completed_count exceeds dispatched_count"
                    );
                }
                if let Err(e) = store_state(ctx, &state).await {
                    tracing::warn!(%execution_id, index, error = %e, "failed to store completion");
                }
            }
            Ok(None) => {
                tracing::warn!(%execution_id, index, "execution state gone before completion recorded")
            }
            Err(e) => tracing::warn!(%execution_id, index, error = %e, "state load failed"),
        }
    }

    // Nobody-waiting (or already-released) means nothing to wake.
    if let Some(watcher) = ctx.existing_watcher(&execution_id) {
        watcher.notify_waiters();
    }
    ctx.broadcaster
        .emit(ToolNotification::tool(execution_id, index, tool_status))
        .await;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) async fn load_state(
    ctx: &RuntimeCtx,
    execution_id: &Uuid,
) -> Result<Option<ExecutionState>> {
    match ctx.kv.get(&state_key(execution_id)).await? {
        Some(v) => Ok(Some(serde_json::from_value(v)?)),
        None => Ok(None),
    }
}

async fn store_state(ctx: &RuntimeCtx, state: &ExecutionState) -> Result<()> {
    ctx.kv
        .set(
            &state_key(&state.execution_id),
            serde_json::to_value(state)?,
            ctx.config.execution_ttl(),
        )
        .await
}

async fn set_snapshot_status(ctx: &RuntimeCtx, execution_id: &Uuid, status: ExecutionStatus) {
    let guard = ctx.existing_lock(execution_id).unwrap_or_default();
    let _g = guard.lock().await;
    if let Ok(Some(mut state)) = load_state(ctx, execution_id).await {
        state.status = status;
        if let Err(e) = store_state(ctx, &state).await {
            tracing::warn!(%execution_id, error = %e, "failed to store terminal status");
        }
    }
}

/// Flow reconciliation: reload the record, mutate the most recent tools
/// entry for this execution (scanning from the end), write the whole flow
/// back. A missing entry is logged, not fatal — the rest of the pipeline
/// may have rewritten the flow underneath us (accepted risk).
pub(crate) async fn mutate_flow<F>(ctx: &RuntimeCtx, execution_id: &Uuid, apply: F) -> Result<()>
where
    F: FnOnce(&mut ToolsEntry),
{
    let mut flow = ctx.flow.reload(&ctx.record_id).await?;
    match flow.latest_tools_entry_mut(execution_id) {
        Some(entry) => apply(entry),
        None => {
            tracing::warn!(
                %execution_id,
                record_id = %ctx.record_id,
                "tools entry missing from flow; skipping mutation"
            );
            return Ok(());
        }
    }
    ctx.flow
        .replace_flow(&ctx.record_id, flow, Utc::now())
        .await
}

/// Read stored outcomes for indices `0..count`, substituting a pending
/// placeholder where a result is missing. `warn_missing` distinguishes
/// the defensive should-not-happen case from the lost-state partial path.
async fn collect_outcomes(
    ctx: &RuntimeCtx,
    execution_id: &Uuid,
    count: u32,
    warn_missing: bool,
) -> Vec<ToolOutcome> {
    let mut results = Vec::with_capacity(count as usize);
    for index in 0..count {
        let outcome = match ctx.kv.get(&result_key(execution_id, index)).await {
            Ok(Some(v)) => serde_json::from_value(v).unwrap_or_else(|e| {
                tracing::warn!(%execution_id, index, error = %e, "stored result failed to parse");
                ToolOutcome::pending()
            }),
            Ok(None) => {
                if warn_missing {
                    tracing::warn!(%execution_id, index, "no result stored for completed index");
                }
                ToolOutcome::pending()
            }
            Err(e) => {
                tracing::warn!(%execution_id, index, error = %e, "result lookup failed");
                ToolOutcome::pending()
            }
        };
        results.push(outcome);
    }
    results
}
