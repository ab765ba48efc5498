//! Background worker pool for the queued dispatch strategy.
//!
//! Jobs go over an unbounded channel; a fixed pool of tokio tasks drains
//! it. Each job is executed exactly once by whichever worker receives it.
//! Workers exit when the coordinator (the sole sender) is dropped.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use wf_domain::tool::ToolCall;

use crate::coordinator::{run_tool, RuntimeCtx};

/// One dispatched tool call awaiting execution.
pub(crate) struct ToolJob {
    pub(crate) execution_id: Uuid,
    pub(crate) index: u32,
    pub(crate) call: ToolCall,
}

/// Spawn `workers` tasks sharing one receiver. Returns the job sender.
pub(crate) fn spawn_workers(
    ctx: Arc<RuntimeCtx>,
    workers: usize,
) -> mpsc::UnboundedSender<ToolJob> {
    let (tx, rx) = mpsc::unbounded_channel::<ToolJob>();
    let rx = Arc::new(Mutex::new(rx));

    for worker_id in 0..workers.max(1) {
        let ctx = ctx.clone();
        let rx = rx.clone();
        tokio::spawn(async move {
            tracing::debug!(worker_id, "tool worker started");
            loop {
                // Hold the receiver lock only while waiting — release it
                // before running the job so siblings can pick up work.
                let job = { rx.lock().await.recv().await };
                match job {
                    Some(job) => run_tool(&ctx, job).await,
                    None => break,
                }
            }
            tracing::debug!(worker_id, "tool worker stopped");
        });
    }

    tx
}
