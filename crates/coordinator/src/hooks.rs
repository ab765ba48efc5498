//! Post-completion hooks.
//!
//! When a finalized batch comes back with every outcome successful, the
//! coordinator signals `batch_succeeded` — the seam a deployment trigger
//! hangs off. The coordinator itself performs no deployment; a hook
//! failure is logged and does not affect the returned results.

use async_trait::async_trait;
use uuid::Uuid;

use wf_domain::Result;

#[async_trait]
pub trait BatchHooks: Send + Sync {
    /// Called once per execution whose finalized batch was all-success.
    /// Not called on timeout, partial failure, or lost state.
    async fn batch_succeeded(&self, execution_id: Uuid) -> Result<()>;
}

/// Default hook: does nothing.
#[derive(Default)]
pub struct NoopHooks;

#[async_trait]
impl BatchHooks for NoopHooks {
    async fn batch_succeeded(&self, _execution_id: Uuid) -> Result<()> {
        Ok(())
    }
}
