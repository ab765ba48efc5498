//! Tool executor seam.
//!
//! The coordinator never knows what a tool does — writing a file, patching
//! CSS, generating an image, deploying. It hands the executor a name and an
//! arguments payload and records whatever comes back. Any `Err` is a tool
//! failure, absorbed into the per-tool outcome rather than propagated.
//!
//! Contract: the coordinator invokes the executor exactly once per
//! dispatched index. It does not deduplicate completion signals, so an
//! executor that is retried externally must deduplicate on its side.

use async_trait::async_trait;
use serde_json::Value;

use wf_domain::Result;

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Perform the side-effecting operation for one tool call.
    async fn execute(&self, name: &str, arguments: &Value) -> Result<Value>;
}
