//! Call logging stage: side-effect only, never alters the call.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};

use toolgate_core::mcp::MethodCall;

use crate::error::Result;
use crate::pipeline::{Middleware, Next};

/// Logs every tool call and its outcome.
pub struct LogCallsMiddleware;

#[async_trait]
impl Middleware for LogCallsMiddleware {
    async fn handle(&self, call: &MethodCall, next: Next<'_>) -> Result<Value> {
        if !call.is_tool_call() {
            return next.run(call).await;
        }

        let tool = call
            .tool_params()
            .map(|p| p.name)
            .unwrap_or_else(|| "<unknown>".to_string());
        info!(tool, "calling tool");

        let started = Instant::now();
        let result = next.run(call).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => info!(tool, elapsed_ms, "tool call completed"),
            Err(e) => warn!(tool, elapsed_ms, error = %e, "tool call failed"),
        }

        result
    }
}
