//! Telemetry stage: spans and status for recognized protocol methods.
//!
//! Always present, always calls through, never blocks or rewrites.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument, Span};

use toolgate_core::mcp::{
    MethodCall, METHOD_INITIALIZE, METHOD_PROMPTS_LIST, METHOD_RESOURCES_LIST,
    METHOD_RESOURCE_TEMPLATES_LIST, METHOD_TOOLS_LIST,
};

use crate::error::Result;
use crate::pipeline::{Middleware, Next};

/// Records a span per recognized method and its success/error status.
pub struct TelemetryMiddleware;

/// Build the span for a method we track, if any.
fn method_span(method: &str) -> Option<Span> {
    match method {
        METHOD_INITIALIZE => Some(info_span!("mcp.initialize")),
        METHOD_TOOLS_LIST => Some(info_span!("mcp.list", what = "tools")),
        METHOD_PROMPTS_LIST => Some(info_span!("mcp.list", what = "prompts")),
        METHOD_RESOURCES_LIST => Some(info_span!("mcp.list", what = "resources")),
        METHOD_RESOURCE_TEMPLATES_LIST => {
            Some(info_span!("mcp.list", what = "resourceTemplates"))
        }
        _ => None,
    }
}

#[async_trait]
impl Middleware for TelemetryMiddleware {
    async fn handle(&self, call: &MethodCall, next: Next<'_>) -> Result<Value> {
        let Some(span) = method_span(&call.method) else {
            return next.run(call).await;
        };

        let started = Instant::now();
        let result = next.run(call).instrument(span.clone()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => debug!(parent: &span, method = %call.method, elapsed_ms, "method completed"),
            Err(e) => warn!(parent: &span, method = %call.method, elapsed_ms, error = %e, "method failed"),
        }

        result
    }
}
