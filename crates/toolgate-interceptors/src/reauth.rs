//! Auth-error translation stage.
//!
//! Watches `tools/call` *results* only. When a tool-level error carries
//! the upstream GitHub 401 signature, the raw error is replaced with an
//! instructional result containing a reauthorization link. The link comes
//! from an injected source; the browser OAuth flow itself lives outside
//! this subsystem.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use toolgate_core::mcp::{CallToolResult, Content, MethodCall};

use crate::error::Result;
use crate::pipeline::{Middleware, Next};

/// Supplies the reauthorization URL when translation fires.
#[async_trait]
pub trait ReauthLinkSource: Send + Sync {
    /// Produce the authorization URL, or a human-readable failure reason.
    async fn authorization_url(&self) -> std::result::Result<String, String>;
}

/// A fixed, configuration-supplied link.
pub struct StaticReauthLink {
    url: String,
}

impl StaticReauthLink {
    /// Source that always returns `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ReauthLinkSource for StaticReauthLink {
    async fn authorization_url(&self) -> std::result::Result<String, String> {
        Ok(self.url.clone())
    }
}

/// Whether a tool error text matches the upstream authentication-failure
/// signature. Requires the 401 status plus a GitHub indicator so ordinary
/// errors are never rewritten.
fn is_upstream_auth_error(text: &str) -> bool {
    if !text.contains("401") {
        return false;
    }

    text.contains("github.com")
        || text.contains("api.github.com")
        || (text.contains("Bad credentials")
            && (text.contains("github") || text.contains("GitHub")))
}

/// Replaces upstream 401 tool errors with a reauthorization instruction.
pub struct ReauthMiddleware {
    source: Arc<dyn ReauthLinkSource>,
}

impl ReauthMiddleware {
    /// Stage with the given link source.
    pub fn new(source: Arc<dyn ReauthLinkSource>) -> Self {
        Self { source }
    }

    /// Build the synthesized replacement result.
    async fn synthesize(&self) -> CallToolResult {
        match self.source.authorization_url().await {
            Ok(url) => CallToolResult {
                content: vec![Content::text(format!(
                    "Authentication required. Please authorize at:\n{url}\n\n\
                     Note: After authorizing, retry your request."
                ))],
                is_error: false,
            },
            Err(reason) => CallToolResult::error(format!(
                "Failed to get authorization URL: {reason}"
            )),
        }
    }
}

#[async_trait]
impl Middleware for ReauthMiddleware {
    async fn handle(&self, call: &MethodCall, next: Next<'_>) -> Result<Value> {
        if !call.is_tool_call() {
            return next.run(call).await;
        }

        // Calls through unconditionally; only the result is inspected.
        let response = next.run(call).await?;

        let Ok(result) = serde_json::from_value::<CallToolResult>(response.clone()) else {
            return Ok(response);
        };
        if !result.is_error || result.content.is_empty() {
            return Ok(response);
        }

        for content in &result.content {
            if let Content::Text { text } = content {
                if is_upstream_auth_error(text) {
                    debug!("translating upstream 401 into reauthorization instructions");
                    return Ok(self.synthesize().await.into_value());
                }
            }
        }

        Ok(response)
    }
}
