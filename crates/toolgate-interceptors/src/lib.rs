//! Protocol method interception for Toolgate.
//!
//! Every MCP method call entering the gateway passes through an ordered
//! middleware pipeline before it reaches the real handler. Stage order is
//! fixed at construction: telemetry wraps everything, then auth-error
//! translation, then user-supplied interceptors in configuration order,
//! then call logging, then secret blocking innermost. Only `tools/call`
//! is subject to the inner stages; other methods pass through untouched
//! except for telemetry.

pub mod block_secrets;
pub mod custom;
pub mod error;
pub mod log_calls;
pub mod pipeline;
pub mod reauth;
pub mod telemetry;

pub use custom::{Hook, InterceptorKind, InterceptorSpec};
pub use error::{InterceptError, Result};
pub use pipeline::{FnHandler, MethodHandler, Middleware, Next, Pipeline, PipelineConfig};
pub use reauth::{ReauthLinkSource, StaticReauthLink};
