//! The middleware chain wrapping every protocol method handler.
//!
//! A textbook chain-of-responsibility: stages are an ordered, immutable
//! list; each stage receives the call and an explicit [`Next`] that runs
//! the remainder of the chain into the terminal handler. Any stage may
//! short-circuit by returning a synthesized result instead of calling
//! `next.run()`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use toolgate_core::mcp::MethodCall;

use crate::block_secrets::BlockSecretsMiddleware;
use crate::custom::{CustomInterceptor, InterceptorSpec};
use crate::error::Result;
use crate::log_calls::LogCallsMiddleware;
use crate::reauth::{ReauthLinkSource, ReauthMiddleware};
use crate::telemetry::TelemetryMiddleware;

/// The real method handler sitting innermost in the chain.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Handle the call, producing the method result.
    async fn handle(&self, call: &MethodCall) -> Result<Value>;
}

/// Adapter for plain async-free closures, mostly useful in tests.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> MethodHandler for FnHandler<F>
where
    F: Fn(&MethodCall) -> Result<Value> + Send + Sync,
{
    async fn handle(&self, call: &MethodCall) -> Result<Value> {
        (self.0)(call)
    }
}

/// One stage in the pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Inspect, forward, rewrite, or short-circuit the call.
    async fn handle(&self, call: &MethodCall, next: Next<'_>) -> Result<Value>;
}

/// The remainder of the chain from one stage's point of view.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    terminal: &'a dyn MethodHandler,
}

impl<'a> Next<'a> {
    /// Run the rest of the chain, ending at the terminal handler.
    pub async fn run(self, call: &MethodCall) -> Result<Value> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage
                    .handle(
                        call,
                        Next {
                            stages: rest,
                            terminal: self.terminal,
                        },
                    )
                    .await
            }
            None => self.terminal.handle(call).await,
        }
    }
}

/// Configuration the pipeline is built from, once per gateway run.
pub struct PipelineConfig {
    /// Enable the side-effect-only call logging stage.
    pub log_calls: bool,

    /// Enable the secret-blocking stage (innermost).
    pub block_secrets: bool,

    /// Enable auth-error translation with this link source.
    pub reauth: Option<Arc<dyn ReauthLinkSource>>,

    /// User-supplied interceptors, already parsed, in CLI order.
    pub interceptors: Vec<InterceptorSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_calls: false,
            block_secrets: true,
            reauth: None,
            interceptors: Vec::new(),
        }
    }
}

/// An ordered, immutable middleware chain.
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// Build the pipeline with the fixed stage order. Interceptor specs
    /// must already have parsed; nothing here fails at call time.
    pub fn build(config: PipelineConfig) -> Result<Self> {
        let mut stages: Vec<Arc<dyn Middleware>> = vec![Arc::new(TelemetryMiddleware)];

        if let Some(source) = config.reauth {
            stages.push(Arc::new(ReauthMiddleware::new(source)));
        }

        for spec in config.interceptors {
            stages.push(Arc::new(CustomInterceptor::new(spec)?));
        }

        if config.log_calls {
            stages.push(Arc::new(LogCallsMiddleware));
        }

        if config.block_secrets {
            stages.push(Arc::new(BlockSecretsMiddleware));
        }

        Ok(Self { stages })
    }

    /// Dispatch one call through every stage into `handler`.
    pub async fn dispatch(&self, call: &MethodCall, handler: &dyn MethodHandler) -> Result<Value> {
        Next {
            stages: &self.stages,
            terminal: handler,
        }
        .run(call)
        .await
    }

    /// Number of stages, mostly for diagnostics.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use toolgate_core::mcp::CallToolResult;

    /// Terminal handler counting invocations.
    pub(crate) struct CountingHandler {
        pub calls: AtomicUsize,
        pub result: Value,
    }

    impl CountingHandler {
        pub fn returning(result: Value) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result,
            }
        }

        pub fn count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MethodHandler for CountingHandler {
        async fn handle(&self, _call: &MethodCall) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    #[tokio::test]
    async fn test_empty_pipeline_reaches_handler() {
        let pipeline = Pipeline { stages: Vec::new() };
        let handler = CountingHandler::returning(serde_json::json!({"ok": true}));

        let call = MethodCall::tool_call("echo", serde_json::json!({"x": "hello"}));
        let result = pipeline.dispatch(&call, &handler).await.unwrap();

        assert_eq!(handler.count(), 1);
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn test_default_build_has_telemetry_and_blocking() {
        let pipeline = Pipeline::build(PipelineConfig::default()).unwrap();
        assert_eq!(pipeline.len(), 2);
    }

    #[tokio::test]
    async fn test_stages_run_in_declared_order() {
        struct Tagger(&'static str, Arc<std::sync::Mutex<Vec<&'static str>>>);

        #[async_trait]
        impl Middleware for Tagger {
            async fn handle(&self, call: &MethodCall, next: Next<'_>) -> Result<Value> {
                self.1.lock().unwrap().push(self.0);
                next.run(call).await
            }
        }

        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let pipeline = Pipeline {
            stages: vec![
                Arc::new(Tagger("outer", order.clone())),
                Arc::new(Tagger("inner", order.clone())),
            ],
        };

        let handler = CountingHandler::returning(CallToolResult::text("hi").into_value());
        let call = MethodCall::tool_call("t", Value::Null);
        pipeline.dispatch(&call, &handler).await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest_of_chain() {
        struct ShortCircuit;

        #[async_trait]
        impl Middleware for ShortCircuit {
            async fn handle(&self, _call: &MethodCall, _next: Next<'_>) -> Result<Value> {
                Ok(serde_json::json!({"synthesized": true}))
            }
        }

        let pipeline = Pipeline {
            stages: vec![Arc::new(ShortCircuit)],
        };
        let handler = CountingHandler::returning(Value::Null);

        let call = MethodCall::tool_call("t", Value::Null);
        let result = pipeline.dispatch(&call, &handler).await.unwrap();

        assert_eq!(handler.count(), 0);
        assert_eq!(result["synthesized"], true);
    }
}
