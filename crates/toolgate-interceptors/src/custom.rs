//! User-supplied interceptors.
//!
//! Declared on the command line as `when:kind:argument` and spliced into
//! the pipeline in declaration order. A `before` hook sees the serialized
//! request; non-empty output parses as a complete tool result and replaces
//! the call entirely. An `after` hook sees the serialized result and its
//! non-empty output replaces that result. Three transports share the
//! contract: a shell command, a container image, or an HTTP endpoint.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use toolgate_core::mcp::{CallToolResult, MethodCall};

use crate::error::{InterceptError, Result};
use crate::pipeline::{Middleware, Next};

/// Upper bound on one interceptor invocation, any transport.
const INTERCEPTOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Container runtime CLI used by the `container` kind.
const CONTAINER_RUNTIME: &str = "docker";

/// Which side of the inner call a hook runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Before,
    After,
}

/// Execution transport for a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorKind {
    /// Local shell command, payload on stdin.
    Exec,
    /// Container image run with the payload on stdin.
    Container,
    /// HTTP POST of the payload; response body is the output.
    Http,
}

/// A parsed `when:kind:argument` declaration. Immutable once parsed.
#[derive(Debug, Clone)]
pub struct InterceptorSpec {
    pub when: Hook,
    pub kind: InterceptorKind,
    pub argument: String,
}

impl InterceptorSpec {
    /// Parse one declaration. Anything malformed is a configuration
    /// error; the pipeline is never built from unparsed specs.
    pub fn parse(spec: &str) -> Result<Self> {
        let config_err = |reason: &str| InterceptError::Config {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = spec.splitn(3, ':');
        let (Some(when), Some(kind), Some(argument)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(config_err("expected format 'when:kind:argument'"));
        };

        let when = match when.to_ascii_lowercase().as_str() {
            "before" => Hook::Before,
            "after" => Hook::After,
            _ => return Err(config_err("expected 'before' or 'after'")),
        };

        let kind = match kind.to_ascii_lowercase().as_str() {
            "exec" => InterceptorKind::Exec,
            "container" => InterceptorKind::Container,
            "http" => InterceptorKind::Http,
            _ => return Err(config_err("expected 'exec', 'container', or 'http'")),
        };

        if argument.is_empty() {
            return Err(config_err("argument must not be empty"));
        }

        Ok(Self {
            when,
            kind,
            argument: argument.to_string(),
        })
    }

    /// Parse a full declaration list, rejecting on the first bad entry.
    pub fn parse_all(specs: &[String]) -> Result<Vec<Self>> {
        specs.iter().map(|s| Self::parse(s)).collect()
    }
}

/// Pipeline stage running one user-supplied hook.
pub struct CustomInterceptor {
    spec: InterceptorSpec,
    /// Client for the `http` kind, built once with the call timeout.
    http_client: Option<reqwest::Client>,
}

impl CustomInterceptor {
    /// Build the stage, constructing transport state up front so nothing
    /// fails lazily at call time.
    pub fn new(spec: InterceptorSpec) -> Result<Self> {
        let http_client = match spec.kind {
            InterceptorKind::Http => Some(
                reqwest::Client::builder()
                    .timeout(INTERCEPTOR_TIMEOUT)
                    .build()
                    .map_err(|e| InterceptError::Config {
                        spec: spec.argument.clone(),
                        reason: format!("building HTTP client: {e}"),
                    })?,
            ),
            _ => None,
        };

        Ok(Self { spec, http_client })
    }

    /// Run the hook with `payload` on its input, returning its output.
    async fn run(&self, payload: &[u8]) -> Result<Vec<u8>> {
        match self.spec.kind {
            InterceptorKind::Exec => self.run_exec(payload).await,
            InterceptorKind::Container => self.run_container(payload).await,
            InterceptorKind::Http => self.run_http(payload).await,
        }
    }

    async fn run_exec(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let command = Command::new("/bin/sh")
            .arg("-c")
            .arg(&self.spec.argument)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        self.feed_and_collect(command, payload).await
    }

    async fn run_container(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut words = self.spec.argument.split_whitespace();
        let image = words
            .next()
            .ok_or_else(|| InterceptError::Interceptor("missing container image".to_string()))?;

        // -i keeps stdin open so the payload actually reaches the
        // container's entrypoint.
        let mut args = vec!["run", "--rm", "-i", "--init", image];
        args.extend(words);

        let command = Command::new(CONTAINER_RUNTIME)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        self.feed_and_collect(command, payload).await
    }

    async fn run_http(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let client = self
            .http_client
            .as_ref()
            .ok_or_else(|| InterceptError::Interceptor("HTTP client not built".to_string()))?;

        let response = client
            .post(&self.spec.argument)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| InterceptError::Interceptor(format!("making HTTP request: {e}")))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| InterceptError::Interceptor(format!("reading HTTP response: {e}")))?;
        Ok(body.to_vec())
    }

    /// Write the payload to a spawned child and collect its stdout.
    async fn feed_and_collect(
        &self,
        spawned: std::io::Result<tokio::process::Child>,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        let mut child =
            spawned.map_err(|e| InterceptError::Interceptor(format!("spawning: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload)
                .await
                .map_err(|e| InterceptError::Interceptor(format!("writing payload: {e}")))?;
            // Dropping stdin closes the pipe and unblocks readers.
        }

        let output = timeout(INTERCEPTOR_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| InterceptError::Interceptor("interceptor timed out".to_string()))?
            .map_err(|e| InterceptError::Interceptor(format!("waiting for child: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InterceptError::Interceptor(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }

    /// Parse non-empty hook output as a complete tool result.
    fn parse_output(&self, out: &[u8]) -> Result<Value> {
        let result: CallToolResult = serde_json::from_slice(out)
            .map_err(|e| InterceptError::Interceptor(format!("unmarshalling output: {e}")))?;
        Ok(result.into_value())
    }
}

#[async_trait]
impl Middleware for CustomInterceptor {
    async fn handle(&self, call: &MethodCall, next: Next<'_>) -> Result<Value> {
        if !call.is_tool_call() {
            return next.run(call).await;
        }

        if self.spec.when == Hook::Before {
            let message = serde_json::to_vec(call)?;
            let out = self.run(&message).await?;

            // Non-empty output replaces the call entirely; the inner
            // handler and all remaining stages are skipped.
            if !out.is_empty() {
                debug!(argument = %self.spec.argument, "before-interceptor replaced the call");
                return self.parse_output(&out);
            }
        }

        let response = next.run(call).await?;

        if self.spec.when == Hook::After {
            let message = serde_json::to_vec(&response)?;
            let out = self.run(&message).await?;

            if !out.is_empty() {
                debug!(argument = %self.spec.argument, "after-interceptor replaced the result");
                return self.parse_output(&out);
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::pipeline::{MethodHandler, Pipeline, PipelineConfig};

    struct CountingHandler {
        calls: AtomicUsize,
        result: Value,
    }

    impl CountingHandler {
        fn returning(result: Value) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result,
            }
        }

        fn count(&self) -> usize {
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

    fn pipeline_with(specs: &[&str]) -> Pipeline {
        let specs: Vec<String> = specs.iter().map(|s| s.to_string()).collect();
        Pipeline::build(PipelineConfig {
            block_secrets: false,
            interceptors: InterceptorSpec::parse_all(&specs).unwrap(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_parse_valid_specs() {
        let spec = InterceptorSpec::parse("before:exec:/usr/local/bin/check").unwrap();
        assert_eq!(spec.when, Hook::Before);
        assert_eq!(spec.kind, InterceptorKind::Exec);
        assert_eq!(spec.argument, "/usr/local/bin/check");

        // The argument may itself contain colons.
        let spec = InterceptorSpec::parse("after:http:http://localhost:8080/hook").unwrap();
        assert_eq!(spec.kind, InterceptorKind::Http);
        assert_eq!(spec.argument, "http://localhost:8080/hook");

        let spec = InterceptorSpec::parse("BEFORE:Container:scanner:latest").unwrap();
        assert_eq!(spec.when, Hook::Before);
        assert_eq!(spec.kind, InterceptorKind::Container);
        assert_eq!(spec.argument, "scanner:latest");
    }

    #[test]
    fn test_parse_rejects_malformed_specs() {
        for bad in [
            "before:exec",
            "sideways:exec:/bin/x",
            "before:teleport:/bin/x",
            "before:exec:",
            "",
        ] {
            let result = InterceptorSpec::parse(bad);
            assert!(
                matches!(result, Err(InterceptError::Config { .. })),
                "spec {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_all_rejects_on_first_bad_entry() {
        let specs = vec![
            "before:exec:/bin/ok".to_string(),
            "nonsense".to_string(),
        ];
        assert!(InterceptorSpec::parse_all(&specs).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_before_exec_short_circuits_the_handler() {
        let pipeline = pipeline_with(&[
            r#"before:exec:echo '{"content":[{"type":"text","text":"intercepted"}]}'"#,
        ]);
        let handler = CountingHandler::returning(CallToolResult::text("real").into_value());

        let call = MethodCall::tool_call("anything", serde_json::json!({}));
        let response = pipeline.dispatch(&call, &handler).await.unwrap();

        assert_eq!(handler.count(), 0, "inner handler must be skipped");
        let result: CallToolResult = serde_json::from_value(response).unwrap();
        assert_eq!(result.text_content(), "intercepted");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_before_exec_with_empty_output_passes_through() {
        let pipeline = pipeline_with(&["before:exec:true"]);
        let handler = CountingHandler::returning(CallToolResult::text("real").into_value());

        let call = MethodCall::tool_call("anything", serde_json::json!({}));
        let response = pipeline.dispatch(&call, &handler).await.unwrap();

        assert_eq!(handler.count(), 1);
        let result: CallToolResult = serde_json::from_value(response).unwrap();
        assert_eq!(result.text_content(), "real");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_after_exec_receives_result_on_stdin() {
        // `cat` replaces the result with... the serialized result. The
        // round-trip proves the payload reached the hook's stdin intact.
        let pipeline = pipeline_with(&["after:exec:cat"]);
        let handler = CountingHandler::returning(CallToolResult::text("inner").into_value());

        let call = MethodCall::tool_call("anything", serde_json::json!({}));
        let response = pipeline.dispatch(&call, &handler).await.unwrap();

        assert_eq!(handler.count(), 1);
        let result: CallToolResult = serde_json::from_value(response).unwrap();
        assert_eq!(result.text_content(), "inner");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_after_exec_replaces_result() {
        let pipeline = pipeline_with(&[
            r#"after:exec:echo '{"content":[{"type":"text","text":"rewritten"}]}'"#,
        ]);
        let handler = CountingHandler::returning(CallToolResult::text("inner").into_value());

        let call = MethodCall::tool_call("anything", serde_json::json!({}));
        let response = pipeline.dispatch(&call, &handler).await.unwrap();

        let result: CallToolResult = serde_json::from_value(response).unwrap();
        assert_eq!(result.text_content(), "rewritten");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_exec_fails_the_call() {
        let pipeline = pipeline_with(&["before:exec:exit 3"]);
        let handler = CountingHandler::returning(Value::Null);

        let call = MethodCall::tool_call("anything", serde_json::json!({}));
        let err = pipeline.dispatch(&call, &handler).await.unwrap_err();
        assert!(matches!(err, InterceptError::Interceptor(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalid_output_is_an_error() {
        let pipeline = pipeline_with(&["before:exec:echo not-json"]);
        let handler = CountingHandler::returning(Value::Null);

        let call = MethodCall::tool_call("anything", serde_json::json!({}));
        let err = pipeline.dispatch(&call, &handler).await.unwrap_err();
        assert!(matches!(err, InterceptError::Interceptor(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_only_tool_calls_are_intercepted() {
        // `false` would fail the call if the hook ever ran.
        let pipeline = pipeline_with(&["before:exec:false"]);
        let handler = CountingHandler::returning(Value::Bool(true));

        let call = MethodCall::new("tools/list", Value::Null);
        let response = pipeline.dispatch(&call, &handler).await.unwrap();
        assert_eq!(response, Value::Bool(true));
        assert_eq!(handler.count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interceptors_run_in_declaration_order() {
        let pipeline = pipeline_with(&[
            "before:exec:true",
            r#"before:exec:echo '{"content":[{"type":"text","text":"second wins"}]}'"#,
        ]);
        let handler = CountingHandler::returning(CallToolResult::text("real").into_value());

        let call = MethodCall::tool_call("anything", serde_json::json!({}));
        let response = pipeline.dispatch(&call, &handler).await.unwrap();

        assert_eq!(handler.count(), 0);
        let result: CallToolResult = serde_json::from_value(response).unwrap();
        assert_eq!(result.text_content(), "second wins");
    }
}
