//! MCP protocol value types.
//!
//! Toolgate does not implement the MCP transport; these are the in-process
//! representations of method calls flowing through the interceptor pipeline.
//! Params and results are kept as JSON values so every method can pass
//! through the pipeline, with typed views for `tools/call`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method name for tool invocations.
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Method name for session initialization.
pub const METHOD_INITIALIZE: &str = "initialize";

/// Method name for tool listing.
pub const METHOD_TOOLS_LIST: &str = "tools/list";

/// Method name for prompt listing.
pub const METHOD_PROMPTS_LIST: &str = "prompts/list";

/// Method name for resource listing.
pub const METHOD_RESOURCES_LIST: &str = "resources/list";

/// Method name for resource template listing.
pub const METHOD_RESOURCE_TEMPLATES_LIST: &str = "resourceTemplates/list";

/// A protocol method invocation entering the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodCall {
    /// Method name (e.g. "tools/call").
    pub method: String,

    /// Method parameters, untyped.
    #[serde(default)]
    pub params: Value,
}

impl MethodCall {
    /// Create a new method call.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Create a `tools/call` invocation for the given tool.
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: METHOD_TOOLS_CALL.to_string(),
            params: serde_json::json!({
                "name": name.into(),
                "arguments": arguments,
            }),
        }
    }

    /// Check whether this call is a tool invocation.
    pub fn is_tool_call(&self) -> bool {
        self.method == METHOD_TOOLS_CALL
    }

    /// Typed view of the params for a `tools/call` method.
    ///
    /// Returns `None` for other methods or malformed params.
    pub fn tool_params(&self) -> Option<CallToolParams> {
        if !self.is_tool_call() {
            return None;
        }
        serde_json::from_value(self.params.clone()).ok()
    }
}

/// Parameters of a `tools/call` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Name of the tool being invoked.
    pub name: String,

    /// Tool arguments, untyped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// A single content block in a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Plain text content.
    Text {
        /// The text payload.
        text: String,
    },

    /// Base64-encoded image content.
    Image {
        /// Base64 image data.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },

    /// An embedded resource reference.
    Resource {
        /// Resource URI.
        uri: String,
    },
}

impl Content {
    /// Create a text content block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Result of a `tools/call` invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Content blocks returned by the tool.
    #[serde(default)]
    pub content: Vec<Content>,

    /// Whether the result represents a tool-level error.
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// Create a successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: false,
        }
    }

    /// Create a tool-level error result.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: true,
        }
    }

    /// Concatenate all text content blocks.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for content in &self.content {
            if let Content::Text { text } = content {
                out.push_str(text);
            }
        }
        out
    }

    /// Convert into an untyped JSON value.
    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_params_roundtrip() {
        let call = MethodCall::tool_call("fetch", serde_json::json!({"url": "https://x"}));
        assert!(call.is_tool_call());

        let params = call.tool_params().unwrap();
        assert_eq!(params.name, "fetch");
        assert_eq!(params.arguments.unwrap()["url"], "https://x");
    }

    #[test]
    fn test_tool_params_rejects_other_methods() {
        let call = MethodCall::new("tools/list", Value::Null);
        assert!(call.tool_params().is_none());
    }

    #[test]
    fn test_result_text_content_concatenates() {
        let result = CallToolResult {
            content: vec![
                Content::text("a"),
                Content::Image {
                    data: "xxx".into(),
                    mime_type: "image/png".into(),
                },
                Content::text("b"),
            ],
            is_error: false,
        };
        assert_eq!(result.text_content(), "ab");
    }

    #[test]
    fn test_result_serializes_is_error_camel_case() {
        let json = serde_json::to_value(CallToolResult::error("boom")).unwrap();
        assert_eq!(json["isError"], true);
        assert_eq!(json["content"][0]["type"], "text");
    }
}
