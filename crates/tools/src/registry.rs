use std::{collections::BTreeMap, sync::Arc};

use {
    anyhow::Result,
    async_trait::async_trait,
    parley_channels::Error,
    serde::de::DeserializeOwned,
    serde_json::{Value, json},
    tracing::{debug, error, warn},
};

#[cfg(feature = "metrics")]
use parley_metrics::{counter, labels, tools as tool_metrics};

/// Externally callable tool.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, params: Value) -> Result<Value>;
}

/// Decode tool arguments, reporting shape errors as invalid input.
pub fn parse_args<T: DeserializeOwned>(params: Value) -> Result<T> {
    let params = if params.is_null() {
        json!({})
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| Error::invalid_input(format!("invalid arguments: {e}")).into())
}

/// Registry of available tools, keyed by name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn AgentTool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, tool: Box<dyn AgentTool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::from(tool));
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn list_schemas(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.parameters_schema(),
                })
            })
            .collect()
    }

    /// Run a tool and always produce a payload.
    ///
    /// Success payloads get `"ok": true`; every failure becomes
    /// `{"ok": false, "error": ...}`. Internal errors are logged in full and
    /// reported with a short reason only.
    pub async fn call(&self, name: &str, params: Value) -> Value {
        #[cfg(feature = "metrics")]
        counter!(tool_metrics::CALLS_TOTAL, labels::TOOL => name.to_string()).increment(1);

        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "unknown tool");
            return failure(format!("unknown tool '{name}'"));
        };

        match tool.execute(params).await {
            Ok(Value::Object(mut payload)) => {
                payload.insert("ok".into(), Value::Bool(true));
                debug!(tool = name, "tool call succeeded");
                Value::Object(payload)
            },
            Ok(other) => json!({ "ok": true, "result": other }),
            Err(e) => {
                let (kind, message) = describe_failure(name, &e);

                #[cfg(feature = "metrics")]
                counter!(
                    tool_metrics::ERRORS_TOTAL,
                    labels::TOOL => name.to_string(),
                    labels::ERROR_TYPE => kind
                )
                .increment(1);

                debug!(tool = name, error_type = kind, "tool call failed");
                failure(message)
            },
        }
    }
}

fn failure(message: String) -> Value {
    json!({ "ok": false, "error": message })
}

/// Stable kind and caller-facing message for a tool failure.
fn describe_failure(tool: &str, err: &anyhow::Error) -> (&'static str, String) {
    match err.downcast_ref::<Error>() {
        Some(e) if e.is_user_facing() => {
            warn!(tool, error = %e, "tool call rejected");
            (e.kind(), e.to_string())
        },
        Some(e) => {
            error!(tool, error = ?err, "tool call failed with an internal error");
            (e.kind(), format!("internal error while running {tool}"))
        },
        None => {
            error!(tool, error = ?err, "tool call failed with an internal error");
            ("internal", format!("internal error while running {tool}"))
        },
    }
}
