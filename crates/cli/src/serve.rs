//! JSON-lines tool server over stdin/stdout.
//!
//! Each input line is `{"id": .., "tool": "..", "arguments": {..}}`; each
//! output line is `{"id": .., "result": {..}}`. Calls are answered in order.

use {
    parley_tools::ToolRegistry,
    serde::Deserialize,
    serde_json::{Value, json},
    tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    tracing::{debug, warn},
};

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    tool: String,
    #[serde(default)]
    arguments: Value,
}

/// Answer requests until the reader reaches EOF. Returns the number of
/// requests handled.
pub async fn serve<R, W>(registry: &ToolRegistry, reader: R, mut writer: W) -> anyhow::Result<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                debug!(tool = %request.tool, "tool call");
                let result = registry.call(&request.tool, request.arguments).await;
                json!({ "id": request.id, "result": result })
            },
            Err(e) => {
                warn!(error = %e, "malformed request line");
                json!({
                    "id": Value::Null,
                    "result": { "ok": false, "error": format!("malformed request: {e}") },
                })
            },
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
        handled += 1;
    }

    Ok(handled)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        parley_tools::{AgentTool, parse_args},
        tokio::io::BufReader,
    };

    struct Shout;

    #[derive(Deserialize)]
    struct ShoutArgs {
        text: String,
    }

    #[async_trait]
    impl AgentTool for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn description(&self) -> &str {
            "Upper-case the text"
        }

        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn execute(&self, params: Value) -> anyhow::Result<Value> {
            let args: ShoutArgs = parse_args(params)?;
            Ok(json!({ "text": args.text.to_uppercase() }))
        }
    }

    async fn run(input: &str) -> Vec<Value> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Shout));
        let mut out = Vec::new();
        serve(&registry, BufReader::new(input.as_bytes()), &mut out)
            .await
            .unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn answers_each_line_in_order() {
        let responses = run(concat!(
            r#"{"id": 1, "tool": "shout", "arguments": {"text": "hi"}}"#,
            "\n\n",
            r#"{"id": "b", "tool": "missing"}"#,
            "\n",
        ))
        .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["ok"], true);
        assert_eq!(responses[0]["result"]["text"], "HI");
        assert_eq!(responses[1]["id"], "b");
        assert_eq!(responses[1]["result"]["ok"], false);
        assert_eq!(responses[1]["result"]["error"], "unknown tool 'missing'");
    }

    #[tokio::test]
    async fn malformed_lines_get_an_error_and_the_loop_continues() {
        let responses = run(concat!(
            "not json\n",
            r#"{"id": 2, "tool": "shout", "arguments": {"text": "ok"}}"#,
        ))
        .await;

        assert_eq!(responses.len(), 2);
        assert!(responses[0]["id"].is_null());
        assert_eq!(responses[0]["result"]["ok"], false);
        assert!(
            responses[0]["result"]["error"]
                .as_str()
                .unwrap()
                .starts_with("malformed request")
        );
        assert_eq!(responses[1]["result"]["text"], "OK");
    }

    #[tokio::test]
    async fn bad_arguments_are_reported_not_raised() {
        let responses = run(r#"{"id": 3, "tool": "shout", "arguments": {"text": 5}}"#).await;
        assert_eq!(responses[0]["result"]["ok"], false);
        assert!(
            responses[0]["result"]["error"]
                .as_str()
                .unwrap()
                .contains("invalid arguments")
        );
    }
}
