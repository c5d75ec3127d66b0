use crate::llm::ToolCall;
use crate::tools::{ToolError, ToolExecutor};

/// Execute one tool call and format a short human-readable note (e.g.
/// `✓ Wrote file: x.py`). Tool errors are never fatal to the run — they are
/// formatted as an in-band failure note instead of propagated.
pub async fn execute_and_format(executor: &ToolExecutor, call: &ToolCall) -> String {
    match run(executor, call).await {
        Ok(note) => format!("✓ {note}"),
        Err(err) => format!("✗ {}: {err}", call.name),
    }
}

async fn run(executor: &ToolExecutor, call: &ToolCall) -> Result<String, ToolError> {
    let path = |field: &str| -> Result<String, ToolError> {
        call.arguments
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ToolError::IoFailure(format!("{}: missing `{field}` argument", call.name)))
    };

    match call.name.as_str() {
        "read_file" => {
            let p = path("path")?;
            let content = executor.read_file(&p).await?;
            Ok(format!("Read file: {p} ({} bytes)", content.len()))
        }
        "write_file" => {
            let p = path("path")?;
            let content = call.arguments.get("content").and_then(|v| v.as_str()).unwrap_or_default();
            executor.write_file(&p, content).await?;
            Ok(format!("Wrote file: {p}"))
        }
        "list_directory" => {
            let p = call.arguments.get("path").and_then(|v| v.as_str()).map(str::to_string);
            let entries = executor.list_directory(p.as_deref()).await?;
            Ok(format!("Listed directory: {} entries", entries.len()))
        }
        "create_directory" => {
            let p = path("path")?;
            executor.create_directory(&p).await?;
            Ok(format!("Created directory: {p}"))
        }
        "delete_file" => {
            let p = path("path")?;
            executor.delete_file(&p).await?;
            Ok(format!("Deleted: {p}"))
        }
        "file_exists" => {
            let p = path("path")?;
            let exists = executor.file_exists(&p).await?;
            Ok(format!("Path {p} {}", if exists { "exists" } else { "does not exist" }))
        }
        other => Err(ToolError::IoFailure(format!("unknown tool: {other}"))),
    }
}
