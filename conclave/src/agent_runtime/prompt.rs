use serde_json::json;

use crate::llm::{build_tool_instructions, ToolCallCapability, ToolSpec};
use crate::memory::ScoredRecord;

/// Limit on retrieved-memory records folded into the prompt.
pub const MAX_MEMORY_RECORDS: usize = 5;

/// Step 1 of `process_streaming`: concatenate the agent's system prompt
/// verbatim, a retrieved-memory block, an optional running summary, then
/// hand back to the caller to append the conversation window and new
/// message as chat turns. No runtime text is ever added to `system_prompt`
/// itself — instructions for text-only tool calling are appended as a
/// separate block, never mixed into the persona text.
pub fn assemble_system_prompt(
    system_prompt: &str,
    memories: &[ScoredRecord],
    running_summary: Option<&str>,
    tools: &[ToolSpec],
    capability: ToolCallCapability,
) -> String {
    let mut sections = vec![system_prompt.to_string()];

    if !memories.is_empty() {
        let mut block = String::from("Relevant prior context:\n");
        for scored in memories.iter().take(MAX_MEMORY_RECORDS) {
            block.push_str(&format!("- (score {:.3}) {}\n", scored.score, scored.record.content));
        }
        sections.push(block);
    }

    if let Some(summary) = running_summary {
        if !summary.trim().is_empty() {
            sections.push(format!("Summary of earlier conversation:\n{summary}"));
        }
    }

    if capability == ToolCallCapability::TextOnly && !tools.is_empty() {
        sections.push(build_tool_instructions(tools));
    }

    sections.join("\n\n")
}

/// The fixed tool catalog exposed to agents whose config enables tools,
/// filtered to an agent's `tool_allow_list`.
pub fn tool_specs_for_allow_list(allow_list: &[String]) -> Vec<ToolSpec> {
    catalog().into_iter().filter(|spec| allow_list.iter().any(|name| name == &spec.name)).collect()
}

fn catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "read_file".to_string(),
            description: "Read a UTF-8 text file under the workspace root".to_string(),
            parameters: json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]}),
        },
        ToolSpec {
            name: "write_file".to_string(),
            description: "Write (create or overwrite) a UTF-8 text file under the workspace root".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}, "content": {"type": "string"}},
                "required": ["path", "content"]
            }),
        },
        ToolSpec {
            name: "list_directory".to_string(),
            description: "List entries in a directory under the workspace root".to_string(),
            parameters: json!({"type": "object", "properties": {"path": {"type": "string"}}}),
        },
        ToolSpec {
            name: "create_directory".to_string(),
            description: "Create a directory (and parents) under the workspace root".to_string(),
            parameters: json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]}),
        },
        ToolSpec {
            name: "delete_file".to_string(),
            description: "Delete a file or directory under the workspace root".to_string(),
            parameters: json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]}),
        },
        ToolSpec {
            name: "file_exists".to_string(),
            description: "Check whether a path exists under the workspace root".to_string(),
            parameters: json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]}),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_never_gains_runtime_text_for_native_providers() {
        let prompt = assemble_system_prompt("You are @backend.", &[], None, &[], ToolCallCapability::Native);
        assert_eq!(prompt, "You are @backend.");
    }

    #[test]
    fn text_only_providers_get_the_tag_instructions_appended() {
        let tools = tool_specs_for_allow_list(&["read_file".to_string()]);
        let prompt = assemble_system_prompt("You are @backend.", &[], None, &tools, ToolCallCapability::TextOnly);
        assert!(prompt.contains("tool_call"));
    }

    #[test]
    fn allow_list_filters_the_catalog() {
        let specs = tool_specs_for_allow_list(&["read_file".to_string(), "made_up".to_string()]);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "read_file");
    }
}
