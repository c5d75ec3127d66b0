//! The XML tag convention text-only providers fall back to:
//! `<tool_call name="...">`</tool_call>`, with the caller (the agent
//! runtime) responsible for parsing the tags out of accumulated text.

use serde_json::{Map, Value};

use super::{ToolCall, ToolSpec};

/// Fixed instruction block prepended to the system prompt for text-only
/// providers, describing the tag convention and the available tools.
pub fn build_tool_instructions(tools: &[ToolSpec]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let mut out = String::from(
        "You can call tools by emitting XML tags of the form \
         <tool_call name=\"tool_name\"><arg_name>value</arg_name>...</tool_call>. \
         Available tools:\n",
    );
    for tool in tools {
        out.push_str(&format!("- {}: {}\n", tool.name, tool.description));
    }
    out
}

/// Extract `<tool_call>` tags from `text`, returning the text with those
/// tags removed plus the parsed calls in document order. Malformed tags are
/// left in place rather than dropped silently.
pub fn parse_tool_calls_from_text(text: &str) -> (String, Vec<ToolCall>) {
    let mut clean = String::with_capacity(text.len());
    let mut calls = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("<tool_call") {
        clean.push_str(&rest[..start]);
        let Some(tag_end) = rest[start..].find('>') else {
            clean.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let tag_end = start + tag_end;
        let Some(name) = extract_attr(&rest[start..=tag_end], "name") else {
            clean.push_str(&rest[start..=tag_end]);
            rest = &rest[tag_end + 1..];
            continue;
        };

        let Some(close_rel) = rest[tag_end + 1..].find("</tool_call>") else {
            clean.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let body_start = tag_end + 1;
        let body_end = body_start + close_rel;
        let body = &rest[body_start..body_end];
        let arguments = parse_args(body);
        calls.push(ToolCall { id: format!("call_{}", calls.len()), name, arguments });

        rest = &rest[body_end + "</tool_call>".len()..];
    }
    clean.push_str(rest);
    (clean.trim().to_string(), calls)
}

fn extract_attr(tag: &str, attr: &str) -> Option<String> {
    let needle = format!("{attr}=\"");
    let start = tag.find(&needle)? + needle.len();
    let end = tag[start..].find('"')? + start;
    Some(tag[start..end].to_string())
}

/// `<arg_name>value</arg_name>` pairs inside a tool call body, collected
/// into a flat JSON object.
fn parse_args(body: &str) -> Value {
    let mut map = Map::new();
    let mut rest = body;
    while let Some(open) = rest.find('<') {
        let Some(tag_close) = rest[open..].find('>') else { break };
        let tag_close = open + tag_close;
        let tag_name = rest[open + 1..tag_close].trim().to_string();
        if tag_name.is_empty() || tag_name.starts_with('/') {
            rest = &rest[tag_close + 1..];
            continue;
        }
        let closing = format!("</{tag_name}>");
        let Some(close_rel) = rest[tag_close + 1..].find(&closing) else { break };
        let value_start = tag_close + 1;
        let value_end = value_start + close_rel;
        map.insert(tag_name, Value::String(rest[value_start..value_end].to_string()));
        rest = &rest[value_end + closing.len()..];
    }
    Value::Object(map)
}
