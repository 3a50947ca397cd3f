// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming parser for the agent's stream-json output.
//!
//! The agent emits one JSON object per line. A line buffer accumulates
//! partial frames until a newline terminates them; recognised events
//! become typed `@@…@@` marker chunks, unparseable lines are logged and
//! dropped.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Longest excerpt taken from a structured `content` result.
const CONTENT_EXCERPT_MAX: usize = 500;
/// Longest query/url/prompt excerpt in a tool marker.
const TOOL_ARG_MAX: usize = 100;

/// Top-level inbound event from the agent's stream-json output.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum InboundEvent {
    #[serde(rename = "assistant")]
    Assistant { message: AssistantMessageBody },
    #[serde(rename = "result")]
    Result {
        #[serde(default)]
        result: Value,
    },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta {
        #[serde(default)]
        delta: Delta,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
struct AssistantMessageBody {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[allow(dead_code)]
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    text: Option<String>,
}

/// Line-buffered stream-json parser producing output-log chunks.
#[derive(Default)]
pub struct StreamParser {
    line_buffer: String,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw stdout bytes; returns the chunks to append to the
    /// output log, in order.
    pub fn feed(&mut self, data: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        self.line_buffer.push_str(data);
        while let Some(newline) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=newline).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<InboundEvent>(line) {
                Ok(event) => chunks.extend(render_event(event)),
                Err(e) => debug!(error = %e, "unparseable stream-json line dropped"),
            }
        }
        chunks
    }

    /// Flush a trailing unterminated line (process exit).
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.line_buffer);
        let line = rest.trim();
        if line.is_empty() {
            return Vec::new();
        }
        match serde_json::from_str::<InboundEvent>(line) {
            Ok(event) => render_event(event),
            Err(e) => {
                debug!(error = %e, "unparseable trailing line dropped");
                Vec::new()
            }
        }
    }
}

fn render_event(event: InboundEvent) -> Vec<String> {
    match event {
        InboundEvent::Assistant { message } => message
            .content
            .into_iter()
            .filter_map(render_content_block)
            .collect(),
        InboundEvent::Result { result } => vec![render_result(&result)],
        InboundEvent::ContentBlockDelta { delta } => {
            delta.text.map(|t| vec![t]).unwrap_or_default()
        }
        InboundEvent::Other => Vec::new(),
    }
}

fn render_content_block(block: ContentBlock) -> Option<String> {
    match block {
        ContentBlock::Text { text } => Some(format!("@@TEXT@@\n{}\n@@END@@\n", text)),
        ContentBlock::ToolUse { name, input, .. } => Some(render_tool_use(&name, &input)),
        ContentBlock::Other => None,
    }
}

fn render_tool_use(name: &str, input: &Value) -> String {
    let str_field = |key: &str| input.get(key).and_then(Value::as_str);
    match name {
        "Bash" => format!(
            "@@TOOL:Bash@@\n@@CMD:{}@@\n",
            str_field("command").unwrap_or("")
        ),
        "Write" | "Edit" | "Read" => format!(
            "@@TOOL:{}@@\n@@FILE:{}@@\n",
            name,
            str_field("file_path").unwrap_or("")
        ),
        "Glob" | "Grep" => format!(
            "@@TOOL:{}@@\n@@CMD:{}@@\n",
            name,
            str_field("pattern").unwrap_or("")
        ),
        "WebSearch" | "WebFetch" | "Task" => {
            let arg = str_field("query")
                .or_else(|| str_field("url"))
                .or_else(|| str_field("description"))
                .or_else(|| str_field("prompt"))
                .unwrap_or("");
            format!("@@TOOL:{}@@\n@@CMD:{}@@\n", name, truncate(arg, TOOL_ARG_MAX))
        }
        other => format!("@@TOOL:{}@@\n", other),
    }
}

fn render_result(result: &Value) -> String {
    let text = if let Some(s) = result.as_str() {
        s.to_string()
    } else if let Some(obj) = result.as_object() {
        if let Some(stdout) = obj.get("stdout").and_then(Value::as_str) {
            let mut text = stdout.to_string();
            if let Some(stderr) = obj.get("stderr").and_then(Value::as_str) {
                if !stderr.is_empty() {
                    text.push_str(&format!("\n@@STDERR@@\n{}", stderr));
                }
            }
            text
        } else if let Some(output) = obj.get("output").and_then(Value::as_str) {
            output.to_string()
        } else if let Some(content) = obj.get("content") {
            let raw = content
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| content.to_string());
            if raw.len() > CONTENT_EXCERPT_MAX {
                format!("{}... (truncated)", truncate(&raw, CONTENT_EXCERPT_MAX))
            } else {
                raw
            }
        } else {
            result.to_string()
        }
    } else {
        result.to_string()
    };
    format!("@@OUTPUT@@\n{}\n@@END@@\n", text)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
