//! Planner：调用决策服务并把输出解析为动作调用或直接回复

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;

/// 动作调用：{"tool": "record_query", "args": {"value": "..."}}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannerOutput {
    Response(String),
    ToolCall(ToolCall),
}

/// 含可解析 JSON 且 tool 非空则为 ToolCall；提到 "tool" 却解析失败为 JsonParseError；其余为 Response
pub fn parse_llm_output(output: &str) -> Result<PlannerOutput, AgentError> {
    let trimmed = output.trim();

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or(rest.trim())
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            &trimmed[start..=end]
        } else {
            return Ok(PlannerOutput::Response(trimmed.to_string()));
        }
    } else {
        return Ok(PlannerOutput::Response(trimmed.to_string()));
    };

    let parsed: ToolCall = match serde_json::from_str(json_str) {
        Ok(p) => p,
        Err(e) if json_str.contains("\"tool\"") => {
            return Err(AgentError::JsonParseError(format!("{}: {}", e, json_str)))
        }
        Err(_) => return Ok(PlannerOutput::Response(trimmed.to_string())),
    };

    if parsed.tool.trim().is_empty() {
        Ok(PlannerOutput::Response(trimmed.to_string()))
    } else {
        Ok(PlannerOutput::ToolCall(parsed))
    }
}

pub struct Planner {
    llm: Arc<dyn LlmClient>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// system + messages 后调用决策服务；传输失败为 DecisionService
    pub async fn plan_with_system(
        &self,
        messages: &[Message],
        system: &str,
    ) -> Result<String, AgentError> {
        let mut full_messages = Vec::with_capacity(messages.len() + 1);
        full_messages.push(Message::system(system.to_string()));
        full_messages.extend_from_slice(messages);
        self.llm
            .complete(&full_messages)
            .await
            .map_err(AgentError::DecisionService)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text() {
        assert_eq!(
            parse_llm_output("  Which directory holds your documents? ").unwrap(),
            PlannerOutput::Response("Which directory holds your documents?".to_string())
        );
    }

    #[test]
    fn test_parse_tool_call() {
        let out = parse_llm_output(r#"{"tool": "record_chunk_size", "args": {"value": 500}}"#).unwrap();
        match out {
            PlannerOutput::ToolCall(tc) => {
                assert_eq!(tc.tool, "record_chunk_size");
                assert_eq!(tc.args["value"], 500);
            }
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_fenced_tool_call_without_args() {
        let out = parse_llm_output("Sure.\n```json\n{\"tool\": \"generate\"}\n```").unwrap();
        assert!(matches!(out, PlannerOutput::ToolCall(tc) if tc.tool == "generate"));
    }

    #[test]
    fn test_parse_broken_tool_json_is_error() {
        let err = parse_llm_output(r#"{"tool": "done", "args": {"response": }"#).unwrap_err();
        assert!(matches!(err, AgentError::JsonParseError(_)));
    }

    #[test]
    fn test_braces_in_prose_are_a_response() {
        let out = parse_llm_output("Use the {query} placeholder in your template.").unwrap();
        assert!(matches!(out, PlannerOutput::Response(_)));
    }
}
