//! 智能体动作目录与参数解析
//!
//! 动作以 `{"tool": "<name>", "args": {...}}` 调用；目录与调用格式的 JSON Schema（schemars）一起拼进 system prompt。
//! 七个参数记录动作（record_*）由各智能体共享，按名称写入 SharedState 对应字段。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

use crate::agents::planner::ToolCall;
use crate::core::SharedState;

/// 动作描述：名称、说明、参数 (名称, 说明)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [(&'static str, &'static str)],
}

impl ActionSpec {
    pub fn to_json(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .params
            .iter()
            .map(|(name, desc)| {
                (
                    name.to_string(),
                    serde_json::json!({ "type": "string", "description": desc }),
                )
            })
            .collect();
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": self.params.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
            }
        })
    }
}

/// 仅用于 Schema 生成
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 动作名，如 record_query、generate、done
    pub tool: String,
    /// 动作参数，参数记录动作统一使用 value
    pub args: HashMap<String, String>,
}

pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

pub fn catalogue_json(actions: &[ActionSpec]) -> String {
    let list: Vec<Value> = actions.iter().map(ActionSpec::to_json).collect();
    serde_json::to_string_pretty(&list).unwrap_or_else(|_| "[]".to_string())
}

const VALUE: &[(&str, &str)] = &[("value", "the value supplied by the user")];

pub const RECORD_INPUT_DIR: ActionSpec = ActionSpec {
    name: "record_input_dir",
    description: "Record the directory containing the documents to preprocess.",
    params: VALUE,
};
pub const RECORD_CHUNK_SIZE: ActionSpec = ActionSpec {
    name: "record_chunk_size",
    description: "Record the chunk size (a positive integer, in characters).",
    params: VALUE,
};
pub const RECORD_CHUNK_OVERLAP: ActionSpec = ActionSpec {
    name: "record_chunk_overlap",
    description: "Record the chunk overlap (a non-negative integer, in characters).",
    params: VALUE,
};
pub const RECORD_EMBEDDING_MODEL: ActionSpec = ActionSpec {
    name: "record_embedding_model",
    description: "Record the embedding model used for indexing.",
    params: VALUE,
};
pub const RECORD_QUERY: ActionSpec = ActionSpec {
    name: "record_query",
    description: "Record the question the user wants answered from the documents.",
    params: VALUE,
};
pub const RECORD_SEARCH_TYPE: ActionSpec = ActionSpec {
    name: "record_search_type",
    description: "Record the search type: vector, keyword or hybrid.",
    params: VALUE,
};
pub const RECORD_RERANKING_MODEL: ActionSpec = ActionSpec {
    name: "record_reranking_model",
    description: "Record the reranking model (use none to keep retrieval order).",
    params: VALUE,
};

pub const SETTERS: [ActionSpec; 7] = [
    RECORD_INPUT_DIR,
    RECORD_CHUNK_SIZE,
    RECORD_CHUNK_OVERLAP,
    RECORD_EMBEDDING_MODEL,
    RECORD_QUERY,
    RECORD_SEARCH_TYPE,
    RECORD_RERANKING_MODEL,
];

pub const DONE: ActionSpec = ActionSpec {
    name: "done",
    description: "Finish your task and hand control back. Pass the final response, \
                  or an empty response if the user now wants something else.",
    params: &[("response", "the final message for the user; may be empty")],
};

/// 字符串参数；数字与布尔也按文本接受
pub fn arg_str(args: &Value, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 非负整数参数；接受 500、"500"、" 500 "，其余为 None
pub fn arg_usize(args: &Value, key: &str) -> Option<usize> {
    match args.get(key)? {
        Value::Number(n) => n.as_u64().map(|v| v as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 执行参数记录动作；不是 record_* 时返回 None
pub fn apply_setter(state: &mut SharedState, call: &ToolCall) -> Option<String> {
    let args = &call.args;
    let (field, is_set) = match call.tool.as_str() {
        "record_input_dir" => ("input_dir", state.record_input_dir(arg_str(args, "value").as_deref())),
        "record_chunk_size" => ("chunk_size", state.record_chunk_size(arg_usize(args, "value"))),
        "record_chunk_overlap" => (
            "chunk_overlap",
            state.record_chunk_overlap(arg_usize(args, "value")),
        ),
        "record_embedding_model" => (
            "embedding_model",
            state.record_embedding_model(arg_str(args, "value").as_deref()),
        ),
        "record_query" => ("query", state.record_query(arg_str(args, "value").as_deref())),
        "record_search_type" => (
            "search_type",
            state.record_search_type(arg_str(args, "value").as_deref()),
        ),
        "record_reranking_model" => (
            "reranking_model",
            state.record_reranking_model(arg_str(args, "value").as_deref()),
        ),
        _ => return None,
    };
    tracing::debug!(field, is_set, "setter");
    Some(format!("{} is set: {}", field, is_set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(tool: &str, args: Value) -> ToolCall {
        ToolCall {
            tool: tool.to_string(),
            args,
        }
    }

    #[test]
    fn test_arg_parsing() {
        let args = json!({"a": 500, "b": " 50 ", "c": "x", "d": -1});
        assert_eq!(arg_usize(&args, "a"), Some(500));
        assert_eq!(arg_usize(&args, "b"), Some(50));
        assert_eq!(arg_usize(&args, "c"), None);
        assert_eq!(arg_usize(&args, "d"), None);
        assert_eq!(arg_str(&args, "a").as_deref(), Some("500"));
        assert_eq!(arg_str(&args, "missing"), None);
    }

    #[test]
    fn test_apply_setter_records_field() {
        let mut state = SharedState::new();
        let obs = apply_setter(&mut state, &call("record_chunk_size", json!({"value": "500"})));
        assert_eq!(obs.as_deref(), Some("chunk_size is set: true"));
        assert_eq!(state.chunk_size, Some(500));
    }

    #[test]
    fn test_apply_setter_unparseable_value() {
        let mut state = SharedState::new();
        let obs = apply_setter(&mut state, &call("record_chunk_overlap", json!({"value": "lots"})));
        assert_eq!(obs.as_deref(), Some("chunk_overlap is set: false"));
        assert_eq!(state, SharedState::new());
    }

    #[test]
    fn test_apply_setter_ignores_other_actions() {
        let mut state = SharedState::new();
        assert!(apply_setter(&mut state, &call("generate", json!({}))).is_none());
    }

    #[test]
    fn test_catalogue_and_schema() {
        let catalogue = catalogue_json(&[RECORD_QUERY, DONE]);
        assert!(catalogue.contains("record_query"));
        assert!(catalogue.contains("\"response\""));
        assert!(tool_call_schema_json().contains("tool"));
    }
}
