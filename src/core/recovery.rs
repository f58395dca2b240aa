//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供智能体工具调用循环决定是重试还是终止。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作（重试提示 / 终止）
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// `available` 为当前智能体可用的动作名，用于未知动作时的纠正提示
    pub fn handle(&self, err: &AgentError, available: &[String]) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your last output was not valid JSON: {raw}. \
                 To call an action output exactly one JSON object and nothing else, \
                 in the form {{\"tool\": \"action_name\", \"args\": {{...}}}}. \
                 To answer the user, reply in plain text without any JSON."
            )),
            AgentError::UnknownAction(name) => {
                let list = if available.is_empty() {
                    "none; answer the user in plain text".to_string()
                } else {
                    available.join(", ")
                };
                RecoveryAction::RetryWithPrompt(format!(
                    "The action '{name}' does not exist. Available actions: {list}."
                ))
            }
            AgentError::Executor(msg) => RecoveryAction::RetryWithPrompt(format!(
                "The last action failed: {msg}. Tell the user what went wrong or try again."
            )),
            _ => RecoveryAction::Abort,
        }
    }
}
