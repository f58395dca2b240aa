//! 编排错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：智能体单轮内的解析错误 / 未知动作 -> RetryWithPrompt；
//! 决策服务故障 -> Abort（整个会话的唯一致命边界）。

use thiserror::Error;

/// 编排层与智能体运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 决策服务（LLM）调用失败：不可恢复，终止会话
    #[error("Decision service failure: {0}")]
    DecisionService(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    /// 模型调用了当前智能体不存在的动作
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// 执行器内部失败（通常在执行器边界被吞掉并降级为空结果）
    #[error("Executor failure: {0}")]
    Executor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AgentError {
    /// 是否为会话级致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(self, AgentError::DecisionService(_))
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 将提示注入下一步，让模型重试（如 JSON 格式错误、调用了不存在的动作）
    RetryWithPrompt(String),
    /// 终止当前会话
    Abort,
}
