//! 决策服务抽象
//!
//! 路由、续接与各智能体的推理都通过 LlmClient::complete 调用外部模型：
//! 输入 system + 历史 + 用户消息，返回自由文本；文本的结构化解析由调用方负责。

use async_trait::async_trait;

use crate::memory::Message;

/// 约束型提示（路由 / 续接）在 system prompt 中列出可选输出的行前缀
pub const ALLOWED_OUTPUTS_MARKER: &str = "Allowed outputs:";

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成；Err 表示传输或服务端故障
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
