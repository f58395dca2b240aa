//! Mock LLM 客户端（离线运行与测试，无需 API）
//!
//! - 脚本模式：按顺序返回预置回复，并记录每次调用收到的消息，便于断言
//! - 脚本耗尽后：约束型提示返回允许列表中的最后一项（路由 -> Concierge，续接 -> no_further_task），
//!   其余情况回显最后一条 User 消息

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, ALLOWED_OUTPUTS_MARKER};
use crate::memory::{Message, Role};

/// 预置一条回复或一次故障
#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Failure(String),
}

#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回给定回复
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for r in replies {
            mock.push_reply(r);
        }
        mock
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Scripted::Reply(reply.into()));
        }
    }

    /// 下一次调用返回 Err，模拟决策服务故障
    pub fn push_failure(&self, reason: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Scripted::Failure(reason.into()));
        }
    }

    /// 已收到的全部调用（每次调用的完整消息列表）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn fallback(messages: &[Message]) -> String {
        let constrained = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .flat_map(|m| m.content.lines())
            .find_map(|line| line.trim().strip_prefix(ALLOWED_OUTPUTS_MARKER));
        if let Some(options) = constrained {
            if let Some(last) = options.split(',').map(str::trim).filter(|o| !o.is_empty()).last() {
                return last.to_string();
            }
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        format!("Echo from Mock: {}", last_user)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Scripted::Reply(r)) => Ok(r),
            Some(Scripted::Failure(e)) => Err(e),
            None => Ok(Self::fallback(messages)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_echo() {
        let mock = MockLlmClient::scripted(["first"]);
        let msgs = vec![Message::user("hi")];
        assert_eq!(mock.complete(&msgs).await.unwrap(), "first");
        assert_eq!(mock.complete(&msgs).await.unwrap(), "Echo from Mock: hi");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_constrained_fallback_picks_last_option() {
        let mock = MockLlmClient::new();
        let msgs = vec![
            Message::system(format!("Pick one.\n{} indexing, generation, Concierge", ALLOWED_OUTPUTS_MARKER)),
            Message::user("hello"),
        ];
        assert_eq!(mock.complete(&msgs).await.unwrap(), "Concierge");
    }

    #[tokio::test]
    async fn test_failure() {
        let mock = MockLlmClient::new();
        mock.push_failure("boom");
        assert_eq!(mock.complete(&[]).await, Err("boom".to_string()));
    }
}
