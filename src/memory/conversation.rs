//! 对话记忆：跨智能体交接的完整消息日志
//!
//! 编排循环持有规范副本；每轮把快照交给被派发的智能体，轮末整体采用智能体返回的日志。
//! 日志受 token 预算约束，超出时从最旧的消息开始丢弃。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Token 估算：英文约 4 字符/token，CJK 约 1.5 字符/token
pub fn estimate_tokens(text: &str) -> usize {
    let (ascii, other) = text.chars().fold((0usize, 0usize), |(a, o), c| {
        if c.is_ascii() {
            (a + 1, o)
        } else {
            (a, o + 1)
        }
    });
    (ascii / 4 + (other as f64 / 1.5).ceil() as usize).max(1)
}

/// 有 token 上限的对话日志
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    token_limit: usize,
}

impl ConversationMemory {
    pub fn new(token_limit: usize) -> Self {
        Self {
            messages: Vec::new(),
            token_limit,
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.prune();
    }

    /// 整体替换为智能体返回的日志（不做逐条合并）
    pub fn set(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.prune();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 派发给智能体的只读快照
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn token_count(&self) -> usize {
        self.messages.iter().map(|m| estimate_tokens(&m.content)).sum()
    }

    /// 超出 token_limit 时丢弃最旧的消息，至少保留最后一条
    fn prune(&mut self) {
        let mut total = self.token_count();
        let mut drop = 0;
        while total > self.token_limit && drop + 1 < self.messages.len() {
            total -= estimate_tokens(&self.messages[drop].content);
            drop += 1;
        }
        if drop > 0 {
            tracing::debug!(dropped = drop, "conversation memory pruned");
            self.messages.drain(..drop);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_wholesale() {
        let mut memory = ConversationMemory::new(8000);
        memory.push(Message::user("hello"));
        memory.set(vec![
            Message::user("a"),
            Message::assistant("b"),
            Message::assistant("c"),
        ]);
        assert_eq!(memory.len(), 3);
        assert_eq!(memory.messages()[0], Message::user("a"));
    }

    #[test]
    fn test_prune_drops_oldest_first() {
        let mut memory = ConversationMemory::new(10);
        let long = "x".repeat(24); // 6 tokens
        memory.push(Message::user(long.clone()));
        memory.push(Message::assistant(long.clone()));
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.messages()[0].role, Role::Assistant);
    }

    #[test]
    fn test_prune_keeps_last_message_even_if_over_budget() {
        let mut memory = ConversationMemory::new(1);
        memory.push(Message::user("x".repeat(400)));
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("你好吗"), 2);
    }
}
