//! 记忆层：跨智能体对话日志与检索用分词

pub mod conversation;
pub mod tokenizer;

pub use conversation::{estimate_tokens, ConversationMemory, Message, Role};
