//! 用户边界：读取一行输入、展示一段输出
//!
//! StdioUser 用于终端运行（智能体回复为品红色）；ScriptedUser 用预置输入驱动循环并记录输出，供测试使用。

use std::collections::VecDeque;

use async_trait::async_trait;
use crossterm::style::Stylize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use crate::core::AgentError;

#[async_trait]
pub trait UserIo: Send {
    /// 输入结束时返回 None
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, AgentError>;

    /// 智能体回复
    async fn show_reply(&mut self, text: &str) -> Result<(), AgentError>;

    /// 系统提示，如退出信息
    async fn show_notice(&mut self, text: &str) -> Result<(), AgentError>;
}

pub struct StdioUser {
    lines: Lines<BufReader<Stdin>>,
}

impl StdioUser {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn write(&self, text: &str) -> Result<(), AgentError> {
        let mut out = tokio::io::stdout();
        out.write_all(text.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}

impl Default for StdioUser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserIo for StdioUser {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, AgentError> {
        self.write(prompt).await?;
        Ok(self.lines.next_line().await?)
    }

    async fn show_reply(&mut self, text: &str) -> Result<(), AgentError> {
        self.write(&format!("{}\n", text.magenta())).await
    }

    async fn show_notice(&mut self, text: &str) -> Result<(), AgentError> {
        self.write(&format!("{}\n", text)).await
    }
}

/// 测试用：按顺序给出输入，耗尽后视为输入结束
#[derive(Debug, Default)]
pub struct ScriptedUser {
    inputs: VecDeque<String>,
    pub prompts: Vec<String>,
    pub replies: Vec<String>,
    pub notices: Vec<String>,
}

impl ScriptedUser {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn remaining_inputs(&self) -> usize {
        self.inputs.len()
    }
}

#[async_trait]
impl UserIo for ScriptedUser {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, AgentError> {
        self.prompts.push(prompt.to_string());
        Ok(self.inputs.pop_front())
    }

    async fn show_reply(&mut self, text: &str) -> Result<(), AgentError> {
        self.replies.push(text.to_string());
        Ok(())
    }

    async fn show_notice(&mut self, text: &str) -> Result<(), AgentError> {
        self.notices.push(text.to_string());
        Ok(())
    }
}
