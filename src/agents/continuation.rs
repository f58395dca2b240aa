//! 续接智能体：任务智能体 done 之后，推断用户最初的目标并以用户口吻写出下一条请求
//!
//! 只读 SharedState；原始输出在此解析为 Continuation，不再向外传递。

use std::sync::Arc;

use crate::core::{AgentError, SharedState};
use crate::llm::{LlmClient, ALLOWED_OUTPUTS_MARKER};
use crate::memory::Message;

pub const NO_FURTHER_TASK: &str = "no_further_task";

const INSTRUCTIONS: &str = "You help a multi-agent assistant keep going after one of its \
assistants finished a sub-task.\n\
Look at the chat history to date and figure out what the user was originally trying to do. \
They might have had to do some sub-tasks to complete that task, but what we want is the original \
thing they started out trying to do. Formulate a sentence as if written by the user that asks to \
continue that task. If it seems like the user really completed their task, output \
no_further_task only.";

const REQUEST: &str = "What should happen next?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// 以用户口吻合成的下一条请求
    Next(String),
    NoFurtherTask,
}

impl Continuation {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('"').trim();
        if trimmed.is_empty() || trimmed == NO_FURTHER_TASK {
            Continuation::NoFurtherTask
        } else {
            Continuation::Next(trimmed.to_string())
        }
    }
}

pub struct ContinuationAgent {
    llm: Arc<dyn LlmClient>,
}

impl ContinuationAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn system_prompt(state: &SharedState) -> String {
        format!(
            "{}\n\nCurrent task state:\n{}\n\n{} <a sentence written as the user>, {}",
            INSTRUCTIONS,
            state.to_prompt_string(),
            ALLOWED_OUTPUTS_MARKER,
            NO_FURTHER_TASK
        )
    }

    pub async fn infer(
        &self,
        state: &SharedState,
        history: &[Message],
    ) -> Result<Continuation, AgentError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(Self::system_prompt(state)));
        messages.extend_from_slice(history);
        messages.push(Message::user(REQUEST));

        let raw = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::DecisionService)?;
        let continuation = Continuation::parse(&raw);
        tracing::info!(?continuation, "continuation inferred");
        Ok(continuation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_parse() {
        assert_eq!(Continuation::parse(" no_further_task \n"), Continuation::NoFurtherTask);
        assert_eq!(Continuation::parse(""), Continuation::NoFurtherTask);
        assert_eq!(
            Continuation::parse("Now I'd like to index the documents."),
            Continuation::Next("Now I'd like to index the documents.".into())
        );
    }

    #[tokio::test]
    async fn test_infer_sends_history_and_state() {
        let mock = Arc::new(MockLlmClient::scripted(["Please index the chunks with local."]));
        let agent = ContinuationAgent::new(mock.clone());
        let mut state = SharedState::new();
        state.record_input_dir(Some("/docs"));
        let history = vec![Message::user("preprocess then index /docs"), Message::assistant("Done.")];

        let next = agent.infer(&state, &history).await.unwrap();
        assert_eq!(next, Continuation::Next("Please index the chunks with local.".into()));

        let sent = &mock.calls()[0];
        assert!(sent[0].content.contains("\"input_dir\": \"/docs\""));
        assert_eq!(sent[1], history[0]);
        assert_eq!(sent.len(), 4);
        assert_eq!(state.input_dir.as_deref(), Some("/docs"));
    }

    #[tokio::test]
    async fn test_offline_mock_declares_no_further_task() {
        let agent = ContinuationAgent::new(Arc::new(MockLlmClient::new()));
        let next = agent.infer(&SharedState::new(), &[]).await.unwrap();
        assert_eq!(next, Continuation::NoFurtherTask);
    }

    #[tokio::test]
    async fn test_failure_is_decision_service_error() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_failure("503");
        let err = ContinuationAgent::new(mock).infer(&SharedState::new(), &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::DecisionService(_)));
    }
}
