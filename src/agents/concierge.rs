//! Concierge：非粘性的接待智能体
//!
//! 介绍可用的工作流，并用全部七个 record_* 动作记录用户给出的参数；不调用执行器，也不会 done。

use async_trait::async_trait;

use crate::agents::actions::{ActionSpec, SETTERS};
use crate::agents::{record_param, ActionOutcome, TaskAgent, ToolCall};
use crate::core::{AgentError, SharedState, Speaker};

const INSTRUCTIONS: &str = "You are the concierge of a retrieval augmented generation assistant. \
The assistant offers three workflows:\n\
1. data preprocessing: needs an input directory, a chunk size and a chunk overlap\n\
2. indexing: needs preprocessed documents and an embedding model (\"local\" works offline)\n\
3. generation: needs a query, a search type (vector, keyword or hybrid) and a reranking model \
(\"none\" keeps retrieval order)\n\
Greet the user, explain what they can do and find out what they want. Look at the current task \
state to see which values are missing for the workflow the user wants, and ask for them. Record \
every value the user gives you with the matching record_* action. You do not run any workflow \
yourself; once the values are recorded, tell the user you are ready to proceed.";

#[derive(Debug, Default)]
pub struct ConciergeAgent;

impl ConciergeAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskAgent for ConciergeAgent {
    fn speaker(&self) -> Speaker {
        Speaker::Concierge
    }

    fn instructions(&self) -> &'static str {
        INSTRUCTIONS
    }

    fn actions(&self) -> Vec<ActionSpec> {
        SETTERS.to_vec()
    }

    async fn act(
        &mut self,
        state: &mut SharedState,
        call: &ToolCall,
    ) -> Result<ActionOutcome, AgentError> {
        record_param(&self.actions(), state, call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_records_any_parameter() {
        let mut agent = ConciergeAgent::new();
        let mut state = SharedState::new();
        let out = agent
            .act(
                &mut state,
                &ToolCall {
                    tool: "record_embedding_model".into(),
                    args: json!({"value": "local"}),
                },
            )
            .await
            .unwrap();
        assert_eq!(out, ActionOutcome::Observation("embedding_model is set: true".into()));
        assert_eq!(state.current_speaker, None);
    }

    #[tokio::test]
    async fn test_cannot_finish() {
        let mut agent = ConciergeAgent::new();
        let mut state = SharedState::new();
        let err = agent
            .act(
                &mut state,
                &ToolCall {
                    tool: "done".into(),
                    args: json!({}),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnknownAction(_)));
        assert!(!state.just_finished);
    }
}
