//! 生成智能体：收集 query / search_type / reranking_model，检索 -> 重排 -> 合成答案
//!
//! 智能体每轮重建；最近一次生成的答案放在 Dispatcher 持有的 AnswerSlot 里，
//! 这样 generate 与 done 落在不同轮次时，done 仍能把答案交给用户。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::agents::actions::{
    arg_str, ActionSpec, DONE, RECORD_QUERY, RECORD_RERANKING_MODEL, RECORD_SEARCH_TYPE,
};
use crate::agents::{finish_with, record_param, ActionOutcome, TaskAgent, ToolCall};
use crate::core::{AgentError, SharedState, Speaker};
use crate::executors::{AnswerSynthesizer, RetrievalExecutor};

const INSTRUCTIONS: &str = "You are the generation assistant of a retrieval augmented generation \
workflow. You answer the user's question from the indexed documents.\n\
You need three values: the query, the search type (vector, keyword or hybrid) and the reranking \
model (none keeps the retrieval order). Record each value the user gives you with the matching \
record_* action and ask for whatever is still missing.\n\
When all three are set, call generate. Then call done with the generated answer as the response \
so the user sees it. If the user asks for something unrelated to answering questions, call done \
with an empty response so another assistant can take over.";

const GENERATE: ActionSpec = ActionSpec {
    name: "generate",
    description: "Retrieve and rerank documents for the recorded query, then synthesize an answer.",
    params: &[],
};

/// 跨轮保存的最近一次答案
pub type AnswerSlot = Arc<Mutex<Option<String>>>;

pub struct GenerationAgent {
    retrieval: Arc<dyn RetrievalExecutor>,
    synthesizer: AnswerSynthesizer,
    last_answer: AnswerSlot,
}

impl GenerationAgent {
    pub fn new(
        retrieval: Arc<dyn RetrievalExecutor>,
        synthesizer: AnswerSynthesizer,
        last_answer: AnswerSlot,
    ) -> Self {
        Self {
            retrieval,
            synthesizer,
            last_answer,
        }
    }

    async fn generate(&mut self, state: &SharedState) -> Result<String, AgentError> {
        let (query, search_type, reranking_model) =
            match (&state.query, &state.search_type, &state.reranking_model) {
                (Some(q), Some(s), Some(r)) => (q.as_str(), s.as_str(), r.as_str()),
                _ => {
                    return Ok(format!(
                        "Cannot generate yet, missing: {}",
                        state.missing_generation().join(", ")
                    ))
                }
            };

        let documents = self
            .retrieval
            .retrieve_rerank(query, search_type, reranking_model)
            .await;
        let answer = self.synthesizer.synthesize(query, &documents).await?;
        tracing::info!(documents = documents.len(), "answer synthesized");
        *self.last_answer.lock().await = Some(answer.clone());

        let sources: Vec<&str> = documents.iter().map(|d| d.source.as_str()).collect();
        Ok(format!(
            "Answer: {}\n(based on {} retrieved documents: {})",
            answer,
            documents.len(),
            if sources.is_empty() {
                "none".to_string()
            } else {
                sources.join(", ")
            }
        ))
    }
}

#[async_trait]
impl TaskAgent for GenerationAgent {
    fn speaker(&self) -> Speaker {
        Speaker::Generation
    }

    fn instructions(&self) -> &'static str {
        INSTRUCTIONS
    }

    fn actions(&self) -> Vec<ActionSpec> {
        vec![
            RECORD_QUERY,
            RECORD_SEARCH_TYPE,
            RECORD_RERANKING_MODEL,
            GENERATE,
            DONE,
        ]
    }

    async fn act(
        &mut self,
        state: &mut SharedState,
        call: &ToolCall,
    ) -> Result<ActionOutcome, AgentError> {
        match call.tool.as_str() {
            "generate" => Ok(ActionOutcome::Observation(self.generate(state).await?)),
            "done" => {
                let last_answer = self.last_answer.lock().await.take();
                let response = arg_str(&call.args, "response")
                    .filter(|r| !r.trim().is_empty())
                    .or(last_answer)
                    .unwrap_or_default();
                Ok(finish_with(state, response))
            }
            _ => record_param(&self.actions(), state, call),
        }
    }
}
