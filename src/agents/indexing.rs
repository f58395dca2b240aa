//! 索引智能体：收集 embedding_model，把上一次预处理落盘的文本块嵌入并写入索引

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::actions::{arg_str, ActionSpec, DONE, RECORD_EMBEDDING_MODEL};
use crate::agents::{finish_with, record_param, ActionOutcome, TaskAgent, ToolCall};
use crate::core::{AgentError, SharedState, Speaker};
use crate::executors::{DocumentExecutor, IndexExecutor};

const INSTRUCTIONS: &str = "You are the indexing assistant of a retrieval augmented generation \
workflow. The documents have already been chunked; your job is to embed the chunks into a \
vector index.\n\
You need the embedding model from the user. Record it with record_embedding_model (use \"local\" \
for the built-in offline embedder), then call index_documents. When indexing succeeds, call done \
with a short summary. If the user asks for something unrelated to indexing, call done with an \
empty response so another assistant can take over.";

const INDEX_DOCUMENTS: ActionSpec = ActionSpec {
    name: "index_documents",
    description: "Embed the preprocessed chunks with the recorded embedding model and write the index.",
    params: &[],
};

pub struct IndexingAgent {
    documents: Arc<dyn DocumentExecutor>,
    index: Arc<dyn IndexExecutor>,
}

impl IndexingAgent {
    pub fn new(documents: Arc<dyn DocumentExecutor>, index: Arc<dyn IndexExecutor>) -> Self {
        Self { documents, index }
    }

    async fn index(&self, state: &SharedState) -> String {
        let Some(model) = state.embedding_model.clone() else {
            return "Cannot index yet, missing: embedding_model".to_string();
        };

        let chunks = self.documents.load_persisted().await;
        if chunks.is_empty() {
            return "No preprocessed chunks were found. The documents need to be preprocessed first."
                .to_string();
        }

        let ack = self.index.embed_and_index(&chunks, &model).await;
        match &ack.location {
            Some(path) if !ack.is_empty() => format!(
                "Indexed {} chunks with {} into {} ({} skipped).",
                ack.indexed,
                model,
                path.display(),
                ack.skipped
            ),
            _ => format!(
                "Indexing with {} produced no entries ({} chunks skipped).",
                model, ack.skipped
            ),
        }
    }
}

#[async_trait]
impl TaskAgent for IndexingAgent {
    fn speaker(&self) -> Speaker {
        Speaker::Indexing
    }

    fn instructions(&self) -> &'static str {
        INSTRUCTIONS
    }

    fn actions(&self) -> Vec<ActionSpec> {
        vec![RECORD_EMBEDDING_MODEL, INDEX_DOCUMENTS, DONE]
    }

    async fn act(
        &mut self,
        state: &mut SharedState,
        call: &ToolCall,
    ) -> Result<ActionOutcome, AgentError> {
        match call.tool.as_str() {
            "index_documents" => Ok(ActionOutcome::Observation(self.index(state).await)),
            "done" => Ok(finish_with(
                state,
                arg_str(&call.args, "response").unwrap_or_default(),
            )),
            _ => record_param(&self.actions(), state, call),
        }
    }
}
