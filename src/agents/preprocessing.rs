//! 预处理智能体：收集 input_dir / chunk_size / chunk_overlap，调用文档执行器分块并落盘

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::actions::{
    arg_str, ActionSpec, DONE, RECORD_CHUNK_OVERLAP, RECORD_CHUNK_SIZE,
    RECORD_INPUT_DIR,
};
use crate::agents::{finish_with, record_param, ActionOutcome, TaskAgent, ToolCall};
use crate::core::{AgentError, SharedState, Speaker};
use crate::executors::DocumentExecutor;

const INSTRUCTIONS: &str = "You are the data preprocessing assistant of a retrieval augmented \
generation workflow. Your job is to turn a directory of documents into chunks.\n\
You need three values from the user: the input directory, the chunk size and the chunk overlap. \
Use the matching record_* action for every value the user gives you, then ask for whatever is \
still missing. The current task state shows what is already set.\n\
When all three are set, call process_documents. When it reports success, call done with a short \
summary of what was processed. If the user asks for something unrelated to preprocessing, call \
done with an empty response so another assistant can take over.";

const PROCESS_DOCUMENTS: ActionSpec = ActionSpec {
    name: "process_documents",
    description: "Read, normalize and chunk every text file in the input directory.",
    params: &[],
};

pub struct PreprocessingAgent {
    documents: Arc<dyn DocumentExecutor>,
}

impl PreprocessingAgent {
    pub fn new(documents: Arc<dyn DocumentExecutor>) -> Self {
        Self { documents }
    }

    async fn process(&self, state: &SharedState) -> String {
        let (input_dir, chunk_size, chunk_overlap) =
            match (&state.input_dir, state.chunk_size, state.chunk_overlap) {
                (Some(dir), Some(size), Some(overlap)) => (dir.clone(), size, overlap),
                _ => {
                    return format!(
                        "Cannot process yet, missing: {}",
                        state.missing_preprocessing().join(", ")
                    )
                }
            };

        let chunks = self
            .documents
            .transform_and_chunk(&input_dir, chunk_size, chunk_overlap)
            .await;
        if chunks.is_empty() {
            format!(
                "No chunks were produced from {}. The directory may be missing or contain no text files.",
                input_dir
            )
        } else {
            let sources: std::collections::BTreeSet<&str> =
                chunks.iter().map(|c| c.source.as_str()).collect();
            format!(
                "Processed {} documents from {} into {} chunks (chunk_size={}, chunk_overlap={}).",
                sources.len(),
                input_dir,
                chunks.len(),
                chunk_size,
                chunk_overlap
            )
        }
    }
}

#[async_trait]
impl TaskAgent for PreprocessingAgent {
    fn speaker(&self) -> Speaker {
        Speaker::Preprocessing
    }

    fn instructions(&self) -> &'static str {
        INSTRUCTIONS
    }

    fn actions(&self) -> Vec<ActionSpec> {
        vec![
            RECORD_INPUT_DIR,
            RECORD_CHUNK_SIZE,
            RECORD_CHUNK_OVERLAP,
            PROCESS_DOCUMENTS,
            DONE,
        ]
    }

    async fn act(
        &mut self,
        state: &mut SharedState,
        call: &ToolCall,
    ) -> Result<ActionOutcome, AgentError> {
        match call.tool.as_str() {
            "process_documents" => Ok(ActionOutcome::Observation(self.process(state).await)),
            "done" => Ok(finish_with(
                state,
                arg_str(&call.args, "response").unwrap_or_default(),
            )),
            _ => record_param(&self.actions(), state, call),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::ChunkedUnit;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDocuments {
        calls: Mutex<Vec<(String, usize, usize)>>,
    }

    #[async_trait]
    impl DocumentExecutor for RecordingDocuments {
        async fn transform_and_chunk(
            &self,
            input_dir: &str,
            chunk_size: usize,
            chunk_overlap: usize,
        ) -> Vec<ChunkedUnit> {
            self.calls
                .lock()
                .unwrap()
                .push((input_dir.to_string(), chunk_size, chunk_overlap));
            vec![ChunkedUnit {
                id: "a.txt#0".into(),
                text: "hello".into(),
                source: "a.txt".into(),
                offset: 0,
                metadata: Default::default(),
            }]
        }

        async fn load_persisted(&self) -> Vec<ChunkedUnit> {
            Vec::new()
        }
    }

    fn call(tool: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            tool: tool.into(),
            args,
        }
    }

    #[tokio::test]
    async fn test_process_refuses_until_trio_set() {
        let docs = Arc::new(RecordingDocuments::default());
        let mut agent = PreprocessingAgent::new(docs.clone());
        let mut state = SharedState::new();
        state.record_input_dir(Some("/docs"));

        let out = agent.act(&mut state, &call("process_documents", json!({}))).await.unwrap();
        assert_eq!(
            out,
            ActionOutcome::Observation("Cannot process yet, missing: chunk_size, chunk_overlap".into())
        );
        assert!(docs.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_invokes_executor() {
        let docs = Arc::new(RecordingDocuments::default());
        let mut agent = PreprocessingAgent::new(docs.clone());
        let mut state = SharedState::new();
        for (tool, value) in [
            ("record_input_dir", json!("/docs")),
            ("record_chunk_size", json!(500)),
            ("record_chunk_overlap", json!("50")),
        ] {
            agent.act(&mut state, &call(tool, json!({ "value": value }))).await.unwrap();
        }

        let out = agent.act(&mut state, &call("process_documents", json!({}))).await.unwrap();
        assert!(matches!(out, ActionOutcome::Observation(ref s) if s.contains("into 1 chunks")));
        assert_eq!(docs.calls.lock().unwrap()[0], ("/docs".to_string(), 500, 50));
    }

    #[tokio::test]
    async fn test_setters_outside_catalogue_are_unknown() {
        let mut agent = PreprocessingAgent::new(Arc::new(RecordingDocuments::default()));
        let mut state = SharedState::new();
        let err = agent
            .act(&mut state, &call("record_query", json!({"value": "q"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnknownAction(ref a) if a == "record_query"));
        assert_eq!(state, SharedState::new());
    }
}
