//! 派发：Speaker -> 本轮使用的 TaskAgent
//!
//! 智能体按轮构造；跨轮状态只有执行器句柄和生成智能体的最近答案。粘性角色在这里占用 current_speaker。

use std::sync::Arc;

use crate::agents::{
    AnswerSlot, ConciergeAgent, GenerationAgent, IndexingAgent, PreprocessingAgent, TaskAgent,
};
use crate::core::{SharedState, Speaker};
use crate::executors::{AnswerSynthesizer, Executors};
use crate::llm::LlmClient;

pub struct Dispatcher {
    executors: Executors,
    llm: Arc<dyn LlmClient>,
    last_answer: AnswerSlot,
}

impl Dispatcher {
    pub fn new(executors: Executors, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            executors,
            llm,
            last_answer: AnswerSlot::default(),
        }
    }

    pub fn dispatch(&self, speaker: Speaker, state: &mut SharedState) -> Box<dyn TaskAgent> {
        state.claim(speaker);
        tracing::info!(%speaker, sticky = speaker.is_sticky(), "dispatching");
        match speaker {
            Speaker::Preprocessing => {
                Box::new(PreprocessingAgent::new(self.executors.documents.clone()))
            }
            Speaker::Indexing => Box::new(IndexingAgent::new(
                self.executors.documents.clone(),
                self.executors.index.clone(),
            )),
            Speaker::Generation => Box::new(GenerationAgent::new(
                self.executors.retrieval.clone(),
                AnswerSynthesizer::new(self.llm.clone()),
                self.last_answer.clone(),
            )),
            Speaker::Concierge => Box::new(ConciergeAgent::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use tempfile::TempDir;

    #[test]
    fn test_dispatch_claims_sticky_roles_only() {
        let data = TempDir::new().unwrap();
        let dispatcher = Dispatcher::new(
            Executors::local(data.path(), None, 64, 3),
            Arc::new(MockLlmClient::new()),
        );

        for speaker in Speaker::ALL {
            let mut state = SharedState::new();
            let agent = dispatcher.dispatch(speaker, &mut state);
            assert_eq!(agent.speaker(), speaker);
            let expected = speaker.is_sticky().then_some(speaker);
            assert_eq!(state.current_speaker, expected);
        }
    }
}
