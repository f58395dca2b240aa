//! 答案合成：把检索结果拼进提示模板，交给 LLM 生成回答

use std::sync::Arc;

use crate::core::AgentError;
use crate::executors::RankedDocument;
use crate::llm::LlmClient;
use crate::memory::Message;

pub const ANSWER_TEMPLATE: &str = "You are an assistant that explains topics around retrieval augmented \
generation (RAG). Give a clear, concise and informative explanation based on the context and \
the query below.\n\n\
Context:\n\
{context}\n\n\
Query: {query}\n\n\
Guidelines:\n\
1. Open with a short overview of the concept the query mentions.\n\
2. Give at least one concrete example or use case.\n\
3. Briefly mention any limitations or open challenges.\n\
4. Close with one sentence on future impact or applications.\n\n\
Keep it accessible to a reader with a basic understanding of RAG. If the context does not contain \
what the query asks for, say that you don't have enough information for a complete answer, and \
answer only from the given context.\n\n\
Response:";

const EMPTY_CONTEXT: &str =
    "(no relevant documents were retrieved; say that there is not enough information to answer)";

pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn render_prompt(&self, query: &str, documents: &[RankedDocument]) -> String {
        let context = if documents.is_empty() {
            EMPTY_CONTEXT.to_string()
        } else {
            documents
                .iter()
                .map(|d| format!("[{}] {}", d.source, d.text))
                .collect::<Vec<_>>()
                .join("\n\n")
        };
        ANSWER_TEMPLATE
            .replace("{context}", &context)
            .replace("{query}", query)
    }

    pub async fn synthesize(
        &self,
        query: &str,
        documents: &[RankedDocument],
    ) -> Result<String, AgentError> {
        let prompt = self.render_prompt(query, documents);
        let answer = self
            .llm
            .complete(&[Message::user(prompt)])
            .await
            .map_err(AgentError::DecisionService)?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn doc(source: &str, text: &str) -> RankedDocument {
        RankedDocument {
            chunk_id: format!("{}#0", source),
            source: source.to_string(),
            text: text.to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_render_prompt_fills_template() {
        let synth = AnswerSynthesizer::new(Arc::new(MockLlmClient::new()));
        let prompt = synth.render_prompt("what is self rag", &[doc("a.txt", "self rag reflects")]);
        assert!(prompt.contains("[a.txt] self rag reflects"));
        assert!(prompt.contains("Query: what is self rag"));
        assert!(!prompt.contains("{context}"));
        assert!(prompt.contains("don't have enough information"));
        assert!(prompt.trim_end().ends_with("Response:"));
    }

    #[test]
    fn test_render_prompt_without_documents() {
        let synth = AnswerSynthesizer::new(Arc::new(MockLlmClient::new()));
        assert!(synth.render_prompt("q", &[]).contains("not enough information"));
    }

    #[tokio::test]
    async fn test_synthesize_uses_llm() {
        let mock = Arc::new(MockLlmClient::scripted(["  It critiques its own retrievals.  "]));
        let synth = AnswerSynthesizer::new(mock.clone());
        let answer = synth.synthesize("q", &[doc("a.txt", "text")]).await.unwrap();
        assert_eq!(answer, "It critiques its own retrievals.");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_synthesize_failure_is_decision_service_error() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_failure("offline");
        let synth = AnswerSynthesizer::new(mock);
        let err = synth.synthesize("q", &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::DecisionService(_)));
    }
}
