//! 路由：决定下一轮由哪个智能体发言
//!
//! 1. SharedState 已有 current_speaker 时直接返回（粘性）
//! 2. 否则确定意图：先做关键词快速匹配（不调 LLM），未命中或有歧义再问决策服务
//! 3. 按固定优先级套用状态门控；决策服务给出集合外的字符串时返回 Invalid，由主循环重试

use std::sync::Arc;

use crate::core::{AgentError, RoutingDecision, SharedState, Speaker};
use crate::llm::{LlmClient, ALLOWED_OUTPUTS_MARKER};
use crate::memory::Message;

/// 路由意图：用户想做什么（尚未经过门控）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Preprocess,
    Index,
    Query,
    /// 闲聊、说明、或无法判断
    Other,
}

impl From<Speaker> for Intent {
    fn from(speaker: Speaker) -> Self {
        match speaker {
            Speaker::Preprocessing => Intent::Preprocess,
            Speaker::Indexing => Intent::Index,
            Speaker::Generation => Intent::Query,
            Speaker::Concierge => Intent::Other,
        }
    }
}

const PREPROCESS_KEYWORDS: [&str; 4] = ["preprocess", "pre-process", "chunk", "预处理"];
const INDEX_KEYWORDS: [&str; 4] = ["index", "embed", "索引", "嵌入"];
const QUERY_KEYWORDS: [&str; 6] = ["query", "queries", "search", "ask", "检索", "提问"];

/// 关键词快速匹配；恰好命中一类意图才返回
///
/// 英文关键词按词前缀匹配（indexing 命中 index，task 不命中 ask），中文关键词按子串匹配。
pub fn fast_match(utterance: &str) -> Option<Intent> {
    let lower = utterance.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .collect();
    let hits = |keywords: &[&str]| {
        keywords.iter().any(|k| {
            if k.is_ascii() {
                words.iter().any(|w| w.starts_with(k))
            } else {
                lower.contains(k)
            }
        })
    };
    let matched: Vec<Intent> = [
        (Intent::Preprocess, hits(&PREPROCESS_KEYWORDS[..])),
        (Intent::Index, hits(&INDEX_KEYWORDS[..])),
        (Intent::Query, hits(&QUERY_KEYWORDS[..])),
    ]
    .into_iter()
    .filter_map(|(intent, hit)| hit.then_some(intent))
    .collect();

    match matched.as_slice() {
        [single] => Some(*single),
        _ => None,
    }
}

/// 状态门控（优先级固定）：
/// 预处理缺参数 -> Concierge；索引缺预处理参数 -> Preprocessing、缺 embedding_model -> Concierge；
/// 生成缺参数 -> Concierge；其余 -> Concierge
pub fn apply_gates(intent: Intent, state: &SharedState) -> Speaker {
    match intent {
        Intent::Preprocess if state.preprocessing_ready() => Speaker::Preprocessing,
        Intent::Index if !state.preprocessing_ready() => Speaker::Preprocessing,
        Intent::Index if state.has_embedding_model() => Speaker::Indexing,
        Intent::Query if state.generation_ready() => Speaker::Generation,
        _ => Speaker::Concierge,
    }
}

pub struct Router {
    llm: Arc<dyn LlmClient>,
    /// 启用关键词快速匹配
    fast_match: bool,
}

impl Router {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            fast_match: true,
        }
    }

    pub fn with_fast_match(mut self, enabled: bool) -> Self {
        self.fast_match = enabled;
        self
    }

    fn system_prompt(state: &SharedState) -> String {
        let ids = Speaker::ALL.map(|s| s.id());
        format!(
            "You are the orchestration agent.\n\
             Your job is to decide which agent to run based on the current state of the user and \
             what they've asked to do. Agents are identified by short strings. What you do is return \
             the name of the agent to run next. You do not do anything else.\n\n\
             The current state of the user is:\n{state}\n\n\
             Look at the chat history and the current state and return one of these strings:\n\
             * \"{pre}\" - if the user wants to pre-process the documents into chunks\n\
             * \"{idx}\" - if the user wants to embed and index the chunks into a vector index\n\
             * \"{gen}\" - if the user wants to query the documents\n\
             * \"{con}\" - if the user wants to do something else, or hasn't said what they want to do, \
             or you can't figure out what they want to do. Choose this by default.\n\n\
             Output one of these strings and ONLY these strings, without quotes. NEVER respond with \
             anything else. DO NOT be helpful or conversational.\n\
             {marker} {list}",
            state = state.to_prompt_string(),
            pre = ids[0],
            idx = ids[1],
            gen = ids[2],
            con = ids[3],
            marker = ALLOWED_OUTPUTS_MARKER,
            list = ids.join(", "),
        )
    }

    async fn classify(
        &self,
        state: &SharedState,
        history: &[Message],
        utterance: &str,
    ) -> Result<RoutingDecision, AgentError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(Self::system_prompt(state)));
        messages.extend_from_slice(history);
        messages.push(Message::user(utterance.to_string()));

        let raw = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::DecisionService)?;
        Ok(RoutingDecision::parse(&raw))
    }

    /// 决策服务传输失败为 DecisionService；无效文本为 Ok(Invalid)
    pub async fn decide(
        &self,
        state: &SharedState,
        history: &[Message],
        utterance: &str,
    ) -> Result<RoutingDecision, AgentError> {
        if let Some(speaker) = state.current_speaker {
            tracing::info!(%speaker, "sticky speaker");
            return Ok(RoutingDecision::Route(speaker));
        }

        let intent = match self.fast_match.then(|| fast_match(utterance)).flatten() {
            Some(intent) => {
                tracing::debug!(?intent, "fast match");
                intent
            }
            None => match self.classify(state, history, utterance).await? {
                RoutingDecision::Route(speaker) => Intent::from(speaker),
                invalid @ RoutingDecision::Invalid(_) => return Ok(invalid),
            },
        };

        let speaker = apply_gates(intent, state);
        tracing::info!(?intent, %speaker, "routing decision");
        Ok(RoutingDecision::Route(speaker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn trio() -> SharedState {
        let mut state = SharedState::new();
        state.record_input_dir(Some("/docs"));
        state.record_chunk_size(Some(500));
        state.record_chunk_overlap(Some(50));
        state
    }

    #[test]
    fn test_fast_match() {
        assert_eq!(fast_match("Please preprocess my files"), Some(Intent::Preprocess));
        assert_eq!(fast_match("embed them with local"), Some(Intent::Index));
        assert_eq!(fast_match("I want to ask a question"), Some(Intent::Query));
        assert_eq!(fast_match("preprocess and then index"), None);
        assert_eq!(fast_match("Hello there!"), None);
        assert_eq!(fast_match("what task is next"), None);
        assert_eq!(fast_match("start indexing"), Some(Intent::Index));
    }

    #[test]
    fn test_preprocess_gate() {
        assert_eq!(apply_gates(Intent::Preprocess, &SharedState::new()), Speaker::Concierge);
        let mut state = trio();
        state.chunk_overlap = None;
        assert_eq!(apply_gates(Intent::Preprocess, &state), Speaker::Concierge);
        assert_eq!(apply_gates(Intent::Preprocess, &trio()), Speaker::Preprocessing);
    }

    #[test]
    fn test_index_gate_precedence() {
        assert_eq!(apply_gates(Intent::Index, &trio()), Speaker::Concierge);

        let mut state = SharedState::new();
        state.record_embedding_model(Some("local"));
        assert_eq!(apply_gates(Intent::Index, &state), Speaker::Preprocessing);

        let mut state = trio();
        state.record_embedding_model(Some("local"));
        assert_eq!(apply_gates(Intent::Index, &state), Speaker::Indexing);
    }

    #[test]
    fn test_query_gate() {
        let mut state = SharedState::new();
        state.record_query(Some("what is self rag"));
        state.record_search_type(Some("hybrid"));
        assert_eq!(apply_gates(Intent::Query, &state), Speaker::Concierge);
        state.record_reranking_model(Some("cross-encoder"));
        assert_eq!(apply_gates(Intent::Query, &state), Speaker::Generation);
        assert_eq!(apply_gates(Intent::Other, &state), Speaker::Concierge);
    }

    #[tokio::test]
    async fn test_sticky_speaker_skips_decision_service() {
        let mock = Arc::new(MockLlmClient::new());
        let router = Router::new(mock.clone());
        let mut state = SharedState::new();
        state.claim(Speaker::Indexing);
        let decision = router.decide(&state, &[], "banana").await.unwrap();
        assert_eq!(decision, RoutingDecision::Route(Speaker::Indexing));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_decision_service_output_is_gated() {
        let mock = Arc::new(MockLlmClient::scripted(["data_pre_processing", "data_pre_processing"]));
        let router = Router::new(mock);
        let decision = router.decide(&SharedState::new(), &[], "let's start").await.unwrap();
        assert_eq!(decision, RoutingDecision::Route(Speaker::Concierge));
        let decision = router.decide(&trio(), &[], "let's start").await.unwrap();
        assert_eq!(decision, RoutingDecision::Route(Speaker::Preprocessing));
    }

    #[tokio::test]
    async fn test_invalid_output() {
        let router = Router::new(Arc::new(MockLlmClient::scripted(["banana"])));
        let state = trio();
        let decision = router.decide(&state, &[], "hmm").await.unwrap();
        assert_eq!(decision, RoutingDecision::Invalid("banana".into()));
        assert_eq!(state, trio());
    }

    #[tokio::test]
    async fn test_identical_inputs_identical_decision() {
        let router = Router::new(Arc::new(MockLlmClient::new()));
        let state = trio();
        let history = vec![Message::user("hi")];
        let a = router.decide(&state, &history, "ask about self rag").await.unwrap();
        let b = router.decide(&state, &history, "ask about self rag").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_fast_match_can_be_disabled() {
        let mock = Arc::new(MockLlmClient::scripted(["indexing"]));
        let router = Router::new(mock.clone()).with_fast_match(false);
        let decision = router.decide(&trio(), &[], "preprocess please").await.unwrap();
        // 决策服务说 indexing，但还没有 embedding_model
        assert_eq!(decision, RoutingDecision::Route(Speaker::Concierge));
        let sent = &mock.calls()[0];
        assert!(sent[0].content.contains("Allowed outputs: data_pre_processing, indexing, generation, Concierge"));
        assert_eq!(sent.last().map(|m| m.content.as_str()), Some("preprocess please"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_failure("connection reset");
        let err = Router::new(mock).decide(&SharedState::new(), &[], "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::DecisionService(_)));
    }
}
