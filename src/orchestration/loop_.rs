//! 编排主循环
//!
//! AwaitingInput -> Routing -> Dispatched -> (AwaitingInput | Completed)，外加 Routing 上的重试边：
//! - 首轮使用问候语；上一轮智能体 done 之后先问续接智能体，其余时候读用户输入
//! - 路由结果无效时，用固定澄清语重新路由，不消费用户输入、不修改 SharedState
//! - 智能体基于对话快照执行，循环整体采用其返回的历史
//! - 只有直接输入处的 exit / 输入结束会终止循环；决策服务故障向上传播

use std::sync::Arc;

use uuid::Uuid;

use crate::agents::{AgentRunner, Continuation, ContinuationAgent};
use crate::config::AppConfig;
use crate::core::{AgentError, RoutingDecision, SharedState, Speaker};
use crate::executors::Executors;
use crate::llm::LlmClient;
use crate::memory::{ConversationMemory, Message};
use crate::orchestration::{Dispatcher, Router, UserIo};

pub const RETRY_UTTERANCE: &str = "That's not right, try again. Pick one agent.";
pub const EXIT_MESSAGE: &str = "Exiting the conversation...";
const INPUT_PROMPT: &str = "> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    AwaitingInput,
    Routing,
    Dispatched,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Exited,
}

pub struct OrchestrationLoop<U: UserIo> {
    session_id: String,
    state: SharedState,
    memory: ConversationMemory,
    router: Router,
    dispatcher: Dispatcher,
    runner: AgentRunner,
    continuation: ContinuationAgent,
    io: U,
    greeting: Option<String>,
    phase: LoopPhase,
    retries: usize,
    turns: usize,
}

impl<U: UserIo> OrchestrationLoop<U> {
    pub fn new(cfg: &AppConfig, llm: Arc<dyn LlmClient>, executors: Executors, io: U) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            state: SharedState::new(),
            memory: ConversationMemory::new(cfg.memory.token_limit),
            router: Router::new(llm.clone()).with_fast_match(cfg.router.fast_match),
            dispatcher: Dispatcher::new(executors, llm.clone()),
            runner: AgentRunner::new(llm.clone(), cfg.agents.max_steps),
            continuation: ContinuationAgent::new(llm),
            io,
            greeting: Some(cfg.app.greeting.clone()),
            phase: LoopPhase::AwaitingInput,
            retries: 0,
            turns: 0,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn io(&self) -> &U {
        &self.io
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// 无效路由决策触发的重试次数
    pub fn retries(&self) -> usize {
        self.retries
    }

    /// 已执行的智能体回合数
    pub fn turns(&self) -> usize {
        self.turns
    }

    pub async fn run(&mut self) -> Result<SessionOutcome, AgentError> {
        tracing::info!(session_id = %self.session_id, "session started");
        loop {
            self.phase = LoopPhase::AwaitingInput;
            let Some(utterance) = self.next_utterance().await? else {
                self.io.show_notice(EXIT_MESSAGE).await?;
                self.phase = LoopPhase::Completed;
                let (_, _, total_tokens) = self.runner.token_usage();
                tracing::info!(
                    session_id = %self.session_id,
                    turns = self.turns,
                    retries = self.retries,
                    total_tokens,
                    "session ended"
                );
                return Ok(SessionOutcome::Exited);
            };

            self.phase = LoopPhase::Routing;
            let speaker = self.resolve_speaker(&utterance).await?;

            self.phase = LoopPhase::Dispatched;
            let mut agent = self.dispatcher.dispatch(speaker, &mut self.state);
            let snapshot = self.memory.snapshot();
            let turn = self
                .runner
                .turn(agent.as_mut(), &mut self.state, &utterance, &snapshot)
                .await?;
            tracing::debug!(state = %self.state.to_prompt_string(), "state after turn");

            self.memory.set(turn.history);
            self.turns += 1;
            self.io.show_reply(&turn.reply).await?;
        }
    }

    /// 首轮问候 -> 续接 -> 直接输入；None 表示用户退出
    async fn next_utterance(&mut self) -> Result<Option<String>, AgentError> {
        if let Some(greeting) = self.greeting.take() {
            return Ok(Some(greeting));
        }

        if self.state.take_just_finished() {
            tracing::info!("asking the continuation agent what to do next");
            match self
                .continuation
                .infer(&self.state, self.memory.messages())
                .await?
            {
                Continuation::Next(utterance) => return Ok(Some(utterance)),
                Continuation::NoFurtherTask => {}
            }
        }

        self.read_direct().await
    }

    async fn read_direct(&mut self) -> Result<Option<String>, AgentError> {
        loop {
            let Some(line) = self.io.read_line(INPUT_PROMPT).await? else {
                return Ok(None);
            };
            let line = line.trim();
            if line.eq_ignore_ascii_case("exit") {
                return Ok(None);
            }
            if !line.is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
    }

    /// 粘性发言者或路由；无效决策以澄清语重试，重试历史只在本次路由内使用
    async fn resolve_speaker(&mut self, utterance: &str) -> Result<Speaker, AgentError> {
        let mut history: Vec<Message> = self.memory.snapshot();
        let mut router_utterance = utterance.to_string();
        loop {
            match self
                .router
                .decide(&self.state, &history, &router_utterance)
                .await?
            {
                RoutingDecision::Route(speaker) => return Ok(speaker),
                RoutingDecision::Invalid(raw) => {
                    self.retries += 1;
                    tracing::warn!(raw = %raw, "router returned an invalid speaker, retrying");
                    history.push(Message::user(router_utterance));
                    history.push(Message::assistant(raw));
                    router_utterance = RETRY_UTTERANCE.to_string();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::orchestration::ScriptedUser;
    use tempfile::TempDir;

    fn build(mock: Arc<MockLlmClient>, inputs: &[&str], data: &TempDir) -> OrchestrationLoop<ScriptedUser> {
        let mut cfg = AppConfig::default();
        cfg.router.fast_match = false;
        OrchestrationLoop::new(
            &cfg,
            mock,
            Executors::local(data.path(), None, 64, 3),
            ScriptedUser::new(inputs.iter().copied()),
        )
    }

    #[tokio::test]
    async fn test_greeting_then_exit() {
        let data = TempDir::new().unwrap();
        let mock = Arc::new(MockLlmClient::scripted(["Concierge", "Hi! I can preprocess, index or answer."]));
        let mut lp = build(mock.clone(), &["  EXIT "], &data);

        assert_eq!(lp.run().await.unwrap(), SessionOutcome::Exited);
        assert_eq!(lp.phase(), LoopPhase::Completed);
        assert_eq!(lp.io().replies, vec!["Hi! I can preprocess, index or answer."]);
        assert_eq!(lp.io().notices, vec![EXIT_MESSAGE]);
        // 路由请求中的最后一条用户消息是问候语
        let router_call = &mock.calls()[0];
        assert_eq!(router_call.last().map(|m| m.content.as_str()), Some("Hello there!"));
    }

    #[tokio::test]
    async fn test_invalid_decision_retries_without_consuming_input() {
        let data = TempDir::new().unwrap();
        let mock = Arc::new(MockLlmClient::scripted(["banana", "Concierge", "Welcome."]));
        let mut lp = build(mock.clone(), &[], &data);

        lp.run().await.unwrap();
        assert_eq!(lp.retries(), 1);
        assert_eq!(lp.state(), &SharedState::new());
        assert_eq!(lp.io().prompts.len(), 1);

        let retry_call = &mock.calls()[1];
        let n = retry_call.len();
        assert_eq!(retry_call[n - 1].content, RETRY_UTTERANCE);
        assert_eq!(retry_call[n - 2].content, "banana");
        assert_eq!(retry_call[n - 3].content, "Hello there!");

        // 智能体收到的仍是原始问候语
        let agent_call = &mock.calls()[2];
        assert_eq!(agent_call.last().map(|m| m.content.as_str()), Some("Hello there!"));
    }

    #[tokio::test]
    async fn test_decision_service_failure_ends_run() {
        let data = TempDir::new().unwrap();
        let mock = Arc::new(MockLlmClient::new());
        mock.push_failure("no route to host");
        let mut lp = build(mock, &["hello"], &data);
        let err = lp.run().await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(lp.phase(), LoopPhase::Routing);
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let data = TempDir::new().unwrap();
        let mock = Arc::new(MockLlmClient::scripted(["Concierge", "Welcome.", "Concierge", "Sure."]));
        let mut lp = build(mock.clone(), &["", "   ", "tell me more"], &data);
        lp.run().await.unwrap();
        assert_eq!(lp.turns(), 2);
        assert_eq!(lp.io().prompts.len(), 4);
        assert_eq!(mock.calls()[2].last().map(|m| m.content.as_str()), Some("tell me more"));
    }

    #[tokio::test]
    async fn test_answer_generated_in_one_turn_is_delivered_by_a_later_done() {
        let data = TempDir::new().unwrap();
        let set = |tool: &str, value: &str| {
            serde_json::json!({ "tool": tool, "args": { "value": value } }).to_string()
        };
        let mock = Arc::new(MockLlmClient::scripted([
            // 问候：生成参数不全，门控到 Concierge
            "generation".to_string(),
            set("record_query", "what is self rag"),
            set("record_search_type", "hybrid"),
            set("record_reranking_model", "none"),
            "Ready.".to_string(),
            // 第二轮：生成智能体占用发言权，先生成再追问
            "generation".to_string(),
            r#"{"tool": "generate", "args": {}}"#.to_string(),
            "X IS THE ANSWER.".to_string(),
            "Anything else before I wrap up?".to_string(),
            // 第三轮：粘性，重建后的智能体直接 done
            r#"{"tool": "done", "args": {}}"#.to_string(),
        ]));
        let mut lp = build(mock.clone(), &["what is self rag", "no, that's all"], &data);

        lp.run().await.unwrap();
        assert_eq!(
            lp.io().replies,
            vec!["Ready.", "Anything else before I wrap up?", "X IS THE ANSWER."]
        );
        assert_eq!(lp.state().current_speaker, None);
        // 第 11 次调用是续接智能体，离线回退给出 no_further_task
        assert_eq!(mock.calls().len(), 11);
        assert_eq!(lp.turns(), 3);
    }
}
