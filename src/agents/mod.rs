//! 任务智能体：预处理 / 索引 / 生成 / Concierge，以及完成后的续接推断
//!
//! 每个智能体只声明角色说明、动作目录和动作实现；多步动作调用循环由 AgentRunner 统一驱动。

pub mod actions;
pub mod concierge;
pub mod continuation;
pub mod generation;
pub mod indexing;
pub mod planner;
pub mod preprocessing;
pub mod runner;

use async_trait::async_trait;

use crate::core::{AgentError, SharedState, Speaker};
use crate::memory::Message;

pub use actions::ActionSpec;
pub use concierge::ConciergeAgent;
pub use continuation::{Continuation, ContinuationAgent, NO_FURTHER_TASK};
pub use generation::{AnswerSlot, GenerationAgent};
pub use indexing::IndexingAgent;
pub use planner::{parse_llm_output, Planner, PlannerOutput, ToolCall};
pub use preprocessing::PreprocessingAgent;
pub use runner::AgentRunner;

/// 一轮执行结果：给用户的回复与完整替换后的对话历史
#[derive(Debug, Clone)]
pub struct AgentTurn {
    pub reply: String,
    pub history: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// 写回对话，继续下一步
    Observation(String),
    /// 调用 SharedState::finish 之后返回，结束本轮
    Finished(String),
}

#[async_trait]
pub trait TaskAgent: Send {
    fn speaker(&self) -> Speaker;

    fn instructions(&self) -> &'static str;

    fn actions(&self) -> Vec<ActionSpec>;

    async fn act(
        &mut self,
        state: &mut SharedState,
        call: &ToolCall,
    ) -> Result<ActionOutcome, AgentError>;
}

/// 本智能体目录中的 record_* 动作；其余动作名为 UnknownAction
pub(crate) fn record_param(
    actions: &[ActionSpec],
    state: &mut SharedState,
    call: &ToolCall,
) -> Result<ActionOutcome, AgentError> {
    if !actions.iter().any(|a| a.name == call.tool) {
        return Err(AgentError::UnknownAction(call.tool.clone()));
    }
    actions::apply_setter(state, call)
        .map(ActionOutcome::Observation)
        .ok_or_else(|| AgentError::UnknownAction(call.tool.clone()))
}

/// `done` 的公共实现：清理 current_speaker 并置位 just_finished
pub(crate) fn finish_with(state: &mut SharedState, payload: String) -> ActionOutcome {
    state.finish();
    ActionOutcome::Finished(payload)
}
