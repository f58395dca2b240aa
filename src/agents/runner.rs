//! 智能体回合循环
//!
//! Plan -> Act -> Observe，直到模型给出纯文本回复、调用 done，或达到 max_steps。
//! 解析失败与未知动作交给 RecoveryEngine 生成纠正提示；决策服务故障直接向上传播。

use std::sync::Arc;
use std::time::Instant;

use crate::agents::actions::{catalogue_json, tool_call_schema_json};
use crate::agents::{parse_llm_output, ActionOutcome, AgentTurn, Planner, PlannerOutput, TaskAgent, ToolCall};
use crate::core::{AgentError, RecoveryAction, RecoveryEngine, SharedState};
use crate::llm::LlmClient;
use crate::memory::Message;

const HANDOFF_REPLY: &str = "Alright, handing this back so the right assistant can pick it up.";

pub struct AgentRunner {
    planner: Planner,
    recovery: RecoveryEngine,
    max_steps: usize,
}

impl AgentRunner {
    pub fn new(llm: Arc<dyn LlmClient>, max_steps: usize) -> Self {
        Self {
            planner: Planner::new(llm),
            recovery: RecoveryEngine::new(),
            max_steps: max_steps.max(1),
        }
    }

    /// (prompt_tokens, completion_tokens, total_tokens)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.planner.token_usage()
    }

    fn system_prompt(&self, agent: &dyn TaskAgent, state: &SharedState) -> String {
        format!(
            "{}\n\n\
             Current task state:\n{}\n\n\
             Available actions:\n{}\n\n\
             To call an action, output only one JSON object matching this schema:\n{}\n\n\
             Call at most one action per reply. Record every value the user gives you \
             before doing anything else. When you need to ask the user something, \
             reply in plain text without JSON.",
            agent.instructions(),
            state.to_prompt_string(),
            catalogue_json(&agent.actions()),
            tool_call_schema_json(),
        )
    }

    /// 执行一轮：返回回复与替换后的完整历史
    pub async fn turn(
        &self,
        agent: &mut dyn TaskAgent,
        state: &mut SharedState,
        utterance: &str,
        history: &[Message],
    ) -> Result<AgentTurn, AgentError> {
        let speaker = agent.speaker();
        let available: Vec<String> = agent.actions().iter().map(|a| a.name.to_string()).collect();
        let mut history = history.to_vec();
        history.push(Message::user(utterance.to_string()));

        for step in 0..self.max_steps {
            let system = self.system_prompt(agent, state);
            let output = self.planner.plan_with_system(&history, &system).await?;
            tracing::debug!(%speaker, step, "planner output: {}", output);

            let call = match parse_llm_output(&output) {
                Ok(PlannerOutput::Response(reply)) => {
                    history.push(Message::assistant(reply.clone()));
                    return Ok(AgentTurn { reply, history });
                }
                Ok(PlannerOutput::ToolCall(call)) if available.contains(&call.tool) => call,
                Ok(PlannerOutput::ToolCall(call)) => {
                    self.recover(AgentError::UnknownAction(call.tool), &available, &mut history)?;
                    continue;
                }
                Err(e) => {
                    self.recover(e, &available, &mut history)?;
                    continue;
                }
            };

            match self.execute(agent, state, &call).await {
                Ok(ActionOutcome::Observation(observation)) => {
                    history.push(Message::assistant(format!(
                        "Tool call: {} | Result: {}",
                        call.tool, observation
                    )));
                    history.push(Message::user(format!(
                        "Observation from {}: {}",
                        call.tool, observation
                    )));
                }
                Ok(ActionOutcome::Finished(payload)) => {
                    let reply = if payload.trim().is_empty() {
                        HANDOFF_REPLY.to_string()
                    } else {
                        payload
                    };
                    tracing::info!(%speaker, "agent finished");
                    history.push(Message::assistant(reply.clone()));
                    return Ok(AgentTurn { reply, history });
                }
                Err(e) => self.recover(e, &available, &mut history)?,
            }
        }

        tracing::warn!(%speaker, max_steps = self.max_steps, "step limit reached");
        let reply = format!(
            "I could not complete that within {} steps. Could you tell me a bit more about what you need?",
            self.max_steps
        );
        history.push(Message::assistant(reply.clone()));
        Ok(AgentTurn { reply, history })
    }

    /// 执行动作并输出 JSON 审计日志
    async fn execute(
        &self,
        agent: &mut dyn TaskAgent,
        state: &mut SharedState,
        call: &ToolCall,
    ) -> Result<ActionOutcome, AgentError> {
        let start = Instant::now();
        let result = agent.act(state, call).await;
        let outcome = match &result {
            Ok(ActionOutcome::Observation(_)) => "observation",
            Ok(ActionOutcome::Finished(_)) => "finished",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "action_audit",
            "agent": agent.speaker().id(),
            "action": call.tool,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.args),
        });
        tracing::info!(audit = %audit.to_string(), "action");
        result
    }

    fn recover(
        &self,
        err: AgentError,
        available: &[String],
        history: &mut Vec<Message>,
    ) -> Result<(), AgentError> {
        match self.recovery.handle(&err, available) {
            RecoveryAction::RetryWithPrompt(prompt) => {
                tracing::warn!("recoverable agent error: {}", err);
                history.push(Message::user(prompt));
                Ok(())
            }
            RecoveryAction::Abort => Err(err),
        }
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
