//! ragnav - 多智能体 RAG 导航助手
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 共享状态、发言者标识、错误与恢复
//! - **memory**: 跨智能体对话日志与分词
//! - **llm**: 决策服务抽象与实现（OpenAI 兼容 / DeepSeek / Mock）及嵌入
//! - **executors**: 文档分块、索引、检索重排与答案合成
//! - **agents**: 任务智能体、动作循环与续接推断
//! - **orchestration**: 路由、派发、用户边界与主循环
//! - **observability**: 日志初始化

pub mod agents;
pub mod config;
pub mod core;
pub mod executors;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod orchestration;

pub use orchestration::{OrchestrationLoop, SessionOutcome};
