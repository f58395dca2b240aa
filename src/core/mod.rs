//! 核心层：错误与恢复、发言者与路由决策、共享状态

pub mod error;
pub mod recovery;
pub mod speaker;
pub mod state;

pub use error::{AgentError, RecoveryAction};
pub use recovery::RecoveryEngine;
pub use speaker::{RoutingDecision, Speaker};
pub use state::SharedState;
