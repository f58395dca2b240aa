//! 编排层：路由、派发、用户边界与主循环

pub mod dispatcher;
pub mod io;
pub mod loop_;
pub mod router;

pub use dispatcher::Dispatcher;
pub use io::{ScriptedUser, StdioUser, UserIo};
pub use loop_::{LoopPhase, OrchestrationLoop, SessionOutcome, EXIT_MESSAGE, RETRY_UTTERANCE};
pub use router::{apply_gates, fast_match, Intent, Router};
