//! 核心层：错误类型、模型回退列表、回退执行循环、回复归一化

pub mod error;
pub mod executor;
pub mod normalize;
pub mod roster;

pub use error::AgentError;
pub use executor::{ExecutionAttempt, RequestExecutor, NO_RESPONSE_FALLBACK};
pub use normalize::{normalize, NormalizedResult};
pub use roster::{FallbackCursor, ModelRoster};
