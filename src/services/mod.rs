//! 业务能力层
//!
//! 只处理单个输入（一张图片或一段文字），不认识会话、批次和朗读队列。

pub mod block_selector;
pub mod llm_service;
pub mod solve_service;

pub use block_selector::TextBlockSelector;
pub use llm_service::{ChatBackend, ChatRequest, LlmService};
pub use solve_service::{SolveInput, SolveService};
