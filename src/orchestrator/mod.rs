//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责会话生命周期和批次调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `session` - 会话控制器
//! - 开始 / 结束会话，管理 generation 和后台任务
//! - 轮询照片库，驱动采集窗口
//! - 点击计数倒计时
//! - 朗读循环（暂停、继续、重新开始）
//! - 推送状态快照
//!
//! ### `batch_processor` - 批次处理器
//! - 按顺序逐张处理一批照片（Vec<BatchItem>）
//! - 复用 ImageFlow
//! - 输出单个批次的统计信息
//!
//! ## 层次关系
//!
//! ```text
//! session (会话、轮询、朗读)
//!     ↓
//! batch_processor (处理 Vec<BatchItem>)
//!     ↓
//! workflow::ImageFlow (处理单张照片)
//!     ↓
//! services (能力层：OCR 选块 / 解题)
//!     ↓
//! infrastructure (基础设施：照片库、朗读引擎)
//! ```

pub mod batch_processor;
pub mod session;

pub use batch_processor::{BatchReport, SequentialProcessor};
pub use session::{SessionController, SessionSettings};
