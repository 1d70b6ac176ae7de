//! # Photo Question Reader
//!
//! 拍照读题：眼镜（或手机）拍下试题，自动识别、解题并朗读答案
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `PhotoLibrary` / `FolderPhotoLibrary` - 拉取新照片、加载图片
//! - `Speaker` - 朗读 / 停止
//! - `TextRecognizer` - OCR
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单张图片
//! - `TextBlockSelector` - 从 OCR 结果中挑出题目文字块
//! - `LlmService` - LLM 调用能力
//! - `SolveService` - 解题（重试 + 兜底）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一张照片"的处理流程，以及纯状态机
//! - `ImageFlow` - 流程编排（load → solve → answers）
//! - `AcquisitionWindow` / `TapExpectationCounter` / `ReadoutQueue`
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session` - 会话控制器，管理轮询、点击计数、批次和朗读任务
//! - `orchestrator/batch_processor` - 顺序批次处理器
//!
//! ## 模块结构

pub mod app;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult, PhotoError, SessionError, SolveError};
pub use models::{AnswerItem, AssetRef, Image, PhotoSource, SessionSnapshot};
pub use orchestrator::{SessionController, SessionSettings};
pub use services::{SolveInput, SolveService};
pub use workflow::{ReadoutState, TapStatus};
