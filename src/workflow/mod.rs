//! 流程层
//!
//! - `image_flow`: 一张照片的处理流程（加载 → 解题 → 展开答案）
//! - `tap_counter` / `acquisition` / `readout`: 纯状态机，只接收时间和事件，不做 IO

pub mod acquisition;
pub mod image_flow;
pub mod readout;
pub mod tap_counter;

pub use acquisition::{AcquisitionDecision, AcquisitionWindow};
pub use image_flow::{BatchItem, ImageCtx, ImageFlow, ImageOutcome};
pub use readout::{AdvanceOutcome, ReadoutQueue, ReadoutState, ToggleOutcome};
pub use tap_counter::{TapExpectationCounter, TapStatus};
