//! 单张图片处理流程 - 流程层
//!
//! 核心职责：定义"一张照片"的完整处理流程
//!
//! 流程顺序：
//! 1. 加载图片（同步来源从照片库读取，直接拍摄的图片已在内存中）
//! 2. 解题（OCR → 选块 → LLM，重试和兜底由 SolveService 负责）
//! 3. 展开为答案条目，丢弃空白答案

use std::fmt::Display;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::SolveError;
use crate::infrastructure::PhotoLibrary;
use crate::models::{flatten_answers, AnswerItem, AssetRef, Image};
use crate::services::{SolveInput, SolveService};

/// 批次中的一项
#[derive(Debug, Clone)]
pub enum BatchItem {
    /// 照片库中的照片，处理时才加载
    Asset(AssetRef),
    /// 直接拍摄、已在内存中的图片
    Captured(Image),
}

/// 图片处理上下文
///
/// 封装"我正在处理第几批的第几张"这一信息
#[derive(Debug, Clone)]
pub struct ImageCtx {
    /// 批次编号（仅用于日志显示）
    pub batch_num: usize,
    /// 图片在批次中的位置（从1开始）
    pub position: usize,
    /// 本批图片总数
    pub total: usize,
}

impl ImageCtx {
    pub fn new(batch_num: usize, position: usize, total: usize) -> Self {
        Self {
            batch_num,
            position,
            total,
        }
    }
}

impl Display for ImageCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[批次 {} 照片 {}/{}]",
            self.batch_num, self.position, self.total
        )
    }
}

/// 单张图片的处理结果
#[derive(Debug)]
pub enum ImageOutcome {
    /// 解题完成（可能没有可读的答案）
    Answered(Vec<AnswerItem>),
    /// 图片加载失败，静默跳过
    Skipped,
    /// 解题失败
    Failed(SolveError),
}

/// 单张图片处理流程
///
/// - 决定何时加载、何时解题
/// - 不持有会话状态
/// - 只依赖业务能力（services）和照片库
pub struct ImageFlow {
    library: Option<Arc<dyn PhotoLibrary>>,
    solver: Arc<SolveService>,
}

impl ImageFlow {
    pub fn new(solver: Arc<SolveService>) -> Self {
        Self {
            library: None,
            solver,
        }
    }

    /// 配置照片库，用于加载 `BatchItem::Asset`
    pub fn with_library(mut self, library: Arc<dyn PhotoLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    pub async fn run(&self, item: BatchItem, ctx: &ImageCtx) -> ImageOutcome {
        let Some(image) = self.load(item, ctx).await else {
            return ImageOutcome::Skipped;
        };

        info!("{} 🔍 正在解题: {}", ctx, image.id);
        let source_id = image.id.clone();

        match self.solver.solve(SolveInput::Image(image)).await {
            Ok(response) => {
                let answers = flatten_answers(&source_id, &response.questions);
                info!(
                    "{} ✓ 得到 {} 条答案 (共 {} 道题)",
                    ctx,
                    answers.len(),
                    response.questions.len()
                );
                ImageOutcome::Answered(answers)
            }
            Err(e) => {
                error!("{} ❌ 解题失败: {}", ctx, e);
                ImageOutcome::Failed(e)
            }
        }
    }

    async fn load(&self, item: BatchItem, ctx: &ImageCtx) -> Option<Image> {
        match item {
            BatchItem::Captured(image) if image.is_empty() => {
                warn!("{} ⚠️ 图片为空，跳过: {}", ctx, image.id);
                None
            }
            BatchItem::Captured(image) => Some(image),
            BatchItem::Asset(asset) => {
                let Some(library) = &self.library else {
                    warn!("{} ⚠️ 没有配置照片库，跳过: {}", ctx, asset.id);
                    return None;
                };
                let image = library.load_image(&asset).await;
                if image.is_none() {
                    warn!("{} ⚠️ 加载照片失败，跳过: {}", ctx, asset.id);
                }
                image
            }
        }
    }
}
