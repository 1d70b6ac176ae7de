//! 批次处理器 - 编排层
//!
//! ## 职责
//!
//! 按顺序逐张处理一批照片，汇总答案和统计。
//!
//! ## 核心功能
//!
//! 1. **顺序处理**：一次只处理一张，前一张完成后才开始下一张
//! 2. **数量上限**：超过上限的照片不处理
//! 3. **失败隔离**：单张失败只记日志，不影响其余照片
//! 4. **统计输出**：记录得到答案 / 跳过 / 失败数量

use tracing::info;

use crate::models::AnswerItem;
use crate::utils::logging::{log_batch_complete, log_batch_start};
use crate::workflow::{BatchItem, ImageCtx, ImageFlow, ImageOutcome};

/// 批次处理结果
#[derive(Debug, Default)]
pub struct BatchReport {
    pub batch_num: usize,
    /// 实际处理的照片数量
    pub total: usize,
    /// 解题成功的照片数量
    pub answered: usize,
    /// 加载失败跳过的照片数量
    pub skipped: usize,
    /// 解题失败的照片数量
    pub failed: usize,
    /// 按照片顺序、题目顺序排列的答案
    pub answers: Vec<AnswerItem>,
}

impl BatchReport {
    /// 给用户看的状态文字
    pub fn status_text(&self) -> String {
        if self.answers.is_empty() {
            if self.failed > 0 {
                return format!(
                    "No readable questions found ({} photo{} failed to solve)",
                    self.failed,
                    if self.failed == 1 { "" } else { "s" }
                );
            }
            return "No readable questions found".to_string();
        }

        let mut text = format!("Answers ready ({})", self.answers.len());
        if self.failed + self.skipped > 0 {
            text.push_str(&format!(
                ", {} photo{} skipped",
                self.failed + self.skipped,
                if self.failed + self.skipped == 1 { "" } else { "s" }
            ));
        }
        text
    }
}

/// 顺序批次处理器
pub struct SequentialProcessor {
    flow: ImageFlow,
    limit: usize,
}

impl SequentialProcessor {
    pub fn new(flow: ImageFlow, limit: usize) -> Self {
        Self { flow, limit }
    }

    /// 处理一批照片
    ///
    /// # 参数
    /// - `items`: 按顺序排列的照片
    /// - `batch_num`: 批次编号（用于日志）
    /// - `source`: 照片来源（用于日志）
    pub async fn process(&self, items: Vec<BatchItem>, batch_num: usize, source: &str) -> BatchReport {
        let total = items.len().min(self.limit);
        if items.len() > self.limit {
            info!(
                "批次 {} 共 {} 张照片，超过上限，只处理前 {} 张",
                batch_num,
                items.len(),
                self.limit
            );
        }

        log_batch_start(batch_num, total, source);

        let mut report = BatchReport {
            batch_num,
            total,
            ..Default::default()
        };

        for (index, item) in items.into_iter().take(total).enumerate() {
            let ctx = ImageCtx::new(batch_num, index + 1, total);

            match self.flow.run(item, &ctx).await {
                ImageOutcome::Answered(answers) => {
                    report.answered += 1;
                    report.answers.extend(answers);
                }
                ImageOutcome::Skipped => report.skipped += 1,
                ImageOutcome::Failed(_) => report.failed += 1,
            }
        }

        log_batch_complete(batch_num, report.answered, total, report.answers.len());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolveError;
    use crate::models::Image;
    use crate::services::{ChatBackend, ChatRequest, SolveService};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// 按图片 id 回复；记录调用顺序
    struct EchoBackend {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn complete(&self, request: ChatRequest) -> Result<String, SolveError> {
            let id = request.image.map(|i| i.id).unwrap_or_default();
            self.calls.lock().unwrap().push(id.clone());
            match id.as_str() {
                "offline" => Err(SolveError::transport(
                    "test-model",
                    std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout"),
                )),
                "blank" => Ok(r#"{"questions":[{"number":1,"questionText":"q","answerText":""}]}"#.to_string()),
                _ => Ok(format!(
                    r#"{{"questions":[{{"number":1,"questionText":"q1","answerText":"{id}-a"}},{{"number":2,"questionText":"q2","answerText":"{id}-b"}}]}}"#
                )),
            }
        }
    }

    fn processor(limit: usize) -> (SequentialProcessor, Arc<EchoBackend>) {
        let backend = Arc::new(EchoBackend {
            calls: Mutex::new(Vec::new()),
        });
        let solver = Arc::new(SolveService::new(backend.clone()));
        (SequentialProcessor::new(ImageFlow::new(solver), limit), backend)
    }

    fn captured(id: &str) -> BatchItem {
        BatchItem::Captured(Image::new(id, vec![1u8], "image/jpeg"))
    }

    #[tokio::test]
    async fn test_answers_keep_image_then_question_order() {
        let (processor, backend) = processor(10);
        let report = processor
            .process(vec![captured("p1"), captured("p2")], 1, "测试")
            .await;

        let spoken: Vec<&str> = report.answers.iter().map(|a| a.spoken_text.as_str()).collect();
        assert_eq!(
            spoken,
            vec![
                "Question 1: p1-a",
                "Question 2: p1-b",
                "Question 1: p2-a",
                "Question 2: p2-b"
            ]
        );
        assert_eq!(*backend.calls.lock().unwrap(), vec!["p1", "p2"]);
        assert_eq!(report.status_text(), "Answers ready (4)");
    }

    #[tokio::test]
    async fn test_failed_item_does_not_abort_batch() {
        let (processor, _) = processor(10);
        let report = processor
            .process(vec![captured("offline"), captured("p2")], 1, "测试")
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.answered, 1);
        assert_eq!(report.answers.len(), 2);
        assert_eq!(report.status_text(), "Answers ready (2), 1 photo skipped");
    }

    #[tokio::test]
    async fn test_limit_caps_processed_items() {
        let (processor, backend) = processor(2);
        let report = processor
            .process(vec![captured("a"), captured("b"), captured("c")], 3, "测试")
            .await;

        assert_eq!(report.total, 2);
        assert_eq!(backend.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_readable_questions() {
        let (processor, _) = processor(10);
        let report = processor.process(vec![captured("blank")], 1, "测试").await;

        assert!(report.answers.is_empty());
        assert_eq!(report.status_text(), "No readable questions found");
    }
}
