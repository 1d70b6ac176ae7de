//! 解题服务 - 业务能力层
//!
//! 包装外部的 OCR + LLM 调用：
//! 1. 第 0 次尝试使用标准指令
//! 2. 回复无法解析时，第 1 次尝试使用"只输出 JSON"的严格指令
//! 3. 仍然无法解析：连接错误直接返回；内容错误构造一条兜底答案
//!
//! 调用方因此不会遇到"明明处理了文字却没有任何输出"的情况。

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::SolveError;
use crate::infrastructure::TextRecognizer;
use crate::models::{Image, QuestionsResponse, SolvedQuestion};
use crate::services::block_selector::TextBlockSelector;
use crate::services::llm_service::{ChatBackend, ChatRequest};
use crate::utils::logging::truncate_text;

/// 兜底答案的说明文字
pub const FALLBACK_NOTE: &str = "Unparsed fallback: the solver reply could not be read as structured answers.";

/// 模型回复为空时兜底答案朗读的内容
pub const FALLBACK_ANSWER: &str = "Sorry, the answer for this photo could not be read.";

/// 图片没有识别出文字时兜底答案使用的题干
const IMAGE_PLACEHOLDER: &str = "[photo]";

const SYSTEM_MESSAGE: &str = "You are an expert tutor for statistics and mathematics worksheets. \
    You read photographed exam questions and give short, exact answers that can be read aloud.";

const RESPONSE_SHAPE: &str = r#"{"questions":[{"number":"1","part":null,"questionText":"...","answerText":"...","explanation":"..."}]}"#;

/// 解题输入
#[derive(Debug, Clone)]
pub enum SolveInput {
    /// 已经识别好的文字
    Text(String),
    /// 原始图片（有 OCR 时先识别文字）
    Image(Image),
}

/// 解题服务
///
/// 职责：
/// - 把图片 / 文字交给模型解题
/// - 负责重试、JSON 提取和兜底
/// - 只处理单张图片
/// - 不关心批次顺序
pub struct SolveService {
    backend: Arc<dyn ChatBackend>,
    recognizer: Option<Arc<dyn TextRecognizer>>,
    selector: TextBlockSelector,
}

impl SolveService {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            recognizer: None,
            selector: TextBlockSelector::new(),
        }
    }

    /// 配置 OCR，图片会先识别并挑出题目文字块
    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// 解题
    ///
    /// # 返回
    /// - `Ok`: 解析成功的结果，或内容无法解析时的一条兜底答案
    /// - `Err(Transport)`: 连接失败
    /// - `Err(EmptyInput)`: 没有文字也没有图片
    pub async fn solve(&self, input: SolveInput) -> Result<QuestionsResponse, SolveError> {
        let (question_text, image) = self.prepare(input).await?;

        let mut last_error = None;

        for attempt in 0..2 {
            let request = build_request(&question_text, image.as_ref(), attempt > 0);

            let reply = match self.backend.complete(request).await {
                Ok(reply) => reply,
                Err(e) if e.is_transport() => return Err(e),
                Err(e) => {
                    warn!("第 {} 次解题调用失败: {}", attempt + 1, e);
                    last_error = Some(e);
                    continue;
                }
            };

            match parse_questions(&reply) {
                Ok(response) => {
                    info!(
                        "✓ 解题成功 (第 {} 次尝试)，共 {} 道题",
                        attempt + 1,
                        response.questions.len()
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        "第 {} 次回复无法解析: {} | 回复: {}",
                        attempt + 1,
                        e,
                        truncate_text(&reply, 120)
                    );
                    last_error = Some(e);
                }
            }
        }

        let raw = match last_error {
            Some(SolveError::Parse { raw, .. }) => raw,
            _ => String::new(),
        };

        warn!("⚠️ 两次尝试均无法解析，使用兜底答案");
        Ok(fallback_response(&question_text, &raw))
    }

    /// 整理输入：图片先 OCR 再选块，文字直接使用
    async fn prepare(&self, input: SolveInput) -> Result<(String, Option<Image>), SolveError> {
        match input {
            SolveInput::Text(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Err(SolveError::EmptyInput);
                }
                Ok((text, None))
            }
            SolveInput::Image(image) => {
                if image.is_empty() {
                    return Err(SolveError::EmptyInput);
                }

                let text = match &self.recognizer {
                    Some(recognizer) => match recognizer.recognize(&image).await {
                        Ok(lines) => self.selector.select(&lines),
                        Err(e) => {
                            // OCR 失败不影响 Vision 模型直接看图
                            warn!("OCR 失败 ({}): {}，直接发送图片", image.id, e);
                            String::new()
                        }
                    },
                    None => String::new(),
                };

                debug!("图片 {} 识别文字: {}", image.id, truncate_text(&text, 80));
                Ok((text, Some(image)))
            }
        }
    }
}

/// 构建解题请求
fn build_request(question_text: &str, image: Option<&Image>, strict: bool) -> ChatRequest {
    let source = match (question_text.is_empty(), image.is_some()) {
        (true, _) => "Read every question in the attached photo.".to_string(),
        (false, true) => format!(
            "Text recognized from the attached photo (may contain OCR mistakes):\n{}",
            question_text
        ),
        (false, false) => format!("Questions:\n{}", question_text),
    };

    let instruction = if strict {
        format!(
            "Respond with ONLY a JSON object and nothing else: no markdown, no code fences, \
             no commentary. The object must match exactly this shape:\n{}",
            RESPONSE_SHAPE
        )
    } else {
        format!(
            "Solve each question. Keep every answerText short enough to be spoken aloud. \
             Return JSON in this shape:\n{}",
            RESPONSE_SHAPE
        )
    };

    ChatRequest {
        system_message: SYSTEM_MESSAGE.to_string(),
        user_message: format!("{}\n\n{}", source, instruction),
        image: image.cloned(),
    }
}

/// 截取第一个 `{` 到最后一个 `}` 之间的内容，容忍模型在 JSON 前后的说明文字
pub fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&reply[start..=end])
}

/// 解析模型回复
pub fn parse_questions(reply: &str) -> Result<QuestionsResponse, SolveError> {
    let json = extract_json_object(reply)
        .ok_or_else(|| SolveError::parse(reply, "回复中没有 JSON 对象"))?;

    serde_json::from_str::<QuestionsResponse>(json)
        .map_err(|e| SolveError::parse(reply, e.to_string()))
}

/// 构造兜底答案：题干用原始输入，答案用模型的完整回复（回复为空时用固定提示）
pub fn fallback_response(question_text: &str, raw_reply: &str) -> QuestionsResponse {
    let question_text = if question_text.trim().is_empty() {
        IMAGE_PLACEHOLDER.to_string()
    } else {
        question_text.to_string()
    };
    let answer_text = match raw_reply.trim() {
        "" => FALLBACK_ANSWER.to_string(),
        reply => reply.to_string(),
    };

    QuestionsResponse {
        questions: vec![SolvedQuestion {
            number: String::new(),
            part: None,
            question_text,
            answer_text,
            explanation: Some(FALLBACK_NOTE.to_string()),
        }],
    }
}
