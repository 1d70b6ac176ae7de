//! 文字块选择 - 业务能力层
//!
//! 从 OCR 结果中挑出"真正的题目"那一块文字，过滤掉考试界面上的按钮、
//! 计时器等干扰内容。纯函数，不做任何 I/O。
//!
//! ## 算法
//! 1. 丢弃置信度 < 0.35 的行
//! 2. 从上到下排序（y 轴向上，所以按中点降序）
//! 3. 逐行打分（数字密度、领域关键词、题号、问号、界面文字、短行、高置信度）
//! 4. 相邻两行中点间距 > 0.06 时切分为新块
//! 5. 选总分最高的块，同分比数字个数；没有正分块时使用全部行
//! 6. 用换行拼接选中块的文字

use phf::phf_set;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::RecognizedLine;

/// 低于此置信度的行直接丢弃
pub const MIN_CONFIDENCE: f32 = 0.35;
/// 高置信度加分阈值
pub const HIGH_CONFIDENCE: f32 = 0.85;
/// 切分文字块的垂直间距（归一化高度）
pub const BLOCK_GAP: f32 = 0.06;

/// 统计 / 数学领域关键词
static DOMAIN_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "mean", "median", "mode", "range", "variance", "standard deviation",
    "probability", "hypothesis", "confidence interval", "regression",
    "correlation", "sample", "population", "distribution", "p-value",
    "z-score", "t-test", "frequency", "percentile", "quartile", "histogram",
    "expected value", "binomial", "normal", "significance", "estimate",
    "calculate", "solve", "equation", "average", "ratio", "percent",
};

/// 考试界面上常见的按钮 / 提示文字
static UI_CHROME_PHRASES: phf::Set<&'static str> = phf_set! {
    "next question", "previous question", "submit", "submit answer",
    "flag for review", "mark for review", "time remaining", "save and exit",
    "log out", "sign out", "calculator", "end test", "question navigator",
    "settings", "menu", "help", "zoom", "back", "next", "battery",
};

/// 行首题号，如 `3.`、`12.`
static NUMBERING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d{1,3}\.").expect("题号正则无效"));

/// 打过分的行
#[derive(Debug, Clone)]
struct ScoredLine<'a> {
    line: &'a RecognizedLine,
    score: i32,
    digits: usize,
}

/// 一组垂直相邻的行
#[derive(Debug, Default)]
struct Block<'a> {
    lines: Vec<ScoredLine<'a>>,
}

impl Block<'_> {
    fn score(&self) -> i32 {
        self.lines.iter().map(|l| l.score).sum()
    }

    fn digits(&self) -> usize {
        self.lines.iter().map(|l| l.digits).sum()
    }
}

/// 文字块选择器
///
/// 职责：
/// - 对 OCR 行打分并聚类
/// - 只处理单张图片的识别结果
/// - 不关心解题流程
#[derive(Debug, Clone, Default)]
pub struct TextBlockSelector;

impl TextBlockSelector {
    pub fn new() -> Self {
        Self
    }

    /// 选出最像题目的文字块，没有可用的行时返回空字符串
    pub fn select(&self, lines: &[RecognizedLine]) -> String {
        let mut kept: Vec<&RecognizedLine> = lines
            .iter()
            .filter(|l| l.confidence >= MIN_CONFIDENCE)
            .collect();

        if kept.is_empty() {
            return String::new();
        }

        // y 轴向上：中点越大越靠上
        kept.sort_by(|a, b| b.bounding_box.mid_y().total_cmp(&a.bounding_box.mid_y()));

        let scored: Vec<ScoredLine> = kept
            .iter()
            .map(|line| ScoredLine {
                line: *line,
                score: score_line(line),
                digits: count_digits(&line.text),
            })
            .collect();

        let blocks = split_blocks(&scored);
        debug!("OCR 共 {} 行，切分为 {} 个文字块", scored.len(), blocks.len());

        let best = blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.score() > 0)
            .max_by(|(ia, a), (ib, b)| {
                a.score()
                    .cmp(&b.score())
                    .then(a.digits().cmp(&b.digits()))
                    // 完全同分时取靠上的块
                    .then(ib.cmp(ia))
            })
            .map(|(_, b)| b);

        match best {
            Some(block) => {
                debug!("选中文字块: {} 行, 得分 {}", block.lines.len(), block.score());
                join_lines(block.lines.iter().map(|l| l.line))
            }
            None => {
                debug!("没有正分文字块，使用全部文字");
                join_lines(scored.iter().map(|l| l.line))
            }
        }
    }
}

/// 单行打分
fn score_line(line: &RecognizedLine) -> i32 {
    let text = line.text.trim();
    let lower = text.to_lowercase();
    let digits = count_digits(text);
    let length = text.chars().filter(|c| !c.is_whitespace()).count();

    let mut score = 0;

    if digits > 0 {
        let density = digits as f32 / length as f32;
        score += if density >= 0.5 {
            3
        } else if density >= 0.2 {
            2
        } else {
            1
        };
    }

    if DOMAIN_KEYWORDS.iter().any(|k| contains_phrase(&lower, k)) {
        score += 3;
    }
    if NUMBERING.is_match(text) {
        score += 2;
    }
    if text.contains('?') {
        score += 2;
    }
    if UI_CHROME_PHRASES.iter().any(|p| contains_phrase(&lower, p)) {
        score -= 4;
    }
    if length <= 2 && digits == 0 {
        score -= 2;
    }
    if line.confidence >= HIGH_CONFIDENCE {
        score += 1;
    }

    score
}

fn count_digits(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_digit()).count()
}

/// 按整词匹配短语，避免 `back` 命中 `background`
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

/// 按垂直间距切分文字块
fn split_blocks<'a>(lines: &[ScoredLine<'a>]) -> Vec<Block<'a>> {
    let mut blocks: Vec<Block<'a>> = Vec::new();
    let mut previous_mid: Option<f32> = None;

    for line in lines {
        let mid = line.line.bounding_box.mid_y();
        let new_block = match previous_mid {
            Some(prev) => prev - mid > BLOCK_GAP,
            None => true,
        };

        if new_block {
            blocks.push(Block::default());
        }
        if let Some(block) = blocks.last_mut() {
            block.lines.push(line.clone());
        }
        previous_mid = Some(mid);
    }

    blocks
}

fn join_lines<'a>(lines: impl Iterator<Item = &'a RecognizedLine>) -> String {
    lines
        .map(|l| l.text.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    fn line(text: &str, confidence: f32, y: f32) -> RecognizedLine {
        RecognizedLine::new(text, confidence, BoundingBox::new(0.1, y, 0.8, 0.03))
    }

    #[test]
    fn test_empty_input_gives_empty_string() {
        let selector = TextBlockSelector::new();
        assert_eq!(selector.select(&[]), "");
        assert_eq!(selector.select(&[line("12 + 4", 0.2, 0.5)]), "");
    }

    #[test]
    fn test_question_block_beats_chrome() {
        let lines = vec![
            // 底部按钮
            line("Submit", 0.95, 0.05),
            line("Next Question", 0.95, 0.10),
            // 题目块（乱序输入）
            line("Find the mean of 4, 8, 15, 16, 23, 42.", 0.9, 0.60),
            line("3. A sample of six values:", 0.9, 0.64),
            line("What is the median?", 0.9, 0.56),
            // 顶部计时器
            line("Time remaining 12:40", 0.9, 0.95),
        ];

        let selected = TextBlockSelector::new().select(&lines);
        assert_eq!(
            selected,
            "3. A sample of six values:\nFind the mean of 4, 8, 15, 16, 23, 42.\nWhat is the median?"
        );
    }

    #[test]
    fn test_fallback_to_all_lines_when_nothing_positive() {
        let lines = vec![line("Menu", 0.5, 0.9), line("ok", 0.5, 0.2)];
        let selected = TextBlockSelector::new().select(&lines);
        assert_eq!(selected, "Menu\nok");
    }

    #[test]
    fn test_tie_broken_by_digit_count() {
        // 两块都是 2 分：问号 +2 / 数字密度 ≥0.2 +2，后者数字更多
        let lines = vec![line("Is it odd?", 0.5, 0.9), line("Odd: 77", 0.5, 0.3)];
        assert_eq!(TextBlockSelector::new().select(&lines), "Odd: 77");

        // 完全同分且都没有数字时取靠上的块
        let lines = vec![line("Is x odd?", 0.5, 0.9), line("Is x even?", 0.5, 0.3)];
        assert_eq!(TextBlockSelector::new().select(&lines), "Is x odd?");
    }

    #[test]
    fn test_score_components() {
        assert_eq!(score_line(&line("42", 0.5, 0.0)), 3);
        assert_eq!(score_line(&line("2. Compute the variance", 0.9, 0.0)), 1 + 3 + 2 + 1);
        assert_eq!(score_line(&line("Flag for review", 0.5, 0.0)), -4);
        assert_eq!(score_line(&line("ab", 0.5, 0.0)), -2);
        // 整词匹配：background 不算 back
        assert_eq!(score_line(&line("background noise", 0.5, 0.0)), 0);
    }

    #[test]
    fn test_gap_splits_blocks() {
        let lines = vec![line("a", 0.5, 0.90), line("b", 0.5, 0.85), line("c", 0.5, 0.50)];
        let scored: Vec<ScoredLine> = lines
            .iter()
            .map(|l| ScoredLine {
                line: l,
                score: 0,
                digits: 0,
            })
            .collect();
        let blocks = split_blocks(&scored);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lines.len(), 2);
    }
}
