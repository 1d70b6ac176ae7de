use serde::{Deserialize, Serialize};

use super::question::SolvedQuestion;

/// 朗读队列中的一条答案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerItem {
    /// 来源图片 id
    pub source_id: String,
    pub spoken_text: String,
    pub explanation_text: String,
}

impl AnswerItem {
    /// 从解题结果生成答案；答案为空白时返回 None
    pub fn from_question(source_id: &str, question: &SolvedQuestion) -> Option<Self> {
        if !question.has_answer() {
            return None;
        }

        Some(Self {
            source_id: source_id.to_string(),
            spoken_text: question.spoken_text(),
            explanation_text: question
                .explanation
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// 按题目顺序展开解题结果，丢弃空白答案
pub fn flatten_answers(source_id: &str, questions: &[SolvedQuestion]) -> Vec<AnswerItem> {
    questions
        .iter()
        .filter_map(|q| AnswerItem::from_question(source_id, q))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(number: &str, answer: &str) -> SolvedQuestion {
        SolvedQuestion {
            number: number.to_string(),
            question_text: format!("question {}", number),
            answer_text: answer.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_flatten_keeps_order_and_drops_blank() {
        let questions = vec![
            question("1", "4"),
            question("2", "   "),
            question("3", "0.25"),
            question("4", ""),
        ];

        let items = flatten_answers("IMG_7.jpg", &questions);
        let spoken: Vec<&str> = items.iter().map(|i| i.spoken_text.as_str()).collect();
        assert_eq!(spoken, vec!["Question 1: 4", "Question 3: 0.25"]);
        assert!(items.iter().all(|i| i.source_id == "IMG_7.jpg"));
    }

    #[test]
    fn test_n_answered_questions_yield_n_items() {
        let questions: Vec<SolvedQuestion> =
            (1..=6).map(|n| question(&n.to_string(), "yes")).collect();
        let items = flatten_answers("a", &questions);
        assert_eq!(items.len(), 6);
        assert_eq!(items[5].spoken_text, "Question 6: yes");
    }
}
