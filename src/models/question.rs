use serde::{Deserialize, Serialize};

/// 解题服务返回的单道题
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedQuestion {
    /// 题号（模型有时返回数字，有时返回字符串）
    #[serde(default, deserialize_with = "deserialize_number")]
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    pub question_text: String,
    pub answer_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl SolvedQuestion {
    /// 朗读用的文本，例如 `Question 3 b: 12.5`
    pub fn spoken_text(&self) -> String {
        let answer = self.answer_text.trim();
        let number = self.number.trim();
        let part = self.part.as_deref().map(str::trim).unwrap_or_default();

        match (number.is_empty(), part.is_empty()) {
            (true, _) => answer.to_string(),
            (false, true) => format!("Question {}: {}", number, answer),
            (false, false) => format!("Question {} {}: {}", number, part, answer),
        }
    }

    pub fn has_answer(&self) -> bool {
        !self.answer_text.trim().is_empty()
    }
}

/// 解题服务的完整响应
///
/// `questions`、`questionText`、`answerText` 必须出现，缺少时视为无法解析
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionsResponse {
    pub questions: Vec<SolvedQuestion>,
}

/// 题号既可以是字符串也可以是整数
fn deserialize_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct NumberVisitor;

    impl<'de> Visitor<'de> for NumberVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or number representing a question number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(NumberVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_accepts_int_and_string() {
        let json = r#"{"questions":[
            {"number": 3, "questionText": "Find the mean", "answerText": "12.5"},
            {"number": "4", "part": "b", "questionText": "Median?", "answerText": "7", "explanation": "middle value"},
            {"number": null, "questionText": "x", "answerText": "y"}
        ]}"#;

        let response: QuestionsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.questions.len(), 3);
        assert_eq!(response.questions[0].number, "3");
        assert_eq!(response.questions[1].part.as_deref(), Some("b"));
        assert_eq!(response.questions[2].number, "");
    }

    #[test]
    fn test_missing_required_fields_rejected() {
        assert!(serde_json::from_str::<QuestionsResponse>(r#"{"answer":"12.5"}"#).is_err());
        assert!(serde_json::from_str::<QuestionsResponse>(r#"{"questions":[{"foo":1}]}"#).is_err());
        assert!(serde_json::from_str::<QuestionsResponse>(
            r#"{"questions":[{"number":1,"questionText":"Mean?"}]}"#
        )
        .is_err());

        // 题号、小题、解释缺省即可
        let response: QuestionsResponse =
            serde_json::from_str(r#"{"questions":[{"questionText":"q","answerText":"a"}]}"#).unwrap();
        assert_eq!(response.questions[0].number, "");
        assert!(response.questions[0].explanation.is_none());
    }

    #[test]
    fn test_spoken_text_format() {
        let mut q = SolvedQuestion {
            number: "3".to_string(),
            answer_text: " 12.5 ".to_string(),
            ..Default::default()
        };
        assert_eq!(q.spoken_text(), "Question 3: 12.5");

        q.part = Some("b".to_string());
        assert_eq!(q.spoken_text(), "Question 3 b: 12.5");

        q.number.clear();
        assert_eq!(q.spoken_text(), "12.5");
    }

    #[test]
    fn test_blank_answer_detected() {
        let q = SolvedQuestion {
            answer_text: "  \n ".to_string(),
            ..Default::default()
        };
        assert!(!q.has_answer());
    }
}
