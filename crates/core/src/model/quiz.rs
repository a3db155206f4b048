use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::WeekId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizDefinitionError {
    #[error("quiz must contain at least one question")]
    NoQuestions,

    #[error("question {index} needs at least two options")]
    TooFewOptions { index: usize },

    #[error("question {index} marks option {correct} correct but has {options} options")]
    CorrectOutOfRange {
        index: usize,
        correct: usize,
        options: usize,
    },
}

/// A multiple-choice question with exactly one correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
}

impl Question {
    #[must_use]
    pub fn new(prompt: impl Into<String>, options: Vec<String>, correct_option: usize) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            correct_option,
        }
    }
}

/// Weekly quiz content. Questions are presented in order.
///
/// Decoding goes through [`Quiz::new`], so a deserialized quiz is always answerable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuizRecord")]
pub struct Quiz {
    pub week: WeekId,
    pub title: String,
    questions: Vec<Question>,
}

impl Quiz {
    /// Build a quiz, checking every question is answerable.
    ///
    /// # Errors
    ///
    /// Returns `QuizDefinitionError` for an empty quiz, a question with fewer than
    /// two options, or a correct index outside the option list.
    pub fn new(
        week: WeekId,
        title: impl Into<String>,
        questions: Vec<Question>,
    ) -> Result<Self, QuizDefinitionError> {
        if questions.is_empty() {
            return Err(QuizDefinitionError::NoQuestions);
        }
        for (index, q) in questions.iter().enumerate() {
            if q.options.len() < 2 {
                return Err(QuizDefinitionError::TooFewOptions { index });
            }
            if q.correct_option >= q.options.len() {
                return Err(QuizDefinitionError::CorrectOutOfRange {
                    index,
                    correct: q.correct_option,
                    options: q.options.len(),
                });
            }
        }
        Ok(Self {
            week,
            title: title.into(),
            questions,
        })
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Unchecked wire shape of a [`Quiz`].
#[derive(Deserialize)]
struct QuizRecord {
    week: WeekId,
    title: String,
    questions: Vec<Question>,
}

impl TryFrom<QuizRecord> for Quiz {
    type Error = QuizDefinitionError;

    fn try_from(record: QuizRecord) -> Result<Self, Self::Error> {
        Quiz::new(record.week, record.title, record.questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(options: usize, correct: usize) -> Question {
        Question::new(
            "Which?",
            (0..options).map(|i| format!("option {i}")).collect(),
            correct,
        )
    }

    #[test]
    fn decodes_valid_quiz() {
        let raw = r#"{
            "week": 2,
            "title": "Week 2 check",
            "questions": [
                { "prompt": "2 + 2?", "options": ["3", "4"], "correctOption": 1 }
            ]
        }"#;
        let quiz: Quiz = serde_json::from_str(raw).unwrap();
        assert_eq!(quiz.week, WeekId::number(2));
        assert_eq!(quiz.len(), 1);
    }

    #[test]
    fn decoding_rejects_empty_quiz() {
        let err = serde_json::from_str::<Quiz>(r#"{"week":1,"title":"t","questions":[]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("at least one question"));
    }

    #[test]
    fn decoding_rejects_out_of_range_answer() {
        let raw = r#"{"week":"misc","title":"t","questions":[
            {"prompt":"p","options":["a","b"],"correctOption":2}
        ]}"#;
        assert!(serde_json::from_str::<Quiz>(raw).is_err());
    }

    #[test]
    fn new_validates_each_question() {
        assert_eq!(
            Quiz::new(WeekId::number(1), "t", vec![question(2, 0), question(1, 0)]),
            Err(QuizDefinitionError::TooFewOptions { index: 1 })
        );
        assert!(Quiz::new(WeekId::number(1), "t", vec![question(3, 2)]).is_ok());
    }

    #[test]
    fn serializes_with_question_list() {
        let quiz = Quiz::new(WeekId::number(1), "t", vec![question(2, 1)]).unwrap();
        let json = serde_json::to_string(&quiz).unwrap();
        assert_eq!(serde_json::from_str::<Quiz>(&json).unwrap(), quiz);
    }
}
