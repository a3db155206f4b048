//! Linear quiz runner: one question at a time, scored on finish.

use thiserror::Error;

use crate::model::{Question, Quiz};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz already finished")]
    Finished,

    #[error("option {option} does not exist (question has {options})")]
    InvalidOption { option: usize, options: usize },

    #[error("question {index} does not exist (quiz has {total})")]
    InvalidQuestion { index: usize, total: usize },

    #[error("already at the last question")]
    AtEnd,

    #[error("already at the first question")]
    AtStart,
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Final result of a quiz attempt. Unanswered questions count as wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizScore {
    pub correct: usize,
    pub total: usize,
    pub percent: u8,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizState {
    InProgress,
    Finished(QuizScore),
}

/// In-memory attempt at a quiz.
#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz: Quiz,
    current: usize,
    answers: Vec<Option<usize>>,
    state: QuizState,
}

impl QuizSession {
    #[must_use]
    pub fn new(quiz: Quiz) -> Self {
        let answers = vec![None; quiz.len()];
        Self {
            quiz,
            current: 0,
            answers,
            state: QuizState::InProgress,
        }
    }

    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    #[must_use]
    pub fn state(&self) -> QuizState {
        self.state
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        &self.quiz.questions()[self.current]
    }

    /// Option selected for the current question, if any.
    #[must_use]
    pub fn current_answer(&self) -> Option<usize> {
        self.answers[self.current]
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current + 1 == self.quiz.len()
    }

    /// Record (or replace) the answer to the current question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Finished` after `finish`, or `QuizError::InvalidOption`
    /// if `option` is out of range.
    pub fn answer(&mut self, option: usize) -> Result<(), QuizError> {
        self.ensure_in_progress()?;
        let options = self.current_question().options.len();
        if option >= options {
            return Err(QuizError::InvalidOption { option, options });
        }
        self.answers[self.current] = Some(option);
        Ok(())
    }

    /// Advance to the next question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AtEnd` on the last question, `QuizError::Finished` after `finish`.
    pub fn next(&mut self) -> Result<(), QuizError> {
        self.ensure_in_progress()?;
        if self.is_last() {
            return Err(QuizError::AtEnd);
        }
        self.current += 1;
        Ok(())
    }

    /// Step back to the previous question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AtStart` on the first question, `QuizError::Finished` after `finish`.
    pub fn previous(&mut self) -> Result<(), QuizError> {
        self.ensure_in_progress()?;
        if self.current == 0 {
            return Err(QuizError::AtStart);
        }
        self.current -= 1;
        Ok(())
    }

    /// Jump straight to question `index`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidQuestion` if out of range, `QuizError::Finished` after `finish`.
    pub fn go_to(&mut self, index: usize) -> Result<(), QuizError> {
        self.ensure_in_progress()?;
        let total = self.quiz.len();
        if index >= total {
            return Err(QuizError::InvalidQuestion { index, total });
        }
        self.current = index;
        Ok(())
    }

    /// Score the attempt and lock it.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Finished` if called twice.
    pub fn finish(&mut self) -> Result<QuizScore, QuizError> {
        self.ensure_in_progress()?;
        let total = self.quiz.len();
        let correct = self
            .quiz
            .questions()
            .iter()
            .zip(&self.answers)
            .filter(|(q, a)| **a == Some(q.correct_option))
            .count();
        let score = QuizScore {
            correct,
            total,
            percent: crate::aggregate::rounded_percent(correct, total),
        };
        self.state = QuizState::Finished(score);
        Ok(score)
    }

    fn ensure_in_progress(&self) -> Result<(), QuizError> {
        match self.state {
            QuizState::InProgress => Ok(()),
            QuizState::Finished(_) => Err(QuizError::Finished),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuizDefinitionError, WeekId};

    fn options(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("option {i}")).collect()
    }

    fn three_question_quiz() -> Quiz {
        Quiz::new(
            WeekId::number(1),
            "Week 1 check",
            vec![
                Question::new("Q1", options(3), 0),
                Question::new("Q2", options(2), 1),
                Question::new("Q3", options(4), 3),
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_malformed_quiz() {
        assert_eq!(
            Quiz::new(WeekId::number(1), "empty", vec![]).unwrap_err(),
            QuizDefinitionError::NoQuestions
        );
        assert!(matches!(
            Quiz::new(WeekId::number(1), "bad", vec![Question::new("Q", options(2), 2)]),
            Err(QuizDefinitionError::CorrectOutOfRange { index: 0, .. })
        ));
        assert!(matches!(
            Quiz::new(WeekId::number(1), "bad", vec![Question::new("Q", options(1), 0)]),
            Err(QuizDefinitionError::TooFewOptions { index: 0 })
        ));
    }

    #[test]
    fn navigates_linearly() {
        let mut session = QuizSession::new(three_question_quiz());
        assert_eq!(session.previous(), Err(QuizError::AtStart));
        session.next().unwrap();
        session.next().unwrap();
        assert!(session.is_last());
        assert_eq!(session.next(), Err(QuizError::AtEnd));
        session.previous().unwrap();
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.current_question().prompt, "Q2");
    }

    #[test]
    fn answers_are_kept_across_navigation() {
        let mut session = QuizSession::new(three_question_quiz());
        session.answer(2).unwrap();
        session.next().unwrap();
        session.previous().unwrap();
        assert_eq!(session.current_answer(), Some(2));
        session.answer(0).unwrap();
        assert_eq!(session.current_answer(), Some(0));
        assert_eq!(session.answered_count(), 1);
    }

    #[test]
    fn rejects_out_of_range_choices() {
        let mut session = QuizSession::new(three_question_quiz());
        assert_eq!(
            session.answer(3),
            Err(QuizError::InvalidOption {
                option: 3,
                options: 3
            })
        );
        assert!(matches!(
            session.go_to(3),
            Err(QuizError::InvalidQuestion { index: 3, total: 3 })
        ));
    }

    #[test]
    fn scores_with_unanswered_as_wrong() {
        let mut session = QuizSession::new(three_question_quiz());
        session.answer(0).unwrap();
        session.go_to(2).unwrap();
        session.answer(3).unwrap();

        let score = session.finish().unwrap();
        assert_eq!(score.correct, 2);
        assert_eq!(score.total, 3);
        assert_eq!(score.percent, 67);
        assert_eq!(session.state(), QuizState::Finished(score));
    }

    #[test]
    fn finished_session_is_locked() {
        let mut session = QuizSession::new(three_question_quiz());
        session.finish().unwrap();
        assert_eq!(session.answer(0), Err(QuizError::Finished));
        assert_eq!(session.next(), Err(QuizError::Finished));
        assert_eq!(session.finish(), Err(QuizError::Finished));
    }
}
