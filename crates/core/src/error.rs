use thiserror::Error;

use crate::model::{ParseIdError, QuizDefinitionError};
use crate::quiz::QuizError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidId(#[from] ParseIdError),
    #[error(transparent)]
    QuizDefinition(#[from] QuizDefinitionError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}
