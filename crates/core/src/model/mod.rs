mod catalog;
mod ids;
mod progress;
mod quiz;

pub use catalog::{Material, MaterialKind, MaterialLinks, ResourceCatalog, Week};
pub use ids::{MISC_WEEK, MaterialId, ParseIdError, ProgressKey, UserId, WeekId};
pub use progress::ProgressMap;
pub use quiz::{Question, Quiz, QuizDefinitionError};
