use course_core::model::{ProgressKey, ProgressMap};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn progress_to_json(progress: &ProgressMap) -> Result<String, StorageError> {
    serde_json::to_string(progress).map_err(ser)
}

pub(crate) fn progress_from_json(raw: &str) -> Result<ProgressMap, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

/// JSON path addressing one progress key inside the document, e.g. `$."1-0"`.
///
/// Keys are `{week}-{material}` with numeric or `misc` parts, so no escaping is needed.
pub(crate) fn progress_key_path(key: ProgressKey) -> String {
    format!("$.\"{key}\"")
}

/// JSON literal stored for a completion flag.
pub(crate) fn bool_json(completed: bool) -> &'static str {
    if completed { "true" } else { "false" }
}
