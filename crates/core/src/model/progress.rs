use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::model::ids::{MaterialId, ProgressKey, WeekId};

/// Completion flags keyed by `"{week}-{material}"`.
///
/// Serialized as a flat JSON object of booleans. Keys that do not parse as a
/// progress key are dropped on decode rather than failing the whole map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProgressMap {
    entries: BTreeMap<ProgressKey, bool>,
}

impl ProgressMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion flag for `key`; absent keys are not completed.
    #[must_use]
    pub fn get(&self, key: ProgressKey) -> bool {
        self.entries.get(&key).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn is_completed(&self, week: WeekId, material: MaterialId) -> bool {
        self.get(ProgressKey::new(week, material))
    }

    pub fn set(&mut self, key: ProgressKey, completed: bool) {
        self.entries.insert(key, completed);
    }

    /// Flip the flag at `key` and return the new value.
    pub fn toggle(&mut self, key: ProgressKey) -> bool {
        let next = !self.get(key);
        self.entries.insert(key, next);
        next
    }

    /// Overwrite entries with those from `other`, keeping keys `other` lacks.
    pub fn merge(&mut self, other: &ProgressMap) {
        self.entries
            .extend(other.entries.iter().map(|(k, v)| (*k, *v)));
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProgressKey, bool)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.entries.values().filter(|done| **done).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(ProgressKey, bool)> for ProgressMap {
    fn from_iter<I: IntoIterator<Item = (ProgressKey, bool)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'de> Deserialize<'de> for ProgressMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, bool>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .filter_map(|(key, done)| key.parse::<ProgressKey>().ok().map(|k| (k, done)))
            .collect())
    }
}
