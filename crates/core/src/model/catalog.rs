use serde::{Deserialize, Serialize};

use crate::model::ids::{MaterialId, ProgressKey, WeekId};

//
// ─── MATERIAL ──────────────────────────────────────────────────────────────────
//

/// File format of a course material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    Pdf,
    Docx,
}

/// Where a material can be viewed or downloaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,
}

/// A single course resource as published by the content provider.
///
/// `week_id` and `id` are the identity fields used to build progress keys. The
/// provider does not guarantee them, so both are optional here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MaterialId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_id: Option<WeekId>,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: MaterialKind,
    #[serde(default)]
    pub links: MaterialLinks,
}

impl Material {
    #[must_use]
    pub fn new(
        week_id: WeekId,
        id: MaterialId,
        title: impl Into<String>,
        kind: MaterialKind,
    ) -> Self {
        Self {
            id: Some(id),
            week_id: Some(week_id),
            title: title.into(),
            kind,
            links: MaterialLinks::default(),
        }
    }

    /// Progress key for this material, or `None` when an identity field is missing.
    #[must_use]
    pub fn progress_key(&self) -> Option<ProgressKey> {
        Some(ProgressKey::new(self.week_id?, self.id?))
    }
}

//
// ─── WEEK ──────────────────────────────────────────────────────────────────────
//

/// One week of the course and its materials, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Week {
    pub week: WeekId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub materials: Vec<Material>,
}

impl Week {
    #[must_use]
    pub fn new(week: WeekId, materials: Vec<Material>) -> Self {
        Self {
            week,
            title: None,
            materials,
        }
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Ordered list of weeks supplied by the content provider.
///
/// Serialized as a bare JSON array of week records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceCatalog {
    weeks: Vec<Week>,
}

impl ResourceCatalog {
    #[must_use]
    pub fn new(weeks: Vec<Week>) -> Self {
        Self { weeks }
    }

    #[must_use]
    pub fn weeks(&self) -> &[Week] {
        &self.weeks
    }

    #[must_use]
    pub fn week(&self, week: WeekId) -> Option<&Week> {
        self.weeks.iter().find(|w| w.week == week)
    }

    /// Every material in catalog order, across all weeks.
    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.weeks.iter().flat_map(|w| w.materials.iter())
    }

    /// Progress keys of every fully identified material.
    pub fn progress_keys(&self) -> impl Iterator<Item = ProgressKey> + '_ {
        self.materials().filter_map(Material::progress_key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }
}
