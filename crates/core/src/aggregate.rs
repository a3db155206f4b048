//! Completion percentages derived from a progress map and the resource catalog.
//!
//! Only materials carrying both `weekId` and `id` are counted; anything else is
//! left out of numerator and denominator alike.

use crate::model::{Material, ProgressMap, ResourceCatalog, WeekId};

/// `round(100 * part / whole)` with halves rounded up; `0` when `whole` is zero.
#[must_use]
pub fn rounded_percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = part.min(whole);
    let pct = (200 * part + whole) / (2 * whole);
    u8::try_from(pct).unwrap_or(100)
}

/// Percentage of `week`'s materials marked completed.
///
/// A week with no countable materials (or absent from the catalog) yields `0`.
#[must_use]
pub fn percent_complete(catalog: &ResourceCatalog, progress: &ProgressMap, week: WeekId) -> u8 {
    tally(
        catalog.materials().filter(|m| m.week_id == Some(week)),
        progress,
    )
}

/// Percentage of all catalog materials marked completed.
#[must_use]
pub fn percent_complete_total(catalog: &ResourceCatalog, progress: &ProgressMap) -> u8 {
    tally(catalog.materials(), progress)
}

fn tally<'a>(materials: impl Iterator<Item = &'a Material>, progress: &ProgressMap) -> u8 {
    let (done, total) = materials
        .filter_map(Material::progress_key)
        .fold((0_usize, 0_usize), |(done, total), key| {
            (done + usize::from(progress.get(key)), total + 1)
        });
    rounded_percent(done, total)
}
