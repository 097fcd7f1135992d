//! Classification of armor records by clothing type.
//!
//! Clothing types matter because of clipping, so the label shown for a record
//! should be as helpful as possible in little space. An explicit assignment is
//! shown as is. Without one, the occupied slots are compared against every
//! type's primary slots: an exact match is shown as `AUTO:` with the matching
//! names, which tells the curator the record is compatible with an existing
//! mapping. Failing that, the occupied slots themselves are listed after
//! `SLOT:`.
//!
//! A selection is summarized the same way. Records that resolve to different
//! labels produce [`MULTIPLE`], a hint that they probably should not be tagged
//! together.

use std::fmt;

use crate::catalog::ArmorRecord;
use crate::construct::{ArmorTags, TagKeeper};
use crate::slot::{BipedMask, SlotCatalog};
use crate::taxonomy::Taxonomy;

pub const MULTIPLE: &str = "<<multiple>>";
pub const NOTHING_SELECTED: &str = "None";
pub const DEFAULT_TYPE: &str = "DEFAULT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Explicit(String),
    Auto(Vec<String>),
    Slots(Vec<String>),
}

impl Classification {
    pub fn is_explicit(&self) -> bool {
        matches!(self, Classification::Explicit(_))
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Classification::Explicit(name) => write!(f, "{name}"),
            Classification::Auto(names) => write!(f, "AUTO:{}", names.join(", ")),
            Classification::Slots(labels) => write!(f, "SLOT:{}", labels.join(", ")),
        }
    }
}

/// Infers a classification from occupied slots alone.
pub fn classify_slots(occupied: BipedMask, taxonomy: &Taxonomy) -> Classification {
    let matches = taxonomy.matching_primary(occupied);
    if !matches.is_empty() {
        return Classification::Auto(matches.into_iter().map(String::from).collect());
    }
    Classification::Slots(occupied.slots().map(SlotCatalog::describe).collect())
}

pub fn classify_one(record: &ArmorRecord, tags: Option<&ArmorTags>, taxonomy: &Taxonomy) -> Classification {
    if let Some(explicit) = tags.and_then(|tags| tags.clothing_type()) {
        return Classification::Explicit(explicit.to_string());
    }
    classify_slots(record.occupied_slots(), taxonomy)
}

/// The shared label of a selection, [`MULTIPLE`] when labels differ and
/// [`NOTHING_SELECTED`] for an empty selection.
pub fn classify_many<'r, I>(records: I, keeper: &TagKeeper, taxonomy: &Taxonomy) -> String
where
    I: IntoIterator<Item = &'r ArmorRecord>,
{
    let mut aggregate: Option<String> = None;
    for record in records {
        let label = classify_one(record, keeper.get(record.editor_id()), taxonomy).to_string();
        match &aggregate {
            None => aggregate = Some(label),
            Some(seen) if *seen != label => return MULTIPLE.to_string(),
            Some(_) => (),
        }
    }
    aggregate.unwrap_or_else(|| NOTHING_SELECTED.to_string())
}
