//! Add-on (OMOD) compatibility.
//!
//! The tag table lists, for every armor, the add-ons that can attach to it.
//! That judgement belongs to the game-data side; [`Compatibility`] is the seam
//! and [`AttachSlotOverlap`] the rule the curation tool has always used.

use std::collections::HashSet;
use std::path::Path;

use crate::catalog::{ArmorRecord, Catalog, FormKey, OmodRecord, RawArmor};
use crate::error::Result;
use crate::persist::quote;
use crate::slot::TemplateResolver;

pub trait Compatibility: Send + Sync {
    fn compatible<'c>(&self, armor: &ArmorRecord, catalog: &'c Catalog) -> Vec<&'c OmodRecord>;
}

/// Compatible when the add-on attaches to one of the armor's attach-parent
/// slots, targets one of its keywords and ships in the same module. The module
/// restriction also excludes some add-ons that would fit, mostly material swaps
/// from other plugins.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttachSlotOverlap;

impl Compatibility for AttachSlotOverlap {
    fn compatible<'c>(&self, armor: &ArmorRecord, catalog: &'c Catalog) -> Vec<&'c OmodRecord> {
        let slots: HashSet<&FormKey> = effective_attach_slots(armor.raw(), catalog).into_iter().collect();
        if slots.is_empty() {
            return Vec::new();
        }
        let keywords = &armor.raw().keywords;
        catalog
            .omods()
            .iter()
            .filter(|omod| {
                omod.attach_point.as_ref().is_some_and(|point| slots.contains(point))
                    && omod.target_keywords.iter().any(|keyword| keywords.contains(keyword))
                    && omod.form_key.module().eq_ignore_ascii_case(armor.module())
            })
            .collect()
    }
}

/// Never compatible. Useful where a table is written without game data.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAddons;

impl Compatibility for NoAddons {
    fn compatible<'c>(&self, _armor: &ArmorRecord, _catalog: &'c Catalog) -> Vec<&'c OmodRecord> {
        Vec::new()
    }
}

const MAX_TEMPLATE_DEPTH: usize = 8;

// An armor without attach-parent slots inherits those of its template chain.
fn effective_attach_slots<'a>(armor: &'a RawArmor, catalog: &'a Catalog) -> Vec<&'a FormKey> {
    let mut current = armor;
    for _ in 0..MAX_TEMPLATE_DEPTH {
        if !current.attach_parent_slots.is_empty() {
            return current.attach_parent_slots.iter().collect();
        }
        match current.template.as_ref().and_then(|link| catalog.resolve(link)) {
            Some(template) => current = template,
            None => break,
        }
    }
    Vec::new()
}

/// True when every filter keyword of the add-on is present on the armor.
pub fn filter_keywords_pass(omod: &OmodRecord, armor: &ArmorRecord) -> bool {
    omod.filter_keywords
        .iter()
        .all(|keyword| armor.raw().keywords.contains(keyword))
}

/// Dumps the add-ons of a catalog for inspection in a spreadsheet.
pub fn write_omod_dump(path: &Path, omods: &[OmodRecord]) -> Result<()> {
    let join = |keys: &[FormKey]| keys.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(";");
    let mut out = String::from("Plugin,FormKey,EditorID,AttachParentSlots,FilterKeywords\n");
    for omod in omods {
        let row = [
            quote(omod.form_key.module()),
            quote(&omod.form_key.to_string()),
            quote(omod.editor_id.as_deref().unwrap_or("")),
            quote(&join(&omod.attach_parent_slots)),
            quote(&join(&omod.filter_keywords)),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    std::fs::write(path, out).map_err(|e| crate::error::TagError::io(path, e))
}
