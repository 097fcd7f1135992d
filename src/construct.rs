use std::sync::{Arc, Mutex};

// other keepers use HashMap with a fast hasher
use core::hash::BuildHasherDefault;
use std::collections::{HashMap, HashSet};
use seahash::SeaHasher;

// selections are sets of catalog positions
use roaring::RoaringBitmap;

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// our own stuff that we need
use crate::catalog::{ArmorRecord, Catalog};
use crate::classify::{self, DEFAULT_TYPE, MULTIPLE};
use crate::error::Result;
use crate::omod::{AttachSlotOverlap, Compatibility};
use crate::persist;
use crate::taxonomy::Taxonomy;

pub type KeyHasher = BuildHasherDefault<SeaHasher>;

// tag keys compare without regard to case
fn fold(key: &str) -> String {
    key.to_lowercase()
}

// ------------- Occupations -------------
pub const MALE: &str = "male";
pub const FEMALE: &str = "female";
pub const NSFW: &str = "nsfw";

/// The order is the position in the occupation bit string, first name is the
/// leftmost bit. New occupations are only ever added at the front.
pub const OCCUPATIONS: [&str; 20] = [
    "Railroad (Runaway)",
    "Railroad (Overt Agent)",
    "Minuteman",
    "Institute (Soldier)",
    "Institute (Assassin)",
    "Gunner",
    "Raider",
    "BoS Soldier",
    "BoS Support",
    "Merchant",
    "Citizen",
    "Cultist",
    "Drifter",
    "Farmer",
    "Guard",
    "Scientist",
    "Mercenary",
    "Vault Dweller",
    "Captive",
    "Doctor",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupationRoster {
    names: Vec<String>,
}

impl Default for OccupationRoster {
    fn default() -> Self {
        Self::new(OCCUPATIONS.iter().map(|name| name.to_string()).collect())
    }
}

impl OccupationRoster {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
    pub fn names(&self) -> &[String] {
        &self.names
    }
    pub fn len(&self) -> usize {
        self.names.len()
    }
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known.eq_ignore_ascii_case(name))
    }
}

// ------------- ArmorTags -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmorTags {
    values: HashMap<String, bool, KeyHasher>,
    min_level: u32,
    clothing_type: Option<String>,
}

impl ArmorTags {
    /// Every known field present and false.
    pub fn empty(roster: &OccupationRoster) -> Self {
        let values = [MALE, FEMALE, NSFW]
            .into_iter()
            .chain(roster.names().iter().map(String::as_str))
            .map(|field| (fold(field), false))
            .collect();
        Self {
            values,
            min_level: 0,
            clothing_type: None,
        }
    }
    pub fn get(&self, field: &str) -> bool {
        self.values.get(&fold(field)).copied().unwrap_or(false)
    }
    /// Unknown fields are ignored, the return value tells whether the field exists.
    pub fn set(&mut self, field: &str, value: bool) -> bool {
        match self.values.get_mut(&fold(field)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
    pub fn min_level(&self) -> u32 {
        self.min_level
    }
    pub fn set_min_level(&mut self, min_level: u32) {
        self.min_level = min_level;
    }
    pub fn clothing_type(&self) -> Option<&str> {
        self.clothing_type.as_deref()
    }
    pub fn set_clothing_type(&mut self, clothing_type: Option<String>) {
        self.clothing_type = clothing_type;
    }
    pub fn occupation_bits(&self, roster: &OccupationRoster) -> String {
        roster
            .names()
            .iter()
            .map(|name| if self.get(name) { '1' } else { '0' })
            .collect()
    }
    pub fn has_occupation(&self, roster: &OccupationRoster) -> bool {
        roster.names().iter().any(|name| self.get(name))
    }
    /// Female first, then male.
    pub fn sex_bits(&self) -> &'static str {
        match (self.get(FEMALE), self.get(MALE)) {
            (true, true) => "11",
            (true, false) => "10",
            (false, true) => "01",
            (false, false) => "00",
        }
    }
}

// ------------- Aggregates -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    False,
    True,
    Indeterminate,
}

impl TriState {
    /// Folds values into a single state. No values at all rest at false.
    pub fn from_values<I: IntoIterator<Item = bool>>(values: I) -> Self {
        let mut first: Option<bool> = None;
        for value in values {
            match first {
                None => first = Some(value),
                Some(seen) if seen != value => return TriState::Indeterminate,
                Some(_) => (),
            }
        }
        first.unwrap_or(false).into()
    }
    pub fn as_option(self) -> Option<bool> {
        match self {
            TriState::False => Some(false),
            TriState::True => Some(true),
            TriState::Indeterminate => None,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value { TriState::True } else { TriState::False }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelAggregate {
    Uniform(u32),
    Mixed,
}

// ------------- TagKeeper -------------
#[derive(Debug)]
pub struct TagKeeper {
    roster: OccupationRoster,
    // folded key to (key as first spelled, tags)
    kept: HashMap<String, (String, ArmorTags), KeyHasher>,
}

impl TagKeeper {
    pub fn new(roster: OccupationRoster) -> Self {
        Self {
            roster,
            kept: HashMap::default(),
        }
    }
    pub fn roster(&self) -> &OccupationRoster {
        &self.roster
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
    pub fn get(&self, key: &str) -> Option<&ArmorTags> {
        self.kept.get(&fold(key)).map(|(_, tags)| tags)
    }
    pub fn get_or_create(&mut self, key: &str) -> &mut ArmorTags {
        let roster = &self.roster;
        &mut self
            .kept
            .entry(fold(key))
            .or_insert_with(|| (key.to_string(), ArmorTags::empty(roster)))
            .1
    }
    pub fn keep(&mut self, key: &str, tags: ArmorTags) {
        self.kept.insert(fold(key), (key.to_string(), tags));
    }
    /// Every kept key, spelled as it was first kept, with its tags.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ArmorTags)> {
        self.kept.values().map(|(key, tags)| (key.as_str(), tags))
    }
    fn current(&self, key: &str, field: &str) -> bool {
        self.get(key).is_some_and(|tags| tags.get(field))
    }

    pub fn aggregate_boolean<'k, I>(&self, selection: I, field: &str) -> TriState
    where
        I: IntoIterator<Item = &'k str>,
    {
        TriState::from_values(selection.into_iter().map(|key| self.current(key, field)))
    }

    pub fn aggregate_min_level<'k, I>(&self, selection: I) -> LevelAggregate
    where
        I: IntoIterator<Item = &'k str>,
    {
        let mut first: Option<u32> = None;
        for key in selection {
            let level = self.get(key).map(|tags| tags.min_level()).unwrap_or(0);
            match first {
                None => first = Some(level),
                Some(seen) if seen != level => return LevelAggregate::Mixed,
                Some(_) => (),
            }
        }
        LevelAggregate::Uniform(first.unwrap_or(0))
    }

    /// The clothing type to present for a selection. A label that is neither
    /// [`MULTIPLE`] nor a live type name falls back to [`DEFAULT_TYPE`].
    pub fn aggregate_clothing_type(&self, records: &[&ArmorRecord], taxonomy: &Taxonomy) -> String {
        let label = classify::classify_many(records.iter().copied(), self, taxonomy);
        if label != MULTIPLE && !taxonomy.has_name(&label) {
            return DEFAULT_TYPE.to_string();
        }
        label
    }

    /// Returns false, changing nothing, when `field` is not a known tag.
    pub fn apply_boolean<'k, I>(&mut self, selection: I, field: &str, value: bool) -> bool
    where
        I: IntoIterator<Item = &'k str>,
    {
        let known = [MALE, FEMALE, NSFW].iter().any(|f| f.eq_ignore_ascii_case(field))
            || self.roster.contains(field);
        if !known {
            warn!(field, "unknown tag field ignored");
            return false;
        }
        for key in selection {
            self.get_or_create(key).set(field, value);
        }
        true
    }

    pub fn apply_min_level<'k, I>(&mut self, selection: I, min_level: u32)
    where
        I: IntoIterator<Item = &'k str>,
    {
        for key in selection {
            self.get_or_create(key).set_min_level(min_level);
        }
    }

    /// Assigns a clothing type. A name the taxonomy does not know clears the
    /// assignment instead. Returns what was stored.
    pub fn apply_clothing_type<'k, I>(&mut self, selection: I, name: &str, taxonomy: &Taxonomy) -> Option<String>
    where
        I: IntoIterator<Item = &'k str>,
    {
        let stored = if taxonomy.has_name(name) { Some(name.to_string()) } else { None };
        for key in selection {
            self.get_or_create(key).set_clothing_type(stored.clone());
        }
        stored
    }

    /// Forgets everything and starts every given key over from defaults.
    pub fn reset<'k, I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = &'k str>,
    {
        self.kept.clear();
        for key in keys {
            self.get_or_create(key);
        }
    }
}

// ------------- Workspace -------------
/// Everything shown to the curator for one aggregated selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateView {
    pub male: TriState,
    pub female: TriState,
    pub nsfw: TriState,
    pub occupations: Vec<(String, TriState)>,
    pub min_level: LevelAggregate,
    pub clothing_type: String,
}

// This sets up the curation session with the necessary structures.
// Locks are always taken in field order: catalog, taxonomy, tags, selection,
// descriptions, tag_file.
pub struct Workspace {
    pub catalog: Arc<Mutex<Catalog>>,
    pub taxonomy: Arc<Mutex<Taxonomy>>,
    pub tags: Arc<Mutex<TagKeeper>>,
    // positions in the catalog
    pub selection: Arc<Mutex<RoaringBitmap>>,
    // the label shown next to each record, by record key
    pub descriptions: Arc<Mutex<HashMap<String, String, KeyHasher>>>,
    pub tag_file: Arc<Mutex<Option<PathBuf>>>,
    compatibility: Box<dyn Compatibility>,
}

fn selected_records<'c>(catalog: &'c Catalog, selection: &RoaringBitmap) -> Vec<&'c ArmorRecord> {
    selection
        .iter()
        .filter_map(|position| catalog.get(position as usize))
        .collect()
}

fn describe_all(
    catalog: &Catalog,
    taxonomy: &Taxonomy,
    tags: &TagKeeper,
    descriptions: &mut HashMap<String, String, KeyHasher>,
) {
    descriptions.clear();
    for record in catalog.records() {
        let label = classify::classify_one(record, tags.get(record.editor_id()), taxonomy);
        descriptions.insert(record.key().to_string(), label.to_string());
    }
}

impl Workspace {
    pub fn new(taxonomy: Taxonomy, roster: OccupationRoster) -> Self {
        Self::with_compatibility(taxonomy, roster, Box::new(AttachSlotOverlap))
    }
    pub fn with_compatibility(
        taxonomy: Taxonomy,
        roster: OccupationRoster,
        compatibility: Box<dyn Compatibility>,
    ) -> Self {
        Self {
            catalog: Arc::new(Mutex::new(Catalog::new())),
            taxonomy: Arc::new(Mutex::new(taxonomy)),
            tags: Arc::new(Mutex::new(TagKeeper::new(roster))),
            selection: Arc::new(Mutex::new(RoaringBitmap::new())),
            descriptions: Arc::new(Mutex::new(HashMap::default())),
            tag_file: Arc::new(Mutex::new(None)),
            compatibility,
        }
    }
    // functions to access the owned stores
    pub fn catalog(&self) -> Arc<Mutex<Catalog>> {
        Arc::clone(&self.catalog)
    }
    pub fn taxonomy(&self) -> Arc<Mutex<Taxonomy>> {
        Arc::clone(&self.taxonomy)
    }
    pub fn tags(&self) -> Arc<Mutex<TagKeeper>> {
        Arc::clone(&self.tags)
    }

    /// Installs a freshly scanned catalog. Tags survive, the selection does not.
    pub fn install_catalog(&self, fresh: Catalog) -> Result<()> {
        let mut catalog = self.catalog.lock()?;
        *catalog = fresh;
        let taxonomy = self.taxonomy.lock()?;
        let mut tags = self.tags.lock()?;
        for record in catalog.records() {
            tags.get_or_create(record.editor_id());
        }
        self.selection.lock()?.clear();
        describe_all(&catalog, &taxonomy, &tags, &mut *self.descriptions.lock()?);
        info!(armors = catalog.len(), "catalog installed");
        Ok(())
    }

    /// Swaps in a reloaded taxonomy, for instance after the types were edited.
    pub fn replace_taxonomy(&self, fresh: Taxonomy) -> Result<()> {
        let catalog = self.catalog.lock()?;
        let mut taxonomy = self.taxonomy.lock()?;
        *taxonomy = fresh;
        let tags = self.tags.lock()?;
        describe_all(&catalog, &taxonomy, &tags, &mut *self.descriptions.lock()?);
        Ok(())
    }

    pub fn refresh_descriptions(&self) -> Result<()> {
        let catalog = self.catalog.lock()?;
        let taxonomy = self.taxonomy.lock()?;
        let tags = self.tags.lock()?;
        describe_all(&catalog, &taxonomy, &tags, &mut *self.descriptions.lock()?);
        Ok(())
    }

    pub fn description(&self, record_key: &str) -> Result<Option<String>> {
        Ok(self.descriptions.lock()?.get(record_key).cloned())
    }

    // ------------- Selection -------------
    pub fn select_positions<I: IntoIterator<Item = u32>>(&self, positions: I) -> Result<usize> {
        let catalog = self.catalog.lock()?;
        let mut selection = self.selection.lock()?;
        selection.clear();
        for position in positions {
            if (position as usize) < catalog.len() {
                selection.insert(position);
            }
        }
        Ok(selection.len() as usize)
    }

    /// Selects every record with one of the editor ids. Returns how many matched.
    pub fn select_editor_ids(&self, editor_ids: &[&str]) -> Result<usize> {
        let catalog = self.catalog.lock()?;
        let mut selection = self.selection.lock()?;
        selection.clear();
        for (position, record) in catalog.records().iter().enumerate() {
            if editor_ids.iter().any(|id| id.eq_ignore_ascii_case(record.editor_id())) {
                selection.insert(position as u32);
            }
        }
        Ok(selection.len() as usize)
    }

    pub fn clear_selection(&self) -> Result<()> {
        self.selection.lock()?.clear();
        Ok(())
    }

    pub fn selected_positions(&self) -> Result<Vec<u32>> {
        Ok(self.selection.lock()?.iter().collect())
    }

    // ------------- Aggregation -------------
    pub fn aggregate(&self) -> Result<AggregateView> {
        let catalog = self.catalog.lock()?;
        let taxonomy = self.taxonomy.lock()?;
        let tags = self.tags.lock()?;
        let selection = self.selection.lock()?;
        let records = selected_records(&catalog, &selection);
        let keys: Vec<&str> = records.iter().map(|record| record.editor_id()).collect();
        let view = AggregateView {
            male: tags.aggregate_boolean(keys.iter().copied(), MALE),
            female: tags.aggregate_boolean(keys.iter().copied(), FEMALE),
            nsfw: tags.aggregate_boolean(keys.iter().copied(), NSFW),
            occupations: tags
                .roster()
                .names()
                .iter()
                .map(|name| (name.clone(), tags.aggregate_boolean(keys.iter().copied(), name)))
                .collect(),
            min_level: tags.aggregate_min_level(keys.iter().copied()),
            clothing_type: tags.aggregate_clothing_type(&records, &taxonomy),
        };
        Ok(view)
    }

    // The apply functions change every selected record first and aggregate once afterwards.
    pub fn apply_boolean(&self, field: &str, value: bool) -> Result<AggregateView> {
        {
            let catalog = self.catalog.lock()?;
            let mut tags = self.tags.lock()?;
            let selection = self.selection.lock()?;
            let records = selected_records(&catalog, &selection);
            tags.apply_boolean(records.iter().map(|record| record.editor_id()), field, value);
        }
        self.aggregate()
    }

    pub fn apply_min_level(&self, min_level: u32) -> Result<AggregateView> {
        {
            let catalog = self.catalog.lock()?;
            let mut tags = self.tags.lock()?;
            let selection = self.selection.lock()?;
            let records = selected_records(&catalog, &selection);
            tags.apply_min_level(records.iter().map(|record| record.editor_id()), min_level);
        }
        self.aggregate()
    }

    pub fn apply_clothing_type(&self, name: &str) -> Result<AggregateView> {
        {
            let catalog = self.catalog.lock()?;
            let taxonomy = self.taxonomy.lock()?;
            let mut tags = self.tags.lock()?;
            let selection = self.selection.lock()?;
            let records = selected_records(&catalog, &selection);
            let stored = tags.apply_clothing_type(
                records.iter().map(|record| record.editor_id()),
                name,
                &taxonomy,
            );
            if stored.is_none() {
                debug!(name, "not a clothing type, assignment cleared");
            }
            // every record sharing a selected editor id shares its tags
            let touched: HashSet<String, KeyHasher> = records.iter().map(|record| fold(record.editor_id())).collect();
            let mut descriptions = self.descriptions.lock()?;
            for record in catalog
                .records()
                .iter()
                .filter(|record| touched.contains(&fold(record.editor_id())))
            {
                let label = classify::classify_one(record, tags.get(record.editor_id()), &taxonomy);
                descriptions.insert(record.key().to_string(), label.to_string());
            }
        }
        self.aggregate()
    }

    // ------------- Tag files -------------
    /// Loads a tag table in place of the current one. On failure nothing changes.
    pub fn load_tags(&self, path: &Path) -> Result<usize> {
        let catalog = self.catalog.lock()?;
        let taxonomy = self.taxonomy.lock()?;
        let mut tags = self.tags.lock()?;
        let rows = persist::read_tag_table(path, tags.roster(), &catalog)?;
        let count = rows.len();
        tags.reset(catalog.records().iter().map(|record| record.editor_id()));
        for (editor_id, row) in rows {
            tags.keep(&editor_id, row);
        }
        describe_all(&catalog, &taxonomy, &tags, &mut *self.descriptions.lock()?);
        *self.tag_file.lock()? = Some(path.to_path_buf());
        info!(path = %path.display(), rows = count, "tag table loaded");
        Ok(count)
    }

    pub fn save_tags(&self, path: &Path) -> Result<usize> {
        let catalog = self.catalog.lock()?;
        let tags = self.tags.lock()?;
        let written = persist::write_tag_table(path, &catalog, &tags, self.compatibility.as_ref())?;
        *self.tag_file.lock()? = Some(path.to_path_buf());
        info!(path = %path.display(), rows = written, "tag table saved");
        Ok(written)
    }

    /// Forgets the loaded tag table and resets every record to defaults.
    pub fn unload_tags(&self) -> Result<AggregateView> {
        {
            let catalog = self.catalog.lock()?;
            let taxonomy = self.taxonomy.lock()?;
            let mut tags = self.tags.lock()?;
            tags.reset(catalog.records().iter().map(|record| record.editor_id()));
            describe_all(&catalog, &taxonomy, &tags, &mut *self.descriptions.lock()?);
            *self.tag_file.lock()? = None;
        }
        self.aggregate()
    }

    pub fn tag_file(&self) -> Result<Option<PathBuf>> {
        Ok(self.tag_file.lock()?.clone())
    }
}
