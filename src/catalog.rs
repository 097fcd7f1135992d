//! The armor catalog as delivered by the game-data collaborator.
//!
//! The collaborator enumerates the winning armor and add-on records of a load
//! order. This module turns those raw records into [`ArmorRecord`]s with their
//! occupied slots resolved, and offers the lookups the tag table needs: by
//! editor id, by form key, and by template link.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::construct::KeyHasher;
use crate::error::{Result, TagError};
use crate::slot::{occupied_slots, BipedMask, BodyTemplate, TemplateResolver};

pub const MISSING_EDITOR_ID: &str = "(no EDID)";

// local form ids are 24 bits, the top byte is the load order slot
const LOCAL_ID_MASK: u32 = 0x00FF_FFFF;
// light (ESL) forms never exceed 0xFFF
const LIGHT_ID_MASK: u32 = 0x0000_0FFF;

// ------------- FormKey -------------
/// A module-qualified form identifier, written `0012AB:Module.esp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormKey {
    local_id: u32,
    module: String,
}

impl FormKey {
    pub fn new(local_id: u32, module: impl Into<String>) -> Self {
        Self {
            local_id: local_id & LOCAL_ID_MASK,
            module: module.into(),
        }
    }
    pub fn parse(text: &str) -> Option<Self> {
        let (id, module) = text.trim().split_once(':')?;
        if id.is_empty() || id.len() > 8 || module.is_empty() {
            return None;
        }
        let local_id = u32::from_str_radix(id, 16).ok()?;
        Some(Self::new(local_id, module))
    }
    pub fn local_id(&self) -> u32 {
        self.local_id
    }
    pub fn module(&self) -> &str {
        &self.module
    }
    /// Ids whose first three hex digits are `000` can be expressed as light forms.
    pub fn is_light_form(&self) -> bool {
        self.local_id & !LIGHT_ID_MASK == 0
    }
    pub fn light_id(&self) -> u32 {
        self.local_id & LIGHT_ID_MASK
    }
    /// Module names compare case-insensitively, with or without the plugin extension.
    pub fn module_matches(&self, module: &str) -> bool {
        if self.module.eq_ignore_ascii_case(module) {
            return true;
        }
        match self.module.rsplit_once('.') {
            Some((stem, _)) => stem.eq_ignore_ascii_case(module),
            None => false,
        }
    }
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:06X}:{}", self.local_id, self.module)
    }
}

impl TryFrom<String> for FormKey {
    type Error = String;
    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        FormKey::parse(&value).ok_or_else(|| format!("invalid form key '{value}'"))
    }
}

impl From<FormKey> for String {
    fn from(key: FormKey) -> Self {
        key.to_string()
    }
}

// ------------- Raw records -------------
/// An armor record exactly as the collaborator reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArmor {
    #[serde(default)]
    pub editor_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub form_key: FormKey,
    #[serde(default)]
    pub first_person_flags: Option<u64>,
    #[serde(default)]
    pub template: Option<FormKey>,
    #[serde(default)]
    pub keywords: Vec<FormKey>,
    #[serde(default)]
    pub attach_parent_slots: Vec<FormKey>,
    #[serde(default)]
    pub is_light: bool,
}

impl BodyTemplate for RawArmor {
    type Link = FormKey;
    fn first_person_flags(&self) -> Option<u64> {
        self.first_person_flags
    }
    fn template_link(&self) -> Option<&FormKey> {
        self.template.as_ref()
    }
}

/// An object modification (add-on) record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmodRecord {
    #[serde(default)]
    pub editor_id: Option<String>,
    pub form_key: FormKey,
    #[serde(default)]
    pub attach_point: Option<FormKey>,
    #[serde(default)]
    pub attach_parent_slots: Vec<FormKey>,
    #[serde(default)]
    pub filter_keywords: Vec<FormKey>,
    #[serde(default)]
    pub target_keywords: Vec<FormKey>,
}

// ------------- ArmorRecord -------------
#[derive(Debug, Clone)]
pub struct ArmorRecord {
    key: String,
    editor_id: String,
    display_name: String,
    occupied: BipedMask,
    is_underwear: bool,
    source: RawArmor,
}

impl ArmorRecord {
    /// Editor id and module together, which survives two modules sharing an editor id.
    pub fn key(&self) -> &str {
        &self.key
    }
    pub fn editor_id(&self) -> &str {
        &self.editor_id
    }
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
    pub fn module(&self) -> &str {
        self.source.form_key.module()
    }
    pub fn form_key(&self) -> &FormKey {
        &self.source.form_key
    }
    pub fn occupied_slots(&self) -> BipedMask {
        self.occupied
    }
    pub fn is_underwear(&self) -> bool {
        self.is_underwear
    }
    pub fn is_light(&self) -> bool {
        self.source.is_light
    }
    pub fn raw(&self) -> &RawArmor {
        &self.source
    }
    pub fn label(&self) -> String {
        format!("{} - {}", self.editor_id, self.display_name)
    }
}

impl fmt::Display for ArmorRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}]", self.label(), self.source.form_key)
    }
}

struct RawIndex<'a>(HashMap<&'a FormKey, &'a RawArmor, KeyHasher>);

impl TemplateResolver<RawArmor> for RawIndex<'_> {
    fn resolve(&self, link: &FormKey) -> Option<&RawArmor> {
        self.0.get(link).copied()
    }
}

// ------------- Catalog -------------
#[derive(Debug, Default)]
pub struct Catalog {
    records: Vec<ArmorRecord>,
    by_form_key: HashMap<FormKey, usize, KeyHasher>,
    omods: Vec<OmodRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn from_raw(armors: Vec<RawArmor>, omods: Vec<OmodRecord>) -> Self {
        let masks: Vec<BipedMask> = {
            let index = RawIndex(armors.iter().map(|armor| (&armor.form_key, armor)).collect());
            let resolver: &dyn TemplateResolver<RawArmor> = &index;
            armors
                .iter()
                .map(|armor| occupied_slots(armor, Some(resolver)))
                .collect()
        };
        let mut records: Vec<ArmorRecord> = armors
            .into_iter()
            .zip(masks)
            .map(|(armor, occupied)| {
                let editor_id = armor
                    .editor_id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| MISSING_EDITOR_ID.to_string());
                ArmorRecord {
                    key: format!("{}|{}", editor_id, armor.form_key.module()),
                    display_name: armor.name.clone().unwrap_or_default(),
                    editor_id,
                    occupied,
                    is_underwear: occupied.is_underwear(),
                    source: armor,
                }
            })
            .collect();
        records.sort_by(|a, b| {
            (a.editor_id.to_lowercase(), a.module().to_lowercase())
                .cmp(&(b.editor_id.to_lowercase(), b.module().to_lowercase()))
        });
        let by_form_key = records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.form_key().clone(), position))
            .collect();
        debug!(armors = records.len(), omods = omods.len(), "catalog assembled");
        Self {
            records,
            by_form_key,
            omods,
        }
    }
    pub fn records(&self) -> &[ArmorRecord] {
        &self.records
    }
    pub fn get(&self, position: usize) -> Option<&ArmorRecord> {
        self.records.get(position)
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn omods(&self) -> &[OmodRecord] {
        &self.omods
    }
    pub fn find_by_form_key(&self, key: &FormKey) -> Option<&ArmorRecord> {
        self.by_form_key.get(key).map(|position| &self.records[*position])
    }
    pub fn position_of(&self, editor_id: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.editor_id.eq_ignore_ascii_case(editor_id))
    }
    pub fn find(&self, editor_id: &str) -> Option<&ArmorRecord> {
        self.position_of(editor_id).map(|position| &self.records[position])
    }
    /// Positions of the records the filter lets through, in catalog order.
    pub fn filtered(&self, filter: &CatalogFilter) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| filter.accepts(record))
            .map(|(position, _)| position)
            .collect()
    }
}

impl TemplateResolver<RawArmor> for Catalog {
    fn resolve(&self, link: &FormKey) -> Option<&RawArmor> {
        self.find_by_form_key(link).map(|record| record.raw())
    }
}

// ------------- Filtering -------------
#[derive(Debug, Clone)]
pub struct CatalogFilter {
    pub editor: String,
    pub module: String,
    pub show_underwear: bool,
    pub show_outerwear: bool,
}

impl Default for CatalogFilter {
    fn default() -> Self {
        Self {
            editor: String::new(),
            module: String::new(),
            show_underwear: true,
            show_outerwear: true,
        }
    }
}

impl CatalogFilter {
    pub fn accepts(&self, record: &ArmorRecord) -> bool {
        if !self.editor.trim().is_empty()
            && !contains_ignore_case(record.editor_id(), self.editor.trim())
        {
            return false;
        }
        if !self.module.trim().is_empty()
            && !contains_ignore_case(record.module(), self.module.trim())
        {
            return false;
        }
        if record.is_underwear() {
            self.show_underwear
        } else {
            self.show_outerwear
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

// ------------- Sources -------------
/// The game-data collaborator. Scanning may be slow, see `interface::CatalogLoader`.
pub trait ArmorSource: Send {
    fn armors(&self) -> Result<Vec<RawArmor>>;
    fn omods(&self) -> Result<Vec<OmodRecord>>;
}

pub fn scan(source: &dyn ArmorSource) -> Result<Catalog> {
    let armors = source.armors()?;
    let omods = source.omods()?;
    info!(armors = armors.len(), omods = omods.len(), "scanned game data");
    Ok(Catalog::from_raw(armors, omods))
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogDump {
    #[serde(default)]
    pub armors: Vec<RawArmor>,
    #[serde(default)]
    pub omods: Vec<OmodRecord>,
}

/// A catalog exported by the game-data tooling as JSON.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
    fn read(&self) -> Result<CatalogDump> {
        let text = fs::read_to_string(&self.path).map_err(|e| TagError::io(&self.path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl ArmorSource for JsonCatalog {
    fn armors(&self) -> Result<Vec<RawArmor>> {
        Ok(self.read()?.armors)
    }
    fn omods(&self) -> Result<Vec<OmodRecord>> {
        Ok(self.read()?.omods)
    }
}
