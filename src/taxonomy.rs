//! The clothing-type taxonomy.
//!
//! A clothing type is a named pair of slot sets: the slots the armor record
//! itself claims (the ARMO layer, called primary here) and the slots its
//! addon claims (the ARMA layer, secondary). Types live in CSV files below a
//! taxonomy root and the [`Taxonomy`] keeps all of them at once, enforcing
//! that no two share a name regardless of case.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, TagError};
use crate::persist;
use crate::slot::{BipedMask, SlotIndex};

pub const NEW_TYPE_NAME: &str = "New Item";
pub const UNNAMED_TYPE: &str = "Unnamed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// ARMO
    Primary,
    /// ARMA
    Secondary,
}

// ------------- ClothingType -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClothingType {
    name: String,
    source_file: String,
    primary: BipedMask,
    secondary: BipedMask,
}

impl ClothingType {
    pub fn new(name: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self::with_slots(name, source_file, BipedMask::EMPTY, BipedMask::EMPTY)
    }
    pub fn with_slots(
        name: impl Into<String>,
        source_file: impl Into<String>,
        primary: BipedMask,
        secondary: BipedMask,
    ) -> Self {
        Self {
            name: name.into(),
            source_file: source_file.into(),
            primary,
            secondary,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Path of the owning CSV, relative to the taxonomy root.
    pub fn source_file(&self) -> &str {
        &self.source_file
    }
    pub fn primary(&self) -> BipedMask {
        self.primary
    }
    pub fn secondary(&self) -> BipedMask {
        self.secondary
    }
    pub fn slots(&self, layer: Layer) -> BipedMask {
        match layer {
            Layer::Primary => self.primary,
            Layer::Secondary => self.secondary,
        }
    }
}

// ------------- Taxonomy -------------
#[derive(Debug)]
pub struct Taxonomy {
    root: PathBuf,
    // kept sorted by name, ignoring case
    types: Vec<ClothingType>,
    discovered_files: Vec<String>,
    // files whose last type was removed or moved away, rewritten empty on save
    emptied_files: Vec<String>,
    last_used_file: String,
    selected: Option<String>,
}

impl Taxonomy {
    pub fn new(root: impl AsRef<Path>, default_file: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            types: Vec::new(),
            discovered_files: Vec::new(),
            emptied_files: Vec::new(),
            last_used_file: default_file.into(),
            selected: None,
        }
    }

    /// Reads every CSV below `root`. Problems with the directory or a single
    /// file are logged and skipped, the taxonomy is never left unusable.
    pub fn load(root: impl AsRef<Path>, default_file: impl Into<String>) -> Self {
        let mut taxonomy = Self::new(root, default_file);
        let files = taxonomy.discover();
        for relative in files {
            let absolute = taxonomy.absolute(&relative);
            match persist::read_taxonomy_file(&absolute, &relative) {
                Ok(parsed) => {
                    let count = parsed.len();
                    for clothing_type in parsed {
                        let original = clothing_type.name.clone();
                        let kept = taxonomy.insert(clothing_type);
                        if kept != original {
                            warn!(file = %relative, name = %original, renamed = %kept, "duplicate clothing type renamed");
                        }
                    }
                    debug!(file = %relative, count, "taxonomy file parsed");
                }
                Err(e) => warn!(file = %relative, error = %e, "taxonomy file skipped"),
            }
            taxonomy.discovered_files.push(relative);
        }
        info!(root = %taxonomy.root.display(), types = taxonomy.len(), "taxonomy loaded");
        taxonomy
    }

    fn discover(&self) -> Vec<String> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %self.root.display(), error = %e, "taxonomy directory not readable");
                    continue;
                }
            };
            let is_csv = entry
                .path()
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"));
            if entry.file_type().is_file() && is_csv {
                files.push(self.relative(entry.path()));
            }
        }
        files.sort_by_key(|file| file.to_lowercase());
        files
    }

    /// Writes every type back into the file it belongs to, one full rewrite per file.
    pub fn save(&self) -> Result<()> {
        let mut groups: Vec<(String, Vec<&ClothingType>)> = Vec::new();
        for clothing_type in &self.types {
            let file = clothing_type.source_file.as_str();
            match groups.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(file)) {
                Some((_, members)) => members.push(clothing_type),
                None => groups.push((file.to_string(), vec![clothing_type])),
            }
        }
        for file in &self.emptied_files {
            if !groups.iter().any(|(key, _)| key.eq_ignore_ascii_case(file)) {
                groups.push((file.clone(), Vec::new()));
            }
        }
        for (file, members) in groups {
            let absolute = self.absolute(&file);
            persist::write_taxonomy_file(&absolute, &members)?;
            debug!(file = %file, count = members.len(), "taxonomy file written");
        }
        Ok(())
    }

    fn note_if_emptied(&mut self, file: &str) {
        let in_use = self.types.iter().any(|t| t.source_file.eq_ignore_ascii_case(file));
        let known = self.emptied_files.iter().any(|known| known.eq_ignore_ascii_case(file));
        if !in_use && !known {
            self.emptied_files.push(file.to_string());
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
    pub fn absolute(&self, relative: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in relative.split(['/', '\\']).filter(|part| !part.is_empty()) {
            path.push(part);
        }
        path
    }
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(relative) => relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &ClothingType> {
        self.types.iter()
    }
    pub fn names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name()).collect()
    }
    fn position(&self, name: &str) -> Option<usize> {
        self.types.iter().position(|t| t.name.eq_ignore_ascii_case(name))
    }
    pub fn get(&self, name: &str) -> Option<&ClothingType> {
        self.position(name).map(|position| &self.types[position])
    }
    /// Exact, case-sensitive membership. Stored assignments must spell a live name.
    pub fn has_name(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.name == name)
    }

    /// `base`, or `base 2`, `base 3`, ... whichever is free first.
    pub fn make_unique(&self, base: &str) -> String {
        let mut name = base.to_string();
        let mut counter = 1;
        while self.position(&name).is_some() {
            counter += 1;
            name = format!("{base} {counter}");
        }
        name
    }

    fn sort(&mut self) {
        self.types.sort_by_key(|t| t.name.to_lowercase());
    }

    /// Adds a parsed or constructed type, renaming it if the name is taken.
    /// Returns the name it was stored under.
    pub fn insert(&mut self, mut clothing_type: ClothingType) -> String {
        if clothing_type.name.trim().is_empty() {
            clothing_type.name = UNNAMED_TYPE.to_string();
        }
        clothing_type.name = self.make_unique(&clothing_type.name);
        let name = clothing_type.name.clone();
        self.types.push(clothing_type);
        self.sort();
        name
    }

    /// A blank type in the most recently used file. It becomes the selection.
    pub fn add(&mut self, name: &str) -> &ClothingType {
        let base = if name.trim().is_empty() { NEW_TYPE_NAME } else { name.trim() };
        let stored = self.insert(ClothingType::new(base, self.last_used_file.clone()));
        self.selected = Some(stored.clone());
        let position = self.position(&stored).unwrap_or(self.types.len() - 1);
        &self.types[position]
    }

    pub fn remove(&mut self, name: &str) -> Option<ClothingType> {
        let position = self.position(name)?;
        let removed = self.types.remove(position);
        self.note_if_emptied(&removed.source_file);
        let was_selected = self
            .selected
            .as_deref()
            .is_some_and(|selected| selected.eq_ignore_ascii_case(&removed.name));
        if was_selected {
            self.selected = if self.types.is_empty() {
                None
            } else {
                let previous = position.saturating_sub(1).min(self.types.len() - 1);
                Some(self.types[previous].name.clone())
            };
        }
        Some(removed)
    }

    /// Renames a type. A blank name becomes `Unnamed`, a taken one gets a counter.
    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<String> {
        let position = self
            .position(name)
            .ok_or_else(|| TagError::UnknownClothingType(name.to_string()))?;
        let old = self.types.remove(position);
        let wanted = if new_name.trim().is_empty() { UNNAMED_TYPE } else { new_name };
        let stored = self.make_unique(wanted);
        let renamed = ClothingType { name: stored.clone(), ..old };
        self.types.push(renamed);
        self.sort();
        let was_selected = self
            .selected
            .as_deref()
            .is_some_and(|selected| selected.eq_ignore_ascii_case(name));
        if was_selected {
            self.selected = Some(stored.clone());
        }
        Ok(stored)
    }

    /// Moves a type to another file, which also becomes the file for new types.
    pub fn set_source_file(&mut self, name: &str, file: &str) -> Result<()> {
        if file.trim().is_empty() {
            return Ok(());
        }
        let position = self
            .position(name)
            .ok_or_else(|| TagError::UnknownClothingType(name.to_string()))?;
        let previous = std::mem::replace(&mut self.types[position].source_file, file.trim().to_string());
        self.note_if_emptied(&previous);
        self.last_used_file = file.trim().to_string();
        Ok(())
    }

    pub fn set_slot(&mut self, name: &str, layer: Layer, index: SlotIndex, on: bool) -> Result<bool> {
        let position = self
            .position(name)
            .ok_or_else(|| TagError::UnknownClothingType(name.to_string()))?;
        let clothing_type = &mut self.types[position];
        let mask = match layer {
            Layer::Primary => &mut clothing_type.primary,
            Layer::Secondary => &mut clothing_type.secondary,
        };
        Ok(mask.set(index, on))
    }

    /// Names of every type whose primary slots are exactly `occupied`.
    pub fn matching_primary(&self, occupied: BipedMask) -> Vec<&str> {
        self.types
            .iter()
            .filter(|t| t.primary == occupied)
            .map(|t| t.name())
            .collect()
    }

    pub fn last_used_file(&self) -> &str {
        &self.last_used_file
    }
    pub fn set_last_used_file(&mut self, file: &str) {
        if !file.trim().is_empty() {
            self.last_used_file = file.trim().to_string();
        }
    }

    pub fn select(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(position) => {
                self.selected = Some(self.types[position].name.clone());
                true
            }
            None => false,
        }
    }
    pub fn selected(&self) -> Option<&ClothingType> {
        self.selected.as_deref().and_then(|name| self.get(name))
    }

    /// Files a type can be assigned to: those found on disk plus those in use.
    pub fn file_choices(&self) -> Vec<String> {
        let mut choices: Vec<String> = Vec::new();
        let candidates = self
            .discovered_files
            .iter()
            .map(String::as_str)
            .chain(self.types.iter().map(|t| t.source_file()))
            .filter(|file| !file.trim().is_empty());
        for file in candidates {
            if !choices.iter().any(|known| known.eq_ignore_ascii_case(file)) {
                choices.push(file.to_string());
            }
        }
        choices.sort_by_key(|file| file.to_lowercase());
        choices
    }
}
