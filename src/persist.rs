// used for persistence
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace, warn};

use crate::catalog::{Catalog, FormKey};
use crate::construct::{ArmorTags, KeyHasher, OccupationRoster, TagKeeper, FEMALE, MALE, NSFW};
use crate::error::{Result, TagError};
use crate::omod::Compatibility;
use crate::slot::{BipedMask, SlotCatalog, SlotIndex};
use crate::taxonomy::ClothingType;

pub const TAXONOMY_HEADER: [&str; 3] = ["Name", "ARMO Slots", "ARMA Slots"];
pub const TAG_TABLE_HEADER: [&str; 7] = [
    "Sex",
    "Occupation",
    "EditorID",
    "MinLevel",
    "Compatible OMODs",
    "Is NSFW?",
    "Clothing Type",
];

lazy_static! {
    // tag tables written before editor ids were used carry a full form id
    static ref LEGACY_FORM_ID: Regex = Regex::new(r"^[0-9A-Fa-f]{8}$").unwrap();
}

// ------------- CSV helpers -------------
/// Splits one CSV line. Quoted fields may contain commas, `""` inside quotes is a quote.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    if line.is_empty() {
        return fields;
    }
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                ',' => fields.push(std::mem::take(&mut current)),
                '"' => in_quotes = true,
                _ => current.push(c),
            }
        }
    }
    fields.push(current);
    fields
}

/// Quotes a field holding a comma, a quote or a comment marker.
pub fn quote(field: &str) -> String {
    if field.contains([',', '"', '#']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// a `#` outside quotes starts a comment
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (n, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..n],
            _ => (),
        }
    }
    line
}

// undecodable bytes become U+FFFD
fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| TagError::io(path, e))?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    if text.contains(char::REPLACEMENT_CHARACTER) {
        warn!(path = %path.display(), "file is not valid UTF-8, undecodable bytes replaced");
    }
    Ok(text)
}

/// Semicolon-separated slot numbers. Anything that is not a named slot is dropped.
pub fn parse_slot_list(text: &str) -> BipedMask {
    let mut mask = BipedMask::EMPTY;
    for token in text.split(';').map(str::trim).filter(|token| !token.is_empty()) {
        match token.parse::<SlotIndex>() {
            Ok(index) if SlotCatalog::contains(index) => {
                mask.insert(index);
            }
            Ok(index) => debug!(slot = index, "slot is not catalogued, ignored"),
            Err(_) => debug!(token, "slot is not a number, ignored"),
        }
    }
    mask
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| TagError::io(parent, e))?;
        }
    }
    fs::write(path, contents).map_err(|e| TagError::io(path, e))
}

// ------------- Taxonomy files -------------
/// Parses one taxonomy file. The first line is a header whatever it contains.
pub fn read_taxonomy_file(path: &Path, relative: &str) -> Result<Vec<ClothingType>> {
    let text = read_text(path)?;
    let mut parsed = Vec::new();
    for (number, line) in text.lines().enumerate().skip(1) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let columns = split_line(line);
        let Some(name) = columns.first().map(|name| name.trim()) else {
            continue;
        };
        let primary = parse_slot_list(columns.get(1).map(String::as_str).unwrap_or(""));
        let secondary = parse_slot_list(columns.get(2).map(String::as_str).unwrap_or(""));
        trace!(file = relative, line = number + 1, name, %primary, %secondary, "clothing type parsed");
        parsed.push(ClothingType::with_slots(name, relative, primary, secondary));
    }
    Ok(parsed)
}

pub fn write_taxonomy_file(path: &Path, members: &[&ClothingType]) -> Result<()> {
    let mut out = TAXONOMY_HEADER.join(",");
    out.push('\n');
    for clothing_type in members {
        out.push_str(&format!(
            "{},{},{}\n",
            quote(clothing_type.name()),
            clothing_type.primary(),
            clothing_type.secondary()
        ));
    }
    write_file(path, &out)
}

// ------------- Tag tables -------------
/// The module a tag table describes: its file name without the `.csv` suffix.
pub fn table_module(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let split = file_name.len().saturating_sub(4);
    let is_csv = file_name
        .get(split..)
        .is_some_and(|suffix| suffix.eq_ignore_ascii_case(".csv"));
    if is_csv {
        file_name[..split].to_string()
    } else {
        file_name
    }
}

/// Finds the live editor id behind a legacy `LLxxxxxx` form id written for `module`.
/// The load-order byte `LL` is meaningless outside the game session and is ignored.
pub fn migrate_legacy_id(legacy: &str, module: &str, catalog: &Catalog) -> Option<String> {
    if !LEGACY_FORM_ID.is_match(legacy) {
        return None;
    }
    let local_id = u32::from_str_radix(&legacy[2..], 16).ok()?;
    let wanted = FormKey::new(local_id, module);
    catalog
        .records()
        .iter()
        .find(|record| {
            let key = record.form_key();
            if !key.module_matches(module) {
                return false;
            }
            if key.is_light_form() {
                key.light_id() == wanted.light_id()
            } else {
                key.local_id() == wanted.local_id()
            }
        })
        .map(|record| record.editor_id().to_string())
}

fn parse_occupation_bits(bits: &str, roster: &OccupationRoster, tags: &mut ArmorTags, line: usize) {
    let bits: Vec<char> = bits.chars().collect();
    let width = roster.len();
    // occupations are only ever added on the left, so older short strings pad with zeros there
    let aligned: Vec<char> = if bits.len() >= width {
        if bits.len() > width {
            warn!(line, width = bits.len(), known = width, "occupation bits beyond the known occupations dropped");
        }
        bits[bits.len() - width..].to_vec()
    } else {
        std::iter::repeat_n('0', width - bits.len()).chain(bits).collect()
    };
    for (name, bit) in roster.names().iter().zip(aligned) {
        tags.set(name, bit == '1');
    }
}

fn parse_min_level(text: &str, line: usize) -> u32 {
    let text = text.trim();
    if text.is_empty() {
        return 0;
    }
    match text.parse::<i64>() {
        Ok(level) if level >= 0 => u32::try_from(level).unwrap_or(u32::MAX),
        Ok(level) => {
            warn!(line, level, "negative minimum level treated as 0");
            0
        }
        Err(_) => {
            warn!(line, text, "minimum level is not a number, treated as 0");
            0
        }
    }
}

/// Reads a tag table into `(editor id, tags)` rows, migrating legacy form ids
/// through `catalog`. Nothing is applied to any store here.
pub fn read_tag_table(
    path: &Path,
    roster: &OccupationRoster,
    catalog: &Catalog,
) -> Result<Vec<(String, ArmorTags)>> {
    let text = read_text(path)?;
    let module = table_module(path);
    let mut rows = Vec::new();
    for (index, raw) in text.lines().enumerate().skip(1) {
        let line = index + 1;
        let content = strip_comment(raw);
        if content.trim().is_empty() {
            continue;
        }
        let columns = split_line(content);
        if columns.len() < 3 {
            warn!(line, columns = columns.len(), "skipped: expected at least 3 columns");
            continue;
        }
        let mut tags = ArmorTags::empty(roster);

        let sex: Vec<char> = columns[0].trim().chars().collect();
        tags.set(FEMALE, sex.first() == Some(&'1'));
        tags.set(MALE, sex.get(1) == Some(&'1'));

        parse_occupation_bits(columns[1].trim(), roster, &mut tags, line);

        let mut editor_id = columns[2].trim().to_string();
        if editor_id.is_empty() {
            warn!(line, "skipped: no editor id");
            continue;
        }
        if LEGACY_FORM_ID.is_match(&editor_id) {
            match migrate_legacy_id(&editor_id, &module, catalog) {
                Some(migrated) => {
                    debug!(line, legacy = %editor_id, editor_id = %migrated, "converted form id to editor id");
                    editor_id = migrated;
                }
                None => {
                    warn!(line, legacy = %editor_id, module = %module, "no armor found for legacy form id, row kept as is");
                }
            }
        }

        if let Some(level) = columns.get(3) {
            tags.set_min_level(parse_min_level(level, line));
        }
        // column 4 holds compatible OMODs, they are regenerated on export
        if let Some(nsfw) = columns.get(5) {
            let nsfw = nsfw.trim();
            tags.set(NSFW, nsfw == "1" || nsfw.eq_ignore_ascii_case("true"));
        }
        if let Some(clothing_type) = columns.get(6).map(|c| c.trim()).filter(|c| !c.is_empty()) {
            tags.set_clothing_type(Some(clothing_type.to_string()));
        }
        rows.push((editor_id, tags));
    }
    debug!(path = %path.display(), rows = rows.len(), "tag table read");
    Ok(rows)
}

fn tag_row(editor_id: &str, tags: &ArmorTags, roster: &OccupationRoster, omods: &[&str]) -> Option<String> {
    let occupation_bits = tags.occupation_bits(roster);
    if !occupation_bits.contains('1') {
        return None;
    }
    let row = [
        tags.sex_bits().to_string(),
        quote(&occupation_bits),
        quote(editor_id),
        tags.min_level().to_string(),
        omods.join(";"),
        if tags.get(NSFW) { "1" } else { "0" }.to_string(),
        quote(tags.clothing_type().unwrap_or("")),
    ];
    Some(row.join(","))
}

/// Writes one row per editor id that has at least one occupation: first the
/// catalog records, then kept tags without a record (rows whose legacy id did
/// not resolve, or whose module is not loaded), so nothing read is lost.
/// Rows are keyed by editor id alone, two modules sharing an editor id share a row.
pub fn write_tag_table(
    path: &Path,
    catalog: &Catalog,
    keeper: &TagKeeper,
    compatibility: &dyn Compatibility,
) -> Result<usize> {
    let roster = keeper.roster();
    let mut out = TAG_TABLE_HEADER.join(",");
    out.push('\n');
    let mut seen: HashSet<String, KeyHasher> = HashSet::default();
    let mut written = 0;
    for record in catalog.records() {
        if !seen.insert(record.editor_id().to_lowercase()) {
            continue;
        }
        let Some(tags) = keeper.get(record.editor_id()) else {
            continue;
        };
        let omods: Vec<&str> = compatibility
            .compatible(record, catalog)
            .into_iter()
            .filter_map(|omod| omod.editor_id.as_deref())
            .collect();
        if let Some(row) = tag_row(record.editor_id(), tags, roster, &omods) {
            out.push_str(&row);
            out.push('\n');
            written += 1;
        }
    }
    let mut orphans: Vec<(&str, &ArmorTags)> = keeper
        .entries()
        .filter(|(editor_id, _)| !seen.contains(&editor_id.to_lowercase()))
        .collect();
    orphans.sort_by_key(|(editor_id, _)| editor_id.to_lowercase());
    for (editor_id, tags) in orphans {
        if let Some(row) = tag_row(editor_id, tags, roster, &[]) {
            trace!(editor_id, "row kept without a catalog record");
            out.push_str(&row);
            out.push('\n');
            written += 1;
        }
    }
    write_file(path, &out)?;
    debug!(path = %path.display(), rows = written, "tag table written");
    Ok(written)
}
