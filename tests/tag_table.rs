use std::fs;

use armortags::catalog::{Catalog, FormKey, RawArmor};
use armortags::construct::{OccupationRoster, TagKeeper, FEMALE, MALE, NSFW};
use armortags::omod::NoAddons;
use armortags::persist::{self, TAG_TABLE_HEADER};
use armortags::slot::BipedMask;

fn armor(editor_id: &str, form_key: &str) -> RawArmor {
    RawArmor {
        editor_id: Some(editor_id.to_string()),
        name: None,
        form_key: FormKey::parse(form_key).expect("form key"),
        first_person_flags: Some(BipedMask::from_slots([41]).bits()),
        template: None,
        keywords: Vec::new(),
        attach_parent_slots: Vec::new(),
        is_light: false,
    }
}

fn catalog() -> Catalog {
    Catalog::from_raw(
        vec![
            armor("ShirtA", "000800:Clothes.esp"),
            armor("ShirtB", "000801:Clothes.esp"),
            armor("LegacyCoat", "12AB34:plugin.esp"),
            armor("TinyHat", "000801:light.esl"),
        ],
        Vec::new(),
    )
}

fn header() -> String {
    TAG_TABLE_HEADER.join(",")
}

#[test]
fn written_table_reads_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("Clothes.csv");
    let catalog = catalog();
    let mut keeper = TagKeeper::new(OccupationRoster::default());
    keeper.apply_boolean(["ShirtA"], FEMALE, true);
    keeper.apply_boolean(["ShirtA"], "Raider", true);
    keeper.apply_boolean(["ShirtA"], "Doctor", true);
    keeper.apply_boolean(["ShirtA"], NSFW, true);
    keeper.apply_min_level(["ShirtA"], 12);
    keeper.get_or_create("ShirtA").set_clothing_type(Some("Shirt, plain".to_string()));
    // no occupation, so no row
    keeper.apply_boolean(["ShirtB"], MALE, true);

    let written = persist::write_tag_table(&path, &catalog, &keeper, &NoAddons).expect("write");
    assert_eq!(written, 1);

    let text = fs::read_to_string(&path).expect("read");
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some(header().as_str()));
    let row = lines.next().expect("row");
    assert!(row.starts_with("10,"), "{row}");
    assert!(row.contains(",ShirtA,12,,1,"), "{row}");
    assert!(row.ends_with("\"Shirt, plain\""), "{row}");
    assert_eq!(lines.next(), None);

    let rows = persist::read_tag_table(&path, keeper.roster(), &catalog).expect("read table");
    assert_eq!(rows.len(), 1);
    let (editor_id, tags) = &rows[0];
    assert_eq!(editor_id, "ShirtA");
    assert_eq!(tags, keeper.get("ShirtA").expect("tags"));
}

#[test]
fn neither_sex_survives_a_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("Clothes.csv");
    let catalog = catalog();
    let mut keeper = TagKeeper::new(OccupationRoster::default());
    keeper.apply_boolean(["ShirtA"], "Guard", true);
    persist::write_tag_table(&path, &catalog, &keeper, &NoAddons).expect("write");
    let rows = persist::read_tag_table(&path, keeper.roster(), &catalog).expect("read");
    assert!(!rows[0].1.get(MALE));
    assert!(!rows[0].1.get(FEMALE));
}

#[test]
fn legacy_form_ids_become_editor_ids() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("plugin.csv");
    fs::write(&path, format!("{}\n11,00000000000000000001,0012AB34,3\n01,1,00FFFFFF\n", header())).expect("write");
    let roster = OccupationRoster::default();
    let rows = persist::read_tag_table(&path, &roster, &catalog()).expect("read");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, "LegacyCoat");
    assert!(rows[0].1.get("Doctor"));
    assert_eq!(rows[0].1.min_level(), 3);
    // unresolvable ids stay as they were
    assert_eq!(rows[1].0, "00FFFFFF");
}

#[test]
fn light_forms_compare_low_bits_only() {
    let catalog = catalog();
    assert_eq!(persist::migrate_legacy_id("FE123801", "light", &catalog).as_deref(), Some("TinyHat"));
    assert_eq!(persist::migrate_legacy_id("FE123801", "light.esl", &catalog).as_deref(), Some("TinyHat"));
    assert_eq!(persist::migrate_legacy_id("0012AB34", "other", &catalog), None);
    assert_eq!(persist::migrate_legacy_id("ShirtA", "Clothes", &catalog), None);
}

#[test]
fn short_occupation_strings_pad_on_the_left() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("Clothes.csv");
    // written when only two occupations existed, the newest name now leads the list
    fs::write(&path, format!("{}\n10,10,ShirtA\n", header())).expect("write");
    let roster = OccupationRoster::new(vec!["Pilot".to_string(), "Cook".to_string(), "Guard".to_string()]);
    let rows = persist::read_tag_table(&path, &roster, &catalog()).expect("read");
    let tags = &rows[0].1;
    assert!(!tags.get("Pilot"));
    assert!(tags.get("Cook"));
    assert!(!tags.get("Guard"));
    assert!(tags.get(FEMALE));
    assert!(!tags.get(MALE));
}

#[test]
fn long_occupation_strings_keep_the_right_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("Clothes.csv");
    fs::write(&path, format!("{}\n11,1101,ShirtA\n", header())).expect("write");
    let roster = OccupationRoster::new(vec!["Pilot".to_string(), "Cook".to_string()]);
    let rows = persist::read_tag_table(&path, &roster, &catalog()).expect("read");
    assert!(!rows[0].1.get("Pilot"));
    assert!(rows[0].1.get("Cook"));
}

#[test]
fn comments_blank_and_short_rows_are_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("Clothes.csv");
    let body = "# exported by hand\n\n11,1\n01,1,ShirtB,-4,,true,Shirt # checked\n10,1,ShirtA,lots\n";
    fs::write(&path, format!("{}\n{body}", header())).expect("write");
    let roster = OccupationRoster::default();
    let rows = persist::read_tag_table(&path, &roster, &catalog()).expect("read");
    assert_eq!(rows.len(), 2);
    let shirt_b = &rows[0].1;
    assert_eq!(rows[0].0, "ShirtB");
    assert_eq!(shirt_b.min_level(), 0);
    assert!(shirt_b.get(NSFW));
    assert_eq!(shirt_b.clothing_type(), Some("Shirt"));
    assert_eq!(rows[1].1.min_level(), 0);
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let roster = OccupationRoster::default();
    assert!(persist::read_tag_table(&dir.path().join("absent.csv"), &roster, &catalog()).is_err());
}

#[test]
fn table_module_strips_csv() {
    assert_eq!(persist::table_module(std::path::Path::new("x/plugin.csv")), "plugin");
    assert_eq!(persist::table_module(std::path::Path::new("x/Plugin.CSV")), "Plugin");
    assert_eq!(persist::table_module(std::path::Path::new("x/plugin.esp")), "plugin.esp");
}

#[test]
fn hash_in_clothing_type_is_not_a_comment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("Clothes.csv");
    let catalog = catalog();
    let mut keeper = TagKeeper::new(OccupationRoster::default());
    keeper.apply_boolean(["ShirtA"], "Raider", true);
    keeper.get_or_create("ShirtA").set_clothing_type(Some("Outfit #2".to_string()));
    persist::write_tag_table(&path, &catalog, &keeper, &NoAddons).expect("write");

    let text = fs::read_to_string(&path).expect("read");
    assert!(text.contains("\"Outfit #2\""), "{text}");
    let rows = persist::read_tag_table(&path, keeper.roster(), &catalog).expect("read table");
    assert_eq!(rows[0].1.clothing_type(), Some("Outfit #2"));
}

#[test]
fn latin1_rows_still_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("Clothes.csv");
    let mut bytes = format!("{}\n10,1,ShirtA\n", header()).into_bytes();
    bytes.extend_from_slice(b"10,1,Caf\xe9Coat\n");
    fs::write(&path, bytes).expect("write");
    let roster = OccupationRoster::default();
    let rows = persist::read_tag_table(&path, &roster, &catalog()).expect("read");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, "ShirtA");
    assert!(rows[1].0.starts_with("Caf"));
}

#[test]
fn tags_without_a_catalog_record_are_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("Clothes.csv");
    let catalog = catalog();
    let mut keeper = TagKeeper::new(OccupationRoster::default());
    keeper.apply_boolean(["ShirtA"], "Guard", true);
    keeper.apply_boolean(["RetiredCoat"], "Raider", true);
    keeper.apply_min_level(["RetiredCoat"], 7);
    // no occupation, so still no row
    keeper.apply_boolean(["RetiredHat"], MALE, true);

    assert_eq!(persist::write_tag_table(&path, &catalog, &keeper, &NoAddons).expect("write"), 2);
    let rows = persist::read_tag_table(&path, keeper.roster(), &catalog).expect("read");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, "ShirtA");
    assert_eq!(rows[1].0, "RetiredCoat");
    assert!(rows[1].1.get("Raider"));
    assert_eq!(rows[1].1.min_level(), 7);
}
