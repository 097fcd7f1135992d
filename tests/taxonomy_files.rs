use std::fs;
use std::path::Path;

use armortags::slot::BipedMask;
use armortags::taxonomy::{ClothingType, Layer, Taxonomy, NEW_TYPE_NAME, UNNAMED_TYPE};

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, contents).expect("write");
}

#[test]
fn load_discovers_nested_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "base.csv", "Name,ARMO Slots,ARMA Slots\nShirt,36;41,36\nPants,39;40,\n");
    write(dir.path(), "user/custom.csv", "Name,ARMO Slots,ARMA Slots\n# a comment\n\nHat,30,30;31\n");
    write(dir.path(), "notes.txt", "not a taxonomy\n");

    let taxonomy = Taxonomy::load(dir.path(), "user/custom.csv");
    assert_eq!(taxonomy.names(), vec!["Hat", "Pants", "Shirt"]);
    let shirt = taxonomy.get("shirt").expect("shirt");
    assert_eq!(shirt.primary(), BipedMask::from_slots([36, 41]));
    assert_eq!(shirt.secondary(), BipedMask::from_slots([36]));
    assert_eq!(shirt.source_file(), "base.csv");
    assert_eq!(taxonomy.get("Hat").expect("hat").source_file(), "user/custom.csv");
    assert_eq!(taxonomy.file_choices(), vec!["base.csv", "user/custom.csv"]);
}

#[test]
fn missing_root_gives_empty_taxonomy() {
    let dir = tempfile::tempdir().expect("tempdir");
    let taxonomy = Taxonomy::load(dir.path().join("absent"), "user/custom.csv");
    assert!(taxonomy.is_empty());
}

#[test]
fn duplicates_across_files_are_renamed() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a.csv", "Name,ARMO Slots,ARMA Slots\nShirt,41,\n");
    write(dir.path(), "b.csv", "Name,ARMO Slots,ARMA Slots\nSHIRT,36,\n");
    let taxonomy = Taxonomy::load(dir.path(), "a.csv");
    assert_eq!(taxonomy.len(), 2);
    assert!(taxonomy.has_name("Shirt"));
    assert!(taxonomy.has_name("SHIRT 2"));
}

#[test]
fn uncatalogued_slots_are_dropped() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a.csv", "Name,ARMO Slots,ARMA Slots\nOdd,41;61;x;99,\n");
    let taxonomy = Taxonomy::load(dir.path(), "a.csv");
    assert_eq!(taxonomy.get("Odd").expect("odd").primary(), BipedMask::from_slots([41]));
}

#[test]
fn save_then_load_restores_everything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut taxonomy = Taxonomy::new(dir.path(), "user/custom.csv");
    taxonomy.insert(ClothingType::with_slots(
        "Jacket, long",
        "outer.csv",
        BipedMask::from_slots([41, 42, 43]),
        BipedMask::from_slots([41]),
    ));
    taxonomy.add("Gloves");
    taxonomy.set_slot("Gloves", Layer::Primary, 34, true).expect("gloves");
    taxonomy.set_slot("Gloves", Layer::Primary, 35, true).expect("gloves");
    taxonomy.save().expect("save");

    let reloaded = Taxonomy::load(dir.path(), "user/custom.csv");
    assert_eq!(reloaded.names(), vec!["Gloves", "Jacket, long"]);
    let gloves = reloaded.get("Gloves").expect("gloves");
    assert_eq!(gloves.source_file(), "user/custom.csv");
    assert_eq!(gloves.primary(), BipedMask::from_slots([34, 35]));
    let jacket = reloaded.get("Jacket, long").expect("jacket");
    assert_eq!(jacket.primary(), BipedMask::from_slots([41, 42, 43]));
    assert_eq!(jacket.secondary(), BipedMask::from_slots([41]));
    let header = fs::read_to_string(dir.path().join("outer.csv")).expect("read");
    assert!(header.starts_with("Name,ARMO Slots,ARMA Slots\n"));
}

#[test]
fn repeated_adds_stay_unique() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut taxonomy = Taxonomy::new(dir.path(), "user/custom.csv");
    for _ in 0..4 {
        taxonomy.add("");
    }
    let expected = [
        NEW_TYPE_NAME.to_string(),
        format!("{NEW_TYPE_NAME} 2"),
        format!("{NEW_TYPE_NAME} 3"),
        format!("{NEW_TYPE_NAME} 4"),
    ];
    for name in &expected {
        assert!(taxonomy.has_name(name), "{name} missing");
    }
    assert_eq!(taxonomy.selected().expect("selected").name(), expected[3]);
}

#[test]
fn rename_resolves_conflicts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut taxonomy = Taxonomy::new(dir.path(), "user/custom.csv");
    taxonomy.add("Shirt");
    taxonomy.add("Pants");
    assert_eq!(taxonomy.rename("Pants", "shirt").expect("rename"), "shirt 2");
    assert_eq!(taxonomy.rename("shirt 2", "  ").expect("rename"), UNNAMED_TYPE);
    assert_eq!(taxonomy.rename("Shirt", "Shirt").expect("rename"), "Shirt");
    assert!(taxonomy.rename("Nope", "x").is_err());
}

#[test]
fn remove_moves_selection_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut taxonomy = Taxonomy::new(dir.path(), "user/custom.csv");
    taxonomy.add("Alpha");
    taxonomy.add("Beta");
    taxonomy.add("Gamma");
    taxonomy.select("Beta");
    taxonomy.remove("Beta").expect("removed");
    assert_eq!(taxonomy.selected().expect("selected").name(), "Alpha");
    taxonomy.select("Alpha");
    taxonomy.remove("Alpha").expect("removed");
    assert_eq!(taxonomy.selected().expect("selected").name(), "Gamma");
    taxonomy.remove("Gamma").expect("removed");
    assert!(taxonomy.selected().is_none());
    assert!(taxonomy.remove("Gamma").is_none());
}

#[test]
fn moving_last_type_out_empties_its_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "old.csv", "Name,ARMO Slots,ARMA Slots\nShirt,41,\n");
    let mut taxonomy = Taxonomy::load(dir.path(), "old.csv");
    taxonomy.set_source_file("Shirt", "new.csv").expect("move");
    assert_eq!(taxonomy.last_used_file(), "new.csv");
    taxonomy.save().expect("save");
    let old = fs::read_to_string(dir.path().join("old.csv")).expect("read");
    assert_eq!(old.lines().count(), 1);
    let reloaded = Taxonomy::load(dir.path(), "new.csv");
    assert_eq!(reloaded.get("Shirt").expect("shirt").source_file(), "new.csv");
}

#[test]
fn matching_primary_is_exact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut taxonomy = Taxonomy::new(dir.path(), "a.csv");
    taxonomy.insert(ClothingType::with_slots("Shirt", "a.csv", BipedMask::from_slots([36, 41]), BipedMask::EMPTY));
    taxonomy.insert(ClothingType::with_slots("Top", "a.csv", BipedMask::from_slots([36, 41]), BipedMask::EMPTY));
    taxonomy.insert(ClothingType::with_slots("Vest", "a.csv", BipedMask::from_slots([41]), BipedMask::EMPTY));
    assert_eq!(taxonomy.matching_primary(BipedMask::from_slots([36, 41])), vec!["Shirt", "Top"]);
    assert!(taxonomy.matching_primary(BipedMask::from_slots([36, 41, 45])).is_empty());
}

#[test]
fn names_starting_with_hash_survive_a_save() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut taxonomy = Taxonomy::new(dir.path(), "user/custom.csv");
    let name = taxonomy.add("#1 Pick").name().to_string();
    assert_eq!(name, "#1 Pick");
    taxonomy.save().expect("save");
    let loaded = Taxonomy::load(dir.path(), "user/custom.csv");
    assert!(loaded.has_name("#1 Pick"));
}

#[test]
fn latin1_files_still_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("base.csv");
    let mut bytes = b"Name,ARMO Slots,ARMA Slots\nShirt,41,\n".to_vec();
    bytes.extend_from_slice(b"Caf\xe9 Apron,36,\n");
    fs::write(&path, bytes).expect("write");
    let taxonomy = Taxonomy::load(dir.path(), "base.csv");
    assert_eq!(taxonomy.len(), 2);
    assert!(taxonomy.has_name("Shirt"));
}
