use armortags::catalog::{Catalog, FormKey, RawArmor};
use armortags::classify::{self, Classification, DEFAULT_TYPE, MULTIPLE, NOTHING_SELECTED};
use armortags::construct::{OccupationRoster, TagKeeper};
use armortags::slot::BipedMask;
use armortags::taxonomy::{ClothingType, Taxonomy};

fn armor(editor_id: &str, local_id: u32, slots: &[u8]) -> RawArmor {
    RawArmor {
        editor_id: Some(editor_id.to_string()),
        name: Some(format!("{editor_id} name")),
        form_key: FormKey::new(local_id, "Clothes.esp"),
        first_person_flags: Some(BipedMask::from_slots(slots.iter().copied()).bits()),
        template: None,
        keywords: Vec::new(),
        attach_parent_slots: Vec::new(),
        is_light: false,
    }
}

fn taxonomy() -> Taxonomy {
    let mut taxonomy = Taxonomy::new("unused", "user/custom.csv");
    taxonomy.insert(ClothingType::with_slots("Shirt", "base.csv", BipedMask::from_slots([36, 41]), BipedMask::EMPTY));
    taxonomy.insert(ClothingType::with_slots("Gloves", "base.csv", BipedMask::from_slots([34, 35]), BipedMask::EMPTY));
    taxonomy
}

fn catalog() -> Catalog {
    Catalog::from_raw(
        vec![
            armor("ShirtA", 0x800, &[36, 41]),
            armor("ShirtB", 0x801, &[36, 41]),
            armor("Odd", 0x802, &[61]),
            armor("Bare", 0x803, &[]),
            armor("GlovesA", 0x804, &[34, 35]),
        ],
        Vec::new(),
    )
}

#[test]
fn slots_matching_a_type_classify_as_auto() {
    let taxonomy = taxonomy();
    let classification = classify::classify_slots(BipedMask::from_slots([36, 41]), &taxonomy);
    assert_eq!(classification, Classification::Auto(vec!["Shirt".to_string()]));
    assert_eq!(classification.to_string(), "AUTO:Shirt");
}

#[test]
fn several_matches_are_all_listed() {
    let mut taxonomy = taxonomy();
    taxonomy.insert(ClothingType::with_slots("Blouse", "base.csv", BipedMask::from_slots([36, 41]), BipedMask::EMPTY));
    let classification = classify::classify_slots(BipedMask::from_slots([36, 41]), &taxonomy);
    assert_eq!(classification.to_string(), "AUTO:Blouse, Shirt");
}

#[test]
fn unmatched_slots_are_listed_by_label() {
    let taxonomy = taxonomy();
    assert_eq!(classify::classify_slots(BipedMask::from_slots([61]), &taxonomy).to_string(), "SLOT:61");
    assert_eq!(
        classify::classify_slots(BipedMask::from_slots([41, 61]), &taxonomy).to_string(),
        "SLOT:Chest Outerwear, 61"
    );
    assert_eq!(classify::classify_slots(BipedMask::EMPTY, &taxonomy).to_string(), "SLOT:");
}

#[test]
fn explicit_assignment_wins() {
    let taxonomy = taxonomy();
    let catalog = catalog();
    let mut keeper = TagKeeper::new(OccupationRoster::default());
    keeper.apply_clothing_type(["ShirtA"], "Gloves", &taxonomy);
    let record = catalog.find("ShirtA").expect("record");
    let classification = classify::classify_one(record, keeper.get("ShirtA"), &taxonomy);
    assert!(classification.is_explicit());
    assert_eq!(classification.to_string(), "Gloves");
    let other = catalog.find("ShirtB").expect("record");
    assert_eq!(classify::classify_one(other, keeper.get("ShirtB"), &taxonomy).to_string(), "AUTO:Shirt");
}

#[test]
fn selections_agree_or_report_multiple() {
    let taxonomy = taxonomy();
    let catalog = catalog();
    let keeper = TagKeeper::new(OccupationRoster::default());
    let pick = |ids: &[&str]| -> Vec<_> { ids.iter().map(|id| catalog.find(id).expect("record")).collect() };

    assert_eq!(classify::classify_many(pick(&["ShirtA", "ShirtB"]), &keeper, &taxonomy), "AUTO:Shirt");
    assert_eq!(classify::classify_many(pick(&["ShirtA", "GlovesA"]), &keeper, &taxonomy), MULTIPLE);
    assert_eq!(classify::classify_many(pick(&[]), &keeper, &taxonomy), NOTHING_SELECTED);
}

#[test]
fn aggregate_falls_back_to_default() {
    let taxonomy = taxonomy();
    let catalog = catalog();
    let mut keeper = TagKeeper::new(OccupationRoster::default());
    let pick = |ids: &[&str]| -> Vec<_> { ids.iter().map(|id| catalog.find(id).expect("record")).collect() };

    // inferred labels are not type names
    assert_eq!(keeper.aggregate_clothing_type(&pick(&["ShirtA", "ShirtB"]), &taxonomy), DEFAULT_TYPE);
    assert_eq!(keeper.aggregate_clothing_type(&pick(&["Odd"]), &taxonomy), DEFAULT_TYPE);
    assert_eq!(keeper.aggregate_clothing_type(&pick(&[]), &taxonomy), DEFAULT_TYPE);
    assert_eq!(keeper.aggregate_clothing_type(&pick(&["ShirtA", "GlovesA"]), &taxonomy), MULTIPLE);

    keeper.apply_clothing_type(["ShirtA", "ShirtB"], "Shirt", &taxonomy);
    assert_eq!(keeper.aggregate_clothing_type(&pick(&["ShirtA", "ShirtB"]), &taxonomy), "Shirt");

    // a stored name that no longer exists
    let mut renamed = taxonomy;
    renamed.rename("Shirt", "Top").expect("rename");
    assert_eq!(keeper.aggregate_clothing_type(&pick(&["ShirtA", "ShirtB"]), &renamed), DEFAULT_TYPE);
}

#[test]
fn unknown_type_clears_assignment() {
    let taxonomy = taxonomy();
    let mut keeper = TagKeeper::new(OccupationRoster::default());
    assert_eq!(keeper.apply_clothing_type(["ShirtA"], "Shirt", &taxonomy), Some("Shirt".to_string()));
    assert_eq!(keeper.apply_clothing_type(["ShirtA"], "shirt", &taxonomy), None);
    assert_eq!(keeper.get("ShirtA").expect("tags").clothing_type(), None);
}
