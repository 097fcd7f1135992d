//! Armortags – curation of armor tags for a clothing distribution mod.
//!
//! A curator looks at every armor record a load order provides and decides who
//! may wear it: which sexes, which occupations, from what level, whether it is
//! NSFW, and what kind of clothing it is. The decisions end up in per-module
//! CSV tag tables that the in-game component reads.
//!
//! The central pieces are:
//! * A [`slot::BipedMask`] is the set of body slots (30..=63) an armor occupies,
//!   named through the [`slot::SlotCatalog`].
//! * A [`taxonomy::ClothingType`] pairs a name with the slots it covers, and the
//!   [`taxonomy::Taxonomy`] keeps every type found below the taxonomy root.
//! * [`construct::ArmorTags`] are the flags of one armor, owned by the
//!   [`construct::TagKeeper`] which also aggregates them over a selection into
//!   tri-state values.
//! * The [`classify`] module labels armors and selections by clothing type,
//!   explicitly assigned or inferred from the occupied slots.
//!
//! ## Modules
//! * [`slot`] – Slot numbers, labels and masks.
//! * [`catalog`] – Armor and add-on records as delivered by the game-data side.
//! * [`taxonomy`] – Clothing types and their CSV files.
//! * [`classify`] – Explicit, `AUTO:` and `SLOT:` classifications.
//! * [`construct`] – Tag storage, aggregation and the [`construct::Workspace`].
//! * [`omod`] – Add-on compatibility.
//! * [`persist`] – CSV reading and writing, including legacy tag-table migration.
//! * [`interface`] – Background catalog scanning.
//! * [`settings`] – Configuration and the data directory.
//!
//! ## Quick Start
//! ```
//! use armortags::construct::{OccupationRoster, TagKeeper, TriState, MALE};
//! let mut keeper = TagKeeper::new(OccupationRoster::default());
//! keeper.apply_boolean(["ArmorA", "ArmorB"], MALE, true);
//! assert_eq!(keeper.aggregate_boolean(["ArmorA", "ArmorB"], MALE), TriState::True);
//! assert_eq!(keeper.aggregate_boolean(["ArmorA", "ArmorC"], MALE), TriState::Indeterminate);
//! ```

pub mod catalog;
pub mod classify;
pub mod construct;
pub mod error;
pub mod interface;
pub mod omod;
pub mod persist;
pub mod settings;
pub mod slot;
pub mod taxonomy;

pub use error::{Result, TagError};
