//! Biped slots and the bit-level algebra over them.
//!
//! An armor record occupies a set of biped slots, numbered 30 to 63. The game
//! stores them as a flag word where bit `i` stands for slot `i + 30`. The
//! [`BipedMask`] wraps such a word and guarantees that no bit outside the slot
//! range is ever reported, while the [`SlotCatalog`] names the slots a curator
//! cares about.

// used to keep the one-to-one mapping between a slot index and its label
use bimap::BiMap;
use lazy_static::lazy_static;

// used to print out readable forms of a mask
use std::fmt;

// ------------- Slot -------------
pub type SlotIndex = u8;

pub const FIRST_SLOT: SlotIndex = 30;
pub const LAST_SLOT: SlotIndex = 63;
// slots 30..=63 map onto the low 34 bits
const VALID_BITS: u64 = (1u64 << (LAST_SLOT - FIRST_SLOT + 1)) - 1;

/// Slots whose presence marks an armor record as underwear.
pub const UNDERWEAR_SLOTS: [SlotIndex; 5] = [36, 37, 38, 39, 40];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDefinition {
    index: SlotIndex,
    label: &'static str,
}

impl SlotDefinition {
    const fn new(index: SlotIndex, label: &'static str) -> Self {
        Self { index, label }
    }
    pub fn index(&self) -> SlotIndex {
        self.index
    }
    pub fn label(&self) -> &'static str {
        self.label
    }
}

// The order is the order in which a blank slot set is presented.
const SLOT_DEFINITIONS: [SlotDefinition; 27] = [
    SlotDefinition::new(33, "Boots (vanilla BODY)"),
    SlotDefinition::new(52, "Scalp"),
    SlotDefinition::new(30, "Hair (Top)"),
    SlotDefinition::new(31, "Hair (Long)"),
    SlotDefinition::new(46, "Facegear"),
    SlotDefinition::new(47, "Eyes"),
    SlotDefinition::new(50, "Neck"),
    SlotDefinition::new(36, "Chest Underwear"),
    SlotDefinition::new(41, "Chest Outerwear"),
    SlotDefinition::new(56, "Abdomen Underwear"),
    SlotDefinition::new(57, "Abdomen Outerwear"),
    SlotDefinition::new(55, "Pelvis Underwear"),
    SlotDefinition::new(54, "Pelvis Outerwear"),
    SlotDefinition::new(37, "L Arm & Shoulder Underwear"),
    SlotDefinition::new(42, "L Arm & Shoulder Outerwear"),
    SlotDefinition::new(38, "R Arm & Shoulder Underwear"),
    SlotDefinition::new(43, "R Arm & Shoulder Outerwear"),
    SlotDefinition::new(51, "Cloak/Cape/Poncho"),
    SlotDefinition::new(34, "L Hand"),
    SlotDefinition::new(35, "R Hand"),
    SlotDefinition::new(39, "L Leg Underwear"),
    SlotDefinition::new(44, "L Leg Outerwear"),
    SlotDefinition::new(40, "R Leg Underwear"),
    SlotDefinition::new(45, "R Leg Outerwear"),
    SlotDefinition::new(48, "Backpack/Rig"),
    SlotDefinition::new(49, "Hip/Drop-Leg Rig"),
    SlotDefinition::new(58, "Body Jewelry"),
];

lazy_static! {
    static ref SLOT_LABELS: BiMap<SlotIndex, &'static str> = SLOT_DEFINITIONS
        .iter()
        .map(|definition| (definition.index, definition.label))
        .collect();
}

/// The fixed table of named slots.
pub struct SlotCatalog;

impl SlotCatalog {
    pub fn all() -> &'static [SlotDefinition] {
        &SLOT_DEFINITIONS
    }
    pub fn label(index: SlotIndex) -> Option<&'static str> {
        SLOT_LABELS.get_by_left(&index).copied()
    }
    pub fn index_of(label: &str) -> Option<SlotIndex> {
        SLOT_LABELS
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(label))
            .map(|(index, _)| *index)
    }
    pub fn contains(index: SlotIndex) -> bool {
        SLOT_LABELS.contains_left(&index)
    }
    /// The label of a slot, or its bare number when the catalog does not name it.
    pub fn describe(index: SlotIndex) -> String {
        match Self::label(index) {
            Some(label) => label.to_string(),
            None => index.to_string(),
        }
    }
    /// Every catalogued slot, as a mask.
    pub fn mask() -> BipedMask {
        BipedMask::from_slots(SLOT_DEFINITIONS.iter().map(|definition| definition.index))
    }
}

// ------------- BipedMask -------------
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BipedMask(u64);

impl BipedMask {
    pub const EMPTY: BipedMask = BipedMask(0);

    /// Bits beyond slot 63 are dropped, they have no slot to stand for.
    pub fn from_bits(bits: u64) -> Self {
        Self(bits & VALID_BITS)
    }
    pub fn from_slots<I: IntoIterator<Item = SlotIndex>>(slots: I) -> Self {
        let mut mask = Self::EMPTY;
        for slot in slots {
            mask.insert(slot);
        }
        mask
    }
    pub fn bits(&self) -> u64 {
        self.0
    }
    fn bit(index: SlotIndex) -> Option<u64> {
        if (FIRST_SLOT..=LAST_SLOT).contains(&index) {
            Some(1u64 << (index - FIRST_SLOT))
        } else {
            None
        }
    }
    pub fn has_slot(&self, index: SlotIndex) -> bool {
        match Self::bit(index) {
            Some(bit) => self.0 & bit != 0,
            None => false,
        }
    }
    /// Returns false when the index is not a biped slot.
    pub fn insert(&mut self, index: SlotIndex) -> bool {
        match Self::bit(index) {
            Some(bit) => {
                self.0 |= bit;
                true
            }
            None => false,
        }
    }
    pub fn remove(&mut self, index: SlotIndex) {
        if let Some(bit) = Self::bit(index) {
            self.0 &= !bit;
        }
    }
    pub fn set(&mut self, index: SlotIndex, on: bool) -> bool {
        if on {
            self.insert(index)
        } else {
            self.remove(index);
            Self::bit(index).is_some()
        }
    }
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }
    /// Occupied slots in ascending order.
    pub fn slots(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        (FIRST_SLOT..=LAST_SLOT).filter(move |index| self.has_slot(*index))
    }
    pub fn intersection(&self, other: &BipedMask) -> BipedMask {
        BipedMask(self.0 & other.0)
    }
    pub fn is_underwear(&self) -> bool {
        UNDERWEAR_SLOTS.iter().any(|slot| self.has_slot(*slot))
    }
}

impl fmt::Debug for BipedMask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BipedMask({:#011x})", self.0)
    }
}

// The on-disk form: ascending slot numbers joined by semicolons.
impl fmt::Display for BipedMask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let slots: Vec<String> = self.slots().map(|slot| slot.to_string()).collect();
        write!(f, "{}", slots.join(";"))
    }
}

// ------------- Template resolution -------------
/// A record carrying (or inheriting) a biped body template.
pub trait BodyTemplate {
    type Link;
    fn first_person_flags(&self) -> Option<u64>;
    fn template_link(&self) -> Option<&Self::Link>;
}

pub trait TemplateResolver<R: BodyTemplate> {
    fn resolve(&self, link: &R::Link) -> Option<&R>;
}

/// Slots occupied by a record. A record without its own flags borrows those of
/// its template, one level deep; anything unresolvable occupies nothing.
pub fn occupied_slots<R: BodyTemplate>(
    record: &R,
    resolver: Option<&dyn TemplateResolver<R>>,
) -> BipedMask {
    if let Some(flags) = record.first_person_flags() {
        return BipedMask::from_bits(flags);
    }
    let template = match (resolver, record.template_link()) {
        (Some(resolver), Some(link)) => resolver.resolve(link),
        _ => None,
    };
    template
        .and_then(|template| template.first_person_flags())
        .map(BipedMask::from_bits)
        .unwrap_or(BipedMask::EMPTY)
}
