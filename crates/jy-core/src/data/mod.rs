//! Save and content records
//!
//! Plain data shared by the battle engine and the event VM. Every record
//! declares its packed word layout so scripts can address fields by byte
//! offset.

pub mod battle;
pub mod character;
pub mod fields;
pub mod item;
pub mod shop;
pub mod skill;
pub mod submap;

pub use battle::{BattleInfo, BattleMap};
pub use character::CharacterRecord;
pub use fields::WordLayout;
pub use item::{ItemKind, ItemRecord};
pub use shop::ShopRecord;
pub use skill::{AttackArea, SkillRecord};
pub use submap::{SubMapEvent, SubMapLayers, SubMapRecord};

/// Look up a record by signed id. Negative or out-of-range ids give `None`.
pub fn record<T>(table: &[T], id: i16) -> Option<&T> {
    usize::try_from(id).ok().and_then(|i| table.get(i))
}

pub fn record_mut<T>(table: &mut [T], id: i16) -> Option<&mut T> {
    usize::try_from(id).ok().and_then(|i| table.get_mut(i))
}
