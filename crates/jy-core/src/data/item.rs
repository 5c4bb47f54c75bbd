//! Item records

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Broad item class, from the record's `item_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum ItemKind {
    /// Story items with no use in battle
    Plot,
    /// Weapons (slot 0) and armour (slot 1)
    Equipment,
    /// Manuals a character studies to learn a skill or craft items
    Manual,
    /// Consumed from the bag or a carried slot
    Consumable,
    /// Hidden weapons thrown in battle
    Throwing,
    Unknown,
}

impl ItemKind {
    pub fn from_raw(raw: i16) -> Self {
        match raw {
            0 => Self::Plot,
            1 => Self::Equipment,
            2 => Self::Manual,
            3 => Self::Consumable,
            4 => Self::Throwing,
            _ => Self::Unknown,
        }
    }
}

/// Persistent item record, in save-file field order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: i16,
    pub name: [u8; 20],
    pub name2: [u8; 20],
    pub desc: [u8; 30],
    pub skill_id: i16,
    pub throwing_effect_id: i16,
    /// Character currently equipping or studying this item, -1 if none.
    pub user: i16,
    pub equip_type: i16,
    pub show_desc: i16,
    pub item_type: i16,
    pub unknown: [i16; 3],
    pub add_hp: i16,
    pub add_max_hp: i16,
    pub add_poisoned: i16,
    pub add_stamina: i16,
    pub change_mp_type: i16,
    pub add_mp: i16,
    pub add_max_mp: i16,
    pub add_attack: i16,
    pub add_speed: i16,
    pub add_defence: i16,
    pub add_medic: i16,
    pub add_poison: i16,
    pub add_depoison: i16,
    pub add_antipoison: i16,
    pub add_fist: i16,
    pub add_sword: i16,
    pub add_blade: i16,
    pub add_special: i16,
    pub add_throwing: i16,
    pub add_knowledge: i16,
    pub add_integrity: i16,
    pub add_double_attack: i16,
    pub add_poison_amp: i16,
    pub char_only: i16,
    pub req_mp_type: i16,
    pub req_mp: i16,
    pub req_attack: i16,
    pub req_speed: i16,
    pub req_poison: i16,
    pub req_medic: i16,
    pub req_depoison: i16,
    pub req_fist: i16,
    pub req_sword: i16,
    pub req_blade: i16,
    pub req_special: i16,
    pub req_throwing: i16,
    pub req_potential: i16,
    pub req_exp: i16,
    pub req_exp_for_make_item: i16,
    pub req_material: i16,
    pub make_item: [i16; 5],
    pub make_item_count: [i16; 5],
}

crate::word_layout!(ItemRecord {
    id: i16,
    name: [u8; 20],
    name2: [u8; 20],
    desc: [u8; 30],
    skill_id: i16,
    throwing_effect_id: i16,
    user: i16,
    equip_type: i16,
    show_desc: i16,
    item_type: i16,
    unknown: [i16; 3],
    add_hp: i16,
    add_max_hp: i16,
    add_poisoned: i16,
    add_stamina: i16,
    change_mp_type: i16,
    add_mp: i16,
    add_max_mp: i16,
    add_attack: i16,
    add_speed: i16,
    add_defence: i16,
    add_medic: i16,
    add_poison: i16,
    add_depoison: i16,
    add_antipoison: i16,
    add_fist: i16,
    add_sword: i16,
    add_blade: i16,
    add_special: i16,
    add_throwing: i16,
    add_knowledge: i16,
    add_integrity: i16,
    add_double_attack: i16,
    add_poison_amp: i16,
    char_only: i16,
    req_mp_type: i16,
    req_mp: i16,
    req_attack: i16,
    req_speed: i16,
    req_poison: i16,
    req_medic: i16,
    req_depoison: i16,
    req_fist: i16,
    req_sword: i16,
    req_blade: i16,
    req_special: i16,
    req_throwing: i16,
    req_potential: i16,
    req_exp: i16,
    req_exp_for_make_item: i16,
    req_material: i16,
    make_item: [i16; 5],
    make_item_count: [i16; 5],
});

impl Default for ItemRecord {
    fn default() -> Self {
        Self {
            id: 0,
            name: [0; 20],
            name2: [0; 20],
            desc: [0; 30],
            skill_id: -1,
            throwing_effect_id: 0,
            user: -1,
            equip_type: -1,
            show_desc: 0,
            item_type: 0,
            unknown: [0; 3],
            add_hp: 0,
            add_max_hp: 0,
            add_poisoned: 0,
            add_stamina: 0,
            change_mp_type: 0,
            add_mp: 0,
            add_max_mp: 0,
            add_attack: 0,
            add_speed: 0,
            add_defence: 0,
            add_medic: 0,
            add_poison: 0,
            add_depoison: 0,
            add_antipoison: 0,
            add_fist: 0,
            add_sword: 0,
            add_blade: 0,
            add_special: 0,
            add_throwing: 0,
            add_knowledge: 0,
            add_integrity: 0,
            add_double_attack: 0,
            add_poison_amp: 0,
            char_only: -1,
            req_mp_type: 2,
            req_mp: 0,
            req_attack: 0,
            req_speed: 0,
            req_poison: 0,
            req_medic: 0,
            req_depoison: 0,
            req_fist: 0,
            req_sword: 0,
            req_blade: 0,
            req_special: 0,
            req_throwing: 0,
            req_potential: 0,
            req_exp: 0,
            req_exp_for_make_item: 0,
            req_material: -1,
            make_item: [-1; 5],
            make_item_count: [0; 5],
        }
    }
}

impl ItemRecord {
    pub fn kind(&self) -> ItemKind {
        ItemKind::from_raw(self.item_type)
    }

    /// Number of leading valid entries in the crafting product list.
    pub fn product_count(&self) -> usize {
        self.make_item.iter().take_while(|&&id| id >= 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fields::WordLayout;

    #[test]
    fn test_layout_is_95_words() {
        assert_eq!(<ItemRecord as WordLayout>::WORDS, 95);
    }

    #[test]
    fn test_byte_offsets_match_save_layout() {
        let item = ItemRecord {
            user: 4,
            add_hp: 50,
            req_exp: 30,
            ..Default::default()
        };
        assert_eq!(item.peek(38 * 2), Some(4));
        assert_eq!(item.peek(45 * 2), Some(50));
        assert_eq!(item.peek(82 * 2), Some(30));
        assert_eq!(item.peek(85 * 2), Some(-1));
    }

    #[test]
    fn test_kind_and_products() {
        let mut item = ItemRecord {
            item_type: 2,
            ..Default::default()
        };
        assert_eq!(item.kind(), ItemKind::Manual);
        assert_eq!(item.product_count(), 0);
        item.make_item[0] = 10;
        item.make_item[1] = 11;
        assert_eq!(item.product_count(), 2);
        assert_eq!(ItemKind::from_raw(9), ItemKind::Unknown);
    }
}
