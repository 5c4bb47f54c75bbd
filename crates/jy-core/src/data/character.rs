//! Character records

use serde::{Deserialize, Serialize};

use crate::consts::{CARRY_SLOTS, EQUIP_SLOTS, SKILL_LEVEL_STEP, SKILL_LEVELS, SKILL_SLOTS};

/// Persistent character record, in save-file field order.
///
/// Skill levels are stored raw: `level = raw / 100`, progress `raw % 100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CharacterRecord {
    pub id: i16,
    pub head_id: i16,
    pub hp_add_on_level_up: i16,
    pub unused: i16,
    pub name: [u8; 10],
    pub nick: [u8; 10],
    pub sex: i16,
    pub level: i16,
    pub exp: u16,
    pub hp: i16,
    pub max_hp: i16,
    pub hurt: i16,
    pub poisoned: i16,
    pub stamina: i16,
    pub exp_for_make_item: u16,
    pub equip: [i16; EQUIP_SLOTS],
    /// Fight animation frame counts per skill type.
    pub frame: [i16; 5],
    pub frame_delay: [i16; 5],
    pub frame_sound_delay: [i16; 5],
    pub mp_type: i16,
    pub mp: i16,
    pub max_mp: i16,
    pub attack: i16,
    pub speed: i16,
    pub defence: i16,
    pub medic: i16,
    pub poison: i16,
    pub depoison: i16,
    pub antipoison: i16,
    pub fist: i16,
    pub sword: i16,
    pub blade: i16,
    pub special: i16,
    pub throwing: i16,
    pub knowledge: i16,
    pub integrity: i16,
    pub poison_amp: i16,
    pub double_attack: i16,
    pub reputation: i16,
    pub potential: i16,
    pub learning_item: i16,
    pub exp_for_item: u16,
    pub skill_id: [i16; SKILL_SLOTS],
    pub skill_level: [i16; SKILL_SLOTS],
    pub item: [i16; CARRY_SLOTS],
    pub item_count: [i16; CARRY_SLOTS],
}

crate::word_layout!(CharacterRecord {
    id: i16,
    head_id: i16,
    hp_add_on_level_up: i16,
    unused: i16,
    name: [u8; 10],
    nick: [u8; 10],
    sex: i16,
    level: i16,
    exp: u16,
    hp: i16,
    max_hp: i16,
    hurt: i16,
    poisoned: i16,
    stamina: i16,
    exp_for_make_item: u16,
    equip: [i16; EQUIP_SLOTS],
    frame: [i16; 5],
    frame_delay: [i16; 5],
    frame_sound_delay: [i16; 5],
    mp_type: i16,
    mp: i16,
    max_mp: i16,
    attack: i16,
    speed: i16,
    defence: i16,
    medic: i16,
    poison: i16,
    depoison: i16,
    antipoison: i16,
    fist: i16,
    sword: i16,
    blade: i16,
    special: i16,
    throwing: i16,
    knowledge: i16,
    integrity: i16,
    poison_amp: i16,
    double_attack: i16,
    reputation: i16,
    potential: i16,
    learning_item: i16,
    exp_for_item: u16,
    skill_id: [i16; SKILL_SLOTS],
    skill_level: [i16; SKILL_SLOTS],
    item: [i16; CARRY_SLOTS],
    item_count: [i16; CARRY_SLOTS],
});

impl Default for CharacterRecord {
    fn default() -> Self {
        Self {
            id: 0,
            head_id: 0,
            hp_add_on_level_up: 0,
            unused: 0,
            name: [0; 10],
            nick: [0; 10],
            sex: 0,
            level: 1,
            exp: 0,
            hp: 0,
            max_hp: 0,
            hurt: 0,
            poisoned: 0,
            stamina: 0,
            exp_for_make_item: 0,
            equip: [-1; EQUIP_SLOTS],
            frame: [0; 5],
            frame_delay: [0; 5],
            frame_sound_delay: [0; 5],
            mp_type: 0,
            mp: 0,
            max_mp: 0,
            attack: 0,
            speed: 0,
            defence: 0,
            medic: 0,
            poison: 0,
            depoison: 0,
            antipoison: 0,
            fist: 0,
            sword: 0,
            blade: 0,
            special: 0,
            throwing: 0,
            knowledge: 0,
            integrity: 0,
            poison_amp: 0,
            double_attack: 0,
            reputation: 0,
            potential: 0,
            learning_item: -1,
            exp_for_item: 0,
            skill_id: [0; SKILL_SLOTS],
            skill_level: [0; SKILL_SLOTS],
            item: [-1; CARRY_SLOTS],
            item_count: [0; CARRY_SLOTS],
        }
    }
}

impl CharacterRecord {
    /// Level tier (0..=9) of the skill in `slot`.
    pub fn skill_tier(&self, slot: usize) -> i16 {
        self.skill_level
            .get(slot)
            .map_or(0, |raw| (raw / SKILL_LEVEL_STEP).clamp(0, SKILL_LEVELS as i16 - 1))
    }

    /// Slot holding `skill_id`, if learned.
    pub fn skill_slot(&self, skill_id: i16) -> Option<usize> {
        self.skill_id.iter().position(|&id| id == skill_id)
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Name bytes up to the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        &self.name[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fields::WordLayout;

    #[test]
    fn test_layout_is_91_words() {
        assert_eq!(<CharacterRecord as WordLayout>::WORDS, 91);
    }

    #[test]
    fn test_byte_offsets_match_save_layout() {
        let mut c = CharacterRecord {
            level: 12,
            attack: 40,
            potential: 55,
            ..Default::default()
        };
        c.skill_level[1] = 250;
        c.item_count[3] = 9;
        assert_eq!(c.peek(15 * 2), Some(12));
        assert_eq!(c.peek(43 * 2), Some(40));
        assert_eq!(c.peek(60 * 2), Some(55));
        assert_eq!(c.peek(74 * 2), Some(250));
        assert_eq!(c.peek(90 * 2), Some(9));
        assert!(c.poke(44 * 2, 33));
        assert_eq!(c.speed, 33);
    }

    #[test]
    fn test_skill_tier() {
        let mut c = CharacterRecord::default();
        c.skill_level[0] = 999;
        c.skill_level[1] = 250;
        assert_eq!(c.skill_tier(0), 9);
        assert_eq!(c.skill_tier(1), 2);
        assert_eq!(c.skill_tier(42), 0);
    }

    #[test]
    fn test_name_bytes() {
        let mut c = CharacterRecord::default();
        c.name[..3].copy_from_slice(b"abc");
        assert_eq!(c.name_bytes(), b"abc");
    }
}
