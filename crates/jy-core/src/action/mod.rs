//! Character and item action model
//!
//! Stateless calculators and small mutators over [`CharacterRecord`]s:
//! item requirements and effects, equipment, party membership, and the
//! combat formulas the battle engine resolves actions with. Missing
//! records are never fatal; operations report `false`/`None` instead.

mod combat;
mod items;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::consts::{HP_MAX, MP_MAX, POISONED_MAX, STAMINA_MAX, STAT_MAX};
use crate::data::{CharacterRecord, ItemRecord, SkillRecord, record};
use crate::world::{Factors, GameData};

pub use combat::{
    DamageOutcome, Strike, act_damage, act_depoison, act_levelup, act_medic, act_poison,
    act_poison_damage, act_rest, act_throw, calc_predict_damage, calc_real_attack,
    calc_real_defense, post_damage, predict_throw_damage, real_skill_level,
};
pub use items::{
    add_up_equipment, apply_item_changes, can_use_item, disband_party, equip_item, exp_for_level_up,
    exp_for_skill_learn, leave_event_id, leave_team, skill_full, take_carried, try_use_bag_item,
    try_use_npc_item, use_item, use_npc_item,
};

/// Character properties an item or action can change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum PropType {
    Hp,
    MaxHp,
    Poisoned,
    Stamina,
    MpType,
    Mp,
    MaxMp,
    Attack,
    Speed,
    Defence,
    Medic,
    Poison,
    Depoison,
    Antipoison,
    Fist,
    Sword,
    Blade,
    Special,
    Throwing,
    Knowledge,
    Integrity,
    DoubleAttack,
    PoisonAmp,
    Potential,
}

impl PropType {
    /// Fixed ceiling of the property, or `None` when bounded by the
    /// character's own maximum (hp and mp).
    pub fn ceiling(self) -> Option<i16> {
        match self {
            PropType::Hp | PropType::Mp => None,
            PropType::MaxHp => Some(HP_MAX),
            PropType::MaxMp => Some(MP_MAX),
            PropType::Poisoned => Some(POISONED_MAX),
            PropType::Stamina => Some(STAMINA_MAX),
            PropType::MpType => Some(2),
            PropType::DoubleAttack => Some(1),
            _ => Some(STAT_MAX),
        }
    }
}

/// Post-clamp deltas an action produced, by property.
pub type Changes = BTreeMap<PropType, i16>;

/// Read-only tables the combat formulas consult.
#[derive(Debug, Clone, Copy)]
pub struct Rules<'a> {
    pub items: &'a [ItemRecord],
    pub skills: &'a [SkillRecord],
    pub factors: &'a Factors,
}

impl<'a> Rules<'a> {
    pub fn new(data: &'a GameData, factors: &'a Factors) -> Self {
        Self {
            items: &data.items,
            skills: &data.skills,
            factors,
        }
    }

    pub fn item(&self, id: i16) -> Option<&'a ItemRecord> {
        record(self.items, id)
    }

    pub fn skill(&self, id: i16) -> Option<&'a SkillRecord> {
        record(self.skills, id)
    }

    /// Skill learned in `slot` of `c`, if any.
    pub fn skill_in_slot(&self, c: &CharacterRecord, slot: usize) -> Option<&'a SkillRecord> {
        let id = *c.skill_id.get(slot)?;
        if id <= 0 {
            return None;
        }
        self.skill(id)
    }
}

/// Add `delta` to `value` and clamp to `0..=max`.
pub(crate) fn clamp_add(value: i16, delta: i32, max: i16) -> i16 {
    (value as i32 + delta).clamp(0, max.max(0) as i32) as i16
}
