//! Skill records

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::consts::SKILL_LEVELS;

/// Shape of the cells a skill hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum AttackArea {
    /// One selected cell within range
    Point,
    /// A line from the user in one chosen direction
    Line,
    /// All four lines from the user at once
    Cross,
    /// A square of radius `area` around a selected cell
    Radius,
}

impl AttackArea {
    pub fn from_raw(raw: i16) -> Self {
        match raw {
            1 => Self::Line,
            2 => Self::Cross,
            3 => Self::Radius,
            _ => Self::Point,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillRecord {
    pub id: i16,
    pub name: [u8; 10],
    pub unknown: [i16; 5],
    pub sound_id: i16,
    /// Fight animation set (fist, sword, blade, special, ...)
    pub skill_type: i16,
    pub effect_id: i16,
    /// Nonzero: drains mp instead of dealing damage
    pub damage_type: i16,
    pub attack_area_type: i16,
    pub req_mp: i16,
    pub add_poison: i16,
    pub damage: [i16; SKILL_LEVELS],
    pub sel_range: [i16; SKILL_LEVELS],
    pub area: [i16; SKILL_LEVELS],
    pub add_mp: [i16; SKILL_LEVELS],
    pub drain_mp: [i16; SKILL_LEVELS],
}

crate::word_layout!(SkillRecord {
    id: i16,
    name: [u8; 10],
    unknown: [i16; 5],
    sound_id: i16,
    skill_type: i16,
    effect_id: i16,
    damage_type: i16,
    attack_area_type: i16,
    req_mp: i16,
    add_poison: i16,
    damage: [i16; SKILL_LEVELS],
    sel_range: [i16; SKILL_LEVELS],
    area: [i16; SKILL_LEVELS],
    add_mp: [i16; SKILL_LEVELS],
    drain_mp: [i16; SKILL_LEVELS],
});

impl SkillRecord {
    pub fn attack_area(&self) -> AttackArea {
        AttackArea::from_raw(self.attack_area_type)
    }

    pub fn drains_mp(&self) -> bool {
        self.damage_type > 0
    }

    fn at(table: &[i16; SKILL_LEVELS], level: i16) -> i16 {
        table[level.clamp(0, SKILL_LEVELS as i16 - 1) as usize]
    }

    pub fn damage_at(&self, level: i16) -> i16 {
        Self::at(&self.damage, level)
    }

    pub fn range_at(&self, level: i16) -> i16 {
        Self::at(&self.sel_range, level)
    }

    pub fn area_at(&self, level: i16) -> i16 {
        Self::at(&self.area, level)
    }

    pub fn add_mp_at(&self, level: i16) -> i16 {
        Self::at(&self.add_mp, level)
    }

    pub fn drain_mp_at(&self, level: i16) -> i16 {
        Self::at(&self.drain_mp, level)
    }
}
