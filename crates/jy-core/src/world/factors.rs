//! Tunable game factors
//!
//! Tables and ids that belong to the game content rather than the engine:
//! experience curves, weapon/skill synergies, effect lengths and the ids
//! of the few set-piece events the engine rewrites itself.

use serde::{Deserialize, Serialize};

use crate::consts::{KNOWLEDGE_BARRIER, LEVEL_UP_EXP};

/// A submap that can host the travelling shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopSite {
    pub sub_map: i16,
    /// Event slot the shopkeeper occupies
    pub shop_event: i16,
    /// Exit cells that trigger the relocation script
    pub exit_events: Vec<i16>,
}

impl ShopSite {
    fn new(sub_map: i16, shop_event: i16, exit_events: &[i16]) -> Self {
        Self {
            sub_map,
            shop_event,
            exit_events: exit_events.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Factors {
    /// Cumulative experience needed to leave each level, indexed by `level - 1`.
    pub exp_for_level_up: Vec<u16>,
    /// `[weapon item, skill, attack bonus]` synergies.
    pub skill_weapon_bindings: Vec<[i16; 3]>,
    /// Characters that have a scripted farewell when leaving the party.
    pub leave_team_chars: Vec<i16>,
    /// Script id of the first farewell; each character takes two ids.
    pub leave_team_start_event: i16,
    pub knowledge_barrier: i16,
    /// Frame count of each battle effect animation, by effect id.
    pub effect_frames: Vec<i16>,
    /// Used when an effect id has no entry in `effect_frames`.
    pub default_effect_frames: i16,
    pub poison_effect: i16,
    pub depoison_effect: i16,
    pub medic_effect: i16,
    pub money_item: i16,
    pub shop_event: i16,
    pub random_shop_event: i16,
    pub shop_event_tex: i16,
    pub shop_sites: Vec<ShopSite>,
}

impl Default for Factors {
    fn default() -> Self {
        Self {
            exp_for_level_up: LEVEL_UP_EXP.iter().map(|&v| v as u16).collect(),
            skill_weapon_bindings: Vec::new(),
            leave_team_chars: Vec::new(),
            leave_team_start_event: 0,
            knowledge_barrier: KNOWLEDGE_BARRIER,
            effect_frames: Vec::new(),
            default_effect_frames: 10,
            poison_effect: 30,
            depoison_effect: 36,
            medic_effect: 0,
            money_item: 174,
            shop_event: 938,
            random_shop_event: 939,
            shop_event_tex: 8256,
            shop_sites: vec![
                ShopSite::new(1, 16, &[17, 18]),
                ShopSite::new(3, 14, &[15, 16]),
                ShopSite::new(40, 20, &[21, 22]),
                ShopSite::new(60, 16, &[17, 18]),
                ShopSite::new(61, 9, &[10, 11, 12]),
            ],
        }
    }
}

impl Factors {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Frames the effect animation `effect_id` lasts.
    pub fn effect_length(&self, effect_id: i16) -> i32 {
        usize::try_from(effect_id)
            .ok()
            .and_then(|i| self.effect_frames.get(i))
            .copied()
            .unwrap_or(self.default_effect_frames) as i32
    }

    /// Attack bonus for using `skill_id` with `weapon` equipped.
    pub fn weapon_bonus(&self, weapon: i16, skill_id: i16) -> i16 {
        self.skill_weapon_bindings
            .iter()
            .find(|[w, s, _]| *w == weapon && *s == skill_id)
            .map_or(0, |b| b[2])
    }
}
