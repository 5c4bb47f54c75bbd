//! Read-only game content: scripts, dialogue text and battle definitions

use serde::{Deserialize, Serialize};

use crate::data::{BattleInfo, BattleMap, record};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Content {
    /// Event scripts as raw opcode streams, by script id.
    pub events: Vec<Vec<i16>>,
    /// Dialogue strings as raw bytes, by talk id.
    pub talks: Vec<Vec<u8>>,
    pub battles: Vec<BattleInfo>,
    pub battle_maps: Vec<BattleMap>,
}

impl Content {
    pub fn event(&self, id: i16) -> Option<&[i16]> {
        record(&self.events, id).map(Vec::as_slice)
    }

    pub fn talk(&self, id: i16) -> Option<&[u8]> {
        record(&self.talks, id).map(Vec::as_slice)
    }

    pub fn battle(&self, id: i16) -> Option<&BattleInfo> {
        record(&self.battles, id)
    }

    pub fn battle_map(&self, id: i16) -> Option<&BattleMap> {
        record(&self.battle_maps, id)
    }
}
