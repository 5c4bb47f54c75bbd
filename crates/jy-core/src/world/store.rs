//! Mutable save-data store shared by battles and scripts

use serde::{Deserialize, Serialize};

use crate::consts::PARTY_SIZE;
use crate::data::{
    CharacterRecord, ItemRecord, ShopRecord, SkillRecord, SubMapEvent, SubMapLayers, SubMapRecord,
    record, record_mut,
};
use crate::world::Bag;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameData {
    pub characters: Vec<CharacterRecord>,
    pub items: Vec<ItemRecord>,
    pub skills: Vec<SkillRecord>,
    pub sub_maps: Vec<SubMapRecord>,
    pub sub_map_layers: Vec<SubMapLayers>,
    pub sub_map_events: Vec<Vec<SubMapEvent>>,
    pub shops: Vec<ShopRecord>,
    /// Party slots, -1 where empty. Slot 0 is the protagonist.
    pub party: [i16; PARTY_SIZE],
    pub bag: Bag,
}

impl Default for GameData {
    fn default() -> Self {
        Self {
            characters: Vec::new(),
            items: Vec::new(),
            skills: Vec::new(),
            sub_maps: Vec::new(),
            sub_map_layers: Vec::new(),
            sub_map_events: Vec::new(),
            shops: Vec::new(),
            party: [-1; PARTY_SIZE],
            bag: Bag::new(),
        }
    }
}

impl GameData {
    pub fn character(&self, id: i16) -> Option<&CharacterRecord> {
        record(&self.characters, id)
    }

    pub fn character_mut(&mut self, id: i16) -> Option<&mut CharacterRecord> {
        record_mut(&mut self.characters, id)
    }

    pub fn item(&self, id: i16) -> Option<&ItemRecord> {
        record(&self.items, id)
    }

    pub fn item_mut(&mut self, id: i16) -> Option<&mut ItemRecord> {
        record_mut(&mut self.items, id)
    }

    pub fn skill(&self, id: i16) -> Option<&SkillRecord> {
        record(&self.skills, id)
    }

    pub fn skill_mut(&mut self, id: i16) -> Option<&mut SkillRecord> {
        record_mut(&mut self.skills, id)
    }

    pub fn sub_map(&self, id: i16) -> Option<&SubMapRecord> {
        record(&self.sub_maps, id)
    }

    pub fn sub_map_mut(&mut self, id: i16) -> Option<&mut SubMapRecord> {
        record_mut(&mut self.sub_maps, id)
    }

    pub fn layers(&self, sub_map: i16) -> Option<&SubMapLayers> {
        record(&self.sub_map_layers, sub_map)
    }

    pub fn layers_mut(&mut self, sub_map: i16) -> Option<&mut SubMapLayers> {
        record_mut(&mut self.sub_map_layers, sub_map)
    }

    pub fn event(&self, sub_map: i16, index: i16) -> Option<&SubMapEvent> {
        record(&self.sub_map_events, sub_map).and_then(|events| record(events, index))
    }

    pub fn event_mut(&mut self, sub_map: i16, index: i16) -> Option<&mut SubMapEvent> {
        record_mut(&mut self.sub_map_events, sub_map).and_then(|events| record_mut(events, index))
    }

    pub fn shop(&self, id: i16) -> Option<&ShopRecord> {
        record(&self.shops, id)
    }

    pub fn shop_mut(&mut self, id: i16) -> Option<&mut ShopRecord> {
        record_mut(&mut self.shops, id)
    }

    pub fn is_member(&self, char_id: i16) -> bool {
        char_id >= 0 && self.party.contains(&char_id)
    }

    /// Ids of current party members in slot order.
    pub fn members(&self) -> impl Iterator<Item = i16> + '_ {
        self.party.iter().copied().filter(|&id| id >= 0)
    }

    pub fn party_full(&self) -> bool {
        self.party.iter().all(|&id| id >= 0)
    }
}
