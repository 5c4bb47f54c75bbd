//! Battle definitions and battle maps

use serde::{Deserialize, Serialize};

use crate::consts::{BATTLE_ENEMIES, MAP_SIZE, PARTY_SIZE};

/// Static definition of one battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BattleInfo {
    pub id: i16,
    pub name: [u8; 10],
    pub map_id: i16,
    pub exp: i16,
    pub music: i16,
    /// Members that must fight; when the first is unset the player picks.
    pub force_members: [i16; PARTY_SIZE],
    pub default_members: [i16; PARTY_SIZE],
    pub member_x: [i16; PARTY_SIZE],
    pub member_y: [i16; PARTY_SIZE],
    pub enemy: [i16; BATTLE_ENEMIES],
    pub enemy_x: [i16; BATTLE_ENEMIES],
    pub enemy_y: [i16; BATTLE_ENEMIES],
}

impl Default for BattleInfo {
    fn default() -> Self {
        Self {
            id: 0,
            name: [0; 10],
            map_id: 0,
            exp: 0,
            music: -1,
            force_members: [-1; PARTY_SIZE],
            default_members: [-1; PARTY_SIZE],
            member_x: [0; PARTY_SIZE],
            member_y: [0; PARTY_SIZE],
            enemy: [-1; BATTLE_ENEMIES],
            enemy_x: [0; BATTLE_ENEMIES],
            enemy_y: [0; BATTLE_ENEMIES],
        }
    }
}

impl BattleInfo {
    pub fn has_forced_members(&self) -> bool {
        self.force_members[0] >= 0
    }
}

/// Terrain and building layers of a battle map, raw texture values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleMap {
    pub earth: Vec<i16>,
    pub building: Vec<i16>,
}

impl Default for BattleMap {
    fn default() -> Self {
        Self {
            earth: vec![0; MAP_SIZE * MAP_SIZE],
            building: vec![0; MAP_SIZE * MAP_SIZE],
        }
    }
}

impl BattleMap {
    /// Texture ids of the cell at `index` (raw values halved).
    pub fn textures(&self, index: usize) -> (i16, i16) {
        let earth = self.earth.get(index).copied().unwrap_or(0) >> 1;
        let building = self.building.get(index).copied().unwrap_or(0) >> 1;
        (earth, building)
    }
}

/// Terrain textures that cannot be entered (water, cliffs, walls).
pub fn terrain_blocks(earth: i16) -> bool {
    matches!(earth, 179..=181 | 261 | 511 | 662..=665 | 674)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terrain_blocks() {
        for tex in [179, 180, 181, 261, 511, 662, 665, 674] {
            assert!(terrain_blocks(tex), "{tex}");
        }
        for tex in [0, 178, 182, 260, 666, 673, 675] {
            assert!(!terrain_blocks(tex), "{tex}");
        }
    }

    #[test]
    fn test_textures_are_halved() {
        let mut map = BattleMap::default();
        map.earth[3] = 358;
        map.building[3] = 5;
        assert_eq!(map.textures(3), (179, 2));
        assert_eq!(map.textures(usize::MAX), (0, 0));
    }
}
