//! Fixture builders for unit and integration tests
//!
//! Small constructors that produce valid records and sessions with only
//! the fields a test cares about set. Gameplay code never calls these.

use crate::GameRng;
use crate::consts::{SKILL_LEVELS, SUBMAP_EVENTS};
use crate::data::submap::empty_events;
use crate::data::{BattleInfo, BattleMap, CharacterRecord, ItemRecord, SkillRecord, SubMapLayers, SubMapRecord};
use crate::world::{Content, Factors, GameData, Session};

/// Character `id` with `hp` of `hp` max, 50/100 mp and full stamina.
pub fn character(id: i16, hp: i16) -> CharacterRecord {
    CharacterRecord {
        id,
        hp,
        max_hp: hp,
        mp: 50,
        max_mp: 100,
        stamina: 100,
        ..Default::default()
    }
}

/// Consumable `id` restoring `add_hp`.
pub fn consumable(id: i16, add_hp: i16) -> ItemRecord {
    ItemRecord {
        id,
        item_type: 3,
        add_hp,
        ..Default::default()
    }
}

/// Throwing item `id` dealing about `-add_hp`.
pub fn throwing(id: i16, add_hp: i16) -> ItemRecord {
    ItemRecord {
        id,
        item_type: 4,
        add_hp,
        throwing_effect_id: 3,
        ..Default::default()
    }
}

/// Skill `id` of area type `area` with flat `damage` at every level,
/// range 1 and no mp cost.
pub fn skill(id: i16, area: i16, damage: i16) -> SkillRecord {
    SkillRecord {
        id,
        attack_area_type: area,
        damage: [damage; SKILL_LEVELS],
        sel_range: [1; SKILL_LEVELS],
        ..Default::default()
    }
}

/// Pad `table` with defaults so that index `id` exists.
pub fn place<T: Default + Clone>(table: &mut Vec<T>, id: i16, record: T) {
    let index = id as usize;
    if table.len() <= index {
        table.resize(index + 1, T::default());
    }
    table[index] = record;
}

/// Battle 0 on an open map with the party deployed from `member_x/y`
/// and `enemies` placed at the given cells.
pub fn battle_info(members: &[(i16, i16, i16)], enemies: &[(i16, i16, i16)], exp: i16) -> BattleInfo {
    let mut info = BattleInfo {
        exp,
        ..Default::default()
    };
    for (slot, &(id, x, y)) in members.iter().enumerate() {
        info.force_members[slot] = id;
        info.member_x[slot] = x;
        info.member_y[slot] = y;
    }
    for (slot, &(id, x, y)) in enemies.iter().enumerate() {
        info.enemy[slot] = id;
        info.enemy_x[slot] = x;
        info.enemy_y[slot] = y;
    }
    info
}

/// Session holding `characters`, `skills` and `items`, with the
/// characters listed in `party` as members and `battle` as battle 0.
pub fn battle_session(
    characters: Vec<CharacterRecord>,
    skills: Vec<SkillRecord>,
    items: Vec<ItemRecord>,
    party: &[i16],
    battle: BattleInfo,
    rng: GameRng,
) -> Session {
    let mut data = GameData::default();
    for c in characters {
        let id = c.id;
        place(&mut data.characters, id, c);
    }
    for s in skills {
        let id = s.id;
        place(&mut data.skills, id, s);
    }
    for item in items {
        let id = item.id;
        place(&mut data.items, id, item);
    }
    for (slot, &id) in party.iter().enumerate() {
        data.party[slot] = id;
    }
    let content = Content {
        battles: vec![battle],
        battle_maps: vec![BattleMap::default()],
        ..Default::default()
    };
    Session::new(data, content, Factors::default(), rng)
}

/// Session with one empty submap, the protagonist in the party and the
/// given scripts installed as events `0..`.
pub fn event_session(scripts: Vec<Vec<i16>>, rng: GameRng) -> Session {
    let mut data = GameData {
        characters: vec![character(0, 100), character(1, 80), character(2, 60)],
        sub_maps: vec![SubMapRecord::default()],
        sub_map_layers: vec![SubMapLayers::default()],
        sub_map_events: vec![empty_events()],
        ..Default::default()
    };
    data.party[0] = 0;
    debug_assert_eq!(data.sub_map_events[0].len(), SUBMAP_EVENTS);
    let content = Content {
        events: scripts,
        ..Default::default()
    };
    Session::new(data, content, Factors::default(), rng)
}
