//! Item requirements, item effects, equipment and party membership

use crate::GameRng;
use crate::action::{Changes, PropType, clamp_add};
use crate::consts::{CARRY_SLOTS, PARTY_SIZE, PROTAGONIST};
use crate::data::{CharacterRecord, ItemKind, ItemRecord, record};
use crate::world::{Bag, Factors, GameData};

/// Whether `c` meets every requirement of `item`.
///
/// Equipment and manuals may be restricted to one character and to an mp
/// type (2 on either side is a wildcard). A negative stat requirement `-n`
/// means the stat must be below `n`.
pub fn can_use_item(c: &CharacterRecord, item: &ItemRecord) -> bool {
    if matches!(item.kind(), ItemKind::Equipment | ItemKind::Manual) {
        if item.char_only >= 0 && item.char_only != c.id {
            return false;
        }
        if matches!(item.req_mp_type, 0 | 1) && c.mp_type < 2 && item.req_mp_type != c.mp_type {
            return false;
        }
    }
    let meets = |value: i16, req: i16| if req < 0 { value < -req } else { value >= req };
    meets(c.mp, item.req_mp)
        && meets(c.attack, item.req_attack)
        && meets(c.speed, item.req_speed)
        && meets(c.poison, item.req_poison)
        && meets(c.medic, item.req_medic)
        && meets(c.depoison, item.req_depoison)
        && meets(c.fist, item.req_fist)
        && meets(c.sword, item.req_sword)
        && meets(c.blade, item.req_blade)
        && meets(c.special, item.req_special)
        && meets(c.throwing, item.req_throwing)
        && meets(c.potential, item.req_potential)
}

fn cap(prop: PropType) -> i16 {
    prop.ceiling().unwrap_or(i16::MAX)
}

fn change(changes: &mut Changes, prop: PropType, value: &mut i16, add: i16, max: i16) {
    if add == 0 {
        return;
    }
    let old = *value;
    *value = clamp_add(old, add as i32, max);
    if *value != old {
        changes.insert(prop, *value - old);
    }
}

/// Apply every nonzero `add_*` field of `item` to `c`, recording the
/// clamped deltas. Returns whether anything changed.
///
/// Hp and mp are bounded by the character's current maxima; the mp type
/// switches before the mp pool is adjusted.
pub fn apply_item_changes(c: &mut CharacterRecord, item: &ItemRecord, changes: &mut Changes) -> bool {
    change(changes, PropType::Hp, &mut c.hp, item.add_hp, c.max_hp);
    change(changes, PropType::MaxHp, &mut c.max_hp, item.add_max_hp, cap(PropType::MaxHp));
    change(changes, PropType::Poisoned, &mut c.poisoned, item.add_poisoned, cap(PropType::Poisoned));
    change(changes, PropType::Stamina, &mut c.stamina, item.add_stamina, cap(PropType::Stamina));
    if item.change_mp_type > 0 && c.mp_type < 2 && c.mp_type != item.change_mp_type {
        c.mp_type = item.change_mp_type;
        changes.insert(PropType::MpType, item.change_mp_type);
    }
    change(changes, PropType::Mp, &mut c.mp, item.add_mp, c.max_mp);
    change(changes, PropType::MaxMp, &mut c.max_mp, item.add_max_mp, cap(PropType::MaxMp));
    change(changes, PropType::Attack, &mut c.attack, item.add_attack, cap(PropType::Attack));
    change(changes, PropType::Speed, &mut c.speed, item.add_speed, cap(PropType::Speed));
    change(changes, PropType::Defence, &mut c.defence, item.add_defence, cap(PropType::Defence));
    change(changes, PropType::Medic, &mut c.medic, item.add_medic, cap(PropType::Medic));
    change(changes, PropType::Poison, &mut c.poison, item.add_poison, cap(PropType::Poison));
    change(changes, PropType::Depoison, &mut c.depoison, item.add_depoison, cap(PropType::Depoison));
    change(changes, PropType::Antipoison, &mut c.antipoison, item.add_antipoison, cap(PropType::Antipoison));
    change(changes, PropType::Fist, &mut c.fist, item.add_fist, cap(PropType::Fist));
    change(changes, PropType::Sword, &mut c.sword, item.add_sword, cap(PropType::Sword));
    change(changes, PropType::Blade, &mut c.blade, item.add_blade, cap(PropType::Blade));
    change(changes, PropType::Special, &mut c.special, item.add_special, cap(PropType::Special));
    change(changes, PropType::Throwing, &mut c.throwing, item.add_throwing, cap(PropType::Throwing));
    change(changes, PropType::Knowledge, &mut c.knowledge, item.add_knowledge, cap(PropType::Knowledge));
    change(changes, PropType::Integrity, &mut c.integrity, item.add_integrity, cap(PropType::Integrity));
    if item.add_double_attack > 0 && c.double_attack != item.add_double_attack {
        c.double_attack = item.add_double_attack;
        changes.insert(PropType::DoubleAttack, item.add_double_attack);
    }
    change(changes, PropType::PoisonAmp, &mut c.poison_amp, item.add_poison_amp, cap(PropType::PoisonAmp));
    !changes.is_empty()
}

/// Equip a weapon or armour, or start studying a manual.
///
/// The item is released by its previous user first and whatever `char_id`
/// held in that slot is released too, so `item.user` always names the
/// character holding it.
pub fn equip_item(data: &mut GameData, char_id: i16, item_id: i16) -> bool {
    let (Some(c), Some(item)) = (data.character(char_id), data.item(item_id)) else {
        return false;
    };
    let slot = match item.kind() {
        ItemKind::Equipment if matches!(item.equip_type, 0 | 1) => Some(item.equip_type as usize),
        ItemKind::Manual => None,
        _ => return false,
    };
    if !can_use_item(c, item) {
        return false;
    }
    let previous_user = item.user;
    if let Some(prev) = data.character_mut(previous_user) {
        match slot {
            Some(s) => prev.equip[s] = -1,
            None => prev.learning_item = -1,
        }
    }
    let Some(c) = data.character_mut(char_id) else {
        return false;
    };
    let replaced = match slot {
        Some(s) => std::mem::replace(&mut c.equip[s], item_id),
        None => std::mem::replace(&mut c.learning_item, item_id),
    };
    if replaced != item_id {
        if let Some(old) = data.item_mut(replaced) {
            old.user = -1;
        }
    }
    if let Some(item) = data.item_mut(item_id) {
        item.user = char_id;
    }
    true
}

/// Consume one `item_id` from the party bag on `c`.
pub fn use_item(
    c: &mut CharacterRecord,
    items: &[ItemRecord],
    bag: &mut Bag,
    item_id: i16,
    changes: &mut Changes,
) -> bool {
    let Some(item) = record(items, item_id) else {
        return false;
    };
    if !can_use_item(c, item) || !apply_item_changes(c, item, changes) {
        return false;
    }
    bag.remove(item_id, 1);
    true
}

/// Consume one `item_id` from `c`'s own carried slots.
pub fn use_npc_item(c: &mut CharacterRecord, items: &[ItemRecord], item_id: i16, changes: &mut Changes) -> bool {
    let Some(item) = record(items, item_id) else {
        return false;
    };
    if !can_use_item(c, item) {
        return false;
    }
    if !c.item.contains(&item_id) || !apply_item_changes(c, item, changes) {
        return false;
    }
    take_carried(c, item_id)
}

/// Remove one `item_id` from `c`'s carried slots, closing the gap when
/// a stack runs out.
pub fn take_carried(c: &mut CharacterRecord, item_id: i16) -> bool {
    let Some(slot) = c.item.iter().position(|&id| id == item_id) else {
        return false;
    };
    c.item_count[slot] -= 1;
    if c.item_count[slot] <= 0 {
        c.item.copy_within(slot + 1.., slot);
        c.item_count.copy_within(slot + 1.., slot);
        c.item[CARRY_SLOTS - 1] = -1;
        c.item_count[CARRY_SLOTS - 1] = 0;
    }
    true
}

/// How much a consumable restores of `prop`, if it restores it at all.
fn restores(item: &ItemRecord, prop: PropType) -> Option<i32> {
    let amount = match prop {
        PropType::Hp => item.add_hp,
        PropType::Mp => item.add_mp,
        PropType::Stamina => item.add_stamina,
        PropType::Poisoned => -item.add_poisoned,
        _ => return None,
    };
    (amount > 0).then_some(amount as i32)
}

/// Pick the consumable whose effect is closest to `value`.
///
/// Candidates keep their enumeration order among equal distances. When
/// the runner-up's distance is within 80% of the best, a coin flip
/// decides between them.
fn pick_closest(
    candidates: impl Iterator<Item = (i16, i16)>,
    items: &[ItemRecord],
    prop: PropType,
    value: i16,
    rng: &mut GameRng,
) -> Option<i16> {
    let mut options: Vec<(i32, i16)> = candidates
        .filter(|&(id, count)| id >= 0 && count > 0)
        .filter_map(|(id, _)| {
            let item = record(items, id)?;
            if item.kind() != ItemKind::Consumable {
                return None;
            }
            restores(item, prop).map(|amount| ((amount - value as i32).abs(), id))
        })
        .collect();
    options.sort_by_key(|&(diff, _)| diff);
    match options.as_slice() {
        [] => None,
        [(d1, first), (d2, second), ..] if *d2 == 0 || d1 * 100 / d2 >= 80 => {
            Some(if rng.rn2(2) != 0 { *first } else { *second })
        }
        [(_, first), ..] => Some(*first),
    }
}

/// Best bag consumable restoring about `value` of `prop`.
pub fn try_use_bag_item(
    items: &[ItemRecord],
    bag: &Bag,
    prop: PropType,
    value: i16,
    rng: &mut GameRng,
) -> Option<i16> {
    pick_closest(bag.items(), items, prop, value, rng)
}

/// Best carried consumable of `c` restoring about `value` of `prop`.
pub fn try_use_npc_item(
    c: &CharacterRecord,
    items: &[ItemRecord],
    prop: PropType,
    value: i16,
    rng: &mut GameRng,
) -> Option<i16> {
    let carried = c.item.iter().copied().zip(c.item_count.iter().copied());
    pick_closest(carried, items, prop, value, rng)
}

fn release_items(data: &mut GameData, char_id: i16) {
    let Some(c) = data.character_mut(char_id) else {
        return;
    };
    let mut held: Vec<i16> = c.equip.iter().copied().filter(|&id| id >= 0).collect();
    c.equip = [-1; crate::consts::EQUIP_SLOTS];
    if c.learning_item >= 0 {
        held.push(c.learning_item);
        c.learning_item = -1;
    }
    for id in held {
        if let Some(item) = data.item_mut(id) {
            item.user = -1;
        }
    }
}

/// Remove `char_id` from the party, releasing its equipment and manual.
///
/// The protagonist never leaves. Later members shift up one slot.
pub fn leave_team(data: &mut GameData, char_id: i16) -> bool {
    if char_id <= PROTAGONIST || data.character(char_id).is_none() {
        return false;
    }
    let Some(slot) = data.party.iter().position(|&id| id == char_id) else {
        return false;
    };
    release_items(data, char_id);
    data.party.copy_within(slot + 1.., slot);
    data.party[PARTY_SIZE - 1] = -1;
    log::debug!("character {char_id} left the party");
    true
}

/// Every member except the protagonist leaves, last slot first.
pub fn disband_party(data: &mut GameData) {
    for slot in (1..PARTY_SIZE).rev() {
        let id = data.party[slot];
        if id > 0 {
            leave_team(data, id);
        }
    }
}

/// Whether `char_id` has no free skill slot. Unknown characters count as full.
pub fn skill_full(data: &GameData, char_id: i16) -> bool {
    data.character(char_id)
        .is_none_or(|c| c.skill_id.iter().all(|&id| id > 0))
}

/// Script id of `char_id`'s farewell, if the character has one.
pub fn leave_event_id(factors: &Factors, char_id: i16) -> Option<i16> {
    factors
        .leave_team_chars
        .iter()
        .position(|&id| id == char_id)
        .map(|i| factors.leave_team_start_event + i as i16 * 2)
}

/// Fold equipment bonuses into a battle snapshot of `c`.
pub fn add_up_equipment(c: &mut CharacterRecord, items: &[ItemRecord]) {
    for id in c.equip {
        let Some(item) = record(items, id) else {
            continue;
        };
        c.attack += item.add_attack;
        c.speed += item.add_speed;
        c.defence += item.add_defence;
        c.medic += item.add_medic;
        c.poison += item.add_poison;
        c.depoison += item.add_depoison;
        c.antipoison += item.add_antipoison;
        c.fist += item.add_fist;
        c.sword += item.add_sword;
        c.blade += item.add_blade;
        c.special += item.add_special;
        c.throwing += item.add_throwing;
        c.knowledge += item.add_knowledge;
        c.poison_amp += item.add_poison_amp;
    }
}

/// Cumulative experience to leave `level`, 0 when there is no next level.
pub fn exp_for_level_up(factors: &Factors, level: i16) -> u16 {
    usize::try_from(level - 1)
        .ok()
        .and_then(|i| factors.exp_for_level_up.get(i))
        .copied()
        .unwrap_or(0)
}

/// Experience to advance the study of `item` from `level`; 0 once mastered.
///
/// Potential bands scale the cost by 1 (potential >= 90) up to 5.
pub fn exp_for_skill_learn(item: &ItemRecord, level: i16, potential: i16) -> u16 {
    if level >= 9 {
        return 0;
    }
    let band = (7 - potential as i32 / 15).clamp(1, 5);
    (item.req_exp as i32 * level.max(1) as i32 * band).clamp(0, u16::MAX as i32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{character, consumable};

    fn equipment(id: i16, equip_type: i16) -> ItemRecord {
        ItemRecord {
            id,
            item_type: 1,
            equip_type,
            add_attack: 10,
            ..Default::default()
        }
    }

    fn data_with(items: Vec<ItemRecord>) -> GameData {
        GameData {
            characters: (0..4).map(|id| character(id, 100)).collect(),
            items,
            party: [0, 1, 2, -1, -1, -1],
            ..Default::default()
        }
    }

    #[test]
    fn test_can_use_item_requirements() {
        let mut c = character(1, 100);
        c.attack = 30;
        let mut item = ItemRecord {
            item_type: 1,
            req_attack: 40,
            ..Default::default()
        };
        assert!(!can_use_item(&c, &item));
        item.req_attack = 30;
        assert!(can_use_item(&c, &item));
        // anti-requirement: attack must be below 20
        item.req_attack = -20;
        assert!(!can_use_item(&c, &item));
        c.attack = 19;
        assert!(can_use_item(&c, &item));
    }

    #[test]
    fn test_can_use_item_owner_and_mp_type() {
        let mut c = character(1, 100);
        c.mp_type = 0;
        let mut item = ItemRecord {
            item_type: 2,
            char_only: 5,
            ..Default::default()
        };
        assert!(!can_use_item(&c, &item));
        item.char_only = 1;
        item.req_mp_type = 1;
        assert!(!can_use_item(&c, &item));
        c.mp_type = 2;
        assert!(can_use_item(&c, &item));
    }

    #[test]
    fn test_apply_item_changes_clamps() {
        let mut c = character(1, 100);
        c.hp = 90;
        let item = ItemRecord {
            add_hp: 50,
            add_attack: 5,
            ..Default::default()
        };
        let mut changes = Changes::new();
        assert!(apply_item_changes(&mut c, &item, &mut changes));
        assert_eq!(c.hp, 100);
        assert_eq!(changes.get(&PropType::Hp), Some(&10));
        assert_eq!(changes.get(&PropType::Attack), Some(&5));
    }

    #[test]
    fn test_apply_item_changes_no_effect() {
        let mut c = character(1, 100);
        let item = ItemRecord {
            add_hp: 50,
            ..Default::default()
        };
        let mut changes = Changes::new();
        assert!(!apply_item_changes(&mut c, &item, &mut changes));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_mp_type_switches_before_mp() {
        let mut c = character(1, 100);
        c.mp_type = 0;
        c.mp = 10;
        let item = ItemRecord {
            change_mp_type: 1,
            add_mp: 5,
            ..Default::default()
        };
        let mut changes = Changes::new();
        apply_item_changes(&mut c, &item, &mut changes);
        assert_eq!(c.mp_type, 1);
        assert_eq!(changes.get(&PropType::MpType), Some(&1));
        assert_eq!(changes.get(&PropType::Mp), Some(&5));
    }

    #[test]
    fn test_equip_keeps_users_in_sync() {
        let mut data = data_with(vec![equipment(0, 0), equipment(1, 0)]);
        assert!(equip_item(&mut data, 1, 0));
        assert_eq!(data.characters[1].equip[0], 0);
        assert_eq!(data.items[0].user, 1);

        // moving the weapon to another character releases it from the first
        assert!(equip_item(&mut data, 2, 0));
        assert_eq!(data.characters[1].equip[0], -1);
        assert_eq!(data.characters[2].equip[0], 0);
        assert_eq!(data.items[0].user, 2);

        // replacing it releases the old weapon
        assert!(equip_item(&mut data, 2, 1));
        assert_eq!(data.items[0].user, -1);
        assert_eq!(data.items[1].user, 2);
    }

    #[test]
    fn test_equip_rejects_bad_items() {
        let mut data = data_with(vec![equipment(0, 3), consumable(1, 10)]);
        assert!(!equip_item(&mut data, 1, 0));
        assert!(!equip_item(&mut data, 1, 1));
        assert!(!equip_item(&mut data, 9, 0));
    }

    #[test]
    fn test_use_item_consumes_from_bag() {
        let items = vec![consumable(0, 30)];
        let mut bag: Bag = [(0, 2)].into_iter().collect();
        let mut c = character(1, 100);
        c.hp = 50;
        let mut changes = Changes::new();
        assert!(use_item(&mut c, &items, &mut bag, 0, &mut changes));
        assert_eq!(c.hp, 80);
        assert_eq!(bag.count(0), 1);
    }

    #[test]
    fn test_use_npc_item_shifts_slots() {
        let items = vec![consumable(0, 30), consumable(1, 60)];
        let mut c = character(1, 100);
        c.hp = 10;
        c.item = [0, 1, -1, -1];
        c.item_count = [1, 3, 0, 0];
        let mut changes = Changes::new();
        assert!(use_npc_item(&mut c, &items, 0, &mut changes));
        assert_eq!(c.item, [1, -1, -1, -1]);
        assert_eq!(c.item_count, [3, 0, 0, 0]);
        assert!(!use_npc_item(&mut c, &items, 0, &mut changes));
    }

    #[test]
    fn test_try_use_bag_item_prefers_closest() {
        let items = vec![consumable(0, 20), consumable(1, 100), consumable(2, 200)];
        let bag: Bag = [(0, 1), (1, 1), (2, 1)].into_iter().collect();
        let mut rng = GameRng::scripted([]);
        assert_eq!(try_use_bag_item(&items, &bag, PropType::Hp, 90, &mut rng), Some(1));
        assert_eq!(try_use_bag_item(&items, &bag, PropType::Mp, 90, &mut rng), None);
    }

    #[test]
    fn test_try_use_bag_item_tie_break() {
        // distances 10 and 11: ratio 90% triggers the coin flip
        let items = vec![consumable(0, 40), consumable(1, 61)];
        let bag: Bag = [(0, 1), (1, 1)].into_iter().collect();
        let mut rng = GameRng::scripted([1, 0]);
        assert_eq!(try_use_bag_item(&items, &bag, PropType::Hp, 50, &mut rng), Some(0));
        assert_eq!(try_use_bag_item(&items, &bag, PropType::Hp, 50, &mut rng), Some(1));
    }

    #[test]
    fn test_try_use_npc_item_uses_matching_field() {
        let mut items = vec![consumable(0, 0), consumable(1, 0)];
        items[0].add_mp = 40;
        items[1].add_mp = 80;
        let mut c = character(1, 100);
        c.item = [0, 1, -1, -1];
        c.item_count = [1, 1, 0, 0];
        let mut rng = GameRng::scripted([]);
        assert_eq!(try_use_npc_item(&c, &items, PropType::Mp, 80, &mut rng), Some(1));
    }

    #[test]
    fn test_leave_team() {
        let mut data = data_with(vec![equipment(0, 0)]);
        assert!(equip_item(&mut data, 1, 0));
        assert!(leave_team(&mut data, 1));
        assert_eq!(data.party, [0, 2, -1, -1, -1, -1]);
        assert_eq!(data.items[0].user, -1);
        assert_eq!(data.characters[1].equip[0], -1);
        assert!(!leave_team(&mut data, 0));
        assert!(!leave_team(&mut data, 3));
    }

    #[test]
    fn test_disband_keeps_protagonist() {
        let mut data = data_with(Vec::new());
        disband_party(&mut data);
        assert_eq!(data.party, [0, -1, -1, -1, -1, -1]);
    }

    #[test]
    fn test_skill_full() {
        let mut data = data_with(Vec::new());
        assert!(!skill_full(&data, 1));
        data.characters[1].skill_id = [1; 10];
        assert!(skill_full(&data, 1));
        assert!(skill_full(&data, 42));
    }

    #[test]
    fn test_leave_event_id() {
        let factors = Factors {
            leave_team_chars: vec![1, 4, 9],
            leave_team_start_event: 950,
            ..Default::default()
        };
        assert_eq!(leave_event_id(&factors, 9), Some(954));
        assert_eq!(leave_event_id(&factors, 2), None);
    }

    #[test]
    fn test_experience_tables() {
        let factors = Factors::default();
        assert_eq!(exp_for_level_up(&factors, 1), 50);
        assert_eq!(exp_for_level_up(&factors, 30), 0);
        assert_eq!(exp_for_level_up(&factors, 0), 0);

        let manual = ItemRecord {
            req_exp: 100,
            ..Default::default()
        };
        assert_eq!(exp_for_skill_learn(&manual, 0, 90), 100);
        assert_eq!(exp_for_skill_learn(&manual, 2, 0), 1000);
        assert_eq!(exp_for_skill_learn(&manual, 9, 50), 0);
    }

    #[test]
    fn test_add_up_equipment() {
        let items = vec![equipment(0, 0)];
        let mut c = character(1, 100);
        c.attack = 20;
        c.equip = [0, -1];
        add_up_equipment(&mut c, &items);
        assert_eq!(c.attack, 30);
    }
}
