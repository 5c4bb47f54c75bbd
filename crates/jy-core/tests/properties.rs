//! Property-based tests for the action model and battle pathing.

use proptest::prelude::*;

use jy_core::action::{Changes, PropType, apply_item_changes, calc_predict_damage};
use jy_core::battle::Grid;
use jy_core::battle::grid::manhattan;
use jy_core::data::{CharacterRecord, ItemRecord};

type Getter = fn(&CharacterRecord) -> i16;

const STATS: [(PropType, Getter); 9] = [
    (PropType::Hp, |c| c.hp),
    (PropType::MaxHp, |c| c.max_hp),
    (PropType::Poisoned, |c| c.poisoned),
    (PropType::Stamina, |c| c.stamina),
    (PropType::Mp, |c| c.mp),
    (PropType::MaxMp, |c| c.max_mp),
    (PropType::Attack, |c| c.attack),
    (PropType::Speed, |c| c.speed),
    (PropType::Defence, |c| c.defence),
];

fn character(max_hp: i16, hp_pct: i16, max_mp: i16, stats: [i16; 5]) -> CharacterRecord {
    CharacterRecord {
        max_hp,
        hp: (max_hp as i32 * hp_pct as i32 / 100) as i16,
        max_mp,
        mp: max_mp / 2,
        poisoned: stats[0],
        stamina: stats[1],
        attack: stats[2],
        speed: stats[3],
        defence: stats[4],
        ..Default::default()
    }
}

fn item(adds: [i16; 9]) -> ItemRecord {
    ItemRecord {
        add_hp: adds[0],
        add_max_hp: adds[1],
        add_poisoned: adds[2],
        add_stamina: adds[3],
        add_mp: adds[4],
        add_max_mp: adds[5],
        add_attack: adds[6],
        add_speed: adds[7],
        add_defence: adds[8],
        ..Default::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    /// Item effects keep every stat in range and report exactly the
    /// properties that moved.
    #[test]
    fn prop_item_changes_clamped(
        max_hp in 1i16..=999,
        hp_pct in 0i16..=100,
        max_mp in 0i16..=999,
        stats in prop::array::uniform5(0i16..=100),
        adds in prop::array::uniform9(-300i16..300),
    ) {
        let mut c = character(max_hp, hp_pct, max_mp, stats);
        let before = c.clone();
        let mut changes = Changes::new();
        let changed = apply_item_changes(&mut c, &item(adds), &mut changes);

        prop_assert_eq!(changed, !changes.is_empty());
        for (prop, get) in STATS {
            let (old, new) = (get(&before), get(&c));
            prop_assert!(new >= 0, "{} went negative", prop);
            if let Some(max) = prop.ceiling() {
                prop_assert!(new <= max, "{} above {}", prop, max);
            }
            let expected = (new != old).then_some(new - old);
            prop_assert_eq!(changes.get(&prop).copied(), expected, "{}", prop);
        }
        prop_assert!(c.hp <= before.max_hp);
        prop_assert!(c.mp <= before.max_mp);
    }

    /// Stronger defence never raises the estimate while the raw term
    /// stays non-negative.
    #[test]
    fn prop_predict_damage_falls_with_defence(
        atk in 0i32..3000,
        def in 0i32..500,
        more in 0i32..200,
        stamina in 0i16..=100,
        hurt in 0i16..=100,
        distance in 1i32..=10,
    ) {
        prop_assume!(atk - (def + more) * 3 >= 0);
        let weaker = calc_predict_damage(atk, def, stamina, hurt, distance);
        let stronger = calc_predict_damage(atk, def + more, stamina, hurt, distance);
        prop_assert!(stronger <= weaker);
    }

    #[test]
    fn prop_predict_damage_rises_with_attack(
        atk in 0i32..3000,
        more in 0i32..500,
        def in 0i32..500,
        stamina in 0i16..=100,
        hurt in 0i16..=100,
        distance in 1i32..=10,
    ) {
        prop_assume!(atk - def * 3 >= 0);
        let weaker = calc_predict_damage(atk, def, stamina, hurt, distance);
        let stronger = calc_predict_damage(atk + more, def, stamina, hurt, distance);
        prop_assert!(stronger >= weaker);
    }

    /// On an open field the walkable area is the Manhattan diamond cut to
    /// the field.
    #[test]
    fn prop_open_field_diamond(
        x in 0i32..20,
        y in 0i32..20,
        steps in 0i32..8,
    ) {
        let grid = Grid::open(20, 20);
        let area = grid.reachable((x, y), 0, steps, 0, false);
        let mut expected = Vec::new();
        for cy in 0..20 {
            for cx in 0..20 {
                let d = manhattan((x, y), (cx, cy));
                if d <= steps {
                    expected.push(((cx, cy), d));
                }
            }
        }
        expected.sort();
        let got: Vec<_> = area.iter().map(|(&cell, a)| (cell, a.moves)).collect();
        prop_assert_eq!(got, expected);
    }

    /// Reach cells never overlap walk cells or walls.
    #[test]
    fn prop_reach_disjoint_from_walk(
        walls in prop::collection::vec((0i32..16, 0i32..16), 0..40),
        steps in 0i32..6,
        ranges in 1i32..4,
    ) {
        let mut grid = Grid::open(16, 16);
        for &(x, y) in &walls {
            if (x, y) != (8, 8) {
                grid.set_blocked(x, y, true);
            }
        }
        let walk = grid.reachable((8, 8), 0, steps, 0, false);
        let area = grid.reachable((8, 8), 0, steps, ranges, false);
        for (cell, a) in &area {
            prop_assert!(!grid.is_blocked(cell.0, cell.1) || *cell == (8, 8));
            if a.moves >= 0 {
                prop_assert!(walk.contains_key(cell));
            } else {
                prop_assert!(!walk.contains_key(cell));
                prop_assert!((1..=ranges).contains(&a.ranges));
            }
        }
        prop_assert_eq!(area.values().filter(|a| a.moves >= 0).count(), walk.len());
    }
}
