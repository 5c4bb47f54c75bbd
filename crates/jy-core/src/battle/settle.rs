//! Battle-end settlement
//!
//! Party combatants write their pools and trained skills back to the
//! permanent records, then the battle experience is shared out. A member
//! studying a manual splits its experience between levels and the
//! manual; manuals with recipes also craft items from stored experience.

use log::debug;

use crate::action::{self, Changes, clamp_add};
use crate::battle::engine::Battle;
use crate::consts::{EXP_MAX, LEVEL_MAX, MP_MAX, SKILL_SLOTS};
use crate::data::{record, record_mut};
use crate::ui::{FinishMessage, Notice};
use crate::world::Session;

impl Battle {
    pub(super) fn settle(&mut self, session: &mut Session) -> Vec<FinishMessage> {
        let mut alive = Vec::new();
        let mut fought = Vec::new();
        for (index, c) in self.chars.iter().enumerate() {
            if c.side != 0 {
                continue;
            }
            let Some(saved) = session.data.character_mut(c.id) else {
                continue;
            };
            saved.hp = c.info.hp.max(1);
            saved.mp = c.info.mp;
            saved.poisoned = c.info.poisoned;
            saved.hurt = c.info.hurt;
            saved.stamina = c.info.stamina;
            for slot in 0..SKILL_SLOTS {
                if c.info.skill_id[slot] > 0 {
                    saved.skill_level[slot] = c.info.skill_level[slot];
                }
            }
            fought.push(index);
            if c.is_alive() {
                alive.push(index);
            }
        }

        let mut messages = vec![FinishMessage::new(0, if self.won { Notice::Won } else { Notice::Lost })];
        let recipients = if self.won {
            alive
        } else if self.exp_on_lose {
            fought
        } else {
            Vec::new()
        };
        if recipients.is_empty() {
            return messages;
        }
        let share = self.info.exp as i32 / recipients.len() as i32;
        for index in recipients {
            let c = &mut self.chars[index];
            c.exp += share;
            award(session, c.id, c.exp, &mut messages);
        }
        messages
    }
}

/// Credit `earned` battle experience to `char_id`.
fn award(session: &mut Session, char_id: i16, earned: i32, messages: &mut Vec<FinishMessage>) {
    messages.push(FinishMessage::new(0, Notice::ExpGained { char_id, exp: earned }));
    let Session { data, factors, rng, .. } = session;
    let Some(c) = record_mut(&mut data.characters, char_id) else {
        return;
    };
    let manual = record(&data.items, c.learning_item).cloned();

    let mut can_learn = false;
    let mut making = false;
    let mut skill_slot = None;
    let mut tier = 0;
    if let Some(item) = &manual {
        can_learn = true;
        making = item.make_item[0] >= 0;
        if item.skill_id > 0 {
            for slot in 0..SKILL_SLOTS {
                if c.skill_id[slot] == item.skill_id {
                    skill_slot = Some(slot);
                    tier = c.skill_tier(slot);
                    can_learn = tier < 9;
                    break;
                }
                if skill_slot.is_none() && c.skill_id[slot] <= 0 {
                    skill_slot = Some(slot);
                }
            }
        }
    }

    let (exp, exp_for_item) = if c.level >= LEVEL_MAX {
        (0, earned)
    } else if can_learn {
        (earned / 2, earned / 2)
    } else {
        (earned, 0)
    };

    if exp != 0 {
        c.exp = (c.exp as i32 + exp).clamp(0, EXP_MAX as i32) as u16;
        let mut leveled = false;
        loop {
            let req = action::exp_for_level_up(factors, c.level);
            if req == 0 || c.exp < req {
                break;
            }
            action::act_levelup(c, rng);
            leveled = true;
        }
        if leveled {
            debug!("character {char_id} reaches level {}", c.level);
            messages.push(FinishMessage::new(0, Notice::LevelUp { char_id }));
        }
    }

    let Some(item) = manual else {
        return;
    };
    if exp_for_item != 0 && can_learn {
        c.exp_for_item = (c.exp_for_item as i32 + exp_for_item).clamp(0, EXP_MAX as i32) as u16;
        let mut level = tier;
        let mut learned = false;
        loop {
            let req = action::exp_for_skill_learn(&item, level, c.potential);
            if req == 0 || c.exp_for_item < req {
                break;
            }
            learned = true;
            c.exp_for_item -= req;
            action::apply_item_changes(c, &item, &mut Changes::new());
            if let Some(skill) = record(&data.skills, item.skill_id) {
                let add_mp = skill.add_mp_at(level);
                if add_mp != 0 {
                    c.max_mp = clamp_add(c.max_mp, rng.range(1, add_mp as i32 / 2), MP_MAX);
                }
            }
            if let Some(slot) = skill_slot {
                if c.skill_id[slot] <= 0 {
                    c.skill_id[slot] = item.skill_id;
                    c.skill_level[slot] = 0;
                } else {
                    level = c.skill_level[slot] / 100 + 1;
                    c.skill_level[slot] = level * 100;
                }
            }
        }
        if learned {
            debug!("character {char_id} studies item {}", item.id);
            messages.push(FinishMessage::new(
                0,
                Notice::LearnedItem {
                    char_id,
                    item: c.learning_item,
                },
            ));
            if level > 0 {
                messages.push(FinishMessage::new(
                    1,
                    Notice::SkillLevel {
                        skill: item.skill_id,
                        level: level + 1,
                    },
                ));
            }
        }
    }

    if making {
        c.exp_for_make_item = (c.exp_for_make_item as i32 + earned).clamp(0, EXP_MAX as i32) as u16;
        if c.exp_for_make_item >= item.req_exp_for_make_item.max(0) as u16 && data.bag.count(item.req_material) > 0 {
            c.exp_for_make_item = 0;
            data.bag.remove(item.req_material, 1);
            let pick = rng.rn2(item.product_count() as i32) as usize;
            let product = item.make_item[pick];
            data.bag.add(product, item.make_item_count[pick]);
            debug!("character {char_id} crafts item {product}");
            messages.push(FinishMessage::new(0, Notice::ItemMade { char_id, item: product }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameRng;
    use crate::battle::Stage;
    use crate::data::ItemRecord;
    use crate::testing::{battle_info, battle_session, character};

    fn finished(hero: crate::data::CharacterRecord, items: Vec<ItemRecord>, exp: i16) -> (Session, Battle) {
        let info = battle_info(&[(0, 1, 1)], &[(1, 5, 5)], exp);
        let session = battle_session(vec![hero, character(1, 30)], vec![], items, &[0], info, GameRng::scripted([0; 64]));
        let mut battle = Battle::load(&session, 0, false, false).unwrap();
        battle.put_chars(&session, &[]);
        battle.chars[1].info.hp = 0;
        battle.won = true;
        (session, battle)
    }

    #[test]
    fn test_write_back_floors_hp() {
        let mut hero = character(0, 100);
        hero.skill_id[0] = 4;
        let (mut session, mut battle) = finished(hero, vec![], 0);
        battle.chars[0].info.hp = 0;
        battle.chars[0].info.poisoned = 12;
        battle.chars[0].info.skill_level[0] = 140;
        battle.chars[0].info.skill_level[1] = 300;
        battle.won = false;
        let messages = battle.settle(&mut session);
        assert_eq!(messages, vec![FinishMessage::new(0, Notice::Lost)]);
        let hero = session.data.character(0).unwrap();
        assert_eq!((hero.hp, hero.poisoned), (1, 12));
        assert_eq!(hero.skill_level[0], 140);
        assert_eq!(hero.skill_level[1], 0);
    }

    #[test]
    fn test_exp_and_level_up_keep_remainder() {
        let (mut session, mut battle) = finished(character(0, 100), vec![], 100);
        let messages = battle.settle(&mut session);
        let hero = session.data.character(0).unwrap();
        assert_eq!(hero.level, 2);
        // cumulative table: 100 passes 50 but not 150
        assert_eq!(hero.exp, 100);
        assert_eq!(
            messages,
            vec![
                FinishMessage::new(0, Notice::Won),
                FinishMessage::new(0, Notice::ExpGained { char_id: 0, exp: 100 }),
                FinishMessage::new(0, Notice::LevelUp { char_id: 0 }),
            ]
        );
    }

    #[test]
    fn test_exp_on_lose_shares_among_all() {
        let (mut session, mut battle) = finished(character(0, 100), vec![], 40);
        battle.won = false;
        battle.exp_on_lose = true;
        battle.chars[0].info.hp = 0;
        battle.chars[0].exp = 6;
        battle.settle(&mut session);
        assert_eq!(session.data.character(0).unwrap().exp, 46);
    }

    #[test]
    fn test_manual_study_splits_exp() {
        let mut hero = character(0, 100);
        hero.learning_item = 0;
        hero.potential = 100;
        let manual = ItemRecord {
            id: 0,
            item_type: 2,
            skill_id: 9,
            req_exp: 10,
            add_attack: 2,
            ..Default::default()
        };
        let (mut session, mut battle) = finished(hero, vec![manual], 40);
        let messages = battle.settle(&mut session);
        let hero = session.data.character(0).unwrap();
        assert_eq!(hero.exp, 20);
        assert_eq!(hero.skill_id[0], 9);
        assert_eq!(hero.skill_level[0], 100);
        assert_eq!(hero.attack, 4);
        assert!(messages.contains(&FinishMessage::new(0, Notice::LearnedItem { char_id: 0, item: 0 })));
        assert!(messages.contains(&FinishMessage::new(1, Notice::SkillLevel { skill: 9, level: 2 })));
        assert_eq!(battle.stage(), Stage::Idle);
    }

    #[test]
    fn test_crafting_consumes_material() {
        let mut hero = character(0, 100);
        hero.learning_item = 0;
        let manual = ItemRecord {
            id: 0,
            item_type: 2,
            req_exp: 10_000,
            req_exp_for_make_item: 30,
            req_material: 1,
            make_item: [2, 3, -1, -1, -1],
            make_item_count: [4, 1, 0, 0, 0],
            ..Default::default()
        };
        let (mut session, mut battle) = finished(hero, vec![manual], 40);
        session.data.bag.add(1, 1);
        let messages = battle.settle(&mut session);
        assert_eq!(session.data.bag.count(1), 0);
        assert_eq!(session.data.bag.count(2), 4);
        assert_eq!(session.data.character(0).unwrap().exp_for_make_item, 0);
        assert!(messages.contains(&FinishMessage::new(0, Notice::ItemMade { char_id: 0, item: 2 })));
    }
}
