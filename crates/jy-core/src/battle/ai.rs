//! Computer-controlled turns
//!
//! Enemies and auto-controlled party members first look after
//! themselves (stamina, hp, poison), retreating as far from the enemy as
//! they can before doing so. Otherwise every usable skill and throwing
//! item is scored at every cell the actor could strike from, and one of
//! the three best candidates is picked, weighted by score.

use log::{debug, trace, warn};

use crate::action::{self, Changes, PropType, Rules};
use crate::battle::engine::{Act, Battle, Popup, Stage};
use crate::battle::grid::{Area, launch_cell, manhattan};
use crate::consts::{SKILL_SLOTS, STAMINA_MAX};
use crate::data::{AttackArea, CharacterRecord, ItemKind};
use crate::ui::{Direction, UiRequest};
use crate::world::Session;

/// Action an automatic turn settled on, kept across a retreat move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AutoAction {
    /// Use the consumable closest to what is missing of the property,
    /// else rest.
    Restore(PropType),
    /// Use the item chosen earlier, else rest.
    UseOrRest(Option<i16>),
    Rest,
    Strike(Candidate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Aim {
    Cell((i32, i32)),
    Facing(Direction),
}

/// One scored way to hit the enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub score: i32,
    /// Cell the actor strikes from
    pub from: (i32, i32),
    pub aim: Aim,
    pub act: Act,
}

#[derive(Debug, Clone, Copy)]
struct Plan {
    act: Act,
    area: AttackArea,
    atk: i32,
    range: i32,
    radius: i32,
}

impl Battle {
    pub(super) fn auto_action(&mut self, session: &mut Session) {
        if let Some(pending) = self.pending_auto.take() {
            self.run_auto(session, pending);
            return;
        }
        let Some(index) = self.actor() else {
            return;
        };
        let info = &self.chars[index].info;
        let side = self.chars[index].side;
        let mut pending = None;
        if info.stamina < 10 {
            pending = Some(AutoAction::Restore(PropType::Stamina));
        } else if info.hp < 20 || info.hp <= info.max_hp / 5 {
            let hp = info.hp;
            let item = self.pick_item(session, index, PropType::Hp, info.max_hp - info.hp);
            if item.is_some() || hp <= 20 {
                pending = Some(AutoAction::UseOrRest(item));
            }
        } else if info.poisoned > 33 && side == 1 {
            if let Some(item) = self.pick_item(session, index, PropType::Poisoned, info.poisoned) {
                pending = Some(AutoAction::UseOrRest(Some(item)));
            }
        }

        let mut plans = Vec::new();
        let mut max_range = 0;
        if pending.is_none() {
            (plans, max_range) = self.plans(session, index);
            if plans.is_empty() {
                pending = Some(AutoAction::Restore(PropType::Mp));
            }
        }

        let c = &self.chars[index];
        let pos = c.pos();
        let enemies: Vec<usize> = (0..self.chars.len())
            .filter(|&i| self.chars[i].side != side && self.chars[i].is_alive())
            .collect();

        if let Some(pending) = pending {
            let area = self.grid.reachable(pos, side, c.steps, 0, self.zone_of_control);
            let mut best = None;
            let mut distance = 0;
            for (&cell, _) in area.iter().filter(|(_, ac)| ac.is_walkable()) {
                for &enemy in &enemies {
                    let d = manhattan(cell, self.chars[enemy].pos());
                    if d > distance {
                        distance = d;
                        best = Some(cell);
                    }
                }
            }
            trace!("character {} retreats to {best:?} before {pending:?}", c.id);
            match best {
                Some(cell) if cell != pos => {
                    self.pending_auto = Some(pending);
                    self.move_along(&area, cell);
                }
                _ => self.run_auto(session, pending),
            }
            return;
        }

        let area = self.grid.reachable(pos, side, c.steps, max_range, self.zone_of_control);
        let mut candidates = Vec::new();
        for plan in &plans {
            self.score_plan(session, index, plan, &area, &enemies, &mut candidates);
        }

        if candidates.is_empty() {
            let mut best = None;
            let mut distance = 255;
            for (&cell, _) in area.iter().filter(|(_, ac)| ac.is_walkable()) {
                for &enemy in &enemies {
                    let d = manhattan(cell, self.chars[enemy].pos());
                    if d < distance {
                        distance = d;
                        best = Some(cell);
                    }
                }
            }
            debug!("character {} has nothing to hit, closing in to {best:?}", self.chars[index].id);
            match best {
                Some(cell) if cell != pos => {
                    self.pending_auto = Some(AutoAction::Rest);
                    self.move_along(&area, cell);
                }
                _ => self.rest(session),
            }
            return;
        }

        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        candidates.truncate(3);
        let total: i32 = candidates.iter().map(|c| c.score).sum();
        let mut roll = session.rng.rn2(total);
        let mut selected = 0;
        if candidates.len() > 1 {
            while selected < 2 && roll >= candidates[selected].score {
                roll -= candidates[selected].score;
                selected += 1;
            }
        }
        let chosen = candidates[selected.min(candidates.len() - 1)];
        trace!("character {} picks {chosen:?}", self.chars[index].id);
        if chosen.from != pos {
            self.pending_auto = Some(AutoAction::Strike(chosen));
            self.move_along(&area, chosen.from);
        } else {
            self.run_auto(session, AutoAction::Strike(chosen));
        }
    }

    /// Usable damage skills and throwing items of `index`, with the
    /// largest reach among the targeted ones.
    fn plans(&self, session: &Session, index: usize) -> (Vec<Plan>, i32) {
        let rules = Rules::new(&session.data, &session.factors);
        let c = &self.chars[index];
        let knowledge = self.knowledge[(c.side as usize).min(1)];
        let mut plans = Vec::new();
        let mut max_range = 0;
        for slot in 0..SKILL_SLOTS {
            let Some(skill) = rules.skill_in_slot(&c.info, slot) else {
                continue;
            };
            if skill.drains_mp() {
                continue;
            }
            let level = action::real_skill_level(skill.req_mp, c.info.skill_tier(slot), c.info.mp);
            if level < 0 {
                continue;
            }
            let area = skill.attack_area();
            let range = skill.range_at(level) as i32;
            if matches!(area, AttackArea::Point | AttackArea::Radius) {
                max_range = max_range.max(range);
            }
            plans.push(Plan {
                act: Act::Skill { slot },
                area,
                atk: action::calc_real_attack(&c.info, &rules, knowledge, skill, level),
                range,
                radius: skill.area_at(level) as i32,
            });
        }

        let range = c.info.throwing as i32 / 15;
        if range > 0 {
            let held: Vec<i16> = if c.side == 0 {
                session.data.bag.items().map(|(id, _)| id).collect()
            } else {
                c.info
                    .item
                    .iter()
                    .zip(c.info.item_count)
                    .filter(|&(_, n)| n > 0)
                    .map(|(&id, _)| id)
                    .collect()
            };
            for item in held {
                if rules.item(item).is_some_and(|i| i.kind() == ItemKind::Throwing) {
                    max_range = max_range.max(range);
                    plans.push(Plan {
                        act: Act::Throw { item },
                        area: AttackArea::Point,
                        atk: 0,
                        range,
                        radius: 0,
                    });
                }
            }
        }
        (plans, max_range)
    }

    fn predict(&self, session: &Session, attacker: &CharacterRecord, plan: &Plan, enemy: usize, distance: i32) -> i32 {
        let target = &self.chars[enemy].info;
        match plan.act {
            Act::Throw { item } => session
                .data
                .item(item)
                .map_or(0, |i| action::predict_throw_damage(attacker, target, i)),
            _ => action::calc_predict_damage(plan.atk, target.defence as i32, attacker.stamina, target.hurt, distance),
        }
    }

    fn score_plan(
        &self,
        session: &Session,
        index: usize,
        plan: &Plan,
        area: &Area,
        enemies: &[usize],
        out: &mut Vec<Candidate>,
    ) {
        let attacker = &self.chars[index].info;
        let finishing = |dmg: i32, enemy: usize| {
            let target = &self.chars[enemy].info;
            if dmg >= target.hp as i32 { (dmg * 3 / 2).max(target.max_hp as i32) } else { dmg }
        };
        for (&cell, ac) in area {
            let (x, y) = cell;
            match plan.area {
                AttackArea::Line => {
                    if !ac.is_walkable() {
                        continue;
                    }
                    let mut totals = [0i32; 4];
                    for &enemy in enemies {
                        let (ex, ey) = self.chars[enemy].pos();
                        let distance = if ex == x && (ey - y).abs() <= plan.range {
                            (ey - y).abs()
                        } else if ey == y && (ex - x).abs() <= plan.range {
                            (ex - x).abs()
                        } else {
                            continue;
                        };
                        let dmg = finishing(self.predict(session, attacker, plan, enemy, distance), enemy);
                        let bucket = if ey < y {
                            0
                        } else if ex > x {
                            1
                        } else if ex < x {
                            2
                        } else {
                            3
                        };
                        totals[bucket] += dmg;
                    }
                    for (direction, &score) in Direction::ALL.iter().zip(&totals) {
                        if score > 0 {
                            out.push(Candidate {
                                score,
                                from: cell,
                                aim: Aim::Facing(*direction),
                                act: plan.act,
                            });
                        }
                    }
                }
                AttackArea::Cross => {
                    if !ac.is_walkable() {
                        continue;
                    }
                    let mut score = 0;
                    for &enemy in enemies {
                        let (ex, ey) = self.chars[enemy].pos();
                        let distance = if ex == x && (ey - y).abs() <= plan.range {
                            (ey - y).abs()
                        } else if ey == y && (ex - x).abs() <= plan.range {
                            (ex - x).abs()
                        } else {
                            continue;
                        };
                        score += finishing(self.predict(session, attacker, plan, enemy, distance), enemy);
                    }
                    if score > 0 {
                        out.push(Candidate {
                            score,
                            from: cell,
                            aim: Aim::Cell(cell),
                            act: plan.act,
                        });
                    }
                }
                AttackArea::Radius => {
                    if ac.ranges > plan.range {
                        continue;
                    }
                    let Some(from) = launch_cell(area, cell) else {
                        continue;
                    };
                    let mut score = 0;
                    for &enemy in enemies {
                        let epos = self.chars[enemy].pos();
                        if (epos.0 - x).abs() > plan.radius || (epos.1 - y).abs() > plan.radius {
                            continue;
                        }
                        let distance = manhattan(cell, from) + manhattan(cell, epos);
                        score += finishing(self.predict(session, attacker, plan, enemy, distance), enemy);
                    }
                    if score > 0 {
                        out.push(Candidate {
                            score,
                            from,
                            aim: Aim::Cell(cell),
                            act: plan.act,
                        });
                    }
                }
                AttackArea::Point => {
                    if ac.ranges > plan.range {
                        continue;
                    }
                    let Some(occupant) = self.grid.occupant(x, y) else {
                        continue;
                    };
                    if occupant.side == self.chars[index].side || !enemies.contains(&occupant.index) {
                        continue;
                    }
                    let Some(from) = launch_cell(area, cell) else {
                        continue;
                    };
                    let target = &self.chars[occupant.index].info;
                    let mut dmg = self.predict(session, attacker, plan, occupant.index, manhattan(cell, from));
                    if dmg >= target.hp as i32 {
                        dmg = dmg * 3 / 2;
                    }
                    if dmg > 0 {
                        out.push(Candidate {
                            score: dmg,
                            from,
                            aim: Aim::Cell(cell),
                            act: plan.act,
                        });
                    }
                }
            }
        }
    }

    fn pick_item(&self, session: &mut Session, index: usize, prop: PropType, value: i16) -> Option<i16> {
        let c = &self.chars[index];
        if c.side == 1 {
            action::try_use_npc_item(&c.info, &session.data.items, prop, value, &mut session.rng)
        } else {
            action::try_use_bag_item(&session.data.items, &session.data.bag, prop, value, &mut session.rng)
        }
    }

    fn run_auto(&mut self, session: &mut Session, action: AutoAction) {
        let Some(index) = self.actor() else {
            return;
        };
        match action {
            AutoAction::Restore(prop) => {
                let c = &self.chars[index].info;
                let missing = match prop {
                    PropType::Stamina => STAMINA_MAX - c.stamina,
                    PropType::Mp => c.max_mp - c.mp,
                    PropType::Hp => c.max_hp - c.hp,
                    PropType::Poisoned => c.poisoned,
                    _ => 0,
                };
                let item = self.pick_item(session, index, prop, missing);
                self.use_or_rest(session, index, item);
            }
            AutoAction::UseOrRest(item) => self.use_or_rest(session, index, item),
            AutoAction::Rest => self.rest(session),
            AutoAction::Strike(candidate) => self.strike(session, index, candidate),
        }
    }

    fn use_or_rest(&mut self, session: &mut Session, index: usize, item: Option<i16>) {
        let Some(item) = item else {
            self.rest(session);
            return;
        };
        let mut changes = Changes::new();
        let c = &mut self.chars[index];
        let used = if c.side == 1 {
            action::use_npc_item(&mut c.info, &session.data.items, item, &mut changes)
        } else {
            action::use_item(&mut c.info, &session.data.items, &mut session.data.bag, item, &mut changes)
        };
        if !used {
            debug!("character {} could not use item {item}", c.id);
            self.rest(session);
            return;
        }
        self.requests.push(UiRequest::ItemUsed {
            char_id: c.id,
            item,
            changes,
        });
        self.stage = Stage::PoppingUp;
        self.popup = Some(Popup::ItemUsed);
    }

    fn strike(&mut self, session: &mut Session, index: usize, candidate: Candidate) {
        let c = &self.chars[index].info;
        match candidate.act {
            Act::Skill { slot } => {
                let level = Rules::new(&session.data, &session.factors)
                    .skill_in_slot(c, slot)
                    .map(|s| action::real_skill_level(s.req_mp, c.skill_tier(slot), c.mp));
                match level {
                    Some(level) if level >= 0 => self.act_level = level,
                    _ => {
                        warn!("character {} can no longer use slot {slot}", self.chars[index].id);
                        self.queue.pop();
                        self.turn_owner = None;
                        self.stage = Stage::Idle;
                        return;
                    }
                }
                self.attack_times_left = if c.double_attack != 0 { 2 } else { 1 };
            }
            _ => {
                self.act_level = 0;
                self.attack_times_left = 1;
            }
        }
        self.act = Some(candidate.act);
        match candidate.aim {
            Aim::Facing(direction) => {
                self.chars[index].direction = direction;
                self.cursor = candidate.from;
            }
            Aim::Cell(cell) => self.cursor = cell,
        }
        self.start_act(session);
    }
}
