//! Battle turn engine
//!
//! A battle is a state machine over [`Stage`]. The host calls
//! [`Battle::frame`] once per tick and feeds input back through
//! [`Battle::handle_key`], the `choose_*` answers and
//! [`Battle::close_popup`]. Everything the window should show is queued
//! as [`UiRequest`]s and collected with [`Battle::take_requests`].
//!
//! Combatants act from a turn queue rebuilt every round. The back of the
//! queue is the current actor; the queue is sorted ascending by speed, so
//! the fastest combatant acts first.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::action::{self, Changes, Rules, Strike};
use crate::battle::ai::AutoAction;
use crate::battle::grid::{Area, Grid, Occupant, manhattan, path_to};
use crate::consts::{BATTLE_ENEMIES, PARTY_SIZE, SKILL_SLOTS, STAMINA_MAX};
use crate::data::{AttackArea, BattleInfo, CharacterRecord, ItemKind};
use crate::ui::{Direction, Key, MenuOption, Notice, Tone, UiRequest};
use crate::world::{CoreError, CoreResult, Session};

/// One fighter on the field.
///
/// `info` is a snapshot of the character record with equipment folded
/// in; the permanent record only changes at settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    /// 0 for the party, 1 for enemies
    pub side: u8,
    pub id: i16,
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    /// Moves left this round
    pub steps: i32,
    pub info: CharacterRecord,
    /// Experience earned in this battle
    pub exp: i32,
}

impl Combatant {
    pub fn pos(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn is_alive(&self) -> bool {
        self.info.is_alive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum Stage {
    /// Between actions; the next frame picks the actor.
    Idle,
    /// Waiting for [`Battle::choose_menu`].
    PlayerMenu,
    /// Waiting for a facing for a line skill.
    DirectionSelecting,
    MoveSelecting,
    AttackSelecting,
    /// Walking one cell per frame.
    Moving,
    /// Playing the action animation.
    Acting,
    /// Waiting for [`Battle::close_popup`].
    PoppingUp,
    /// Settled; waiting for the results to be closed.
    Finished,
}

/// Action being prepared or played by the current actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Act {
    Skill { slot: usize },
    Poison,
    Depoison,
    Medic,
    Throw { item: i16 },
}

/// Answer to an [`UiRequest::ItemView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemChoice {
    Use(i16),
    Throw(i16),
    Cancel,
}

/// How a battle ended. `dead` means the loss ends the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub won: bool,
    pub dead: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(super) enum Popup {
    ItemUsed,
    SkillLevelUp,
    Results,
}

#[derive(Debug, Clone)]
pub struct Battle {
    pub(super) info: BattleInfo,
    pub(super) grid: Grid,
    pub(super) chars: Vec<Combatant>,
    /// Turn queue; the back is the current actor.
    pub(super) queue: Vec<usize>,
    /// Actor whose turn-start poison tick already ran
    pub(super) turn_owner: Option<usize>,
    /// Knowledge totals per side
    pub(super) knowledge: [i16; 2],
    pub(super) stage: Stage,
    pub(super) popup: Option<Popup>,
    pub(super) menu: Vec<MenuOption>,
    pub(super) menu_index: usize,
    pub(super) area: Area,
    pub(super) cursor: (i32, i32),
    /// Walking path, target first
    pub(super) moving_path: Vec<(i32, i32)>,
    pub(super) act: Option<Act>,
    pub(super) act_level: i16,
    pub(super) attack_times_left: u8,
    pub(super) skill_level_up: bool,
    pub(super) effect_id: i16,
    pub(super) effect_len: i32,
    pub(super) effect_index: i32,
    pub(super) fight_frame: i32,
    pub(super) pending_auto: Option<AutoAction>,
    pub(super) auto_control: bool,
    pub(super) zone_of_control: bool,
    pub(super) exp_on_lose: bool,
    pub(super) dead_on_lose: bool,
    pub(super) won: bool,
    pub(super) outcome: Option<Outcome>,
    pub(super) requests: Vec<UiRequest>,
}

impl Battle {
    /// Set up battle `battle_id` on its map. Nobody is deployed until
    /// [`Battle::put_chars`].
    pub fn load(session: &Session, battle_id: i16, exp_on_lose: bool, dead_on_lose: bool) -> CoreResult<Self> {
        let info = session
            .content
            .battle(battle_id)
            .cloned()
            .ok_or(CoreError::MissingBattle(battle_id))?;
        let map = session
            .content
            .battle_map(info.map_id)
            .ok_or(CoreError::MissingBattleMap(info.map_id))?;
        debug!("loading battle {battle_id} on map {}", info.map_id);
        Ok(Self {
            grid: Grid::from_map(map),
            info,
            chars: Vec::new(),
            queue: Vec::new(),
            turn_owner: None,
            knowledge: [0; 2],
            stage: Stage::Idle,
            popup: None,
            menu: Vec::new(),
            menu_index: 0,
            area: Area::new(),
            cursor: (0, 0),
            moving_path: Vec::new(),
            act: None,
            act_level: 0,
            attack_times_left: 0,
            skill_level_up: false,
            effect_id: -1,
            effect_len: 0,
            effect_index: -1,
            fight_frame: 0,
            pending_auto: None,
            auto_control: false,
            zone_of_control: false,
            exp_on_lose,
            dead_on_lose,
            won: false,
            outcome: None,
            requests: Vec::new(),
        })
    }

    /// Members that must fight, or `None` when the player picks.
    pub fn forced_members(&self) -> Option<Vec<i16>> {
        self.info
            .has_forced_members()
            .then(|| self.info.force_members.iter().copied().filter(|&id| id >= 0).collect())
    }

    /// Members preselected in the picker.
    pub fn default_members(&self) -> Vec<i16> {
        self.info.default_members.iter().copied().filter(|&id| id >= 0).collect()
    }

    /// Deploy the party and the enemies.
    ///
    /// With forced members `members` is ignored. Otherwise each chosen
    /// member takes its default slot when it has one, else the next slot
    /// without a default member.
    pub fn put_chars(&mut self, session: &Session, members: &[i16]) {
        let info = &self.info;
        let mut roster: Vec<(u8, i16, i32, i32)> = Vec::new();
        if info.has_forced_members() {
            for slot in 0..PARTY_SIZE {
                let id = info.force_members[slot];
                if id >= 0 {
                    roster.push((0, id, info.member_x[slot] as i32, info.member_y[slot] as i32));
                }
            }
        } else {
            let mut free = (0..PARTY_SIZE).filter(|&slot| info.default_members[slot] < 0);
            for &id in members {
                let slot = match info.default_members.iter().position(|&d| d >= 0 && d == id) {
                    Some(slot) => slot,
                    None => match free.next() {
                        Some(slot) => slot,
                        None => {
                            warn!("no start position left for character {id}");
                            continue;
                        }
                    },
                };
                roster.push((0, id, info.member_x[slot] as i32, info.member_y[slot] as i32));
            }
        }
        for slot in 0..BATTLE_ENEMIES {
            let id = info.enemy[slot];
            if id >= 0 {
                roster.push((1, id, info.enemy_x[slot] as i32, info.enemy_y[slot] as i32));
            }
        }

        for (side, id, x, y) in roster {
            let Some(record) = session.data.character(id) else {
                warn!("battle {}: character {id} does not exist", self.info.id);
                continue;
            };
            if !self.grid.in_bounds(x, y) || self.grid.occupant(x, y).is_some() {
                debug!("dropping character {id}: cell ({x}, {y}) is taken");
                continue;
            }
            let mut snapshot = record.clone();
            action::add_up_equipment(&mut snapshot, &session.data.items);
            if side == 1 {
                snapshot.hp = snapshot.max_hp;
                snapshot.mp = snapshot.max_mp;
                snapshot.stamina = STAMINA_MAX;
            }
            let index = self.chars.len();
            self.grid.set_occupant(x, y, Some(Occupant { index, side }));
            self.chars.push(Combatant {
                side,
                id,
                x,
                y,
                direction: if side == 0 { Direction::Left } else { Direction::Right },
                steps: 0,
                info: snapshot,
                exp: 0,
            });
        }
        self.recalc_knowledge(session.factors.knowledge_barrier);
        if self.info.music >= 0 {
            self.requests.push(UiRequest::PlayMusic(self.info.music));
        }
    }

    /// Sum per side of the knowledge of living combatants at or above
    /// `barrier`.
    pub(super) fn recalc_knowledge(&mut self, barrier: i16) {
        let mut totals = [0i16; 2];
        for c in self.chars.iter().filter(|c| c.is_alive() && c.info.knowledge >= barrier) {
            let side = (c.side as usize).min(1);
            totals[side] = totals[side].saturating_add(c.info.knowledge);
        }
        self.knowledge = totals;
    }

    /// Advance one tick.
    pub fn frame(&mut self, session: &mut Session) {
        match self.stage {
            Stage::Idle => self.next_action(session),
            Stage::Moving => self.step_moving(),
            Stage::Acting => self.step_acting(session),
            _ => {}
        }
    }

    fn next_action(&mut self, session: &mut Session) {
        let Some(index) = self.current_or_rebuild() else {
            warn!("battle {}: nobody left to act", self.info.id);
            return;
        };
        if self.turn_owner != Some(index) {
            self.turn_owner = Some(index);
            let hurt = action::act_poison_damage(&mut self.chars[index].info);
            if hurt != 0 {
                trace!("character {} loses {} hp to poison", self.chars[index].id, -hurt);
            }
        }
        let c = &self.chars[index];
        self.requests.push(UiRequest::ShowStatus {
            char_id: c.id,
            side: c.side,
        });
        if c.side == 1 || self.auto_control {
            self.auto_action(session);
        } else {
            self.menu_index = 0;
            self.player_menu();
        }
    }

    /// Current actor, rebuilding the round when the queue ran out.
    fn current_or_rebuild(&mut self) -> Option<usize> {
        loop {
            if self.queue.is_empty() {
                self.build_queue();
            }
            let index = *self.queue.last()?;
            if self.chars[index].is_alive() {
                return Some(index);
            }
            self.queue.pop();
        }
    }

    pub(super) fn build_queue(&mut self) {
        let mut queue = Vec::with_capacity(self.chars.len());
        for (index, c) in self.chars.iter_mut().enumerate() {
            if c.is_alive() {
                c.steps = c.info.speed as i32 / 15;
                queue.push(index);
            }
        }
        queue.sort_by_key(|&index| self.chars[index].info.speed);
        trace!("new round: {queue:?}");
        self.queue = queue;
    }

    pub(super) fn actor(&self) -> Option<usize> {
        self.queue.last().copied()
    }

    pub(super) fn player_menu(&mut self) {
        let Some(index) = self.actor() else {
            return;
        };
        self.stage = Stage::PlayerMenu;
        let c = &self.chars[index];
        let info = &c.info;
        let mut options = Vec::with_capacity(10);
        if c.steps > 0 && info.stamina >= 5 {
            options.push(MenuOption::Move);
        }
        if info.stamina >= 10 {
            options.push(MenuOption::Attack);
            if info.poison > 0 {
                options.push(MenuOption::Poison);
            }
        }
        if info.stamina >= 50 {
            if info.depoison > 0 {
                options.push(MenuOption::Depoison);
            }
            if info.medic > 0 {
                options.push(MenuOption::Medic);
            }
        }
        options.push(MenuOption::Item);
        if self.queue.len() > 1 {
            options.push(MenuOption::Wait);
        }
        options.extend([MenuOption::Status, MenuOption::Rest, MenuOption::Auto]);
        self.menu_index = self.menu_index.min(options.len() - 1);
        self.requests.push(UiRequest::PlayerMenu {
            options: options.clone(),
            selected: self.menu_index,
        });
        self.menu = options;
    }

    /// Answer the player menu.
    pub fn choose_menu(&mut self, session: &mut Session, option: MenuOption) {
        if self.stage != Stage::PlayerMenu {
            return;
        }
        let Some(pos) = self.menu.iter().position(|&o| o == option) else {
            debug!("menu option {option} is not offered");
            return;
        };
        self.menu_index = pos;
        let Some(index) = self.actor() else {
            return;
        };
        match option {
            MenuOption::Move => {
                self.mask_area(self.chars[index].steps, 0);
                self.stage = Stage::MoveSelecting;
            }
            MenuOption::Attack => self.choose_attack(session, index),
            MenuOption::Poison => self.select_support(index, Act::Poison),
            MenuOption::Depoison => self.select_support(index, Act::Depoison),
            MenuOption::Medic => self.select_support(index, Act::Medic),
            MenuOption::Item => self.requests.push(UiRequest::ItemView {
                char_id: self.chars[index].id,
            }),
            MenuOption::Wait => {
                if let Some(actor) = self.queue.pop() {
                    self.queue.insert(0, actor);
                }
                self.turn_owner = None;
                self.stage = Stage::Idle;
            }
            MenuOption::Status => {
                let roster = self.chars.iter().map(|c| (c.side, c.id)).collect();
                self.requests.push(UiRequest::Roster(roster));
            }
            MenuOption::Rest => self.rest(session),
            MenuOption::Auto => {
                self.auto_control = true;
                self.stage = Stage::Idle;
            }
        }
    }

    fn choose_attack(&mut self, session: &mut Session, index: usize) {
        let c = &self.chars[index].info;
        if c.skill_id[1] > 0 {
            let rules = Rules::new(&session.data, &session.factors);
            let slots: Vec<usize> = (0..SKILL_SLOTS)
                .filter(|&slot| {
                    rules
                        .skill_in_slot(c, slot)
                        .is_some_and(|s| action::real_skill_level(s.req_mp, c.skill_tier(slot), c.mp) >= 0)
                })
                .collect();
            if !slots.is_empty() {
                self.requests.push(UiRequest::SkillMenu { slots });
                return;
            }
        } else if self.try_use_skill(session, 0) {
            return;
        }
        self.requests.push(UiRequest::Message(Notice::NoUsableSkill));
    }

    /// Answer the skill menu. Returns `false` if the skill cannot be used
    /// now; the menu stays open.
    pub fn choose_skill(&mut self, session: &mut Session, slot: usize) -> bool {
        if self.stage != Stage::PlayerMenu {
            return false;
        }
        self.try_use_skill(session, slot)
    }

    fn try_use_skill(&mut self, session: &mut Session, slot: usize) -> bool {
        let Some(index) = self.actor() else {
            return false;
        };
        let c = &self.chars[index].info;
        let Some(skill) = Rules::new(&session.data, &session.factors).skill_in_slot(c, slot) else {
            return false;
        };
        let level = action::real_skill_level(skill.req_mp, c.skill_tier(slot), c.mp);
        if level < 0 {
            return false;
        }
        let area = skill.attack_area();
        let range = skill.range_at(level) as i32;
        self.act = Some(Act::Skill { slot });
        self.act_level = level;
        self.attack_times_left = if c.double_attack != 0 { 2 } else { 1 };
        match area {
            AttackArea::Line => {
                self.stage = Stage::DirectionSelecting;
                self.requests.push(UiRequest::DirectionPrompt);
            }
            AttackArea::Cross => self.start_act(session),
            AttackArea::Point | AttackArea::Radius => {
                self.mask_area(0, range);
                self.stage = Stage::AttackSelecting;
            }
        }
        true
    }

    /// Answer the direction prompt of a line skill.
    pub fn choose_direction(&mut self, session: &mut Session, direction: Option<Direction>) {
        if self.stage != Stage::DirectionSelecting {
            return;
        }
        match (direction, self.actor()) {
            (Some(direction), Some(index)) => {
                self.chars[index].direction = direction;
                self.start_act(session);
            }
            _ => {
                self.reset_act();
                self.player_menu();
            }
        }
    }

    fn select_support(&mut self, index: usize, act: Act) {
        let c = &self.chars[index].info;
        let stat = match act {
            Act::Poison => c.poison,
            Act::Depoison => c.depoison,
            Act::Medic => c.medic,
            _ => 0,
        };
        self.act = Some(act);
        self.act_level = 0;
        self.attack_times_left = 1;
        self.mask_area(0, stat as i32 / 15);
        self.stage = Stage::AttackSelecting;
    }

    /// Answer the item view.
    pub fn choose_item(&mut self, session: &mut Session, choice: ItemChoice) {
        if self.stage != Stage::PlayerMenu {
            return;
        }
        let Some(index) = self.actor() else {
            return;
        };
        match choice {
            ItemChoice::Cancel => self.player_menu(),
            ItemChoice::Use(item) => {
                let mut changes = Changes::new();
                let c = &mut self.chars[index];
                if action::use_item(&mut c.info, &session.data.items, &mut session.data.bag, item, &mut changes) {
                    self.requests.push(UiRequest::ItemUsed {
                        char_id: c.id,
                        item,
                        changes,
                    });
                    self.end_turn(session);
                } else {
                    debug!("character {} cannot use item {item}", c.id);
                    self.player_menu();
                }
            }
            ItemChoice::Throw(item) => {
                let throwable = session.data.item(item).is_some_and(|i| i.kind() == ItemKind::Throwing)
                    && session.data.bag.count(item) > 0;
                if !throwable {
                    debug!("item {item} cannot be thrown");
                    self.player_menu();
                    return;
                }
                self.act = Some(Act::Throw { item });
                self.act_level = 0;
                self.attack_times_left = 1;
                self.mask_area(0, self.chars[index].info.throwing as i32 / 15);
                self.stage = Stage::AttackSelecting;
            }
        }
    }

    pub(super) fn mask_area(&mut self, steps: i32, ranges: i32) {
        let Some(index) = self.actor() else {
            return;
        };
        let c = &self.chars[index];
        let pos = c.pos();
        self.area = self.grid.reachable(pos, c.side, steps, ranges, self.zone_of_control);
        self.cursor = pos;
        self.grid.mark(&self.area, pos);
    }

    fn unmask_area(&mut self) {
        self.grid.unmark();
        self.area.clear();
    }

    /// Feed a key press.
    pub fn handle_key(&mut self, session: &mut Session, key: Key) {
        match self.stage {
            Stage::MoveSelecting | Stage::AttackSelecting => self.handle_selecting_key(session, key),
            Stage::DirectionSelecting => {
                if key == Key::Cancel {
                    self.choose_direction(session, None);
                } else if let Some(direction) = key.direction() {
                    self.choose_direction(session, Some(direction));
                }
            }
            Stage::Idle | Stage::Moving | Stage::Acting => {
                if key == Key::Cancel {
                    if self.actor().is_some_and(|index| self.chars[index].side == 0) {
                        self.pending_auto = None;
                    }
                    if self.auto_control {
                        debug!("auto control off");
                    }
                    self.auto_control = false;
                }
            }
            Stage::PlayerMenu | Stage::PoppingUp | Stage::Finished => {}
        }
    }

    fn handle_selecting_key(&mut self, session: &mut Session, key: Key) {
        if let Some(direction) = key.direction() {
            let (dx, dy) = direction.delta();
            let next = (self.cursor.0 + dx, self.cursor.1 + dy);
            if self.area.contains_key(&next) {
                self.cursor = next;
                self.grid.move_cursor(next);
            }
            return;
        }
        match key {
            Key::Ok | Key::Space => {
                if self.stage == Stage::MoveSelecting {
                    self.confirm_move();
                } else {
                    self.start_act(session);
                }
                self.unmask_area();
            }
            Key::Cancel => {
                self.unmask_area();
                self.reset_act();
                self.player_menu();
            }
            _ => {}
        }
    }

    fn confirm_move(&mut self) {
        self.stage = Stage::Idle;
        let Some(index) = self.actor() else {
            return;
        };
        let target = self.cursor;
        if target == self.chars[index].pos() || self.grid.occupant(target.0, target.1).is_some() {
            return;
        }
        if self.area.get(&target).is_some_and(|cell| cell.is_walkable()) {
            self.moving_path = path_to(&self.area, target);
            self.stage = Stage::Moving;
        }
    }

    /// Walk toward `target` over `area`, starting next frame.
    pub(super) fn move_along(&mut self, area: &Area, target: (i32, i32)) {
        self.moving_path = path_to(area, target);
        self.stage = Stage::Moving;
    }

    fn step_moving(&mut self) {
        let Some(index) = self.actor() else {
            self.stage = Stage::Idle;
            return;
        };
        let pos = self.chars[index].pos();
        let mut next = self.moving_path.pop();
        if next == Some(pos) {
            next = self.moving_path.pop();
        }
        let Some(next) = next else {
            self.stage = Stage::Idle;
            return;
        };
        let c = &mut self.chars[index];
        c.direction = if next.0 < pos.0 {
            Direction::Left
        } else if next.0 > pos.0 {
            Direction::Right
        } else if next.1 < pos.1 {
            Direction::Up
        } else {
            Direction::Down
        };
        c.steps -= 1;
        (c.x, c.y) = next;
        let side = c.side;
        self.grid.set_occupant(pos.0, pos.1, None);
        self.grid.set_occupant(next.0, next.1, Some(Occupant { index, side }));
    }

    /// Resolve the prepared action at the cursor and start its animation.
    pub(super) fn start_act(&mut self, session: &mut Session) {
        let Some(index) = self.actor() else {
            return;
        };
        match self.act {
            Some(Act::Skill { slot }) => self.start_skill(session, index, slot),
            Some(act) => self.start_support(session, index, act),
            None => self.end_turn(session),
        }
    }

    fn start_support(&mut self, session: &mut Session, index: usize, act: Act) {
        let cursor = self.cursor;
        let Some(target) = self.grid.occupant(cursor.0, cursor.1) else {
            self.reset_act();
            self.player_menu();
            return;
        };
        let side = self.chars[index].side;
        let ally = target.side == side;
        let factors = &session.factors;
        let rng = &mut session.rng;
        let (effect, tone, shown, result) = match act {
            Act::Poison => {
                let result = if ally {
                    0
                } else {
                    with_pair(&mut self.chars, index, target.index, |u, t| action::act_poison(u, t, 2)).unwrap_or(0)
                };
                (factors.poison_effect, Tone::Poison, !ally && result != 0, result)
            }
            Act::Depoison => {
                let result = if ally {
                    with_pair(&mut self.chars, index, target.index, |u, t| action::act_depoison(u, t, 2, rng))
                        .unwrap_or(0)
                } else {
                    0
                };
                (factors.depoison_effect, Tone::Depoison, ally, result)
            }
            Act::Medic => {
                let result = if ally {
                    with_pair(&mut self.chars, index, target.index, |u, t| action::act_medic(u, t, 4, rng))
                        .unwrap_or(0)
                } else {
                    0
                };
                (factors.medic_effect, Tone::Heal, ally, result)
            }
            Act::Throw { item } => {
                let record = session.data.item(item).cloned();
                let effect = record.as_ref().map_or(factors.poison_effect, |i| i.throwing_effect_id);
                match record {
                    Some(record) if !ally => {
                        let (result, dead) = with_pair(&mut self.chars, index, target.index, |u, t| {
                            action::act_throw(u, t, &record, 0, rng)
                        })
                        .unwrap_or((0, false));
                        if side == 0 {
                            session.data.bag.remove(item, 1);
                        } else {
                            action::take_carried(&mut self.chars[index].info, item);
                        }
                        if dead {
                            self.recalc_knowledge(session.factors.knowledge_barrier);
                        }
                        (effect, Tone::Damage, result != 0, result)
                    }
                    _ => (effect, Tone::Damage, false, 0),
                }
            }
            Act::Skill { .. } => return,
        };
        if shown {
            self.chars[index].exp += (result as i32).abs();
            self.requests.push(UiRequest::PopupNumber {
                x: cursor.0,
                y: cursor.1,
                value: result,
                tone,
            });
        }
        self.begin_acting(session, index, effect, 0, true);
    }

    fn start_skill(&mut self, session: &mut Session, index: usize, slot: usize) {
        let Some(skill) = Rules::new(&session.data, &session.factors)
            .skill_in_slot(&self.chars[index].info, slot)
            .cloned()
        else {
            warn!("character {} has no skill in slot {slot}", self.chars[index].id);
            self.reset_act();
            self.end_turn(session);
            return;
        };
        let area = skill.attack_area();
        let frames = skill.skill_type.clamp(0, 4) as usize;
        self.begin_acting(
            session,
            index,
            skill.effect_id,
            frames,
            matches!(area, AttackArea::Point | AttackArea::Radius),
        );

        let origin = self.chars[index].pos();
        let cursor = self.cursor;
        let level = self.act_level;
        let range = skill.range_at(level) as i32;
        let mut hits: Vec<((i32, i32), i32)> = Vec::new();
        match area {
            AttackArea::Line => {
                let (dx, dy) = self.chars[index].direction.delta();
                for i in (1..=range).rev() {
                    hits.push(((origin.0 + dx * i, origin.1 + dy * i), i));
                }
            }
            AttackArea::Cross => {
                for i in (1..=range).rev() {
                    for direction in Direction::ALL {
                        let (dx, dy) = direction.delta();
                        hits.push(((origin.0 + dx * i, origin.1 + dy * i), i));
                    }
                }
            }
            AttackArea::Radius => {
                let radius = skill.area_at(level) as i32;
                let base = manhattan(cursor, origin);
                for j in -radius..=radius {
                    for i in -radius..=radius {
                        hits.push(((cursor.0 + i, cursor.1 + j), base + i.abs() + j.abs()));
                    }
                }
            }
            AttackArea::Point => hits.push((cursor, manhattan(cursor, origin))),
        }
        for (pos, distance) in hits {
            if self.grid.in_bounds(pos.0, pos.1) {
                self.make_damage(session, index, slot, pos, distance);
            }
        }

        let stamina = if self.attack_times_left == 1 { 3 } else { 0 };
        let c = &mut self.chars[index].info;
        self.skill_level_up = action::post_damage(c, slot, stamina, &mut session.rng);
        if self.skill_level_up {
            self.act_level = c.skill_tier(slot);
        }
    }

    fn make_damage(&mut self, session: &mut Session, index: usize, slot: usize, pos: (i32, i32), distance: i32) {
        let Some(target) = self.grid.occupant(pos.0, pos.1) else {
            return;
        };
        let side = self.chars[index].side;
        if target.side == side || target.index == index {
            return;
        }
        let strike = Strike {
            slot,
            level: self.act_level,
            distance,
            attacker_knowledge: self.knowledge[(side as usize).min(1)],
            defender_knowledge: self.knowledge[(target.side as usize).min(1)],
        };
        let was_dead = !self.chars[target.index].is_alive();
        let rules = Rules::new(&session.data, &session.factors);
        let Some((attacker, defender)) = pair_mut(&mut self.chars, index, target.index) else {
            return;
        };
        let Some(outcome) = action::act_damage(&mut attacker.info, &mut defender.info, strike, &rules, &mut session.rng)
        else {
            return;
        };
        let damage = outcome.damage as i32;
        let killed = !was_dead && outcome.dead;
        attacker.exp += if killed { damage * 2 / 3 } else { damage / 3 };
        trace!(
            "character {} hits {} at {pos:?} for {damage}",
            attacker.id, defender.id
        );
        if killed {
            self.recalc_knowledge(session.factors.knowledge_barrier);
        }
        let (value, tone) = if outcome.damage < 0 {
            (outcome.damage, Tone::Drain)
        } else {
            (-outcome.damage, Tone::Damage)
        };
        self.requests.push(UiRequest::PopupNumber {
            x: pos.0,
            y: pos.1,
            value,
            tone,
        });
    }

    fn begin_acting(&mut self, session: &Session, index: usize, effect: i16, frames: usize, face_cursor: bool) {
        self.stage = Stage::Acting;
        self.effect_id = effect;
        self.effect_len = session.factors.effect_length(effect);
        let cursor = self.cursor;
        let c = &mut self.chars[index];
        if face_cursor && c.pos() != cursor {
            c.direction = Direction::facing(c.pos(), cursor);
        }
        let frames = frames.min(c.info.frame_delay.len() - 1);
        self.effect_index = -(c.info.frame_delay[frames] as i32);
        self.fight_frame = -(c.info.frame_sound_delay[frames] as i32);
    }

    fn step_acting(&mut self, session: &mut Session) {
        if self.fight_frame == 0 {
            let sound = match (self.act, self.actor()) {
                (Some(Act::Skill { slot }), Some(index)) => {
                    let c = &self.chars[index].info;
                    Rules::new(&session.data, &session.factors)
                        .skill_in_slot(c, slot)
                        .map_or(0, |s| s.sound_id)
                }
                _ => 0,
            };
            self.requests.push(UiRequest::PlaySound(sound));
        } else if self.fight_frame == 3 {
            self.requests.push(UiRequest::PlayEffectSound(self.effect_id));
        }
        self.fight_frame += 1;
        self.effect_index += 1;
        if self.effect_index < self.effect_len + 3 {
            return;
        }
        if self.skill_level_up {
            self.skill_level_up = false;
            if let (Some(Act::Skill { slot }), Some(index)) = (self.act, self.actor()) {
                let c = &self.chars[index].info;
                self.stage = Stage::PoppingUp;
                self.popup = Some(Popup::SkillLevelUp);
                self.requests.push(UiRequest::Message(Notice::SkillLevel {
                    skill: c.skill_id[slot],
                    level: c.skill_level[slot] / 100 + 1,
                }));
                return;
            }
        }
        self.finish_act(session);
    }

    /// Strike again for double attack, else end the turn.
    fn finish_act(&mut self, session: &mut Session) {
        self.attack_times_left = self.attack_times_left.saturating_sub(1);
        if self.attack_times_left > 0
            && let (Some(Act::Skill { slot }), Some(index)) = (self.act, self.actor())
        {
            let c = &self.chars[index].info;
            if let Some(skill) = Rules::new(&session.data, &session.factors).skill_in_slot(c, slot) {
                self.act_level = action::real_skill_level(skill.req_mp, self.act_level, c.mp);
            }
            if self.act_level >= 0 {
                self.start_act(session);
                return;
            }
        }
        self.reset_act();
        self.end_turn(session);
    }

    pub(super) fn reset_act(&mut self) {
        self.act = None;
        self.act_level = 0;
        self.attack_times_left = 0;
        self.skill_level_up = false;
        self.effect_id = -1;
        self.effect_index = -1;
        self.fight_frame = 0;
    }

    /// Acknowledge the popup the engine is waiting on.
    pub fn close_popup(&mut self, session: &mut Session) {
        match self.popup.take() {
            Some(Popup::SkillLevelUp) => {
                self.stage = Stage::Acting;
                self.finish_act(session);
            }
            Some(Popup::ItemUsed) => {
                self.queue.pop();
                self.turn_owner = None;
                self.stage = Stage::Idle;
            }
            Some(Popup::Results) => {
                let outcome = Outcome {
                    won: self.won,
                    dead: !self.won && self.dead_on_lose,
                };
                self.requests.push(UiRequest::EndBattle {
                    won: outcome.won,
                    dead: outcome.dead,
                });
                self.outcome = Some(outcome);
            }
            None => {}
        }
    }

    pub(super) fn rest(&mut self, session: &mut Session) {
        if let Some(index) = self.actor() {
            action::act_rest(&mut self.chars[index].info, &mut session.rng);
        }
        self.end_turn(session);
    }

    pub(super) fn end_turn(&mut self, session: &mut Session) {
        self.queue.pop();
        self.turn_owner = None;
        let mut alive = [0usize; 2];
        for c in &mut self.chars {
            if c.is_alive() {
                alive[(c.side as usize).min(1)] += 1;
            } else if c.x >= 0 {
                self.grid.set_occupant(c.x, c.y, None);
                c.x = -1;
                c.y = -1;
            }
        }
        if alive[1] == 0 || alive[0] == 0 {
            self.won = alive[1] == 0;
            debug!("battle {} over, won: {}", self.info.id, self.won);
            self.unmask_area();
            let messages = self.settle(session);
            self.stage = Stage::Finished;
            self.popup = Some(Popup::Results);
            self.requests.push(UiRequest::BattleResults(messages));
        } else {
            self.stage = Stage::Idle;
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.chars
    }

    /// Combatant whose turn it is.
    pub fn current(&self) -> Option<&Combatant> {
        self.actor().and_then(|index| self.chars.get(index))
    }

    /// Turn queue of the round, next actor last.
    pub fn turn_queue(&self) -> &[usize] {
        &self.queue
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Cells of the active move or attack selection.
    pub fn area(&self) -> &Area {
        &self.area
    }

    pub fn cursor(&self) -> (i32, i32) {
        self.cursor
    }

    pub fn knowledge(&self) -> [i16; 2] {
        self.knowledge
    }

    pub fn info(&self) -> &BattleInfo {
        &self.info
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_auto_control(&self) -> bool {
        self.auto_control
    }

    pub fn set_auto_control(&mut self, auto_control: bool) {
        self.auto_control = auto_control;
    }

    /// Stop movement next to allies of the mover.
    pub fn set_zone_of_control(&mut self, zone_of_control: bool) {
        self.zone_of_control = zone_of_control;
    }

    /// Drain the queued UI requests.
    pub fn take_requests(&mut self) -> Vec<UiRequest> {
        std::mem::take(&mut self.requests)
    }
}

/// Two distinct combatants borrowed mutably.
fn pair_mut(chars: &mut [Combatant], a: usize, b: usize) -> Option<(&mut Combatant, &mut Combatant)> {
    if a == b || a.max(b) >= chars.len() {
        return None;
    }
    if a < b {
        let (left, right) = chars.split_at_mut(b);
        Some((&mut left[a], &mut right[0]))
    } else {
        let (left, right) = chars.split_at_mut(a);
        Some((&mut right[0], &mut left[b]))
    }
}

/// Run a support action of `user` on `target`, which may be the user
/// itself. Support actions only cost the user stamina.
fn with_pair<R>(
    chars: &mut [Combatant],
    user: usize,
    target: usize,
    f: impl FnOnce(&mut CharacterRecord, &mut CharacterRecord) -> R,
) -> Option<R> {
    if user == target {
        let c = chars.get_mut(user)?;
        let mut acting = c.info.clone();
        let result = f(&mut acting, &mut c.info);
        c.info.stamina = acting.stamina;
        return Some(result);
    }
    let (u, t) = pair_mut(chars, user, target)?;
    Some(f(&mut u.info, &mut t.info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameRng;
    use crate::testing::{battle_info, battle_session, character, consumable, skill, throwing};

    fn duel(rng: GameRng) -> (Session, Battle) {
        let mut hero = character(0, 100);
        hero.speed = 60;
        hero.attack = 50;
        hero.skill_id[0] = 1;
        let mut bandit = character(1, 40);
        bandit.speed = 30;
        bandit.skill_id[0] = 1;
        let info = battle_info(&[(0, 2, 2)], &[(1, 4, 2)], 30);
        let session = battle_session(vec![hero, bandit], vec![skill(1, 0, 20)], vec![], &[0], info, rng);
        let mut battle = Battle::load(&session, 0, false, false).unwrap();
        battle.put_chars(&session, &[]);
        (session, battle)
    }

    #[test]
    fn test_load_missing_battle() {
        let session = battle_session(vec![], vec![], vec![], &[], battle_info(&[], &[], 0), GameRng::new(1));
        assert!(matches!(
            Battle::load(&session, 3, false, false),
            Err(CoreError::MissingBattle(3))
        ));
    }

    #[test]
    fn test_put_chars_forced() {
        let (_, battle) = duel(GameRng::new(1));
        let chars = battle.combatants();
        assert_eq!(chars.len(), 2);
        assert_eq!((chars[0].side, chars[0].pos(), chars[0].direction), (0, (2, 2), Direction::Left));
        assert_eq!((chars[1].side, chars[1].pos(), chars[1].direction), (1, (4, 2), Direction::Right));
        assert_eq!(battle.grid().occupant(4, 2), Some(Occupant { index: 1, side: 1 }));
        assert_eq!(battle.forced_members(), Some(vec![0]));
    }

    #[test]
    fn test_put_chars_default_then_free_slots() {
        let mut info = battle_info(&[], &[], 0);
        info.default_members[1] = 2;
        for slot in 0..3 {
            info.member_x[slot] = slot as i16;
            info.member_y[slot] = 5;
        }
        let chars = vec![character(0, 10), character(1, 10), character(2, 10)];
        let session = battle_session(chars, vec![], vec![], &[0, 1, 2], info, GameRng::new(1));
        let mut battle = Battle::load(&session, 0, false, false).unwrap();
        assert_eq!(battle.forced_members(), None);
        assert_eq!(battle.default_members(), vec![2]);
        battle.put_chars(&session, &[0, 2, 1]);
        let placed: Vec<_> = battle.combatants().iter().map(|c| (c.id, c.x)).collect();
        assert_eq!(placed, vec![(0, 0), (2, 1), (1, 2)]);
    }

    #[test]
    fn test_put_chars_drops_duplicates_and_fills_enemies() {
        let mut enemy = character(1, 50);
        enemy.hp = 5;
        enemy.stamina = 0;
        let info = battle_info(&[(0, 1, 1)], &[(1, 1, 1), (1, 3, 3)], 0);
        let session = battle_session(vec![character(0, 10), enemy], vec![], vec![], &[0], info, GameRng::new(1));
        let mut battle = Battle::load(&session, 0, false, false).unwrap();
        battle.put_chars(&session, &[]);
        assert_eq!(battle.combatants().len(), 2);
        let enemy = &battle.combatants()[1];
        assert_eq!(enemy.pos(), (3, 3));
        assert_eq!((enemy.info.hp, enemy.info.stamina), (50, STAMINA_MAX));
    }

    #[test]
    fn test_turn_order_fastest_first() {
        let mut chars = Vec::new();
        for (id, speed) in [(0, 10), (1, 50), (2, 30)] {
            let mut c = character(id, 10);
            c.speed = speed;
            chars.push(c);
        }
        let info = battle_info(&[(0, 0, 0), (1, 1, 0)], &[(2, 5, 5)], 0);
        let session = battle_session(chars, vec![], vec![], &[0, 1], info, GameRng::new(1));
        let mut battle = Battle::load(&session, 0, false, false).unwrap();
        battle.put_chars(&session, &[]);
        battle.build_queue();
        let mut order = Vec::new();
        while let Some(index) = battle.queue.pop() {
            order.push(battle.chars[index].info.speed);
        }
        assert_eq!(order, vec![50, 30, 10]);
    }

    #[test]
    fn test_poison_ticks_once_per_turn() {
        let (mut session, mut battle) = duel(GameRng::new(1));
        battle.chars[0].info.poisoned = 50;
        battle.frame(&mut session);
        assert_eq!(battle.stage(), Stage::PlayerMenu);
        assert_eq!(battle.chars[0].info.hp, 95);
        battle.choose_menu(&mut session, MenuOption::Move);
        battle.handle_key(&mut session, Key::Cancel);
        assert_eq!(battle.stage(), Stage::PlayerMenu);
        assert_eq!(battle.chars[0].info.hp, 95);
    }

    #[test]
    fn test_player_menu_gating() {
        let (mut session, mut battle) = duel(GameRng::new(1));
        battle.chars[0].info.stamina = 9;
        battle.chars[0].info.medic = 30;
        battle.frame(&mut session);
        assert_eq!(
            battle.menu,
            vec![
                MenuOption::Move,
                MenuOption::Item,
                MenuOption::Wait,
                MenuOption::Status,
                MenuOption::Rest,
                MenuOption::Auto
            ]
        );
        battle.chars[0].info.stamina = 60;
        battle.player_menu();
        assert!(battle.menu.contains(&MenuOption::Medic));
        assert!(battle.menu.contains(&MenuOption::Attack));
        assert!(!battle.menu.contains(&MenuOption::Poison));
    }

    #[test]
    fn test_wait_rotates_actor() {
        let (mut session, mut battle) = duel(GameRng::new(1));
        battle.frame(&mut session);
        assert_eq!(battle.turn_queue(), &[1, 0]);
        battle.choose_menu(&mut session, MenuOption::Wait);
        assert_eq!(battle.turn_queue(), &[0, 1]);
        assert_eq!(battle.stage(), Stage::Idle);
    }

    #[test]
    fn test_move_selection_walks_path() {
        let (mut session, mut battle) = duel(GameRng::new(1));
        battle.frame(&mut session);
        battle.choose_menu(&mut session, MenuOption::Move);
        assert_eq!(battle.stage(), Stage::MoveSelecting);
        // four steps, never through the bandit at (4, 2)
        assert!(battle.area().contains_key(&(2, 6)));
        assert!(battle.area().contains_key(&(5, 1)));
        assert!(!battle.area().contains_key(&(5, 2)));
        assert!(!battle.area().contains_key(&(2, 7)));
        battle.handle_key(&mut session, Key::Down);
        battle.handle_key(&mut session, Key::Down);
        battle.handle_key(&mut session, Key::Ok);
        assert_eq!(battle.stage(), Stage::Moving);
        assert!(battle.area().is_empty());
        battle.frame(&mut session);
        assert_eq!(battle.chars[0].pos(), (2, 3));
        assert_eq!(battle.chars[0].direction, Direction::Down);
        battle.frame(&mut session);
        battle.frame(&mut session);
        assert_eq!(battle.stage(), Stage::Idle);
        assert_eq!(battle.chars[0].pos(), (2, 4));
        assert_eq!(battle.chars[0].steps, 2);
        assert_eq!(battle.grid().occupant(2, 2), None);
        assert_eq!(battle.grid().occupant(2, 4), Some(Occupant { index: 0, side: 0 }));
    }

    #[test]
    fn test_cursor_stays_inside_area() {
        let (mut session, mut battle) = duel(GameRng::new(1));
        battle.frame(&mut session);
        battle.chars[0].info.poison = 20;
        battle.player_menu();
        battle.choose_menu(&mut session, MenuOption::Poison);
        assert_eq!(battle.stage(), Stage::AttackSelecting);
        battle.handle_key(&mut session, Key::Up);
        assert_eq!(battle.cursor(), (2, 1));
        battle.handle_key(&mut session, Key::Up);
        assert_eq!(battle.cursor(), (2, 1));
        battle.handle_key(&mut session, Key::Cancel);
        assert_eq!(battle.stage(), Stage::PlayerMenu);
        assert!(!battle.grid().is_marked(2, 1));
    }

    #[test]
    fn test_point_attack_resolves_and_animates() {
        let (mut session, mut battle) = duel(GameRng::scripted([0; 64]));
        battle.chars[1].info.defence = 15;
        battle.chars[1].x = 3;
        battle.grid.set_occupant(4, 2, None);
        battle.grid.set_occupant(3, 2, Some(Occupant { index: 1, side: 1 }));
        battle.frame(&mut session);
        battle.choose_menu(&mut session, MenuOption::Attack);
        assert_eq!(battle.stage(), Stage::AttackSelecting);
        battle.handle_key(&mut session, Key::Right);
        battle.take_requests();
        battle.handle_key(&mut session, Key::Ok);
        assert_eq!(battle.stage(), Stage::Acting);
        let requests = battle.take_requests();
        let popup = requests.iter().find_map(|r| match r {
            UiRequest::PopupNumber { value, tone, .. } => Some((*value, *tone)),
            _ => None,
        });
        let (value, tone) = popup.unwrap();
        assert_eq!(tone, Tone::Damage);
        // (85 - 45) * 2 / 3 + 100 / 15
        assert_eq!(value, -32);
        assert_eq!(battle.chars[1].info.hp, 8);
        assert_eq!(battle.chars[0].exp, (-value as i32) / 3);
        assert_eq!(battle.chars[0].direction, Direction::Right);

        let mut frames = 0;
        while battle.stage() == Stage::Acting && frames < 100 {
            battle.frame(&mut session);
            frames += 1;
        }
        // default effect length 10 plus 3 trailing frames
        assert_eq!(frames, 13);
        let requests = battle.take_requests();
        assert!(requests.contains(&UiRequest::PlaySound(0)));
        assert!(requests.contains(&UiRequest::PlayEffectSound(0)));
        assert_eq!(battle.stage(), Stage::Idle);
        assert_eq!(battle.turn_queue(), &[1]);
    }

    #[test]
    fn test_kill_ends_battle_with_settlement() {
        let (mut session, mut battle) = duel(GameRng::scripted([0; 64]));
        battle.chars[1].info.hp = 1;
        battle.chars[1].x = 3;
        battle.grid.set_occupant(4, 2, None);
        battle.grid.set_occupant(3, 2, Some(Occupant { index: 1, side: 1 }));
        battle.frame(&mut session);
        battle.choose_menu(&mut session, MenuOption::Attack);
        battle.handle_key(&mut session, Key::Right);
        battle.handle_key(&mut session, Key::Ok);
        while battle.stage() == Stage::Acting {
            battle.frame(&mut session);
        }
        assert_eq!(battle.stage(), Stage::Finished);
        assert_eq!(battle.grid().occupant(3, 2), None);
        assert_eq!(battle.chars[1].pos(), (-1, -1));
        let requests = battle.take_requests();
        let Some(UiRequest::BattleResults(messages)) = requests.last() else {
            panic!("no results: {requests:?}");
        };
        assert_eq!(messages[0].notice, Notice::Won);
        battle.close_popup(&mut session);
        assert_eq!(battle.outcome(), Some(Outcome { won: true, dead: false }));
        assert!(battle.take_requests().contains(&UiRequest::EndBattle { won: true, dead: false }));
    }

    #[test]
    fn test_medic_on_self_keeps_stamina_cost() {
        let (mut session, mut battle) = duel(GameRng::scripted([0; 8]));
        battle.chars[0].info.medic = 40;
        battle.chars[0].info.hp = 50;
        battle.frame(&mut session);
        battle.choose_menu(&mut session, MenuOption::Medic);
        battle.handle_key(&mut session, Key::Ok);
        assert_eq!(battle.stage(), Stage::Acting);
        assert_eq!(battle.chars[0].info.hp, 82);
        assert_eq!(battle.chars[0].info.stamina, 96);
        assert_eq!(battle.chars[0].exp, 32);
        assert!(battle.take_requests().contains(&UiRequest::PopupNumber {
            x: 2,
            y: 2,
            value: 32,
            tone: Tone::Heal
        }));
    }

    #[test]
    fn test_support_on_empty_cell_returns_to_menu() {
        let (mut session, mut battle) = duel(GameRng::new(1));
        battle.chars[0].info.poison = 30;
        battle.frame(&mut session);
        battle.choose_menu(&mut session, MenuOption::Poison);
        battle.handle_key(&mut session, Key::Up);
        battle.handle_key(&mut session, Key::Ok);
        assert_eq!(battle.stage(), Stage::PlayerMenu);
    }

    #[test]
    fn test_item_use_and_throw() {
        let (mut session, mut battle) = duel(GameRng::scripted([0; 16]));
        session.data.items = vec![consumable(0, 30), throwing(1, -60)];
        session.data.bag.add(0, 1);
        session.data.bag.add(1, 2);
        battle.chars[0].info.hp = 50;
        battle.chars[0].info.throwing = 30;
        battle.frame(&mut session);
        battle.choose_menu(&mut session, MenuOption::Item);
        assert!(battle.take_requests().contains(&UiRequest::ItemView { char_id: 0 }));
        battle.choose_item(&mut session, ItemChoice::Use(0));
        assert_eq!(battle.chars[0].info.hp, 80);
        assert_eq!(session.data.bag.count(0), 0);
        assert_eq!(battle.stage(), Stage::Idle);

        // the bandit's turn comes next; hand it back to the hero
        battle.queue = vec![1, 0];
        battle.player_menu();
        battle.choose_item(&mut session, ItemChoice::Throw(1));
        assert_eq!(battle.stage(), Stage::AttackSelecting);
        battle.handle_key(&mut session, Key::Right);
        battle.handle_key(&mut session, Key::Right);
        battle.handle_key(&mut session, Key::Ok);
        assert_eq!(battle.stage(), Stage::Acting);
        assert_eq!(session.data.bag.count(1), 1);
        // (60 / 4 + 0 + 60) / 3
        assert_eq!(battle.chars[1].info.hp, 15);
    }

    #[test]
    fn test_line_skill_prompts_direction() {
        let (mut session, mut battle) = duel(GameRng::scripted([0; 32]));
        session.data.skills[1].attack_area_type = 1;
        session.data.skills[1].sel_range = [3; 10];
        battle.frame(&mut session);
        battle.choose_menu(&mut session, MenuOption::Attack);
        assert_eq!(battle.stage(), Stage::DirectionSelecting);
        assert!(battle.take_requests().contains(&UiRequest::DirectionPrompt));
        battle.handle_key(&mut session, Key::Right);
        assert_eq!(battle.stage(), Stage::Acting);
        assert_eq!(battle.chars[0].direction, Direction::Right);
        assert!(battle.chars[1].info.hp < 40);
    }

    #[test]
    fn test_cancel_stops_auto_control() {
        let (mut session, mut battle) = duel(GameRng::new(1));
        battle.set_auto_control(true);
        battle.handle_key(&mut session, Key::Cancel);
        assert!(!battle.is_auto_control());
    }

    #[test]
    fn test_pair_mut() {
        let (_, mut battle) = duel(GameRng::new(1));
        assert!(pair_mut(&mut battle.chars, 0, 0).is_none());
        let (a, b) = pair_mut(&mut battle.chars, 1, 0).unwrap();
        assert_eq!((a.id, b.id), (1, 0));
    }
}
