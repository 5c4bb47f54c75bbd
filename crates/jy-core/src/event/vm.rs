//! Event script interpreter
//!
//! [`EventVm`] walks the player around a submap and runs the scripts
//! attached to its cells. Execution stops at any instruction that needs
//! the window (a dialogue, a prompt, a fade, a battle) and picks up again
//! at the next instruction when the host calls
//! [`EventVm::continue_events`]. Yes/no prompts and battles resume with
//! their answer, which selects the branch.

use std::collections::VecDeque;

use log::{debug, trace, warn};

use crate::action::{self, PropType, clamp_add};
use crate::consts::{
    CARRY_SLOTS, HP_MAX, MAP_SIZE, MP_MAX, PROTAGONIST, REPUTATION_MAX, SKILL_LEVEL_MAX, SKILL_LEVEL_STEP,
    SKILL_SLOTS, STAMINA_MAX, STAT_MAX,
};
use crate::data::submap::layer;
use crate::event::opcode::{Instruction, Op, decode};
use crate::event::ram::{CMP_RESULT, ScriptRam};
use crate::event::subevent::{self, AnimSlot, SubEvent};
use crate::ui::{Direction, Key, Notice, UiRequest};
use crate::world::{CoreError, CoreResult, Session};

/// Result of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Flow {
    Next,
    /// Wait for the window; the resume answer is ignored.
    Suspend,
    Test(bool),
    /// Wait for an answer that selects the branch.
    Ask,
}

/// Input an extended instruction is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Wait {
    /// Store the pressed direction at this address.
    Key(i16),
    /// Store whether Ok was pressed in the comparison slot.
    Confirm,
    /// Store the 1-based menu choice at this address, 0 on cancel.
    Menu(i16),
}

/// Cell event slots, in the order of [`SubMapEvent::event`](crate::data::SubMapEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Interact,
    UseItem,
    Step,
}

const TUTORIAL_TALK: i16 = 2547;
const TUTORIAL_TALKS: i32 = 18;
const TUTORIAL_HEAD: i16 = 114;
const SHOP_TALK: i16 = 0xb9e;
const SHOP_HEAD: i16 = 0x6f;
const STORY_BOOK_TEX: i16 = 4664;
/// Entrance opened once the protagonist is famous enough.
const FAME_THRESHOLD: i16 = 200;
const FAME_EVENT: [i16; 13] = [70, 11, 0, 11, 932, -1, -1, 7968, 7968, 7968, 0, 18, 21];
/// Enter conditions the world keeps once everything else opens.
const WORLD_EXCEPTIONS: [(i16, i16); 4] = [(2, 2), (38, 2), (75, 1), (80, 1)];

#[derive(Debug, Clone)]
pub struct EventVm {
    pub(super) ram: ScriptRam,
    /// Current submap, -1 on the world map
    sub_map: i16,
    pos: (i32, i32),
    camera: (i32, i32),
    direction: Direction,
    show_player: bool,

    pub(super) script: Vec<i16>,
    script_id: i16,
    pub(super) index: usize,
    /// Skip offsets of a suspended prompt, `(true, false)`
    branch: (i16, i16),
    paused: bool,
    /// Cell event that started the script, -1 if none
    event_index: i16,
    /// Item used on the cell event, -1 if none
    event_item: i16,
    pending: VecDeque<SubEvent>,

    /// Scripted path, next cell last
    moving: Vec<(i32, i32)>,
    moving_player: bool,
    anim: [AnimSlot; 3],
    pub(super) wait: Option<Wait>,
    pub(super) requests: Vec<UiRequest>,
}

impl Default for EventVm {
    fn default() -> Self {
        Self {
            ram: ScriptRam::new(),
            sub_map: -1,
            pos: (0, 0),
            camera: (0, 0),
            direction: Direction::Down,
            show_player: true,
            script: Vec::new(),
            script_id: -1,
            index: 0,
            branch: (0, 0),
            paused: false,
            event_index: -1,
            event_item: -1,
            pending: VecDeque::new(),
            moving: Vec::new(),
            moving_player: false,
            anim: [AnimSlot::default(); 3],
            wait: None,
            requests: Vec::new(),
        }
    }
}

impl EventVm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place the player on `sub_map` (-1 for the world map).
    pub fn enter(&mut self, sub_map: i16, x: i32, y: i32, direction: Direction) {
        self.sub_map = sub_map;
        self.pos = (x, y);
        self.camera = (x, y);
        self.direction = direction;
    }

    pub fn sub_map(&self) -> i16 {
        self.sub_map
    }

    pub fn position(&self) -> (i32, i32) {
        self.pos
    }

    pub fn camera(&self) -> (i32, i32) {
        self.camera
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_player_shown(&self) -> bool {
        self.show_player
    }

    /// Whether a script or queued set-piece is still in progress.
    pub fn is_running(&self) -> bool {
        !self.script.is_empty() || !self.pending.is_empty()
    }

    /// Id of the running script, -1 if none.
    pub fn script_id(&self) -> i16 {
        self.script_id
    }

    pub fn ram(&self) -> &ScriptRam {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut ScriptRam {
        &mut self.ram
    }

    /// Drain the queued UI requests.
    pub fn take_requests(&mut self) -> Vec<UiRequest> {
        std::mem::take(&mut self.requests)
    }

    fn face_cell(&self) -> Option<(i32, i32)> {
        let (dx, dy) = self.direction.delta();
        let (x, y) = (self.pos.0 + dx, self.pos.1 + dy);
        let size = MAP_SIZE as i32;
        ((0..size).contains(&x) && (0..size).contains(&y)).then_some((x, y))
    }

    /// Run the interact script of the cell the player faces.
    pub fn interact(&mut self, session: &mut Session) -> bool {
        self.event_item = -1;
        match self.face_cell() {
            Some(cell) => self.check_event(session, Trigger::Interact, cell),
            None => false,
        }
    }

    /// Use `item` on the cell the player faces.
    pub fn use_item(&mut self, session: &mut Session, item: i16) -> bool {
        self.event_item = item;
        match self.face_cell() {
            Some(cell) => self.check_event(session, Trigger::UseItem, cell),
            None => false,
        }
    }

    /// Run the step script of the cell the player stands on.
    pub fn step_on(&mut self, session: &mut Session) -> bool {
        self.event_item = -1;
        self.check_event(session, Trigger::Step, self.pos)
    }

    fn check_event(&mut self, session: &mut Session, trigger: Trigger, (x, y): (i32, i32)) -> bool {
        if self.sub_map < 0 {
            self.event_item = -1;
            return false;
        }
        let Some(index) = session
            .data
            .layers(self.sub_map)
            .and_then(|l| l.get(layer::EVENT as i32, x, y))
        else {
            return false;
        };
        let Some(script) = session.data.event(self.sub_map, index).map(|ev| ev.event[trigger as usize]) else {
            return false;
        };
        if script <= 0 {
            return false;
        }
        debug!("{trigger:?} on event {index} of submap {} runs script {script}", self.sub_map);
        self.event_index = index;
        match self.run_event(session, script) {
            Ok(()) => true,
            Err(err) => {
                warn!("{err}");
                false
            }
        }
    }

    /// Start script `id` from its first instruction.
    pub fn run_event(&mut self, session: &mut Session, id: i16) -> CoreResult<()> {
        if !self.load(session, id) {
            return Err(CoreError::MissingEvent(id));
        }
        self.continue_events(session, false);
        Ok(())
    }

    fn load(&mut self, session: &Session, id: i16) -> bool {
        let Some(script) = session.content.event(id) else {
            return false;
        };
        self.script = script.to_vec();
        self.script_id = id;
        self.index = 0;
        self.branch = (0, 0);
        self.paused = false;
        self.wait = None;
        true
    }

    /// Resume after the window answered. `result` picks the branch of a
    /// suspended prompt and is ignored otherwise.
    pub fn continue_events(&mut self, session: &mut Session, result: bool) {
        if self.pending.is_empty() && self.script.is_empty() {
            return;
        }
        self.paused = false;
        let skip = if result { self.branch.0 } else { self.branch.1 };
        self.index = self.index.saturating_add_signed(skip as isize);
        self.branch = (0, 0);

        while !self.paused {
            while let Some(step) = self.pending.pop_front() {
                if !self.run_sub_event(session, step) {
                    self.paused = true;
                    return;
                }
            }
            if self.index >= self.script.len() {
                break;
            }
            let Some(ins) = decode(&self.script, self.index) else {
                warn!("script {} is truncated at word {}", self.script_id, self.index);
                self.index = self.script.len();
                break;
            };
            self.index += ins.len;
            match self.execute(session, &ins) {
                Flow::Next => {}
                Flow::Suspend => self.paused = true,
                Flow::Test(passed) => {
                    let skip = if passed { ins.branch.0 } else { ins.branch.1 };
                    self.index = self.index.saturating_add_signed(skip as isize);
                }
                Flow::Ask => {
                    self.branch = ins.branch;
                    self.paused = true;
                }
            }
        }
        if !self.paused && self.index >= self.script.len() {
            self.clear();
        }
    }

    fn clear(&mut self) {
        self.script.clear();
        self.script_id = -1;
        self.index = 0;
        self.branch = (0, 0);
        self.paused = false;
        self.event_index = -1;
        self.event_item = -1;
    }

    /// Replace the running script with `id`, keeping the scratch memory.
    pub(super) fn jump(&mut self, session: &Session, id: i16) {
        if !self.load(session, id) {
            warn!("script jumps to missing script {id}");
            self.index = self.script.len();
        }
    }

    /// Advance scripted walks and texture animations by one frame.
    pub fn frame(&mut self, session: &mut Session) {
        if let Some(next) = self.moving.pop() {
            self.camera = next;
            if self.moving_player {
                if next != self.pos {
                    self.direction = Direction::facing(self.pos, next);
                    self.pos = next;
                }
                self.requests.push(UiRequest::MovePlayer {
                    x: next.0,
                    y: next.1,
                    direction: self.direction,
                });
            } else {
                self.requests.push(UiRequest::MoveCamera { x: next.0, y: next.1 });
            }
            if self.moving.is_empty() {
                self.continue_events(session, false);
            }
        }

        let lead = self.anim[0];
        if lead.curr == 0 {
            return;
        }
        if lead.curr == lead.end {
            self.anim = [AnimSlot::default(); 3];
            self.continue_events(session, false);
            return;
        }
        for slot in &mut self.anim {
            if slot.curr == 0 || slot.curr == slot.end {
                continue;
            }
            slot.curr += if slot.curr < slot.end { 1 } else { -1 };
        }
        if lead.event < 0 {
            return;
        }
        for slot in self.anim {
            if slot.curr == 0 {
                continue;
            }
            let Some(ev) = session.data.event_mut(self.sub_map, slot.event) else {
                continue;
            };
            ev.curr_tex = slot.curr;
            ev.beg_tex = slot.curr;
            ev.end_tex = slot.curr;
            let (x, y) = (ev.x as i32, ev.y as i32);
            self.requests.push(UiRequest::RedrawCell {
                x,
                y,
                layer: layer::EVENT,
                tex: slot.curr >> 1,
            });
        }
    }

    /// Answer a wait-for-key instruction. Returns false if none is waiting.
    pub fn press_key(&mut self, session: &mut Session, key: Key) -> bool {
        match self.wait {
            Some(Wait::Key(addr)) => {
                let code = match key {
                    Key::Left => Some(154),
                    Key::Right => Some(156),
                    Key::Up => Some(158),
                    Key::Down => Some(152),
                    _ => None,
                };
                if let Some(code) = code {
                    self.ram.set(addr as i32, code);
                }
            }
            Some(Wait::Confirm) => {
                self.ram.set(CMP_RESULT, if key == Key::Ok { 0 } else { 1 });
            }
            Some(Wait::Menu(_)) | None => return false,
        }
        self.wait = None;
        self.continue_events(session, false);
        true
    }

    /// Answer a script menu with the chosen row, or `None` on cancel.
    pub fn choose(&mut self, session: &mut Session, choice: Option<usize>) -> bool {
        let Some(Wait::Menu(addr)) = self.wait else {
            return false;
        };
        let value = choice.map_or(0, |i| i as i16 + 1);
        self.ram.set(addr as i32, value);
        self.wait = None;
        self.continue_events(session, false);
        true
    }

    fn execute(&mut self, session: &mut Session, ins: &Instruction) -> Flow {
        let Some(op) = ins.op else {
            debug!("skipping unknown opcode {}", ins.code);
            return Flow::Next;
        };
        trace!("{:2}: {op} {:?}", ins.code, ins.args);
        let a = |i: usize| ins.args.get(i).copied().unwrap_or(0);
        let data = &mut session.data;
        match op {
            Op::ExitScript => {
                self.index = self.script.len();
                self.requests.push(UiRequest::ClosePopup);
            }
            Op::ClosePopup => self.requests.push(UiRequest::ClosePopup),
            Op::Talk => return self.talk(a(0), a(1), a(2)),
            Op::AddItem => return self.add_item(session, a(0), a(1)),
            Op::ModifyEvent => self.modify_event(session, &ins.args),
            Op::UsedItem => return Flow::Test(a(0) == self.event_item),
            Op::AskBattle => return self.ask(Notice::AskForBattle),
            Op::Battle => {
                self.requests.push(UiRequest::EnterBattle {
                    battle: a(0),
                    exp_on_lose: a(1) > 0,
                    dead_on_lose: false,
                });
                return Flow::Ask;
            }
            Op::ChangeExitMusic => {
                if let Some(m) = data.sub_map_mut(self.sub_map) {
                    m.exit_music = a(0);
                }
            }
            Op::AskJoin => return self.ask(Notice::AskToJoin),
            Op::JoinTeam => self.join_team(session, a(0)),
            Op::AskSleep => return self.ask(Notice::AskToSleep),
            Op::Sleep => rest_party(session),
            Op::FadeIn => return self.request(UiRequest::FadeIn),
            Op::FadeOut => return self.request(UiRequest::FadeOut),
            Op::Die => return self.request(UiRequest::PlayerDie),
            Op::InTeam => return Flow::Test(data.party.contains(&a(0))),
            Op::SetLayer => self.set_layer(session, a(0), a(1), a(2), a(3), a(4)),
            Op::HasItem => return Flow::Test(data.bag.count(a(0)) > 0),
            Op::SetPosition => {
                self.pos = (a(0) as i32, a(1) as i32);
                self.camera = self.pos;
                self.requests.push(UiRequest::MovePlayer {
                    x: self.pos.0,
                    y: self.pos.1,
                    direction: self.direction,
                });
            }
            Op::TeamFull => return Flow::Test(data.party_full()),
            Op::LeaveTeam => {
                action::leave_team(data, a(0));
            }
            Op::DrainMp => {
                let ids: Vec<i16> = data.members().collect();
                for id in ids {
                    if let Some(c) = data.character_mut(id) {
                        c.mp = 0;
                    }
                }
            }
            Op::SetPoison => {
                if let Some(c) = data.character_mut(a(0)) {
                    c.poison = a(1);
                }
            }
            Op::MoveCamera => return self.start_path((a(0), a(1)), (a(2), a(3)), false),
            Op::AddEventIds => {
                let sub_map = if a(0) < 0 { self.sub_map } else { a(0) };
                if let Some(ev) = data.event_mut(sub_map, a(1)) {
                    for (slot, delta) in ev.event.iter_mut().zip([a(2), a(3), a(4)]) {
                        *slot = slot.wrapping_add(delta);
                    }
                }
            }
            Op::Animate => {
                return self.animate([AnimSlot::new(a(0), a(1), a(2)), AnimSlot::default(), AnimSlot::default()]);
            }
            Op::CheckIntegrity => {
                let passed = data.character(a(0)).is_some_and(|c| (a(1)..=a(2)).contains(&c.integrity));
                return Flow::Test(passed);
            }
            // the upper bound operand is unused
            Op::CheckAttack => return Flow::Test(data.character(a(0)).is_some_and(|c| c.attack >= a(1))),
            Op::WalkPath => return self.start_path((a(0), a(1)), (a(2), a(3)), true),
            Op::CheckMoney => return Flow::Test(data.bag.count(session.factors.money_item) >= a(0)),
            Op::AddItemQuiet => data.bag.add(a(0), a(1)),
            Op::LearnSkill => return self.learn_skill(session, a(0), a(1), a(2) != 0),
            Op::AddPotential => return self.add_stat(session, a(0), PropType::Potential, a(1)),
            Op::SetSkill => {
                let slot = usize::try_from(a(1)).ok().filter(|&s| s < SKILL_SLOTS);
                if let (Some(c), Some(slot)) = (data.character_mut(a(0)), slot) {
                    c.skill_id[slot] = a(2);
                    c.skill_level[slot] = a(3);
                }
            }
            Op::CheckSex => {
                let passed = if a(0) < 256 {
                    data.character(PROTAGONIST).is_some_and(|c| c.sex == a(0))
                } else {
                    self.ram.get(CMP_RESULT) == 0
                };
                return Flow::Test(passed);
            }
            Op::AddIntegrity => {
                if let Some(c) = data.character_mut(PROTAGONIST) {
                    c.integrity = clamp_add(c.integrity, a(0) as i32, STAT_MAX);
                }
            }
            Op::ReplaceLayerTex => self.replace_layer_tex(session, a(0), a(1), a(2), a(3)),
            Op::OpenSubMap => {
                if let Some(m) = data.sub_map_mut(a(0)) {
                    m.enter_condition = 0;
                }
            }
            Op::Face => {
                if let Some(direction) = Direction::from_index(a(0)) {
                    self.direction = direction;
                    self.requests.push(UiRequest::MovePlayer {
                        x: self.pos.0,
                        y: self.pos.1,
                        direction,
                    });
                }
            }
            Op::GiveItem => give_item(session, a(0), a(1), a(2)),
            Op::FemaleInTeam => {
                let passed = data.members().any(|id| data.character(id).is_some_and(|c| c.sex == 1));
                return Flow::Test(passed);
            }
            Op::Animate2 => {
                return self.animate([
                    AnimSlot::new(a(0), a(1), a(2)),
                    AnimSlot::new(a(3), a(4), a(5)),
                    AnimSlot::default(),
                ]);
            }
            Op::AddSpeed => return self.add_stat(session, a(0), PropType::Speed, a(1)),
            Op::AddMaxMp => return self.add_stat(session, a(0), PropType::MaxMp, a(1)),
            Op::AddAttack => return self.add_stat(session, a(0), PropType::Attack, a(1)),
            Op::AddMaxHp => return self.add_stat(session, a(0), PropType::MaxHp, a(1)),
            Op::SetMpType => {
                if let Some(c) = data.character_mut(a(0)) {
                    c.mp_type = a(1);
                }
            }
            Op::HasFiveItems => return Flow::Test(ins.args.iter().all(|&item| data.bag.count(item) > 0)),
            Op::Extended => {
                let operands = std::array::from_fn(a);
                return self.run_extended(session, operands);
            }
            Op::TutorialTalk => {
                let talk = TUTORIAL_TALK + session.rng.rn2(TUTORIAL_TALKS) as i16;
                return self.talk(talk, TUTORIAL_HEAD, 0);
            }
            Op::ShowIntegrity => {
                if let Some(c) = data.character(PROTAGONIST) {
                    return self.request(UiRequest::Message(Notice::Integrity(c.integrity)));
                }
            }
            Op::ShowReputation => {
                if let Some(c) = data.character(PROTAGONIST) {
                    return self.request(UiRequest::Message(Notice::Reputation(c.reputation)));
                }
            }
            Op::OpenWorld => {
                for m in &mut data.sub_maps {
                    m.enter_condition = 0;
                }
                for (id, condition) in WORLD_EXCEPTIONS {
                    if let Some(m) = data.sub_map_mut(id) {
                        m.enter_condition = condition;
                    }
                }
            }
            Op::CheckEvent => {
                let passed = data.event(self.sub_map, a(0)).is_some_and(|ev| ev.event[0] == a(1));
                return Flow::Test(passed);
            }
            Op::AddReputation => self.add_reputation(session, a(0)),
            Op::RemoveBarrier => {
                let flow = self.animate([AnimSlot::new(-1, 3832 * 2, 3844 * 2), AnimSlot::default(), AnimSlot::default()]);
                self.pending.push_back(subevent::barrier_doors());
                return flow;
            }
            Op::Tournament => self.pending.extend(subevent::tournament(&mut session.rng)),
            Op::Disband => action::disband_party(data),
            Op::CheckEventTex => {
                let sub_map = if a(0) < 0 { self.sub_map } else { a(0) };
                let tex = a(2);
                let passed = data
                    .event(sub_map, a(1))
                    .is_some_and(|ev| ev.curr_tex == tex || ev.beg_tex == tex || ev.end_tex == tex);
                return Flow::Test(passed);
            }
            Op::AllStoryBooks => {
                let passed = (11..=24).all(|i| data.event(self.sub_map, i).is_some_and(|ev| ev.curr_tex == STORY_BOOK_TEX));
                return Flow::Test(passed);
            }
            Op::GoHome => {
                self.show_player = false;
                self.requests.push(UiRequest::ShowPlayer(false));
                self.pending.push_back(SubEvent::EndScreen);
                return self.animate([
                    AnimSlot::new(a(0), a(1), a(2)),
                    AnimSlot::new(a(3), a(4), a(5)),
                    AnimSlot::default(),
                ]);
            }
            Op::SetSex => {
                if let Some(c) = data.character_mut(a(0)) {
                    c.sex = a(1);
                }
            }
            Op::OpenShop => return self.open_shop(session),
            Op::RandomShop => self.random_shop(session),
            Op::PlayMusic => self.requests.push(UiRequest::PlayMusic(a(0))),
            Op::PlaySound => self.requests.push(UiRequest::PlaySound(a(0))),
        }
        Flow::Next
    }

    /// Run one queued set-piece step. Returns false when it waits for
    /// the window.
    fn run_sub_event(&mut self, session: &mut Session, step: SubEvent) -> bool {
        trace!("set piece step {step:?}");
        match step {
            SubEvent::ClosePopup => self.requests.push(UiRequest::ClosePopup),
            SubEvent::Talk { talk, head, position } => return self.talk(talk, head, position) == Flow::Next,
            SubEvent::AddItem { item, count } => return self.add_item(session, item, count) == Flow::Next,
            SubEvent::Battle(battle) => {
                self.requests.push(UiRequest::EnterBattle {
                    battle,
                    exp_on_lose: false,
                    dead_on_lose: true,
                });
                return false;
            }
            SubEvent::Sleep => rest_party(session),
            SubEvent::FadeOut => return self.request(UiRequest::FadeOut) == Flow::Next,
            SubEvent::FadeIn => return self.request(UiRequest::FadeIn) == Flow::Next,
            SubEvent::Animate(slots) => return self.animate(slots) == Flow::Next,
            SubEvent::EndScreen => self.requests.push(UiRequest::EndScreen),
        }
        true
    }

    fn request(&mut self, request: UiRequest) -> Flow {
        self.requests.push(request);
        Flow::Suspend
    }

    fn talk(&mut self, talk: i16, head: i16, position: i16) -> Flow {
        self.request(UiRequest::Talk { talk, head, position })
    }

    fn ask(&mut self, notice: Notice) -> Flow {
        self.requests.push(UiRequest::YesNo(notice));
        Flow::Ask
    }

    fn add_item(&mut self, session: &mut Session, item: i16, count: i16) -> Flow {
        session.data.bag.add(item, count);
        self.request(UiRequest::Message(Notice::ItemGained { item, count }))
    }

    fn animate(&mut self, slots: [AnimSlot; 3]) -> Flow {
        if self.sub_map < 0 {
            return Flow::Next;
        }
        self.anim = slots;
        Flow::Suspend
    }

    /// Walk along x first, then along y. The script resumes when the
    /// last cell is reached.
    fn start_path(&mut self, from: (i16, i16), to: (i16, i16), player: bool) -> Flow {
        if self.sub_map < 0 {
            return Flow::Next;
        }
        let (x0, y0) = (from.0 as i32, from.1 as i32);
        let (x1, y1) = (to.0 as i32, to.1 as i32);
        self.moving_player = player;
        self.moving.clear();
        let dy = if y0 < y1 { -1 } else { 1 };
        let mut y = y1;
        while y != y0 {
            self.moving.push((x1, y));
            y += dy;
        }
        let dx = if x0 < x1 { -1 } else { 1 };
        let mut x = x1;
        while x != x0 {
            self.moving.push((x, y0));
            x += dx;
        }
        if self.moving.is_empty() {
            return Flow::Next;
        }
        Flow::Suspend
    }

    /// Edit one cell event. Fields given as -2 or less keep their value;
    /// negative coordinates keep the position.
    fn modify_event(&mut self, session: &mut Session, args: &[i16]) {
        let &[sub_map, event, blocked, index, e0, e1, e2, curr_tex, end_tex, beg_tex, tex_delay, x, y] = args else {
            return;
        };
        let sub_map = if sub_map < 0 { self.sub_map } else { sub_map };
        let event = if event < 0 { self.event_index } else { event };
        if sub_map < 0 || event < 0 {
            return;
        }
        let Some(ev) = session.data.event_mut(sub_map, event) else {
            warn!("event {event} of submap {sub_map} does not exist");
            return;
        };
        let keep = |v: i16| v <= -2;
        for (field, value) in ev.event.iter_mut().zip([e0, e1, e2]) {
            if !keep(value) {
                *field = value;
            }
        }
        for (field, value) in [
            (&mut ev.blocked, blocked),
            (&mut ev.index, index),
            (&mut ev.end_tex, end_tex),
            (&mut ev.beg_tex, beg_tex),
            (&mut ev.tex_delay, tex_delay),
        ] {
            if !keep(value) {
                *field = value;
            }
        }
        let old = (ev.x, ev.y);
        let to = (if x < 0 { ev.x } else { x }, if y < 0 { ev.y } else { y });
        ev.x = to.0;
        ev.y = to.1;
        if !keep(curr_tex) {
            ev.curr_tex = curr_tex;
        }

        let current = sub_map == self.sub_map;
        if to != old {
            if let Some(layers) = session.data.layers_mut(sub_map) {
                layers.set(layer::EVENT as i32, old.0 as i32, old.1 as i32, -1);
                layers.set(layer::EVENT as i32, to.0 as i32, to.1 as i32, event);
            }
            if current {
                self.requests.push(UiRequest::RedrawCell {
                    x: old.0 as i32,
                    y: old.1 as i32,
                    layer: layer::EVENT,
                    tex: -1,
                });
            }
        }
        if current && !keep(curr_tex) {
            self.requests.push(UiRequest::RedrawCell {
                x: to.0 as i32,
                y: to.1 as i32,
                layer: layer::EVENT,
                tex: curr_tex >> 1,
            });
        }
    }

    fn set_layer(&mut self, session: &mut Session, sub_map: i16, layer: i16, x: i16, y: i16, value: i16) {
        let sub_map = if sub_map < 0 { self.sub_map } else { sub_map };
        let (x, y) = (x as i32, y as i32);
        let written = session
            .data
            .layers_mut(sub_map)
            .is_some_and(|l| l.set(layer as i32, x, y, value));
        if written && sub_map == self.sub_map {
            self.requests.push(UiRequest::RedrawCell {
                x,
                y,
                layer: layer as usize,
                tex: value >> 1,
            });
        }
    }

    fn replace_layer_tex(&mut self, session: &mut Session, sub_map: i16, layer: i16, old: i16, new: i16) {
        let sub_map = if sub_map < 0 { self.sub_map } else { sub_map };
        let Ok(layer) = usize::try_from(layer) else {
            return;
        };
        let Some(cells) = session.data.layers_mut(sub_map).and_then(|l| l.layer_mut(layer)) else {
            return;
        };
        let mut changed = Vec::new();
        for (i, cell) in cells.iter_mut().enumerate() {
            if *cell == old {
                *cell = new;
                changed.push(i);
            }
        }
        if sub_map != self.sub_map {
            return;
        }
        let size = MAP_SIZE;
        for i in changed {
            self.requests.push(UiRequest::RedrawCell {
                x: (i % size) as i32,
                y: (i / size) as i32,
                layer,
                tex: new >> 1,
            });
        }
    }

    /// Put `char_id` in the first free party slot. Items it carries move
    /// to the bag, each announced in turn.
    fn join_team(&mut self, session: &mut Session, char_id: i16) {
        let data = &mut session.data;
        let Some(slot) = data.party.iter().position(|&id| id < 0) else {
            warn!("party is full, character {char_id} cannot join");
            return;
        };
        data.party[slot] = char_id;
        let Some(c) = data.character_mut(char_id) else {
            return;
        };
        for s in 0..CARRY_SLOTS {
            if c.item[s] < 0 {
                continue;
            }
            let count = if c.item_count[s] == 0 { 1 } else { c.item_count[s] };
            self.pending.push_back(SubEvent::AddItem { item: c.item[s], count });
            c.item[s] = -1;
            c.item_count[s] = 0;
        }
    }

    /// Teach `skill_id`, or raise it one level if already known.
    fn learn_skill(&mut self, session: &mut Session, char_id: i16, skill_id: i16, quiet: bool) -> Flow {
        let Some(learn_id) = session.data.skill(skill_id).map(|s| s.id) else {
            return Flow::Next;
        };
        let Some(c) = session.data.character_mut(char_id) else {
            return Flow::Next;
        };
        let mut free = None;
        let mut known = false;
        for slot in 0..SKILL_SLOTS {
            if c.skill_id[slot] == learn_id {
                if c.skill_level[slot] + SKILL_LEVEL_STEP <= SKILL_LEVEL_MAX {
                    c.skill_level[slot] += SKILL_LEVEL_STEP;
                }
                known = true;
                break;
            }
            if c.skill_id[slot] <= 0 && free.is_none() {
                free = Some(slot);
            }
        }
        if !known {
            match free {
                Some(slot) => {
                    c.skill_id[slot] = learn_id;
                    c.skill_level[slot] = 0;
                }
                None => debug!("character {char_id} has no free skill slot"),
            }
        }
        if quiet {
            return Flow::Next;
        }
        self.request(UiRequest::Message(Notice::SkillLearned { char_id, skill: skill_id }))
    }

    fn add_stat(&mut self, session: &mut Session, char_id: i16, prop: PropType, value: i16) -> Flow {
        let Some(c) = session.data.character_mut(char_id) else {
            return Flow::Next;
        };
        let (field, max) = match prop {
            PropType::Potential => (&mut c.potential, STAT_MAX),
            PropType::Speed => (&mut c.speed, STAT_MAX),
            PropType::Attack => (&mut c.attack, STAT_MAX),
            PropType::MaxMp => (&mut c.max_mp, MP_MAX),
            PropType::MaxHp => (&mut c.max_hp, HP_MAX),
            _ => return Flow::Next,
        };
        *field = clamp_add(*field, value as i32, max);
        self.request(UiRequest::Message(Notice::StatRaised { char_id, prop, value }))
    }

    fn add_reputation(&mut self, session: &mut Session, value: i16) {
        let Some(c) = session.data.character_mut(PROTAGONIST) else {
            return;
        };
        let old = c.reputation;
        c.reputation = clamp_add(old, value as i32, REPUTATION_MAX);
        let new = c.reputation;
        if old <= FAME_THRESHOLD && new > FAME_THRESHOLD {
            debug!("reputation {new} opens the fame event");
            self.modify_event(session, &FAME_EVENT);
        }
    }

    /// Greet at the travelling shop and open it. Its exit cells get the
    /// relocation script.
    fn open_shop(&mut self, session: &mut Session) -> Flow {
        if self.sub_map < 0 {
            return Flow::Next;
        }
        let relocate = session.factors.random_shop_event;
        let site = session.factors.shop_sites.iter().position(|s| s.sub_map == self.sub_map);
        if let Some(i) = site {
            for &n in &session.factors.shop_sites[i].exit_events {
                if n > 0
                    && let Some(ev) = session.data.event_mut(self.sub_map, n)
                {
                    ev.event[2] = relocate;
                }
            }
        }
        self.requests.push(UiRequest::Talk {
            talk: SHOP_TALK,
            head: SHOP_HEAD,
            position: 0,
        });
        if let Some(i) = site {
            self.requests.push(UiRequest::OpenShop(i));
        }
        Flow::Suspend
    }

    /// Move the travelling shop from this submap to a random site.
    fn random_shop(&mut self, session: &mut Session) {
        if self.sub_map < 0 {
            return;
        }
        let factors = &session.factors;
        if let Some(site) = factors.shop_sites.iter().find(|s| s.sub_map == self.sub_map) {
            if let Some(ev) = session.data.event_mut(self.sub_map, site.shop_event) {
                ev.blocked = 0;
                ev.event[0] = -1;
                ev.curr_tex = -1;
                ev.beg_tex = -1;
                ev.end_tex = -1;
            }
            for &n in &site.exit_events {
                if n > 0
                    && let Some(ev) = session.data.event_mut(self.sub_map, n)
                {
                    ev.event[2] = -1;
                }
            }
        }
        if factors.shop_sites.is_empty() {
            return;
        }
        let pick = session.rng.rn2(factors.shop_sites.len() as i32) as usize;
        let site = &factors.shop_sites[pick];
        debug!("shop moves to submap {}", site.sub_map);
        if let Some(ev) = session.data.event_mut(site.sub_map, site.shop_event) {
            ev.blocked = 1;
            ev.event[0] = factors.shop_event;
            ev.curr_tex = factors.shop_event_tex;
            ev.beg_tex = factors.shop_event_tex;
            ev.end_tex = factors.shop_event_tex;
        }
    }
}

/// A night's rest: every member back to full.
fn rest_party(session: &mut Session) {
    let ids: Vec<i16> = session.data.members().collect();
    for id in ids {
        if let Some(c) = session.data.character_mut(id) {
            c.stamina = STAMINA_MAX;
            c.hp = c.max_hp;
            c.mp = c.max_mp;
            c.hurt = 0;
            c.poisoned = 0;
        }
    }
}

/// Add `count` of `item` to what `char_id` carries, stacking onto a
/// slot that holds it or taking the first free slot.
fn give_item(session: &mut Session, char_id: i16, item: i16, count: i16) {
    let Some(c) = session.data.character_mut(char_id) else {
        return;
    };
    if let Some(slot) = (0..CARRY_SLOTS).find(|&s| c.item[s] >= 0 && c.item[s] == item) {
        c.item_count[slot] = c.item_count[slot].saturating_add(count);
        return;
    }
    match c.item.iter().position(|&id| id < 0) {
        Some(slot) => {
            c.item[slot] = item;
            c.item_count[slot] = count;
        }
        None => debug!("character {char_id} has no free carry slot for item {item}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameRng;
    use crate::testing::{event_session, place};

    fn start(script: Vec<i16>) -> (Session, EventVm) {
        let mut session = event_session(vec![vec![], script], GameRng::scripted([0; 16]));
        let mut vm = EventVm::new();
        vm.enter(0, 10, 10, Direction::Right);
        vm.run_event(&mut session, 1).unwrap();
        (session, vm)
    }

    #[test]
    fn test_talk_suspends_until_continued() {
        let (mut session, mut vm) = start(vec![1, 300, 5, 0]);
        assert_eq!(
            vm.take_requests(),
            vec![UiRequest::Talk {
                talk: 300,
                head: 5,
                position: 0
            }]
        );
        assert!(vm.is_running());
        vm.continue_events(&mut session, false);
        assert!(!vm.is_running());
        assert_eq!(vm.script_id(), -1);
    }

    #[test]
    fn test_missing_script() {
        let mut session = event_session(vec![], GameRng::new(1));
        let mut vm = EventVm::new();
        assert!(matches!(vm.run_event(&mut session, 4), Err(CoreError::MissingEvent(4))));
        assert!(!vm.is_running());
    }

    #[test]
    fn test_predicate_branches() {
        // in team? skip the add when true
        let script = vec![16, 0, 3, 0, 32, 7, 1, 32, 8, 1];
        let (session, vm) = start(script);
        assert!(!vm.is_running());
        assert_eq!(session.data.bag.count(7), 0);
        assert_eq!(session.data.bag.count(8), 1);
    }

    #[test]
    fn test_yes_no_resumes_on_answer() {
        let script = vec![5, 4, 0, 32, 1, 1, 0, 0, 32, 2, 1];
        let (mut session, mut vm) = start(script.clone());
        assert_eq!(vm.take_requests(), vec![UiRequest::YesNo(Notice::AskForBattle)]);
        vm.continue_events(&mut session, true);
        assert_eq!((session.data.bag.count(1), session.data.bag.count(2)), (0, 1));

        let (mut session, mut vm) = start(script);
        vm.continue_events(&mut session, false);
        assert_eq!((session.data.bag.count(1), session.data.bag.count(2)), (1, 1));
    }

    #[test]
    fn test_battle_branches_on_result() {
        let (mut session, mut vm) = start(vec![6, 12, 3, 0, 1, 32, 1, 1, 32, 2, 1]);
        assert_eq!(
            vm.take_requests(),
            vec![UiRequest::EnterBattle {
                battle: 12,
                exp_on_lose: true,
                dead_on_lose: false
            }]
        );
        vm.continue_events(&mut session, true);
        assert_eq!((session.data.bag.count(1), session.data.bag.count(2)), (0, 1));
    }

    #[test]
    fn test_exit_script_stops() {
        let (session, vm) = start(vec![7, 32, 1, 1]);
        assert!(!vm.is_running());
        assert_eq!(session.data.bag.count(1), 0);
    }

    #[test]
    fn test_unknown_opcode_is_skipped() {
        let (session, _) = start(vec![99, 32, 3, 2]);
        assert_eq!(session.data.bag.count(3), 2);
    }

    #[test]
    fn test_interact_runs_faced_event() {
        let mut session = event_session(vec![vec![], vec![32, 4, 1]], GameRng::new(1));
        session.data.layers_mut(0).unwrap().set(layer::EVENT as i32, 11, 10, 5);
        session.data.event_mut(0, 5).unwrap().event[0] = 1;
        let mut vm = EventVm::new();
        vm.enter(0, 10, 10, Direction::Left);
        assert!(!vm.interact(&mut session));
        vm.enter(0, 10, 10, Direction::Right);
        assert!(vm.interact(&mut session));
        assert_eq!(session.data.bag.count(4), 1);
    }

    #[test]
    fn test_used_item_check() {
        let script = vec![4, 9, 0, 4, 32, 1, 1, 7, 32, 2, 1];
        let mut session = event_session(vec![vec![], script], GameRng::new(1));
        session.data.layers_mut(0).unwrap().set(layer::EVENT as i32, 10, 9, 0);
        session.data.event_mut(0, 0).unwrap().event[1] = 1;
        let mut vm = EventVm::new();
        vm.enter(0, 10, 10, Direction::Up);
        assert!(vm.use_item(&mut session, 9));
        assert_eq!((session.data.bag.count(1), session.data.bag.count(2)), (1, 0));
    }

    #[test]
    fn test_modify_event_moves_cell() {
        let (session, mut vm) = start(vec![3, -1, 0, 1, -2, 40, -2, -2, 10, -2, -2, -2, 6, 7]);
        let ev = session.data.event(0, 0).unwrap();
        assert_eq!((ev.blocked, ev.index, ev.event), (1, 0, [40, -1, -1]));
        assert_eq!(ev.curr_tex, 10);
        assert_eq!((ev.x, ev.y), (6, 7));
        let layers = session.data.layers(0).unwrap();
        assert_eq!(layers.get(layer::EVENT as i32, 6, 7), Some(0));
        assert_eq!(
            vm.take_requests(),
            vec![
                UiRequest::RedrawCell {
                    x: 0,
                    y: 0,
                    layer: 3,
                    tex: -1
                },
                UiRequest::RedrawCell {
                    x: 6,
                    y: 7,
                    layer: 3,
                    tex: 5
                },
            ]
        );
    }

    #[test]
    fn test_join_team_hands_over_items() {
        let mut session = event_session(vec![vec![], vec![10, 2]], GameRng::new(1));
        let c = session.data.character_mut(2).unwrap();
        c.item = [6, -1, -1, -1];
        c.item_count = [0, 0, 0, 0];
        let mut vm = EventVm::new();
        vm.enter(0, 1, 1, Direction::Down);
        vm.run_event(&mut session, 1).unwrap();
        assert_eq!(session.data.party[1], 2);
        assert_eq!(session.data.bag.count(6), 1);
        assert_eq!(
            vm.take_requests(),
            vec![UiRequest::Message(Notice::ItemGained { item: 6, count: 1 })]
        );
        assert!(vm.is_running());
        vm.continue_events(&mut session, false);
        assert!(!vm.is_running());
        assert_eq!(session.data.character(2).unwrap().item[0], -1);
    }

    #[test]
    fn test_learn_skill_and_level() {
        let mut session = event_session(vec![vec![], vec![33, 1, 3, 1, 33, 1, 3, 0]], GameRng::new(1));
        place(
            &mut session.data.skills,
            3,
            crate::data::SkillRecord {
                id: 3,
                ..Default::default()
            },
        );
        let mut vm = EventVm::new();
        vm.run_event(&mut session, 1).unwrap();
        let c = session.data.character(1).unwrap();
        assert_eq!((c.skill_id[0], c.skill_level[0]), (3, 100));
        assert_eq!(
            vm.take_requests(),
            vec![UiRequest::Message(Notice::SkillLearned { char_id: 1, skill: 3 })]
        );
    }

    #[test]
    fn test_stat_gain_is_clamped() {
        let (session, mut vm) = start(vec![47, 1, 150]);
        assert_eq!(session.data.character(1).unwrap().attack, 100);
        assert_eq!(
            vm.take_requests(),
            vec![UiRequest::Message(Notice::StatRaised {
                char_id: 1,
                prop: PropType::Attack,
                value: 150
            })]
        );
    }

    #[test]
    fn test_walk_path_moves_player_then_resumes() {
        let (mut session, mut vm) = start(vec![30, 10, 10, 12, 11, 32, 1, 1]);
        assert!(vm.is_running());
        let mut cells = Vec::new();
        for _ in 0..3 {
            vm.frame(&mut session);
            cells.push(vm.position());
        }
        assert_eq!(cells, vec![(11, 10), (12, 10), (12, 11)]);
        assert_eq!(vm.direction(), Direction::Down);
        assert!(!vm.is_running());
        assert_eq!(session.data.bag.count(1), 1);
    }

    #[test]
    fn test_empty_path_does_not_stall() {
        let (session, vm) = start(vec![25, 3, 3, 3, 3, 32, 1, 1]);
        assert!(!vm.is_running());
        assert_eq!(session.data.bag.count(1), 1);
    }

    #[test]
    fn test_animation_updates_event_texture() {
        let (mut session, mut vm) = start(vec![27, 4, 10, 12]);
        vm.take_requests();
        vm.frame(&mut session);
        assert_eq!(session.data.event(0, 4).unwrap().curr_tex, 11);
        vm.frame(&mut session);
        assert_eq!(session.data.event(0, 4).unwrap().curr_tex, 12);
        assert!(vm.is_running());
        vm.frame(&mut session);
        assert!(!vm.is_running());
        let redraws = vm
            .take_requests()
            .into_iter()
            .filter(|r| matches!(r, UiRequest::RedrawCell { .. }))
            .count();
        assert_eq!(redraws, 2);
    }

    #[test]
    fn test_tournament_queues_bouts() {
        let (mut session, mut vm) = start(vec![58]);
        let first = vm.take_requests();
        assert!(matches!(first[..], [UiRequest::Talk { talk: 2854, .. }]));
        vm.continue_events(&mut session, false);
        assert_eq!(
            vm.take_requests(),
            vec![
                UiRequest::ClosePopup,
                UiRequest::EnterBattle {
                    battle: 102,
                    exp_on_lose: false,
                    dead_on_lose: true
                }
            ]
        );
        assert!(vm.is_running());
    }

    #[test]
    fn test_random_shop_relocates() {
        let mut session = event_session(vec![vec![], vec![65]], GameRng::scripted([0]));
        session.factors.shop_sites = vec![crate::world::ShopSite {
            sub_map: 0,
            shop_event: 16,
            exit_events: vec![17],
        }];
        session.data.event_mut(0, 17).unwrap().event[2] = 939;
        let mut vm = EventVm::new();
        vm.enter(0, 1, 1, Direction::Down);
        vm.run_event(&mut session, 1).unwrap();
        let shop = session.data.event(0, 16).unwrap();
        assert_eq!((shop.blocked, shop.event[0], shop.curr_tex), (1, 938, 8256));
        assert_eq!(session.data.event(0, 17).unwrap().event[2], -1);
    }

    #[test]
    fn test_reputation_opens_fame_event() {
        let mut session = event_session(vec![vec![], vec![56, 30]], GameRng::new(1));
        session.data.sub_map_events.resize(71, crate::data::submap::empty_events());
        session.data.sub_map_layers.resize(71, Default::default());
        session.data.character_mut(0).unwrap().reputation = 190;
        let mut vm = EventVm::new();
        vm.run_event(&mut session, 1).unwrap();
        assert_eq!(session.data.character(0).unwrap().reputation, 220);
        let ev = session.data.event(70, 11).unwrap();
        assert_eq!((ev.event[0], ev.curr_tex, ev.x, ev.y), (932, 7968, 18, 21));
    }

    #[test]
    fn test_sleep_restores_party() {
        let (session, _) = start(vec![12]);
        let c = session.data.character(0).unwrap();
        assert_eq!((c.hp, c.mp, c.stamina), (100, 100, 100));
    }

    #[test]
    fn test_give_item_stacks() {
        let (session, _) = start(vec![41, 1, 9, 2, 41, 1, 9, 3]);
        let c = session.data.character(1).unwrap();
        assert_eq!((c.item[0], c.item_count[0]), (9, 5));
    }
}
