//! Requests and input exchanged with the window collaborator
//!
//! The battle engine and the event VM never draw, play audio or own
//! widgets. They queue [`UiRequest`]s and wait for the matching input
//! call (a key, a menu choice, a popup closing) to continue.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::action::{Changes, PropType};

/// Keys the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Ok,
    Space,
    Cancel,
    Other,
}

impl Key {
    pub fn direction(self) -> Option<Direction> {
        match self {
            Key::Up => Some(Direction::Up),
            Key::Right => Some(Direction::Right),
            Key::Left => Some(Direction::Left),
            Key::Down => Some(Direction::Down),
            _ => None,
        }
    }
}

/// Facing on the isometric maps, in save-file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum Direction {
    Up,
    Right,
    Left,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Left, Direction::Down];

    pub fn index(self) -> i16 {
        self as i16
    }

    pub fn from_index(index: i16) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i)).copied()
    }

    /// Unit step `(dx, dy)`; up is toward y = 0.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Left => (-1, 0),
            Direction::Down => (0, 1),
        }
    }

    /// Facing from `from` toward `to`. The dominant axis wins; horizontal
    /// on ties.
    pub fn facing(from: (i32, i32), to: (i32, i32)) -> Self {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        if dy.abs() > dx.abs() {
            if dy < 0 { Direction::Up } else { Direction::Down }
        } else if dx < 0 {
            Direction::Left
        } else if dx > 0 {
            Direction::Right
        } else if dy < 0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

/// Entries of the battle player menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum MenuOption {
    Move,
    Attack,
    Poison,
    Depoison,
    Medic,
    Item,
    Wait,
    Status,
    Rest,
    Auto,
}

/// Colour class of a floating battle number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum Tone {
    Damage,
    Drain,
    Poison,
    Depoison,
    Heal,
}

/// Fixed-text notices; the window resolves names and wording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Notice {
    Won,
    Lost,
    ExpGained { char_id: i16, exp: i32 },
    LevelUp { char_id: i16 },
    LearnedItem { char_id: i16, item: i16 },
    SkillLevel { skill: i16, level: i16 },
    ItemMade { char_id: i16, item: i16 },
    NoUsableSkill,
    AskForBattle,
    AskToJoin,
    AskToSleep,
    ItemGained { item: i16, count: i16 },
    SkillLearned { char_id: i16, skill: i16 },
    StatRaised { char_id: i16, prop: PropType, value: i16 },
    Integrity(i16),
    Reputation(i16),
}

/// One battle-end message. Messages with a nonzero `offset` are shown
/// together with the preceding group, `offset` rows below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishMessage {
    pub offset: u8,
    pub notice: Notice,
}

impl FinishMessage {
    pub fn new(offset: u8, notice: Notice) -> Self {
        Self { offset, notice }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiRequest {
    PlayMusic(i16),
    PlaySound(i16),
    PlayEffectSound(i16),
    /// Press-to-close message; closing it resumes the caller.
    Message(Notice),
    /// Yes/no prompt; the answer resumes the caller.
    YesNo(Notice),
    ClosePopup,

    /// Status panel of the acting combatant.
    ShowStatus { char_id: i16, side: u8 },
    PlayerMenu { options: Vec<MenuOption>, selected: usize },
    /// Usable skill slots of the actor.
    SkillMenu { slots: Vec<usize> },
    DirectionPrompt,
    /// Bag view for the actor; answered with a use, throw or cancel.
    ItemView { char_id: i16 },
    ItemUsed { char_id: i16, item: i16, changes: Changes },
    PopupNumber { x: i32, y: i32, value: i16, tone: Tone },
    /// `(side, id)` of every combatant, for the status list.
    Roster(Vec<(u8, i16)>),
    BattleResults(Vec<FinishMessage>),
    EndBattle { won: bool, dead: bool },

    Talk { talk: i16, head: i16, position: i16 },
    EnterBattle { battle: i16, exp_on_lose: bool, dead_on_lose: bool },
    FadeIn,
    FadeOut,
    PlayerDie,
    OpenShop(usize),
    EndScreen,
    /// Redraw one submap cell; `tex` is already halved, -1 clears.
    RedrawCell { x: i32, y: i32, layer: usize, tex: i16 },
    MovePlayer { x: i32, y: i32, direction: Direction },
    MoveCamera { x: i32, y: i32 },
    ShowPlayer(bool),
    SetGlobalPosition { x: i16, y: i16 },

    ExtendedText { x: i16, y: i16, text: Vec<u8>, color: u8, shadow: u8 },
    ExtendedBox { x0: i16, y0: i16, x1: i16, y1: i16 },
    ExtendedTexture { kind: i16, index: i16, x: i16, y: i16 },
    /// Wait for any key; the VM resumes on the key.
    ExtendedWaitKey,
    ExtendedMenu { items: Vec<Vec<u8>>, x: i16, y: i16 },
    ExtendedCloseAfter(i16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_indices() {
        assert_eq!(Direction::Left.index(), 2);
        assert_eq!(Direction::from_index(3), Some(Direction::Down));
        assert_eq!(Direction::from_index(4), None);
        assert_eq!(Direction::from_index(-1), None);
    }

    #[test]
    fn test_facing() {
        assert_eq!(Direction::facing((5, 5), (5, 2)), Direction::Up);
        assert_eq!(Direction::facing((5, 5), (8, 6)), Direction::Right);
        assert_eq!(Direction::facing((5, 5), (4, 5)), Direction::Left);
        assert_eq!(Direction::facing((5, 5), (6, 9)), Direction::Down);
    }

    #[test]
    fn test_key_direction() {
        assert_eq!(Key::Left.direction(), Some(Direction::Left));
        assert_eq!(Key::Ok.direction(), None);
    }
}
