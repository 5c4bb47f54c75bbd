//! Opcode table and instruction decoding
//!
//! Scripts are flat streams of signed words. Each instruction is an
//! opcode followed by a fixed number of operands. Predicates carry two
//! more words, the offsets to skip when the test is true or false.

use strum::{Display, EnumIter};

/// How an opcode consumes the words after its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Shape {
    /// Operands only.
    Action,
    /// Operands, then the true and false skip offsets.
    Predicate,
    /// `battle, true offset, false offset, exp on lose`; always suspends
    /// until the battle result arrives.
    Battle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Op {
    ExitScript,
    ClosePopup,
    Talk,
    AddItem,
    ModifyEvent,
    UsedItem,
    AskBattle,
    Battle,
    ChangeExitMusic,
    AskJoin,
    JoinTeam,
    AskSleep,
    Sleep,
    FadeIn,
    FadeOut,
    Die,
    InTeam,
    SetLayer,
    HasItem,
    SetPosition,
    TeamFull,
    LeaveTeam,
    DrainMp,
    SetPoison,
    MoveCamera,
    AddEventIds,
    Animate,
    CheckIntegrity,
    CheckAttack,
    WalkPath,
    CheckMoney,
    AddItemQuiet,
    LearnSkill,
    AddPotential,
    SetSkill,
    CheckSex,
    AddIntegrity,
    ReplaceLayerTex,
    OpenSubMap,
    Face,
    GiveItem,
    FemaleInTeam,
    Animate2,
    AddSpeed,
    AddMaxMp,
    AddAttack,
    AddMaxHp,
    SetMpType,
    HasFiveItems,
    Extended,
    TutorialTalk,
    ShowIntegrity,
    ShowReputation,
    OpenWorld,
    CheckEvent,
    AddReputation,
    RemoveBarrier,
    Tournament,
    Disband,
    CheckEventTex,
    AllStoryBooks,
    GoHome,
    SetSex,
    OpenShop,
    RandomShop,
    PlayMusic,
    PlaySound,
}

impl Op {
    /// Opcode for `code`. Opcode 50 is the five-item check when its first
    /// operand is an item id of 128 or more, the extended dialect below.
    pub fn from_code(code: i16, first_operand: i16) -> Option<Op> {
        let op = match code {
            -1 | 7 => Op::ExitScript,
            0 => Op::ClosePopup,
            1 => Op::Talk,
            2 => Op::AddItem,
            3 => Op::ModifyEvent,
            4 => Op::UsedItem,
            5 => Op::AskBattle,
            6 => Op::Battle,
            8 => Op::ChangeExitMusic,
            9 => Op::AskJoin,
            10 => Op::JoinTeam,
            11 => Op::AskSleep,
            12 => Op::Sleep,
            13 => Op::FadeIn,
            14 => Op::FadeOut,
            15 | 24 => Op::Die,
            16 => Op::InTeam,
            17 => Op::SetLayer,
            18 | 43 => Op::HasItem,
            19 => Op::SetPosition,
            20 => Op::TeamFull,
            21 => Op::LeaveTeam,
            22 => Op::DrainMp,
            23 => Op::SetPoison,
            25 => Op::MoveCamera,
            26 => Op::AddEventIds,
            27 => Op::Animate,
            28 => Op::CheckIntegrity,
            29 => Op::CheckAttack,
            30 => Op::WalkPath,
            31 => Op::CheckMoney,
            32 => Op::AddItemQuiet,
            33 => Op::LearnSkill,
            34 => Op::AddPotential,
            35 => Op::SetSkill,
            36 => Op::CheckSex,
            37 => Op::AddIntegrity,
            38 => Op::ReplaceLayerTex,
            39 => Op::OpenSubMap,
            40 => Op::Face,
            41 => Op::GiveItem,
            42 => Op::FemaleInTeam,
            44 => Op::Animate2,
            45 => Op::AddSpeed,
            46 => Op::AddMaxMp,
            47 => Op::AddAttack,
            48 => Op::AddMaxHp,
            49 => Op::SetMpType,
            50 if first_operand >= 128 => Op::HasFiveItems,
            50 => Op::Extended,
            51 => Op::TutorialTalk,
            52 => Op::ShowIntegrity,
            53 => Op::ShowReputation,
            54 => Op::OpenWorld,
            55 => Op::CheckEvent,
            56 => Op::AddReputation,
            57 => Op::RemoveBarrier,
            58 => Op::Tournament,
            59 => Op::Disband,
            60 => Op::CheckEventTex,
            61 => Op::AllStoryBooks,
            62 => Op::GoHome,
            63 => Op::SetSex,
            64 => Op::OpenShop,
            65 => Op::RandomShop,
            66 => Op::PlayMusic,
            67 => Op::PlaySound,
            _ => return None,
        };
        Some(op)
    }

    /// Number of operands, not counting skip offsets.
    pub fn operands(self) -> usize {
        match self {
            Op::ExitScript
            | Op::ClosePopup
            | Op::AskBattle
            | Op::AskJoin
            | Op::AskSleep
            | Op::Sleep
            | Op::FadeIn
            | Op::FadeOut
            | Op::Die
            | Op::TeamFull
            | Op::DrainMp
            | Op::FemaleInTeam
            | Op::TutorialTalk
            | Op::ShowIntegrity
            | Op::ShowReputation
            | Op::OpenWorld
            | Op::RemoveBarrier
            | Op::Tournament
            | Op::Disband
            | Op::AllStoryBooks
            | Op::OpenShop
            | Op::RandomShop => 0,
            Op::UsedItem
            | Op::ChangeExitMusic
            | Op::JoinTeam
            | Op::InTeam
            | Op::HasItem
            | Op::LeaveTeam
            | Op::CheckMoney
            | Op::CheckSex
            | Op::AddIntegrity
            | Op::OpenSubMap
            | Op::Face
            | Op::AddReputation
            | Op::PlayMusic
            | Op::PlaySound => 1,
            Op::AddItem
            | Op::SetPosition
            | Op::SetPoison
            | Op::AddItemQuiet
            | Op::AddPotential
            | Op::AddSpeed
            | Op::AddMaxMp
            | Op::AddAttack
            | Op::AddMaxHp
            | Op::SetMpType
            | Op::CheckEvent
            | Op::SetSex => 2,
            Op::Talk
            | Op::Animate
            | Op::CheckIntegrity
            | Op::CheckAttack
            | Op::LearnSkill
            | Op::GiveItem
            | Op::CheckEventTex => 3,
            Op::Battle | Op::MoveCamera | Op::WalkPath | Op::SetSkill | Op::ReplaceLayerTex => 4,
            Op::SetLayer | Op::AddEventIds | Op::HasFiveItems => 5,
            Op::Animate2 | Op::GoHome => 6,
            Op::Extended => 7,
            Op::ModifyEvent => 13,
        }
    }

    pub fn shape(self) -> Shape {
        match self {
            Op::Battle => Shape::Battle,
            Op::UsedItem
            | Op::AskBattle
            | Op::AskJoin
            | Op::AskSleep
            | Op::InTeam
            | Op::HasItem
            | Op::TeamFull
            | Op::CheckIntegrity
            | Op::CheckAttack
            | Op::CheckMoney
            | Op::CheckSex
            | Op::FemaleInTeam
            | Op::HasFiveItems
            | Op::CheckEvent
            | Op::CheckEventTex
            | Op::AllStoryBooks => Shape::Predicate,
            _ => Shape::Action,
        }
    }

    /// Words the instruction occupies after the opcode.
    pub fn width(self) -> usize {
        match self.shape() {
            Shape::Predicate => self.operands() + 2,
            Shape::Action | Shape::Battle => self.operands(),
        }
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub code: i16,
    /// `None` for codes outside the table; those are skipped.
    pub op: Option<Op>,
    pub args: Vec<i16>,
    /// Skip offsets `(true, false)` of predicates and battles.
    pub branch: (i16, i16),
    /// Words consumed, opcode included.
    pub len: usize,
}

/// Decode the instruction at `at`. Returns `None` when the stream ends
/// before the instruction does.
pub fn decode(script: &[i16], at: usize) -> Option<Instruction> {
    let code = *script.get(at)?;
    let first = script.get(at + 1).copied().unwrap_or(0);
    let Some(op) = Op::from_code(code, first) else {
        return Some(Instruction {
            code,
            op: None,
            args: Vec::new(),
            branch: (0, 0),
            len: 1,
        });
    };
    let body = script.get(at + 1..at + 1 + op.width())?;
    let (args, branch) = match op.shape() {
        Shape::Action => (body.to_vec(), (0, 0)),
        Shape::Predicate => {
            let n = op.operands();
            (body[..n].to_vec(), (body[n], body[n + 1]))
        }
        Shape::Battle => (vec![body[0], body[3]], (body[1], body[2])),
    };
    Some(Instruction {
        code,
        op: Some(op),
        args,
        branch,
        len: 1 + op.width(),
    })
}
