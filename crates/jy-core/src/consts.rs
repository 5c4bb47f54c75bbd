//! Game constants
//!
//! Record counts and stat ceilings shared by the battle engine and the event VM.

/// Number of party slots
pub const PARTY_SIZE: usize = 6;

/// Number of equipment slots per character (weapon, armour)
pub const EQUIP_SLOTS: usize = 2;

/// Number of carried-item slots per character
pub const CARRY_SLOTS: usize = 4;

/// Number of learned skill slots per character
pub const SKILL_SLOTS: usize = 10;

/// Number of per-level entries in a skill record
pub const SKILL_LEVELS: usize = 10;

/// Number of enemy slots in a battle definition
pub const BATTLE_ENEMIES: usize = 20;

/// Number of event records per submap
pub const SUBMAP_EVENTS: usize = 200;

/// Number of layers per submap (earth, building, decoration, event, and two height layers)
pub const SUBMAP_LAYERS: usize = 6;

/// Width and height of submaps and battle maps
pub const MAP_SIZE: usize = 64;

/// Skill levels are stored as `level * 100 + progress`
pub const SKILL_LEVEL_STEP: i16 = 100;

pub const STAMINA_MAX: i16 = 100;
pub const HP_MAX: i16 = 999;
pub const MP_MAX: i16 = 999;
pub const LEVEL_MAX: i16 = 30;
pub const SKILL_LEVEL_MAX: i16 = 999;
pub const EXP_MAX: u16 = u16::MAX;

/// Ceiling for attack, defence, speed and the trained skills
pub const STAT_MAX: i16 = 100;
pub const POISONED_MAX: i16 = 100;
pub const HURT_MAX: i16 = 100;
pub const REPUTATION_MAX: i16 = 999;

/// Minimum knowledge stat for a combatant to count toward its side's knowledge total
pub const KNOWLEDGE_BARRIER: i16 = 80;

/// Default cost of one level up, indexed by `level - 1`
pub const LEVEL_UP_EXP: [i16; 29] = [
    50, 150, 300, 500, 750, 1050, 1400, 1800, 2250, 2750, 3300, 3900, 4550, 5250, 6000, 6800,
    7650, 8550, 9500, 10500, 11550, 12650, 13800, 15000, 16250, 17550, 18900, 20300, 21750,
];

/// Protagonist character id
pub const PROTAGONIST: i16 = 0;
