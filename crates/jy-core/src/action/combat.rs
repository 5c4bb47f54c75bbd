//! Combat formulas
//!
//! Attack, defence and damage follow one core formula:
//! `(atk - def * 3) * 2 / 3`, falling back to `atk / 10` when negative,
//! then topped up by stamina and the target's hurt and scaled down with
//! distance. The prediction used by the AI is the same formula without
//! jitter.

use crate::GameRng;
use crate::action::{Rules, clamp_add};
use crate::consts::{HP_MAX, HURT_MAX, MP_MAX, POISONED_MAX, SKILL_LEVEL_MAX, SKILL_LEVEL_STEP, STAMINA_MAX, STAT_MAX};
use crate::data::{CharacterRecord, ItemRecord, SkillRecord};

/// Result of one resolved strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DamageOutcome {
    /// Hp lost by the defender, or minus the mp drained for draining skills.
    pub damage: i16,
    /// `old - new` poisoned of the defender (negative when poison rose).
    pub poisoned: i16,
    pub dead: bool,
}

/// Attack of `c` using `skill` at `level`, with side knowledge bonus.
///
/// Equipment bonuses are already folded into `c.attack`; they are backed
/// out before the skill scaling and added back flat, together with any
/// weapon/skill synergy.
pub fn calc_real_attack(c: &CharacterRecord, rules: &Rules<'_>, knowledge: i16, skill: &SkillRecord, level: i16) -> i32 {
    let mut atk = c.attack as i32;
    let mut equip_atk = 0;
    for id in c.equip {
        if let Some(item) = rules.item(id) {
            atk -= item.add_attack as i32;
            equip_atk += item.add_attack as i32;
        }
    }
    equip_atk += rules.factors.weapon_bonus(c.equip[0], skill.id) as i32;
    (atk * 3 + skill.damage_at(level) as i32) / 2 + equip_atk + knowledge as i32 * 2
}

pub fn calc_real_defense(c: &CharacterRecord, knowledge: i16) -> i32 {
    c.defence as i32 + knowledge as i32 * 2
}

fn finish_damage(mut dmg: i32, stamina: i16, hurt: i16, distance: i32) -> i32 {
    if dmg <= 0 {
        return 1;
    }
    dmg += stamina as i32 / 15 + hurt as i32 / 20;
    if distance > 10 {
        dmg * 2 / 3
    } else if distance > 1 {
        dmg * (100 - (distance - 1) * 3) / 100
    } else {
        dmg
    }
}

/// Damage estimate without jitter.
pub fn calc_predict_damage(atk: i32, def: i32, stamina: i16, hurt: i16, distance: i32) -> i32 {
    let mut dmg = (atk - def * 3) * 2 / 3;
    if dmg < 0 {
        dmg = atk / 10;
    }
    finish_damage(dmg, stamina, hurt, distance)
}

/// Highest level the current mp can afford, or -1 if not even level 0.
///
/// Casting at `level` costs `req_mp * (level / 2 + 1)`.
pub fn real_skill_level(req_mp: i16, level: i16, mp: i16) -> i16 {
    if req_mp <= 0 {
        return level;
    }
    let cost = req_mp as i32 * (level as i32 / 2 + 1);
    if cost <= mp as i32 {
        level
    } else if mp < req_mp {
        -1
    } else {
        mp / req_mp * 2
    }
}

/// Parameters of a single strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strike {
    /// Skill slot of the attacker
    pub slot: usize,
    pub level: i16,
    pub distance: i32,
    pub attacker_knowledge: i16,
    pub defender_knowledge: i16,
}

/// Resolve one skill use of `attacker` on `defender`.
///
/// Returns `None` when the slot holds no skill or the attacker cannot pay
/// its mp.
pub fn act_damage(
    attacker: &mut CharacterRecord,
    defender: &mut CharacterRecord,
    strike: Strike,
    rules: &Rules<'_>,
    rng: &mut GameRng,
) -> Option<DamageOutcome> {
    let slot = strike.slot.min(attacker.skill_id.len() - 1);
    let skill = rules.skill_in_slot(attacker, slot)?;
    let level = strike.level;
    if skill.drains_mp() {
        let drain = skill.drain_mp_at(level) as i32 + rng.jitter(5);
        let old = defender.mp;
        defender.mp = clamp_add(defender.mp, -drain, defender.max_mp);
        let drained = old - defender.mp;
        attacker.mp = clamp_add(attacker.mp, drained as i32, attacker.max_mp);
        return Some(DamageOutcome {
            damage: -drained,
            ..Default::default()
        });
    }
    if attacker.mp < skill.req_mp {
        return None;
    }
    attacker.mp = (attacker.mp - skill.req_mp).max(0);
    let atk = calc_real_attack(attacker, rules, strike.attacker_knowledge, skill, level);
    let def = calc_real_defense(defender, strike.defender_knowledge);
    let mut dmg = (atk - def * 3) * 2 / 3 + rng.jitter(21);
    if dmg < 0 {
        dmg = atk / 10 + rng.jitter(5);
    }
    let dmg = finish_damage(dmg, attacker.stamina, defender.hurt, strike.distance).min(i16::MAX as i32);
    defender.hp = (defender.hp as i32 - dmg).max(0) as i16;
    let mut outcome = DamageOutcome {
        damage: dmg as i16,
        poisoned: 0,
        dead: defender.hp <= 0,
    };
    if !outcome.dead && defender.antipoison < 90 {
        let poison = attacker.poison_amp as i32 + level as i32 * skill.add_poison as i32 - defender.antipoison as i32;
        if poison != 0 {
            let old = defender.poisoned;
            defender.poisoned = clamp_add(defender.poisoned, poison / 15, POISONED_MAX);
            outcome.poisoned = old - defender.poisoned;
        }
    }
    Some(outcome)
}

fn spend_stamina(c: &mut CharacterRecord, cost: i16) {
    if cost != 0 {
        c.stamina = clamp_add(c.stamina, -(cost as i32), STAMINA_MAX);
    }
}

/// Train the skill in `slot` by 1-2 points and pay `stamina`.
///
/// Returns whether the skill reached a new tier; progress is then reset
/// to the start of that tier.
pub fn post_damage(c: &mut CharacterRecord, slot: usize, stamina: i16, rng: &mut GameRng) -> bool {
    let mut level_up = false;
    if let Some(raw) = c.skill_level.get_mut(slot) {
        if *raw < SKILL_LEVEL_MAX {
            let tier = *raw / SKILL_LEVEL_STEP;
            *raw = clamp_add(*raw, rng.range(1, 2), SKILL_LEVEL_MAX);
            level_up = *raw / SKILL_LEVEL_STEP != tier;
            if level_up {
                *raw = *raw / SKILL_LEVEL_STEP * SKILL_LEVEL_STEP;
            }
        }
    }
    spend_stamina(c, stamina);
    level_up
}

/// Poison `target`. Returns `old - new` poisoned (negative or 0).
pub fn act_poison(user: &mut CharacterRecord, target: &mut CharacterRecord, stamina: i16) -> i16 {
    if user.poison <= target.antipoison {
        return 0;
    }
    let old = target.poisoned;
    target.poisoned = clamp_add(target.poisoned, (user.poison - target.antipoison) as i32 / 4, POISONED_MAX);
    spend_stamina(user, stamina);
    old - target.poisoned
}

/// Heal `target`. Returns the hp restored.
///
/// Wounds beyond `medic + 20` hurt cannot be treated.
pub fn act_medic(user: &mut CharacterRecord, target: &mut CharacterRecord, stamina: i16, rng: &mut GameRng) -> i16 {
    if target.hurt > user.medic + 20 {
        return 0;
    }
    let medic = user.medic as i32;
    let heal = match target.hurt {
        ..=25 => medic * 4 / 5,
        26..=50 => medic * 3 / 4,
        51..=75 => medic * 2 / 3,
        _ => medic / 2,
    };
    let old = target.hp;
    target.hp = clamp_add(target.hp, heal + rng.rn2(6), target.max_hp);
    target.hurt = clamp_add(target.hurt, -medic, HURT_MAX);
    spend_stamina(user, stamina);
    target.hp - old
}

/// Cure `target`'s poison. Returns `old - new` poisoned.
pub fn act_depoison(user: &mut CharacterRecord, target: &mut CharacterRecord, stamina: i16, rng: &mut GameRng) -> i16 {
    let old = target.poisoned;
    let delta = -(user.depoison as i32 / 3) + rng.jitter(6);
    target.poisoned = clamp_add(target.poisoned, delta, POISONED_MAX);
    spend_stamina(user, stamina);
    old - target.poisoned
}

fn throw_divisor(hurt: i16) -> i32 {
    match hurt {
        ..=0 => 4,
        1..=33 => 3,
        34..=66 => 2,
        _ => 1,
    }
}

/// Throw `item` at `target`. Returns the hp change (negative) and whether
/// the target died.
pub fn act_throw(
    user: &mut CharacterRecord,
    target: &mut CharacterRecord,
    item: &ItemRecord,
    stamina: i16,
    rng: &mut GameRng,
) -> (i16, bool) {
    let div = throw_divisor(target.hurt);
    let hit = ((-(item.add_hp as i32) / div + rng.rn2(6) + user.throwing as i32 * 2) / 3).max(1);
    let old = target.hp;
    target.hp = clamp_add(target.hp, -hit, target.max_hp);
    if target.antipoison < 100 {
        let poison = if item.add_poisoned <= 0 {
            item.add_poisoned as i32 / 2 + rng.jitter(6)
        } else {
            ((item.add_poisoned as i32 - target.throwing as i32) / 2 - target.antipoison as i32) / 2
        };
        if poison > 0 {
            target.poisoned = clamp_add(target.poisoned, poison, POISONED_MAX);
        }
    }
    spend_stamina(user, stamina);
    (target.hp - old, target.hp <= 0)
}

/// Throw damage estimate without jitter.
pub fn predict_throw_damage(user: &CharacterRecord, target: &CharacterRecord, item: &ItemRecord) -> i32 {
    ((-(item.add_hp as i32) / throw_divisor(target.hurt) + user.throwing as i32 * 2) / 3).max(1)
}

/// Turn-start poison tick. Never kills: hp stays at least 1.
pub fn act_poison_damage(c: &mut CharacterRecord) -> i16 {
    if c.poisoned == 0 {
        return 0;
    }
    let old = c.hp;
    c.hp = (c.hp as i32 - c.poisoned as i32 / 10).clamp(1, c.max_hp.max(1) as i32) as i16;
    c.hp - old
}

/// Rest for a turn: +3 stamina, plus about 1% of max hp and mp when the
/// jittered amount is positive.
pub fn act_rest(c: &mut CharacterRecord, rng: &mut GameRng) {
    c.stamina = clamp_add(c.stamina, 3, STAMINA_MAX);
    if c.hp < c.max_hp {
        let n = c.max_hp as i32 / 100 + rng.jitter(3);
        if n > 0 {
            c.hp = clamp_add(c.hp, n, c.max_hp);
        }
    }
    if c.mp < c.max_mp {
        let n = c.max_mp as i32 / 100 + rng.jitter(3);
        if n > 0 {
            c.mp = clamp_add(c.mp, n, c.max_mp);
        }
    }
}

/// Gain one level: stat growth scaled by potential, pools refilled.
///
/// Trained skills (medic, poison, weapon stats) only grow if already
/// nonzero.
pub fn act_levelup(c: &mut CharacterRecord, rng: &mut GameRng) {
    let factor = rng.range(1, (c.potential as i32 / 15).max(3));
    c.level += 1;
    c.attack = clamp_add(c.attack, factor, STAT_MAX);
    c.defence = clamp_add(c.defence, factor, STAT_MAX);
    c.speed = clamp_add(c.speed, factor, STAT_MAX);
    c.max_hp = clamp_add(c.max_hp, c.hp_add_on_level_up as i32 * 3 + rng.rn2(7), HP_MAX);
    c.max_mp = clamp_add(c.max_mp, 3 * (9 - factor), MP_MAX);
    c.hp = c.max_hp;
    c.mp = c.max_mp;
    c.stamina = STAMINA_MAX;
    c.poisoned = 0;
    c.hurt = 0;
    for stat in [
        &mut c.medic,
        &mut c.poison,
        &mut c.depoison,
        &mut c.fist,
        &mut c.sword,
        &mut c.blade,
        &mut c.special,
        &mut c.throwing,
    ] {
        if *stat != 0 {
            *stat = clamp_add(*stat, rng.rn2(3), STAT_MAX);
        }
    }
}
