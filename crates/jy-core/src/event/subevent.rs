//! Queued set-piece steps
//!
//! Some opcodes expand into a chain of steps that each need the window
//! (a dialogue, a battle, a fade). The chain is queued as [`SubEvent`]s
//! and the VM runs them before the next instruction, suspending on every
//! step that waits for input.

use serde::{Deserialize, Serialize};

use crate::GameRng;

/// A texture animation on one event slot. `curr == 0` is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnimSlot {
    /// Event slot whose texture changes; negative animates the player.
    pub event: i16,
    pub curr: i16,
    pub end: i16,
}

impl AnimSlot {
    pub fn new(event: i16, curr: i16, end: i16) -> Self {
        Self { event, curr, end }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubEvent {
    ClosePopup,
    Talk { talk: i16, head: i16, position: i16 },
    /// Put items in the bag and announce them.
    AddItem { item: i16, count: i16 },
    /// A tournament bout: the loss ends the game and earns nothing.
    Battle(i16),
    /// Restore the party as a night's rest does.
    Sleep,
    FadeOut,
    FadeIn,
    Animate([AnimSlot; 3]),
    EndScreen,
}

const BOUTS: i16 = 15;
const FIRST_BOUT_TALK: i16 = 2854;
const FIRST_BOUT_BATTLE: i16 = 102;
const REST_TALK: i16 = 2891;
const REST_HEAD: i16 = 70;
const CLOSING_TALKS: [(i16, i16); 6] = [(2884, 3), (2885, 3), (2886, 3), (2887, 3), (2888, 3), (2889, 1)];
const PRIZE: i16 = 0x8f;

/// Heads of the two possible opponents of each bout.
const BOUT_HEADS: [i16; 30] = [
    8, 21, 23, 31, 32, 43, 7, 11, 14, 20, 33, 34, 10, 12, 19, 22, 56, 68, 13, 55, 62, 67, 70, 71,
    26, 57, 60, 64, 3, 69,
];

/// The martial arts tournament: fifteen bouts against one of two random
/// opponents each, a rest after every third, then the closing speeches
/// and the prize.
pub fn tournament(rng: &mut GameRng) -> Vec<SubEvent> {
    let mut steps = Vec::new();
    for bout in 0..BOUTS {
        let pick = bout * 2 + rng.rn2(2) as i16;
        let position = (rng.rn2(2) * 4 + rng.rn2(2)) as i16;
        steps.extend([
            SubEvent::Talk {
                talk: FIRST_BOUT_TALK + pick,
                head: BOUT_HEADS[pick as usize],
                position,
            },
            SubEvent::ClosePopup,
            SubEvent::Battle(FIRST_BOUT_BATTLE + pick),
            SubEvent::FadeOut,
            SubEvent::FadeIn,
        ]);
        if bout % 3 == 2 {
            steps.extend([
                SubEvent::Talk {
                    talk: REST_TALK,
                    head: REST_HEAD,
                    position: 4,
                },
                SubEvent::ClosePopup,
                SubEvent::Sleep,
                SubEvent::FadeOut,
                SubEvent::FadeIn,
            ]);
        }
    }
    for (i, (talk, position)) in CLOSING_TALKS.into_iter().enumerate() {
        if i > 0 {
            steps.push(SubEvent::ClosePopup);
        }
        steps.push(SubEvent::Talk { talk, head: 0, position });
    }
    steps.push(SubEvent::ClosePopup);
    steps.push(SubEvent::AddItem { item: PRIZE, count: 1 });
    steps
}

/// Second stage of the barrier removal: three doors open together.
pub fn barrier_doors() -> SubEvent {
    SubEvent::Animate([
        AnimSlot::new(2, 3845 * 2, 3873 * 2),
        AnimSlot::new(3, 3874 * 2, 3874 * 2 + (3873 - 3845) * 2),
        AnimSlot::new(4, 3903 * 2, 3903 * 2 + (3873 - 3845) * 2),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tournament_shape() {
        let steps = tournament(&mut GameRng::scripted([1, 1, 0]));
        assert_eq!(
            steps[0],
            SubEvent::Talk {
                talk: 2855,
                head: 21,
                position: 4
            }
        );
        assert_eq!(steps[2], SubEvent::Battle(103));
        let battles = steps.iter().filter(|s| matches!(s, SubEvent::Battle(_))).count();
        let rests = steps.iter().filter(|s| **s == SubEvent::Sleep).count();
        assert_eq!((battles, rests), (15, 5));
        assert_eq!(steps.last(), Some(&SubEvent::AddItem { item: 0x8f, count: 1 }));
    }

    #[test]
    fn test_barrier_doors_share_length() {
        let SubEvent::Animate(slots) = barrier_doors() else {
            panic!("not an animation");
        };
        for slot in slots {
            assert_eq!(slot.end - slot.curr, (3873 - 3845) * 2);
        }
    }
}
