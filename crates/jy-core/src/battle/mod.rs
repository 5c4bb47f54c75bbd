//! Tactical battles
//!
//! [`grid`] holds the field and its reach searches, [`Battle`] runs the
//! turns. Automatic turns and the end-of-battle settlement extend
//! [`Battle`] from their own modules.

mod ai;
mod engine;
pub mod grid;
mod settle;

pub use engine::{Act, Battle, Combatant, ItemChoice, Outcome, Stage};
pub use grid::{Area, AreaCell, Cell, CellFlags, Grid, Occupant};
