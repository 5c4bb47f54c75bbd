//! jy-core: Battle engine and event scripts for Heroes of Jin Yong
//!
//! This crate contains the game logic with no rendering, audio or input
//! handling. Both the battle engine and the event VM talk to the outside
//! world through [`ui::UiRequest`] values and are driven by explicit
//! frame, key and continue calls, so every flow can be replayed in tests.

pub mod action;
pub mod battle;
pub mod data;
pub mod event;
pub mod testing;
pub mod ui;
pub mod world;

mod consts;
mod rng;

pub use consts::*;
pub use rng::GameRng;
