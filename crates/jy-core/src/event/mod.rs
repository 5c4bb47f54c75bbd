//! Map event scripts
//!
//! Cells of a submap carry up to three script ids (interact, use item,
//! step on). [`EventVm`] decodes and runs those scripts against the save
//! store, asking the window for dialogues, prompts and battles through
//! [`UiRequest`](crate::ui::UiRequest)s.

mod extended;
pub mod opcode;
pub mod ram;
mod subevent;
mod vm;

pub use opcode::{Instruction, Op, Shape, decode};
pub use ram::{CALL_ARGS, CMP_RESULT, ScriptRam};
pub use subevent::{AnimSlot, SubEvent};
pub use vm::EventVm;
