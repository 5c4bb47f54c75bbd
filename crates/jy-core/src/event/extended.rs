//! Extended script dialect (opcode 50)
//!
//! Sub-operation `v0` works on the scratch memory and on raw record
//! words. Bits of `v1` mark which operands are addresses to read rather
//! than literal values.

use log::{debug, warn};

use crate::PARTY_SIZE;
use crate::data::WordLayout;
use crate::event::ram::{CALL_ARGS, CMP_RESULT};
use crate::event::vm::{EventVm, Flow, Wait};
use crate::ui::UiRequest;
use crate::world::{GameData, Session};

/// Record table addressed by sub-operations 16, 17 and 27.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Character,
    Item,
    SubMap,
    Skill,
    Shop,
}

impl Table {
    fn from_kind(kind: i16) -> Option<Self> {
        Some(match kind {
            0 => Table::Character,
            1 => Table::Item,
            2 => Table::SubMap,
            3 => Table::Skill,
            4 => Table::Shop,
            _ => return None,
        })
    }

    fn peek(self, data: &GameData, id: i16, offset: i16) -> Option<i16> {
        match self {
            Table::Character => data.character(id)?.peek(offset),
            Table::Item => data.item(id)?.peek(offset),
            Table::SubMap => data.sub_map(id)?.peek(offset),
            Table::Skill => data.skill(id)?.peek(offset),
            Table::Shop => data.shop(id)?.peek(offset),
        }
    }

    fn poke(self, data: &mut GameData, id: i16, offset: i16, value: i16) -> bool {
        match self {
            Table::Character => data.character_mut(id).is_some_and(|r| r.poke(offset, value)),
            Table::Item => data.item_mut(id).is_some_and(|r| r.poke(offset, value)),
            Table::SubMap => data.sub_map_mut(id).is_some_and(|r| r.poke(offset, value)),
            Table::Skill => data.skill_mut(id).is_some_and(|r| r.poke(offset, value)),
            Table::Shop => data.shop_mut(id).is_some_and(|r| r.poke(offset, value)),
        }
    }

    /// Name field, up to its first NUL. Shops have none.
    fn name(self, data: &GameData, id: i16) -> Option<Vec<u8>> {
        let raw: &[u8] = match self {
            Table::Character => data.character(id)?.name.as_slice(),
            Table::Item => data.item(id)?.name.as_slice(),
            Table::SubMap => data.sub_map(id)?.name.as_slice(),
            Table::Skill => data.skill(id)?.name.as_slice(),
            Table::Shop => return None,
        };
        Some(raw.iter().copied().take_while(|&b| b != 0).collect())
    }
}

impl EventVm {
    /// Operand `v`, or the word at address `v` when `bit` is set in the
    /// indirection mask.
    fn mov(&self, mask: i16, v: i16, bit: i16) -> i16 {
        if mask & bit != 0 { self.ram.get(v as i32) } else { v }
    }

    pub(super) fn run_extended(&mut self, session: &mut Session, v: [i16; 7]) -> Flow {
        let [op, v1, v2, v3, v4, v5, v6] = v;
        let addr = |a: i16| a as i32;
        match op {
            0 => {
                self.ram.set(addr(v1), v2);
            }
            1 => {
                let addr = v3 as i32 + self.mov(v1, v4, 1) as i32;
                let value = self.mov(v1, v5, 2);
                self.ram.set(addr, if v2 != 0 { value & 0xff } else { value });
            }
            2 => {
                let value = self.ram.get(v3 as i32 + self.mov(v1, v4, 1) as i32);
                self.ram.set(addr(v5), if v2 != 0 { value & 0xff } else { value });
            }
            3 => {
                let rhs = self.mov(v1, v5, 1);
                let lhs = self.ram.get(addr(v4));
                let result = match v2 {
                    0 => Some(lhs.wrapping_add(rhs)),
                    1 => Some(lhs.wrapping_sub(rhs)),
                    2 => Some(lhs.wrapping_mul(rhs)),
                    3 => lhs.checked_div(rhs),
                    4 => lhs.checked_rem(rhs),
                    _ => None,
                };
                if let Some(result) = result {
                    self.ram.set(addr(v3), result);
                }
            }
            4 => {
                let lhs = self.ram.get(addr(v3));
                let rhs = self.mov(v1, v4, 1);
                let passed = match v2 {
                    0 => lhs < rhs,
                    1 => lhs <= rhs,
                    2 => lhs == rhs,
                    3 => lhs != rhs,
                    4 => lhs >= rhs,
                    5 => lhs > rhs,
                    7 => false,
                    _ => true,
                };
                self.ram.set(CMP_RESULT, if passed { 0 } else { 1 });
            }
            5 => self.ram.clear(),
            8 => {
                let talk = self.mov(v1, v2, 1);
                let text = session.content.talk(talk).unwrap_or_default();
                self.ram.write_str(addr(v3), text);
            }
            9 => {
                let value = self.mov(v1, v4, 1);
                self.ram.format(addr(v2), addr(v3), value);
            }
            10 => {
                let len = self.ram.str_len(addr(v1));
                self.ram.set(addr(v2), len as i16);
            }
            11 => self.ram.concat(addr(v1), addr(v2)),
            12 => {
                let count = self.mov(v1, v3, 1);
                self.ram.fill_spaces(addr(v2), count);
            }
            16 => {
                let (id, offset, value) = (self.mov(v1, v3, 1), self.mov(v1, v4, 2), self.mov(v1, v5, 4));
                let written = Table::from_kind(v2).is_some_and(|t| t.poke(&mut session.data, id, offset, value));
                if !written {
                    debug!("record write {v2}:{id}+{offset} ignored");
                }
            }
            17 => {
                let (id, offset) = (self.mov(v1, v3, 1), self.mov(v1, v4, 2));
                if let Some(value) = Table::from_kind(v2).and_then(|t| t.peek(&session.data, id, offset)) {
                    self.ram.set(addr(v5), value);
                }
            }
            18 => {
                let slot = self.mov(v1, v2, 1);
                let id = self.mov(v1, v3, 2);
                if let Some(member) = usize::try_from(slot).ok().and_then(|s| session.data.party.get_mut(s)) {
                    *member = id;
                }
            }
            19 => {
                let slot = self.mov(v1, v2, 1);
                if let Ok(slot) = usize::try_from(slot)
                    && slot < PARTY_SIZE
                {
                    self.ram.set(addr(v3), session.data.party[slot]);
                }
            }
            20 => {
                let count = session.data.bag.count(self.mov(v1, v2, 1));
                self.ram.set(addr(v3), count);
            }
            21 => {
                let (sub_map, event) = (self.mov(v1, v2, 1), self.mov(v1, v3, 2));
                let (word, value) = (self.mov(v1, v4, 4), self.mov(v1, v5, 8));
                let written = session
                    .data
                    .event_mut(sub_map, event)
                    .zip(usize::try_from(word).ok())
                    .is_some_and(|(ev, word)| ev.write_word(word, value));
                if !written {
                    debug!("event word {sub_map}:{event}:{word} out of range");
                }
            }
            22 => {
                let (sub_map, event, word) = (self.mov(v1, v2, 1), self.mov(v1, v3, 2), self.mov(v1, v4, 4));
                let value = session
                    .data
                    .event(sub_map, event)
                    .zip(usize::try_from(word).ok())
                    .and_then(|(ev, word)| ev.read_word(word));
                if let Some(value) = value {
                    self.ram.set(addr(v5), value);
                }
            }
            23 => {
                let (sub_map, layer) = (self.mov(v1, v2, 1), self.mov(v1, v3, 2));
                let (x, y, value) = (self.mov(v1, v4, 4), self.mov(v1, v5, 8), self.mov(v1, v6, 16));
                if let Some(layers) = session.data.layers_mut(sub_map) {
                    layers.set(layer as i32, x as i32, y as i32, value);
                }
            }
            24 => {
                let (sub_map, layer) = (self.mov(v1, v2, 1), self.mov(v1, v3, 2));
                let (x, y) = (self.mov(v1, v4, 4), self.mov(v1, v5, 8));
                let value = session
                    .data
                    .layers(sub_map)
                    .and_then(|l| l.get(layer as i32, x as i32, y as i32));
                if let Some(value) = value {
                    self.ram.set(addr(v6), value);
                }
            }
            25 | 26 => debug!("raw address access ({op}) is not supported"),
            27 => {
                let id = self.mov(v1, v3, 1);
                if let Some(name) = Table::from_kind(v2).and_then(|t| t.name(&session.data, id)) {
                    self.ram.write_str(addr(v4), &name);
                }
            }
            32 => {
                let at = self.index as isize + self.mov(v1, v3, 1) as isize;
                let value = self.ram.get(addr(v2));
                match usize::try_from(at).ok().and_then(|i| self.script.get_mut(i)) {
                    Some(word) => *word = value,
                    None => warn!("script patch at {at} is outside the script"),
                }
            }
            33 | 36 => {
                let (x, y, style) = (self.mov(v1, v3, 1), self.mov(v1, v4, 2), self.mov(v1, v5, 4));
                self.requests.push(UiRequest::ExtendedText {
                    x,
                    y,
                    text: self.ram.read_str(addr(v2)),
                    color: (style & 0xff) as u8,
                    shadow: (style >> 8) as u8,
                });
                if op == 36 {
                    return self.wait_for(Wait::Confirm, UiRequest::ExtendedWaitKey);
                }
            }
            34 => {
                let (x0, y0) = (self.mov(v1, v2, 1), self.mov(v1, v3, 2));
                let (x1, y1) = (self.mov(v1, v4, 4), self.mov(v1, v5, 8));
                self.requests.push(UiRequest::ExtendedBox { x0, y0, x1, y1 });
            }
            35 => return self.wait_for(Wait::Key(v1), UiRequest::ExtendedWaitKey),
            37 => {
                let frames = self.mov(v1, v2, 1);
                self.requests.push(UiRequest::ExtendedCloseAfter(frames));
            }
            38 => {
                let bound = self.mov(v1, v2, 1);
                let roll = session.rng.rn2(bound as i32) as i16;
                self.ram.set(addr(v3), roll);
            }
            39 | 40 => {
                let count = self.mov(v1, v2, 1).max(0);
                let (x, y) = (self.mov(v1, v5, 2), self.mov(v1, v6, 4));
                let items = (0..count).map(|i| self.ram.read_str(v3 as i32 + i as i32)).collect();
                return self.wait_for(Wait::Menu(v4), UiRequest::ExtendedMenu { items, x, y });
            }
            41 => {
                let (x, y, index) = (self.mov(v1, v3, 1), self.mov(v1, v4, 2), self.mov(v1, v5, 4));
                if matches!(v2, 0 | 1) {
                    self.requests.push(UiRequest::ExtendedTexture { kind: v2, index, x, y });
                }
            }
            42 => {
                let (x, y) = (self.mov(v1, v2, 1), self.mov(v1, v3, 2));
                self.requests.push(UiRequest::SetGlobalPosition { x, y });
            }
            43 => {
                for (i, (operand, bit)) in [(v3, 2), (v4, 4), (v5, 8), (v6, 16)].into_iter().enumerate() {
                    let value = self.mov(v1, operand, bit);
                    self.ram.set(CALL_ARGS + i as i32, value);
                }
                let target = self.mov(v1, v2, 1);
                debug!("script {} calls script {target}", self.script_id());
                self.jump(session, target);
            }
            48 => {
                for addr in v1 as i32..v1 as i32 + v2 as i32 {
                    debug!("RAM[0x{:04X}] = {}", addr as u16, self.ram.get(addr));
                }
            }
            52 => {
                let (char_id, slot, tier) = (self.mov(v1, v2, 1), self.mov(v1, v3, 2), self.mov(v1, v4, 4));
                let reached = session
                    .data
                    .character(char_id)
                    .zip(usize::try_from(slot).ok())
                    .and_then(|(c, slot)| c.skill_level.get(slot).copied())
                    .is_some_and(|level| (level / 100).clamp(0, 9) + 1 >= tier);
                self.ram.set(CMP_RESULT, if reached { 0 } else { 1 });
            }
            _ => debug!("unknown extended operation {op}"),
        }
        Flow::Next
    }

    fn wait_for(&mut self, wait: Wait, request: UiRequest) -> Flow {
        self.wait = Some(wait);
        self.requests.push(request);
        Flow::Suspend
    }
}
