//! Scratch memory of the extended script dialect
//!
//! 64K signed words addressed by a signed 16-bit address, so address 0 is
//! the middle of the block. Text is stored as NUL-terminated byte strings
//! packed two bytes per word, low byte first.

use std::fmt::Write as _;

/// Result slot of the last comparison; 0 means true.
pub const CMP_RESULT: i32 = 0x7000;

/// First of the four argument slots filled by a script call.
pub const CALL_ARGS: i32 = 0x7100;

const WORDS: usize = 0x10000;
const ORIGIN: i32 = 0x8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRam {
    words: Vec<i16>,
}

impl Default for ScriptRam {
    fn default() -> Self {
        Self { words: vec![0; WORDS] }
    }
}

impl ScriptRam {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(addr: i32) -> Option<usize> {
        usize::try_from(addr + ORIGIN).ok().filter(|&i| i < WORDS)
    }

    /// Word at `addr`; 0 outside the block.
    pub fn get(&self, addr: i32) -> i16 {
        Self::slot(addr).map_or(0, |i| self.words[i])
    }

    pub fn set(&mut self, addr: i32, value: i16) -> bool {
        match Self::slot(addr) {
            Some(i) => {
                self.words[i] = value;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    fn byte_index(addr: i32) -> Option<usize> {
        Self::slot(addr).map(|i| i * 2)
    }

    fn byte(&self, index: usize) -> Option<u8> {
        self.words.get(index / 2).map(|w| w.to_le_bytes()[index % 2])
    }

    fn set_byte(&mut self, index: usize, value: u8) -> bool {
        let Some(word) = self.words.get_mut(index / 2) else {
            return false;
        };
        let mut bytes = word.to_le_bytes();
        bytes[index % 2] = value;
        *word = i16::from_le_bytes(bytes);
        true
    }

    /// NUL-terminated string starting at word `addr`, without the NUL.
    pub fn read_str(&self, addr: i32) -> Vec<u8> {
        let Some(start) = Self::byte_index(addr) else {
            return Vec::new();
        };
        (start..WORDS * 2)
            .map_while(|i| self.byte(i).filter(|&b| b != 0))
            .collect()
    }

    /// Copy `bytes` to word `addr` followed by a NUL. Bytes past the end
    /// of the block are dropped.
    pub fn write_str(&mut self, addr: i32, bytes: &[u8]) {
        let Some(start) = Self::byte_index(addr) else {
            return;
        };
        for (i, &b) in bytes.iter().chain(std::iter::once(&0)).enumerate() {
            if !self.set_byte(start + i, b) {
                break;
            }
        }
    }

    pub fn str_len(&self, addr: i32) -> usize {
        self.read_str(addr).len()
    }

    /// Append the string at `src` to the one at `dest`.
    pub fn concat(&mut self, dest: i32, src: i32) {
        let tail = self.read_str(src);
        let Some(start) = Self::byte_index(dest) else {
            return;
        };
        let end = start + self.str_len(dest);
        for (i, &b) in tail.iter().chain(std::iter::once(&0)).enumerate() {
            if !self.set_byte(end + i, b) {
                break;
            }
        }
    }

    /// Format the template at `template` with one integer argument and
    /// store the result at `dest`.
    pub fn format(&mut self, dest: i32, template: i32, value: i16) {
        let text = format_one(&self.read_str(template), value);
        self.write_str(dest, &text);
    }

    /// `count` spaces followed by a NUL at `addr`.
    pub fn fill_spaces(&mut self, addr: i32, count: i16) {
        let spaces = vec![b' '; count.max(0) as usize];
        self.write_str(addr, &spaces);
    }
}

/// printf-style formatting of a single integer. Supports the `-` and `0`
/// flags, a width, and the `d i u x X c %` conversions; anything else is
/// copied through.
fn format_one(template: &[u8], value: i16) -> Vec<u8> {
    let mut out = Vec::with_capacity(template.len() + 8);
    let mut used = false;
    let mut i = 0;
    while i < template.len() {
        let b = template[i];
        i += 1;
        if b != b'%' {
            out.push(b);
            continue;
        }
        let spec_start = i - 1;
        let mut left = false;
        let mut zero = false;
        while let Some(&flag) = template.get(i) {
            match flag {
                b'-' => left = true,
                b'0' => zero = true,
                _ => break,
            }
            i += 1;
        }
        let mut width = 0usize;
        while let Some(d) = template.get(i).filter(|d| d.is_ascii_digit()) {
            width = width * 10 + usize::from(d - b'0');
            i += 1;
        }
        let Some(&conv) = template.get(i) else {
            out.extend_from_slice(&template[spec_start..]);
            break;
        };
        i += 1;
        let arg = if used { 0 } else { value };
        let mut body = String::new();
        match conv {
            b'%' => {
                out.push(b'%');
                continue;
            }
            b'd' | b'i' => {
                let _ = write!(body, "{arg}");
            }
            b'u' => {
                let _ = write!(body, "{}", arg as i32 as u32);
            }
            b'x' => {
                let _ = write!(body, "{:x}", arg as i32 as u32);
            }
            b'X' => {
                let _ = write!(body, "{:X}", arg as i32 as u32);
            }
            b'c' => {
                used = true;
                out.push(arg as u8);
                continue;
            }
            _ => {
                out.extend_from_slice(&template[spec_start..i]);
                continue;
            }
        }
        used = true;
        let pad = width.saturating_sub(body.len());
        if left {
            out.extend_from_slice(body.as_bytes());
            out.extend(std::iter::repeat_n(b' ', pad));
        } else if zero {
            let (sign, digits) = body.split_at(usize::from(body.starts_with('-')));
            out.extend_from_slice(sign.as_bytes());
            out.extend(std::iter::repeat_n(b'0', pad));
            out.extend_from_slice(digits.as_bytes());
        } else {
            out.extend(std::iter::repeat_n(b' ', pad));
            out.extend_from_slice(body.as_bytes());
        }
    }
    out
}
