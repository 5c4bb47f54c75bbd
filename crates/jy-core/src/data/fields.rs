//! Ordinal field addressing for save records
//!
//! Event scripts read and write record fields by *byte offset* into the
//! packed little-endian layout the save files use. Rather than
//! reinterpreting memory, every record declares its field order once with
//! [`word_layout!`] and gets word-indexed and byte-offset accessors that
//! behave exactly like the packed struct would, including unaligned
//! 16-bit accesses that straddle two words.

/// A record field that occupies a whole number of 16-bit words.
pub trait FieldAccess {
    const WORDS: usize;

    fn read(&self, word: usize) -> i16;

    fn write(&mut self, word: usize, value: i16);
}

impl FieldAccess for i16 {
    const WORDS: usize = 1;

    fn read(&self, _word: usize) -> i16 {
        *self
    }

    fn write(&mut self, _word: usize, value: i16) {
        *self = value;
    }
}

impl FieldAccess for u16 {
    const WORDS: usize = 1;

    fn read(&self, _word: usize) -> i16 {
        *self as i16
    }

    fn write(&mut self, _word: usize, value: i16) {
        *self = value as u16;
    }
}

impl<const N: usize> FieldAccess for [i16; N] {
    const WORDS: usize = N;

    fn read(&self, word: usize) -> i16 {
        self[word]
    }

    fn write(&mut self, word: usize, value: i16) {
        self[word] = value;
    }
}

/// Byte strings pack two bytes per word, low byte first.
impl<const N: usize> FieldAccess for [u8; N] {
    const WORDS: usize = N / 2;

    fn read(&self, word: usize) -> i16 {
        i16::from_le_bytes([self[word * 2], self[word * 2 + 1]])
    }

    fn write(&mut self, word: usize, value: i16) {
        let [lo, hi] = value.to_le_bytes();
        self[word * 2] = lo;
        self[word * 2 + 1] = hi;
    }
}

/// Word-level view of a packed record.
pub trait WordLayout {
    /// Total size of the record in 16-bit words.
    const WORDS: usize;

    fn read_word(&self, index: usize) -> Option<i16>;

    fn write_word(&mut self, index: usize, value: i16) -> bool;

    /// Read a 16-bit value at `offset` bytes from the start of the record.
    ///
    /// Odd offsets combine the high byte of one word with the low byte of
    /// the next, as an unaligned load from the packed layout would.
    fn peek(&self, offset: i16) -> Option<i16> {
        let offset = usize::try_from(offset).ok()?;
        let word = offset / 2;
        if offset % 2 == 0 {
            return self.read_word(word);
        }
        let lo = self.read_word(word)?.to_le_bytes()[1];
        let hi = self.read_word(word + 1)?.to_le_bytes()[0];
        Some(i16::from_le_bytes([lo, hi]))
    }

    /// Write a 16-bit value at `offset` bytes from the start of the record.
    ///
    /// Returns false when the write would fall outside the record.
    fn poke(&mut self, offset: i16, value: i16) -> bool {
        let Ok(offset) = usize::try_from(offset) else {
            return false;
        };
        let word = offset / 2;
        if offset % 2 == 0 {
            return self.write_word(word, value);
        }
        let (Some(first), Some(second)) = (self.read_word(word), self.read_word(word + 1)) else {
            return false;
        };
        let [lo, hi] = value.to_le_bytes();
        let [first_lo, _] = first.to_le_bytes();
        let [_, second_hi] = second.to_le_bytes();
        self.write_word(word, i16::from_le_bytes([first_lo, lo]))
            && self.write_word(word + 1, i16::from_le_bytes([hi, second_hi]))
    }
}

/// Declare the packed field order of a record.
///
/// ```ignore
/// word_layout!(ShopRecord { item: [i16; 5], total: [i16; 5], price: [i16; 5] });
/// ```
#[macro_export]
macro_rules! word_layout {
    ($ty:ty { $($field:ident : $fty:ty),+ $(,)? }) => {
        impl $crate::data::fields::WordLayout for $ty {
            const WORDS: usize = 0 $(+ <$fty as $crate::data::fields::FieldAccess>::WORDS)+;

            fn read_word(&self, index: usize) -> Option<i16> {
                let mut base = 0usize;
                $(
                    let words = <$fty as $crate::data::fields::FieldAccess>::WORDS;
                    if index < base + words {
                        return Some($crate::data::fields::FieldAccess::read(&self.$field, index - base));
                    }
                    base += words;
                )+
                let _ = base;
                None
            }

            fn write_word(&mut self, index: usize, value: i16) -> bool {
                let mut base = 0usize;
                $(
                    let words = <$fty as $crate::data::fields::FieldAccess>::WORDS;
                    if index < base + words {
                        $crate::data::fields::FieldAccess::write(&mut self.$field, index - base, value);
                        return true;
                    }
                    base += words;
                )+
                let _ = base;
                false
            }
        }
    };
}
