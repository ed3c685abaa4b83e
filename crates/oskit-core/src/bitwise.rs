//! Symbolic flag tables.
//!
//! A [`BitTable`] pairs names with bit masks and converts between a `u64` and
//! the `name|name|...` text form. The grammar is `token ('|' token)*`: tokens
//! are matched case-sensitively and no whitespace is trimmed.
//!
//! ```
//! use oskit_core::bitwise::{BitEntry, BitTable};
//!
//! const PERMS: BitTable<'static> = BitTable::new(&[
//!     BitEntry::new("read", 0x1),
//!     BitEntry::new("write", 0x2),
//!     BitEntry::new("execute", 0x4),
//! ]);
//!
//! assert_eq!(PERMS.parse("read|write"), 0x3);
//! assert_eq!(PERMS.format(0x3), "read|write");
//! ```

use crate::error::BitwiseError;

/// Delimiter between names in the text form.
pub const DELIMITER: char = '|';

/// One name/bit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitEntry<'a> {
    pub name: &'a str,
    pub bit: u64,
}

impl<'a> BitEntry<'a> {
    pub const fn new(name: &'a str, bit: u64) -> Self {
        Self { name, bit }
    }
}

/// An immutable name/bit table.
#[derive(Debug, Clone, Copy)]
pub struct BitTable<'a> {
    entries: &'a [BitEntry<'a>],
}

impl<'a> BitTable<'a> {
    /// Wrap a table without checking names. Intended for static tables.
    pub const fn new(entries: &'a [BitEntry<'a>]) -> Self {
        Self { entries }
    }

    /// Wrap a table, rejecting names that cannot round-trip through the text
    /// form: empty, containing the delimiter, or containing non-printable
    /// characters.
    pub fn try_new(entries: &'a [BitEntry<'a>]) -> Result<Self, BitwiseError> {
        for entry in entries {
            let printable = entry.name.chars().all(|c| c.is_ascii_graphic());
            if entry.name.is_empty() || entry.name.contains(DELIMITER) || !printable {
                return Err(BitwiseError::InvalidName(entry.name.to_string()));
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &'a [BitEntry<'a>] {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse `name|name|...` into a mask. Unknown names contribute nothing.
    pub fn parse(&self, text: &str) -> u64 {
        if text.is_empty() {
            return 0;
        }
        text.split(DELIMITER)
            .filter_map(|token| self.lookup(token).ok())
            .fold(0, |acc, bit| acc | bit)
    }

    /// Render every entry whose bit is fully contained in `bits`, in table
    /// order.
    ///
    /// Zero-bit entries are never rendered, although 0 is trivially contained
    /// in every mask. This departs from a plain subset rule so that
    /// `format(0)` is always the empty string.
    pub fn format(&self, bits: u64) -> String {
        let mut out = String::new();
        for entry in self.matching(bits) {
            if !out.is_empty() {
                out.push(DELIMITER);
            }
            out.push_str(entry.name);
        }
        out
    }

    /// [`format`](Self::format) into a caller buffer, returning the number of
    /// bytes written. Nothing is written when the result does not fit.
    pub fn format_into(&self, bits: u64, buf: &mut [u8]) -> Result<usize, BitwiseError> {
        let text = self.format(bits);
        if text.len() > buf.len() {
            return Err(BitwiseError::BufferTooSmall {
                needed: text.len(),
                capacity: buf.len(),
            });
        }
        buf[..text.len()].copy_from_slice(text.as_bytes());
        Ok(text.len())
    }

    /// Bit for `name`, first match wins.
    pub fn lookup(&self, name: &str) -> Result<u64, BitwiseError> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.bit)
            .ok_or_else(|| BitwiseError::UnknownName(name.to_string()))
    }

    /// Name whose bit is exactly `bit`.
    pub fn name(&self, bit: u64) -> Option<&'a str> {
        self.entries.iter().find(|e| e.bit == bit).map(|e| e.name)
    }

    /// Union of every bit in the table.
    pub fn all(&self) -> u64 {
        self.entries.iter().fold(0, |acc, e| acc | e.bit)
    }

    /// Fail when `bits` carries anything the table does not name.
    pub fn validate(&self, bits: u64) -> Result<(), BitwiseError> {
        let unknown = bits & !self.all();
        if unknown != 0 {
            return Err(BitwiseError::UnknownBits(unknown));
        }
        Ok(())
    }

    fn matching(&self, bits: u64) -> impl Iterator<Item = &'a BitEntry<'a>> {
        let entries = self.entries;
        entries
            .iter()
            .filter(move |e| e.bit != 0 && bits & e.bit == e.bit)
    }
}

/// Number of set bits in `mask`.
pub fn count(mask: u64) -> u32 {
    mask.count_ones()
}

/// Whether every bit of `bit` is set in `mask`. A zero `bit` is never set.
pub fn has(mask: u64, bit: u64) -> bool {
    bit != 0 && mask & bit == bit
}
