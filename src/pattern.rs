//! Pattern Store: raw pattern registration, ASCII case-folding, and
//! id-based deduplication.

use std::collections::HashMap;

use crate::error::{PfacError, Result};

/// ASCII-only uppercase-to-lowercase fold table (0x41-0x5A -> 0x61-0x7A).
/// Bytes at or above 0x80 pass through unchanged, per the fold contract.
#[inline]
pub(crate) fn ascii_tolower(b: u8) -> u8 {
    if b.is_ascii_uppercase() {
        b + 32
    } else {
        b
    }
}

pub(crate) fn fold(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().copied().map(ascii_tolower).collect()
}

/// Match flags recognized by the core. Unrecognized bits are preserved but
/// ignored, matching the `flags` contract in the external interface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(u32);

impl Flags {
    /// Case-insensitive matching: the pattern is folded to ASCII lowercase
    /// and no case-sensitive verification is performed on a hit.
    pub const NOCASE: Flags = Flags(1 << 0);

    pub const fn empty() -> Flags {
        Flags(0)
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;
    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

/// A single registered pattern.
#[derive(Clone, Debug)]
pub(crate) struct Pattern {
    pub(crate) id: u32,
    pub(crate) len: u16,
    pub(crate) bytes_folded: Vec<u8>,
    pub(crate) bytes_original: Vec<u8>,
    pub(crate) flags: Flags,
}

impl Pattern {
    /// Whether a hit ending at this pattern's terminal state needs
    /// case-sensitive verification before being accepted.
    pub(crate) fn needs_verify(&self) -> bool {
        !self.flags.contains(Flags::NOCASE)
    }
}

/// Holds raw patterns with their flags and identifiers, deduplicated by id
/// at insertion time.
#[derive(Default)]
pub(crate) struct PatternStore {
    patterns: Vec<Pattern>,
    by_id: HashMap<u32, usize>,
    min_len: u16,
    max_len: u16,
    max_pat_id: u32,
}

impl PatternStore {
    pub(crate) fn new() -> Self {
        PatternStore {
            patterns: Vec::new(),
            by_id: HashMap::new(),
            min_len: u16::MAX,
            max_len: 0,
            max_pat_id: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.patterns.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub(crate) fn max_pat_id(&self) -> u32 {
        self.max_pat_id
    }

    #[cfg(test)]
    pub(crate) fn min_len(&self) -> u16 {
        self.min_len
    }

    #[cfg(test)]
    pub(crate) fn max_len(&self) -> u16 {
        self.max_len
    }

    /// Registers a pattern. A zero-length pattern is warned about and
    /// ignored, matching `SCPFACAddPattern`'s treatment of `pat_len == 0`.
    /// An id that can't fit in the compiled 16-bit representation is
    /// rejected with [`PfacError::PidOverflow`]. A duplicate id is a
    /// silent no-op.
    pub(crate) fn register(&mut self, bytes: &[u8], id: u32, flags: Flags) -> Result<()> {
        if bytes.is_empty() {
            tracing::warn!(pattern_id = id, "ignoring zero-length pattern");
            return Ok(());
        }
        if id > u16::MAX as u32 {
            return Err(PfacError::PidOverflow(id));
        }
        if self.by_id.contains_key(&id) {
            tracing::debug!(pattern_id = id, "duplicate pattern id, ignoring");
            return Ok(());
        }

        let bytes_folded = fold(bytes);
        let len = bytes.len() as u16;

        let pattern = Pattern {
            id,
            len,
            bytes_folded,
            bytes_original: bytes.to_vec(),
            flags,
        };

        self.min_len = self.min_len.min(len);
        self.max_len = self.max_len.max(len);
        self.max_pat_id = self.max_pat_id.max(id);

        let index = self.patterns.len();
        self.patterns.push(pattern);
        self.by_id.insert(id, index);
        Ok(())
    }
}
