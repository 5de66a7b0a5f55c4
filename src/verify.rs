//! Case-Sensitive Verifier Index.
//!
//! A side table mapping pattern id -> original (case-sensitive) bytes,
//! consulted during scanning for any hit whose pid carries the verify bit.
//! Mirrors `pid_pat_list[...].cs` in `util-mpm-pfac.c`.

use crate::pattern::PatternStore;

pub(crate) struct VerifierIndex {
    entries: Vec<Option<Box<[u8]>>>,
}

impl VerifierIndex {
    pub(crate) fn build(patterns: &PatternStore) -> Self {
        let mut entries = vec![None; patterns.max_pat_id() as usize + 1];
        for pattern in patterns.iter() {
            if pattern.needs_verify() {
                entries[pattern.id as usize] =
                    Some(pattern.bytes_original.clone().into_boxed_slice());
            }
        }
        VerifierIndex { entries }
    }

    /// Returns the case-sensitive bytes for `pid`, or `None` if `pid` was
    /// registered `NOCASE` (and thus has no entry to verify against).
    #[inline]
    pub(crate) fn bytes_for(&self, pid: u32) -> Option<&[u8]> {
        self.entries
            .get(pid as usize)
            .and_then(|entry| entry.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Flags;

    #[test]
    fn only_case_sensitive_patterns_have_entries() {
        let mut store = PatternStore::new();
        store.register(b"Works", 0, Flags::NOCASE).unwrap();
        store.register(b"Works", 1, Flags::empty()).unwrap();
        let index = VerifierIndex::build(&store);
        assert!(index.bytes_for(0).is_none());
        assert_eq!(index.bytes_for(1), Some(&b"Works"[..]));
    }
}
