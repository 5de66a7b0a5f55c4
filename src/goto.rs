//! Goto Builder, Output Table, and Failure Solver.
//!
//! Structurally grounded on `omirandette-rule-engine`'s `build()` (phases
//! 1-2: seed failure links from root's real children, then breadth-first
//! over the rest) and on `util-mpm-pfac.c`'s `SCPFACCreateGotoTable` /
//! `SCPFACCreateFailureTable`, including the detail that root's `FAIL`
//! cells are rewritten to the root self-loop *before* the failure BFS runs,
//! so a "real child of root" is identified by `goto[0][b] != 0` rather than
//! `!= FAIL`.

use std::collections::VecDeque;

use crate::error::{PfacError, Result};
use crate::pattern::PatternStore;
use crate::state_id::{usize_to_state_id, StateId, FAIL};

/// Trie-shaped transition table used during construction. Row 0 is the
/// root. Unused cells hold [`FAIL`] until the goto trie is complete, at
/// which point row 0's `FAIL` cells are rewritten to the root self-loop.
pub(crate) struct GotoTable {
    rows: Vec<[StateId; 256]>,
    max_states: Option<usize>,
}

impl GotoTable {
    fn new(max_states: Option<usize>) -> Self {
        GotoTable {
            rows: vec![[FAIL; 256]],
            max_states,
        }
    }

    pub(crate) fn state_count(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub(crate) fn get(&self, state: StateId, byte: u8) -> StateId {
        self.rows[state as usize][byte as usize]
    }

    #[inline]
    fn set(&mut self, state: StateId, byte: u8, next: StateId) {
        self.rows[state as usize][byte as usize] = next;
    }

    fn add_state(&mut self) -> Result<StateId> {
        if let Some(max) = self.max_states {
            if self.rows.len() >= max {
                return Err(PfacError::CapacityExceeded(self.rows.len()));
            }
        }
        let id = usize_to_state_id(self.rows.len())
            .ok_or(PfacError::CapacityExceeded(self.rows.len()))?;
        self.rows.push([FAIL; 256]);
        Ok(id)
    }
}

/// Per-state, ordered, duplicate-free list of pattern ids that terminate
/// (directly, or via suffix closure) at that state.
pub(crate) struct OutputTable {
    rows: Vec<Vec<u32>>,
}

impl OutputTable {
    fn new(state_count: usize) -> Self {
        OutputTable {
            rows: vec![Vec::new(); state_count],
        }
    }

    fn grow_to(&mut self, state_count: usize) {
        if self.rows.len() < state_count {
            self.rows.resize(state_count, Vec::new());
        }
    }

    pub(crate) fn row(&self, state: StateId) -> &[u32] {
        &self.rows[state as usize]
    }

    pub(crate) fn state_count(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn is_empty_at(&self, state: StateId) -> bool {
        self.rows[state as usize].is_empty()
    }

    fn add(&mut self, state: StateId, pid: u32) {
        let row = &mut self.rows[state as usize];
        if !row.contains(&pid) {
            row.push(pid);
        }
    }

    /// Unions `src`'s output pids into `dst`'s, preserving insertion order
    /// and suppressing duplicates.
    fn union_into(&mut self, dst: StateId, src: StateId) {
        if dst == src || self.rows[src as usize].is_empty() {
            return;
        }
        let incoming = self.rows[src as usize].clone();
        let row = &mut self.rows[dst as usize];
        for pid in incoming {
            if !row.contains(&pid) {
                row.push(pid);
            }
        }
    }
}

/// Builds the goto trie and its output table from the registered patterns.
///
/// Includes the "level-1 prefilter" pass: one direct child of the root per
/// distinct first byte across all patterns is allocated before patterns are
/// walked in. This has no semantic effect on the standard construction but
/// keeps the root's fan-out dense going into the delta flattener.
pub(crate) fn build_goto(
    patterns: &PatternStore,
    max_states: Option<usize>,
) -> Result<(GotoTable, OutputTable)> {
    let mut goto = GotoTable::new(max_states);

    let mut first_bytes = [false; 256];
    for pattern in patterns.iter() {
        if let Some(&b) = pattern.bytes_folded.first() {
            first_bytes[b as usize] = true;
        }
    }
    for b in 0..256u16 {
        if first_bytes[b as usize] {
            let child = goto.add_state()?;
            goto.set(0, b as u8, child);
        }
    }

    let mut output = OutputTable::new(goto.state_count());

    for pattern in patterns.iter() {
        let mut state: StateId = 0;
        for &b in &pattern.bytes_folded {
            let next = goto.get(state, b);
            state = if next != FAIL {
                next
            } else {
                let new_state = goto.add_state()?;
                output.grow_to(goto.state_count());
                goto.set(state, b, new_state);
                new_state
            };
        }
        output.add(state, pattern.id);
    }

    for b in 0..256u16 {
        if goto.get(0, b as u8) == FAIL {
            goto.set(0, b as u8, 0);
        }
    }

    Ok((goto, output))
}

/// Computes each state's failure link via breadth-first search and merges
/// suffix outputs upward.
///
/// Seeds the queue with root's real children -- identified by
/// `goto[0][b] != 0`, since root's `FAIL` cells have already been rewritten
/// to the root self-loop by [`build_goto`].
pub(crate) fn compute_failure(goto: &GotoTable, output: &mut OutputTable) -> Vec<StateId> {
    let state_count = goto.state_count();
    let mut failure = vec![0u32; state_count];
    let mut queue: VecDeque<StateId> = VecDeque::new();

    for b in 0..256u16 {
        let child = goto.get(0, b as u8);
        if child != 0 {
            failure[child as usize] = 0;
            queue.push_back(child);
        }
    }

    while let Some(r) = queue.pop_front() {
        for b in 0..256u16 {
            let u = goto.get(r, b as u8);
            if u == FAIL {
                continue;
            }
            queue.push_back(u);

            let mut s = failure[r as usize];
            while goto.get(s, b as u8) == FAIL {
                s = failure[s as usize];
            }
            let f = goto.get(s, b as u8);
            failure[u as usize] = f;
            output.union_into(u, f);
        }
    }

    failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Flags;

    fn store(patterns: &[(&[u8], u32)]) -> PatternStore {
        let mut store = PatternStore::new();
        for &(bytes, id) in patterns {
            store.register(bytes, id, Flags::empty()).unwrap();
        }
        store
    }

    #[test]
    fn root_self_loop_after_build() {
        let store = store(&[(b"abcd", 0)]);
        let (goto, _) = build_goto(&store, None).unwrap();
        // 'z' is not a first byte of any pattern, so it self-loops at root.
        assert_eq!(goto.get(0, b'z'), 0);
    }

    #[test]
    fn shared_prefixes_share_states() {
        let store = store(&[(b"abcd", 0), (b"abce", 1)]);
        let (goto, output) = build_goto(&store, None).unwrap();
        let s_a = goto.get(0, b'a');
        let s_ab = goto.get(s_a, b'b');
        let s_abc = goto.get(s_ab, b'c');
        let s_abcd = goto.get(s_abc, b'd');
        let s_abce = goto.get(s_abc, b'e');
        assert_eq!(output.row(s_abcd), &[0]);
        assert_eq!(output.row(s_abce), &[1]);
    }

    #[test]
    fn failure_merges_suffix_outputs() {
        // classic "he"/"she"/"his"/"hers" suffix-closure example.
        let store = store(&[(b"he", 1), (b"she", 2), (b"his", 3), (b"hers", 4)]);
        let (goto, mut output) = build_goto(&store, None).unwrap();
        let _failure = compute_failure(&goto, &mut output);

        // walk "she": s -> h -> e
        let s_s = goto.get(0, b's');
        let s_sh = goto.get(s_s, b'h');
        let s_she = goto.get(s_sh, b'e');
        assert_eq!(output.row(s_she), &[2, 1]);
    }
}
