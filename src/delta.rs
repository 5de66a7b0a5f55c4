//! Delta Flattener and Output Presence Encoder.
//!
//! Rewrites the trie+failure pair into a flat 256-way transition table per
//! state, absorbing failure jumps so scanning needs no failure follow-up,
//! then stamps a high bit on each cell whose destination has non-empty
//! output. Mirrors `util-mpm-pfac.c`'s `SCPFACCreateDeltaTable{16,32}` and
//! the "complete DFA" phase of `omirandette-rule-engine`'s `build()`.

use std::collections::VecDeque;

use crate::goto::{GotoTable, OutputTable};
use crate::pattern::PatternStore;
use crate::state_id::{StateId, FAIL};

/// Threshold below which the narrow (16-bit) cell representation is used:
/// state ids must fit in 15 bits, leaving the top bit for output presence.
const NARROW_STATE_LIMIT: usize = 32767;

const NARROW_STATE_MASK: u16 = 0x7FFF;
const NARROW_OUTPUT_BIT: u16 = 0x8000;

const WIDE_STATE_MASK: u32 = 0x00FF_FFFF;
const WIDE_OUTPUT_BIT: u32 = 0x0100_0000;

const VERIFY_BIT: u32 = 1 << 16;
const PID_MASK: u32 = 0x0000_FFFF;

/// The flattened transition table: one packed cell per (state, byte).
pub(crate) enum DeltaTable {
    Narrow { cells: Vec<u16>, state_count: usize },
    Wide { cells: Vec<u32>, state_count: usize },
}

impl DeltaTable {
    pub(crate) fn state_count(&self) -> usize {
        match self {
            DeltaTable::Narrow { state_count, .. } => *state_count,
            DeltaTable::Wide { state_count, .. } => *state_count,
        }
    }

    #[inline]
    pub(crate) fn step(&self, state: u32, byte: u8) -> (u32, bool) {
        match self {
            DeltaTable::Narrow { cells, .. } => {
                let cell = cells[state as usize * 256 + byte as usize];
                (
                    (cell & NARROW_STATE_MASK) as u32,
                    cell & NARROW_OUTPUT_BIT != 0,
                )
            }
            DeltaTable::Wide { cells, .. } => {
                let cell = cells[state as usize * 256 + byte as usize];
                (cell & WIDE_STATE_MASK, cell & WIDE_OUTPUT_BIT != 0)
            }
        }
    }

    pub(crate) fn heap_bytes(&self) -> usize {
        match self {
            DeltaTable::Narrow { cells, .. } => cells.len() * std::mem::size_of::<u16>(),
            DeltaTable::Wide { cells, .. } => cells.len() * std::mem::size_of::<u32>(),
        }
    }
}

/// Flattens `goto`+`failure` into a [`DeltaTable`], choosing the cell width
/// from the state count, then stamps the output-presence bit on every cell.
///
/// `dual: true` additionally builds the opposite width so a caller (e.g. a
/// hybrid host/accelerator deployment) can hand off either table; see
/// `PfacOptions::dual_width`.
pub(crate) fn flatten(
    goto: &GotoTable,
    failure: &[StateId],
    output: &OutputTable,
    dual: bool,
) -> (DeltaTable, Option<DeltaTable>) {
    let narrow_fits = goto.state_count() < NARROW_STATE_LIMIT;

    let primary = if narrow_fits {
        flatten_narrow(goto, failure, output)
    } else {
        flatten_wide(goto, failure, output)
    };

    let secondary = if dual {
        Some(if narrow_fits {
            flatten_wide(goto, failure, output)
        } else {
            flatten_narrow(goto, failure, output)
        })
    } else {
        None
    };

    (primary, secondary)
}

/// Returns states in BFS order from the root, matching the order the
/// original construction enqueues them in -- the order the flattener
/// depends on, since `failure[r]`'s row must already be fully populated by
/// the time `r` is processed.
fn bfs_order(goto: &GotoTable) -> Vec<StateId> {
    let state_count = goto.state_count();
    let mut visited = vec![false; state_count];
    let mut order = Vec::with_capacity(state_count);
    let mut queue: VecDeque<StateId> = VecDeque::new();

    visited[0] = true;
    order.push(0);
    for b in 0..256u16 {
        let dest = goto.get(0, b as u8);
        if dest != 0 && !visited[dest as usize] {
            visited[dest as usize] = true;
            queue.push_back(dest);
        }
    }
    while let Some(r) = queue.pop_front() {
        order.push(r);
        for b in 0..256u16 {
            let direct = goto.get(r, b as u8);
            if direct != FAIL && !visited[direct as usize] {
                visited[direct as usize] = true;
                queue.push_back(direct);
            }
        }
    }
    order
}

fn flatten_narrow(goto: &GotoTable, failure: &[StateId], output: &OutputTable) -> DeltaTable {
    let state_count = goto.state_count();
    let mut cells = vec![0u16; state_count * 256];
    for r in bfs_order(goto) {
        for b in 0..256u16 {
            let direct = goto.get(r, b as u8);
            let dest = if direct != FAIL {
                direct
            } else {
                // r == 0 never reaches here: root has no FAIL cells.
                cells[failure[r as usize] as usize * 256 + b as usize] as u32 & NARROW_STATE_MASK as u32
            };
            cells[r as usize * 256 + b as usize] = dest as u16;
        }
    }
    stamp_output_presence_narrow(&mut cells, output);
    DeltaTable::Narrow { cells, state_count }
}

fn flatten_wide(goto: &GotoTable, failure: &[StateId], output: &OutputTable) -> DeltaTable {
    let state_count = goto.state_count();
    let mut cells = vec![0u32; state_count * 256];
    for r in bfs_order(goto) {
        for b in 0..256u16 {
            let direct = goto.get(r, b as u8);
            let dest = if direct != FAIL {
                direct
            } else {
                cells[failure[r as usize] as usize * 256 + b as usize] & WIDE_STATE_MASK
            };
            cells[r as usize * 256 + b as usize] = dest;
        }
    }
    stamp_output_presence_wide(&mut cells, output);
    DeltaTable::Wide { cells, state_count }
}

/// Output Presence Encoder: iterates every (state, byte) cell and sets the
/// high bit when the destination state's output row is non-empty.
/// O(states * 256), one-shot.
fn stamp_output_presence_narrow(cells: &mut [u16], output: &OutputTable) {
    for cell in cells.iter_mut() {
        let dest = (*cell & NARROW_STATE_MASK) as u32;
        if !output.is_empty_at(dest) {
            *cell |= NARROW_OUTPUT_BIT;
        }
    }
}

fn stamp_output_presence_wide(cells: &mut [u32], output: &OutputTable) {
    for cell in cells.iter_mut() {
        let dest = *cell & WIDE_STATE_MASK;
        if !output.is_empty_at(dest) {
            *cell |= WIDE_OUTPUT_BIT;
        }
    }
}

/// Packs each output row's pattern ids with the verify bit set according to
/// whether the originating pattern was registered case-sensitive.
pub(crate) fn pack_outputs(output: &OutputTable, patterns: &PatternStore) -> Vec<Box<[u32]>> {
    let mut verify_by_id = vec![false; patterns.max_pat_id() as usize + 1];
    for pattern in patterns.iter() {
        verify_by_id[pattern.id as usize] = pattern.needs_verify();
    }

    (0..output.state_count())
        .map(|state| {
            output
                .row(state as StateId)
                .iter()
                .map(|&pid| {
                    if verify_by_id.get(pid as usize).copied().unwrap_or(false) {
                        (pid & PID_MASK) | VERIFY_BIT
                    } else {
                        pid & PID_MASK
                    }
                })
                .collect::<Vec<_>>()
                .into_boxed_slice()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goto::build_goto;
    use crate::goto::compute_failure;
    use crate::pattern::Flags;

    fn store(patterns: &[(&[u8], u32)]) -> PatternStore {
        let mut store = PatternStore::new();
        for &(bytes, id) in patterns {
            store.register(bytes, id, Flags::empty()).unwrap();
        }
        store
    }

    #[test]
    fn delta_has_no_fail_cells() {
        let s = store(&[(b"abcd", 0), (b"bcde", 1), (b"fghj", 2)]);
        let (goto, mut output) = build_goto(&s, None).unwrap();
        let failure = compute_failure(&goto, &mut output);
        let (delta, _) = flatten(&goto, &failure, &output, false);
        for state in 0..delta.state_count() as u32 {
            for b in 0..=255u8 {
                let (next, _) = delta.step(state, b);
                assert!((next as usize) < delta.state_count());
            }
        }
    }

    #[test]
    fn root_cell_self_loops_for_unknown_byte() {
        let s = store(&[(b"abcd", 0)]);
        let (goto, mut output) = build_goto(&s, None).unwrap();
        let failure = compute_failure(&goto, &mut output);
        let (delta, _) = flatten(&goto, &failure, &output, false);
        let (next, has_output) = delta.step(0, b'z');
        assert_eq!(next, 0);
        assert!(!has_output);
    }
}
