//! Construction-time state identifiers.
//!
//! During construction every state is addressed by a plain `u32` index into
//! the goto/output scratch tables, with [`FAIL`] as the sentinel for "no
//! transition yet". The narrow-vs-wide choice only matters once the delta
//! table is flattened (see `delta.rs`), so there is no generic `StateID`
//! trait here.

pub(crate) type StateId = u32;

/// Sentinel marking the absence of a goto transition, mirroring
/// `SC_PFAC_FAIL` / `NO_STATE` in the reference implementations.
pub(crate) const FAIL: StateId = u32::MAX;

/// Converts a `usize` state count into a `StateId`, returning `None` if it
/// would collide with the [`FAIL`] sentinel.
pub(crate) fn usize_to_state_id(value: usize) -> Option<StateId> {
    if value >= FAIL as usize {
        None
    } else {
        Some(value as StateId)
    }
}
