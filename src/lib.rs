//! PFAC — Parallel Failureless Aho-Corasick.
//!
//! A multi-pattern byte-string matching engine built on a deterministic
//! automaton derived from the Aho-Corasick construction, with failure
//! transitions inlined into the goto table ("failureless") so that
//! scanning is a pure DFA walk with no failure-link chasing at match time.
//!
//! Typical usage:
//!
//! ```
//! use pfac::{Flags, PfacBuilder};
//!
//! let mut builder = PfacBuilder::new();
//! builder.register(b"he", 0, Flags::empty()).unwrap();
//! builder.register(b"she", 1, Flags::empty()).unwrap();
//! builder.register(b"hers", 2, Flags::empty()).unwrap();
//! let pfac = builder.prepare().unwrap();
//!
//! let mut sink = pfac.new_sink();
//! pfac.scan(b"shers", &mut sink);
//! let mut matched = sink.matches().to_vec();
//! matched.sort_unstable();
//! assert_eq!(matched, vec![0, 1, 2]);
//! ```

mod delta;
mod error;
mod goto;
mod pattern;
mod scanner;
mod state_id;
mod verify;

pub use crate::error::{PfacError, Result};
pub use crate::pattern::Flags;
pub use crate::scanner::{Match, MatchIter, Sink};

use crate::delta::DeltaTable;
use crate::pattern::PatternStore;
use crate::verify::VerifierIndex;

/// Construction-time options for a [`PfacBuilder`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PfacOptions {
    /// Caps the number of trie states the goto builder may allocate.
    /// `None` (the default) means unbounded (growable `Vec`-backed
    /// scratch tables, unlike the fixed-capacity ring buffer described for
    /// the reference construction queue).
    pub max_states: Option<usize>,

    /// When set, `prepare()` builds both the narrow (16-bit) and wide
    /// (32-bit) delta tables in the same pass, rather than just the one
    /// the state count calls for. Useful for hybrid host/accelerator
    /// deployments that want to hand either width off. This is a
    /// per-builder field rather than the reference implementation's
    /// process-wide toggle.
    pub dual_width: bool,
}

/// A mutable compilation context. Patterns may be registered until
/// [`PfacBuilder::prepare`] is called, after which the compiled [`Pfac`]
/// context is immutable and may be shared across concurrent scanners.
pub struct PfacBuilder {
    patterns: PatternStore,
    options: PfacOptions,
}

impl Default for PfacBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PfacBuilder {
    pub fn new() -> Self {
        PfacBuilder::with_options(PfacOptions::default())
    }

    pub fn with_options(options: PfacOptions) -> Self {
        PfacBuilder {
            patterns: PatternStore::new(),
            options,
        }
    }

    /// Registers a pattern. `id` must fit in 16 bits in the compiled form.
    /// A zero-length pattern is warned about and ignored, matching
    /// `util-mpm-pfac.c`'s `SCPFACAddPattern` treatment of `pat_len == 0`.
    /// A duplicate `id` is a silent no-op.
    pub fn register(&mut self, bytes: &[u8], id: u32, flags: Flags) -> Result<()> {
        self.patterns.register(bytes, id, flags)
    }

    /// Compiles the registered patterns into an immutable [`Pfac`] context:
    /// builds the goto trie, solves failure links, flattens into the delta
    /// table, and builds the output-presence and case-verifier side
    /// tables. The goto/failure scratch structures are dropped on return.
    pub fn prepare(self) -> Result<Pfac> {
        let (goto_table, mut output_table) = goto::build_goto(&self.patterns, self.options.max_states)?;
        let failure_table = goto::compute_failure(&goto_table, &mut output_table);
        let (delta, dual) = delta::flatten(&goto_table, &failure_table, &output_table, self.options.dual_width);
        let outputs = delta::pack_outputs(&output_table, &self.patterns);
        let verifier = VerifierIndex::build(&self.patterns);

        let mut lens = vec![0u16; self.patterns.max_pat_id() as usize + 1];
        for pattern in self.patterns.iter() {
            lens[pattern.id as usize] = pattern.len;
        }

        Ok(Pfac {
            delta,
            dual,
            outputs,
            verifier,
            lens,
            pattern_count: self.patterns.len(),
            max_pat_id: self.patterns.max_pat_id(),
        })
    }
}

/// A compiled, immutable matching context. Safe to share by reference
/// across arbitrarily many concurrent scanners, each with its own [`Sink`].
pub struct Pfac {
    delta: DeltaTable,
    dual: Option<DeltaTable>,
    outputs: Vec<Box<[u32]>>,
    verifier: VerifierIndex,
    lens: Vec<u16>,
    pattern_count: usize,
    max_pat_id: u32,
}

impl Pfac {
    /// Builds a [`Sink`] sized for this context's pattern id space.
    pub fn new_sink(&self) -> Sink {
        Sink::with_capacity(self.max_pat_id + 1)
    }

    /// Scans `buf`, recording matched pattern ids into `sink`. Returns the
    /// total number of pid-emission events (not the number of unique pids
    /// recorded -- see [`Sink::matches`] for that). A buffer of length 0
    /// is a no-op returning 0.
    pub fn scan(&self, buf: &[u8], sink: &mut Sink) -> u32 {
        scanner::scan(&self.delta, &self.outputs, &self.verifier, buf, sink)
    }

    /// Convenience over [`Pfac::scan`] for callers who only need the raw
    /// match count and not the pid list.
    pub fn scan_count(&self, buf: &[u8]) -> u32 {
        let mut sink = self.new_sink();
        self.scan(buf, &mut sink)
    }

    /// Iterates every post-verification match in `buf` without an
    /// explicit [`Sink`]; unlike `scan`, does not deduplicate by pattern
    /// id -- every occurrence is yielded.
    pub fn scan_iter<'a>(&'a self, buf: &'a [u8]) -> MatchIter<'a> {
        MatchIter::new(&self.delta, &self.outputs, &self.lens, &self.verifier, buf)
    }

    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }

    /// Approximate heap usage of the compiled delta table(s) -- the
    /// dominant allocation, sized `state_count * 256 * cell_width`.
    pub fn heap_bytes(&self) -> usize {
        self.delta.heap_bytes() + self.dual.as_ref().map_or(0, DeltaTable::heap_bytes)
    }

    /// The number of states in the compiled automaton.
    pub fn state_count(&self) -> usize {
        self.delta.state_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_1_single_pattern_hit() {
        let mut b = PfacBuilder::new();
        b.register(b"abcd", 0, Flags::empty()).unwrap();
        let pfac = b.prepare().unwrap();
        let mut sink = pfac.new_sink();
        let count = pfac.scan(b"abcdefghjiklmnopqrstuvwxyz", &mut sink);
        assert_eq!(sink.matches(), &[0]);
        assert_eq!(count, 1);
    }

    #[test]
    fn scenario_2_no_match() {
        let mut b = PfacBuilder::new();
        b.register(b"abce", 0, Flags::empty()).unwrap();
        let pfac = b.prepare().unwrap();
        let mut sink = pfac.new_sink();
        let count = pfac.scan(b"abcdefghjiklmnopqrstuvwxyz", &mut sink);
        assert!(sink.is_empty());
        assert_eq!(count, 0);
    }

    #[test]
    fn scenario_3_multiple_disjoint_patterns() {
        let mut b = PfacBuilder::new();
        b.register(b"abcd", 0, Flags::empty()).unwrap();
        b.register(b"bcde", 1, Flags::empty()).unwrap();
        b.register(b"fghj", 2, Flags::empty()).unwrap();
        let pfac = b.prepare().unwrap();
        let mut sink = pfac.new_sink();
        let count = pfac.scan(b"abcdefghjiklmnopqrstuvwxyz", &mut sink);
        let mut matched = sink.matches().to_vec();
        matched.sort_unstable();
        assert_eq!(matched, vec![0, 1, 2]);
        assert_eq!(count, 3);
    }

    #[test]
    fn scenario_4_nocase() {
        let mut b = PfacBuilder::new();
        b.register(b"ABCD", 0, Flags::NOCASE).unwrap();
        b.register(b"bCdEfG", 1, Flags::NOCASE).unwrap();
        b.register(b"fghJikl", 2, Flags::NOCASE).unwrap();
        let pfac = b.prepare().unwrap();
        let mut sink = pfac.new_sink();
        pfac.scan(b"abcdefghjiklmnopqrstuvwxyz", &mut sink);
        let mut matched = sink.matches().to_vec();
        matched.sort_unstable();
        assert_eq!(matched, vec![0, 1, 2]);
    }

    #[test]
    fn scenario_5_overlapping_suffix_closure() {
        let mut b = PfacBuilder::new();
        b.register(b"he", 1, Flags::empty()).unwrap();
        b.register(b"she", 2, Flags::empty()).unwrap();
        b.register(b"his", 3, Flags::empty()).unwrap();
        b.register(b"hers", 4, Flags::empty()).unwrap();
        let pfac = b.prepare().unwrap();

        let mut sink = pfac.new_sink();
        pfac.scan(b"she", &mut sink);
        let mut matched = sink.matches().to_vec();
        matched.sort_unstable();
        assert_eq!(matched, vec![1, 2]);

        let mut sink = pfac.new_sink();
        pfac.scan(b"hers", &mut sink);
        let mut matched = sink.matches().to_vec();
        matched.sort_unstable();
        assert_eq!(matched, vec![1, 4]);

        let mut sink = pfac.new_sink();
        pfac.scan(b"his", &mut sink);
        assert_eq!(sink.matches(), &[3]);
    }

    #[test]
    fn scenario_6_case_verification_rejects_mismatch() {
        let mut b = PfacBuilder::new();
        b.register(b"Works", 0, Flags::NOCASE).unwrap();
        b.register(b"Works", 1, Flags::empty()).unwrap();
        let pfac = b.prepare().unwrap();
        let mut sink = pfac.new_sink();
        pfac.scan(b"works", &mut sink);
        assert_eq!(sink.matches(), &[0]);
    }

    #[test]
    fn scenario_7_no_substring_match() {
        let mut b = PfacBuilder::new();
        b.register(b"ONE", 0, Flags::empty()).unwrap();
        let pfac = b.prepare().unwrap();
        let mut sink = pfac.new_sink();
        pfac.scan(b"tone", &mut sink);
        assert!(sink.is_empty());
    }

    #[test]
    fn empty_buffer_is_a_noop() {
        let mut b = PfacBuilder::new();
        b.register(b"abc", 0, Flags::empty()).unwrap();
        let pfac = b.prepare().unwrap();
        let mut sink = pfac.new_sink();
        assert_eq!(pfac.scan(b"", &mut sink), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn scan_iter_yields_every_occurrence_without_dedup() {
        let mut b = PfacBuilder::new();
        b.register(b"aa", 0, Flags::empty()).unwrap();
        let pfac = b.prepare().unwrap();
        let ends: Vec<usize> = pfac.scan_iter(b"aaaa").map(|m| m.end()).collect();
        // overlapping occurrences of "aa" in "aaaa" end at 2, 3, 4.
        assert_eq!(ends, vec![2, 3, 4]);
    }

    #[test]
    fn pfac_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pfac>();
    }

    #[test]
    fn dual_width_builds_both_tables() {
        let mut b = PfacBuilder::with_options(PfacOptions {
            max_states: None,
            dual_width: true,
        });
        b.register(b"abc", 0, Flags::empty()).unwrap();
        let pfac = b.prepare().unwrap();
        assert!(pfac.dual.is_some());
    }
}
