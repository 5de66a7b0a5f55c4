//! The Scanner: the hot loop that walks the flat delta table over input
//! bytes and emits matched pattern ids into a caller-provided [`Sink`].
//!
//! Implements the canonical linear walk over the buffer rather than the
//! reference `SCPFACSearch`'s O(n²) re-scan from every offset.

use crate::delta::DeltaTable;
use crate::pattern::ascii_tolower;
use crate::verify::VerifierIndex;

const PID_MASK: u32 = 0x0000_FFFF;
const VERIFY_BIT: u32 = 1 << 16;

/// Caller-owned pid-collection structure: a bitset for at-most-once
/// recording per scan, plus an ordered, append-only list of the pids
/// recorded so far.
pub struct Sink {
    seen_bits: Vec<u64>,
    pid_list: Vec<u32>,
}

impl Sink {
    pub(crate) fn with_capacity(max_pid_exclusive: u32) -> Self {
        let words = (max_pid_exclusive as usize).div_ceil(64).max(1);
        Sink {
            seen_bits: vec![0u64; words],
            pid_list: Vec::new(),
        }
    }

    /// Records `pid`, returning `true` if this is its first recording in
    /// the current scan.
    #[inline]
    fn record(&mut self, pid: u32) -> bool {
        let word = pid as usize / 64;
        let bit = pid as usize % 64;
        if word >= self.seen_bits.len() {
            self.seen_bits.resize(word + 1, 0);
        }
        let mask = 1u64 << bit;
        if self.seen_bits[word] & mask != 0 {
            false
        } else {
            self.seen_bits[word] |= mask;
            self.pid_list.push(pid);
            true
        }
    }

    /// The pattern ids recorded so far this scan, in first-seen order.
    pub fn matches(&self) -> &[u32] {
        &self.pid_list
    }

    pub fn len(&self) -> usize {
        self.pid_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pid_list.is_empty()
    }

    /// Resets the sink so it can be reused for another scan.
    pub fn clear(&mut self) {
        for word in &mut self.seen_bits {
            *word = 0;
        }
        self.pid_list.clear();
    }
}

/// Runs the linear scan over `buf`, emitting matched pids into `sink`.
/// Returns the total number of pid-emission events, which may exceed
/// `sink.len()` since the sink deduplicates but the count does not.
pub(crate) fn scan(
    delta: &DeltaTable,
    outputs: &[Box<[u32]>],
    verifier: &VerifierIndex,
    buf: &[u8],
    sink: &mut Sink,
) -> u32 {
    let mut state: u32 = 0;
    let mut count: u32 = 0;

    for (i, &raw) in buf.iter().enumerate() {
        let (next, has_output) = delta.step(state, ascii_tolower(raw));
        state = next;
        if !has_output {
            continue;
        }

        for &packed in outputs[state as usize].iter() {
            let pid = packed & PID_MASK;
            if packed & VERIFY_BIT != 0 {
                let Some(needle) = verifier.bytes_for(pid) else {
                    continue;
                };
                let start = i + 1 - needle.len();
                if &buf[start..=i] != needle {
                    continue;
                }
            }
            count += 1;
            sink.record(pid);
        }
    }

    count
}

/// A single reported occurrence, yielded by [`crate::Pfac::scan_iter`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Match {
    pattern: u32,
    len: u16,
    end: usize,
}

impl Match {
    /// The identifier of the pattern that matched.
    #[inline]
    pub fn pattern(&self) -> u32 {
        self.pattern
    }

    /// The starting byte offset of the match, inclusive.
    #[inline]
    pub fn start(&self) -> usize {
        self.end - self.len as usize
    }

    /// The ending byte offset of the match, exclusive.
    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }
}

/// Iterator over every (post-verification) match in a buffer, in the order
/// the scanner's terminating position advances -- does not deduplicate by
/// pattern id, unlike [`Sink`]; every occurrence is yielded.
pub struct MatchIter<'a> {
    delta: &'a DeltaTable,
    outputs: &'a [Box<[u32]>],
    lens: &'a [u16],
    verifier: &'a VerifierIndex,
    buf: &'a [u8],
    state: u32,
    pos: usize,
    pending: std::vec::IntoIter<u32>,
    pending_end: usize,
}

impl<'a> MatchIter<'a> {
    pub(crate) fn new(
        delta: &'a DeltaTable,
        outputs: &'a [Box<[u32]>],
        lens: &'a [u16],
        verifier: &'a VerifierIndex,
        buf: &'a [u8],
    ) -> Self {
        MatchIter {
            delta,
            outputs,
            lens,
            verifier,
            buf,
            state: 0,
            pos: 0,
            pending: Vec::new().into_iter(),
            pending_end: 0,
        }
    }
}

impl<'a> Iterator for MatchIter<'a> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        loop {
            if let Some(pid) = self.pending.next() {
                let len = self.lens[pid as usize];
                return Some(Match {
                    pattern: pid,
                    len,
                    end: self.pending_end,
                });
            }

            if self.pos >= self.buf.len() {
                return None;
            }

            let raw = self.buf[self.pos];
            let (next, has_output) = self.delta.step(self.state, ascii_tolower(raw));
            self.state = next;
            let i = self.pos;
            self.pos += 1;

            if !has_output {
                continue;
            }

            let verified: Vec<u32> = self.outputs[self.state as usize]
                .iter()
                .filter_map(|&packed| {
                    let pid = packed & PID_MASK;
                    if packed & VERIFY_BIT != 0 {
                        let needle = self.verifier.bytes_for(pid)?;
                        let start = i + 1 - needle.len();
                        if &self.buf[start..=i] != needle {
                            return None;
                        }
                    }
                    Some(pid)
                })
                .collect();

            if verified.is_empty() {
                continue;
            }
            self.pending_end = i + 1;
            self.pending = verified.into_iter();
        }
    }
}
