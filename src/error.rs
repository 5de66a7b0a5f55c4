//! Error types for pattern registration and compilation.

/// Errors that can occur while building or compiling a [`crate::PfacBuilder`].
///
/// Scanning a compiled [`crate::Pfac`] never fails (see `Scanner` in the
/// crate-level docs): all fallibility lives in registration and `prepare`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PfacError {
    /// A pattern id does not fit in the compiled representation's 16 bits.
    #[error("pattern id {0} exceeds the 16-bit compiled representation")]
    PidOverflow(u32),

    /// The breadth-first construction queue grew past the configured cap.
    ///
    /// Only possible when [`crate::PfacOptions::max_states`] is set; by
    /// default the queue is an unbounded growable `VecDeque` and this
    /// variant is unreachable.
    #[error("construction queue capacity exceeded: state count {0} exceeds the configured maximum")]
    CapacityExceeded(usize),
}

pub type Result<T> = std::result::Result<T, PfacError>;
