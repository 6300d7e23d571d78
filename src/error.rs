/// Errors surfaced when reconstructing a table from a dumped byte buffer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The declared slot count is not a power of two. The import path maps
    /// a fixed layout and is not allowed to round.
    #[error("size {0} must be a power of 2")]
    BadSize(u64),

    /// The buffer does not match the layout implied by the declared key
    /// width and slot count.
    #[error("buffer holds {actual} bytes, layout requires {expected}")]
    BadLength { expected: usize, actual: usize },
}
