//! A concurrent, bit-packed, saturating counting hash table.
//!
//! `mercount` is built for the k-mer counting workload: tens to hundreds of
//! threads each streaming billions of fixed-width integer keys into one
//! table, each insert bumping a saturating per-key counter. There are no
//! deletions, and reads happen only after the writers quiesce.
//!
//! Keys are stored bit-packed at a configurable width and installed with a
//! single compare-and-swap, counters saturate instead of wrapping, and the
//! table grows by chaining doubled generations that all workers migrate
//! cooperatively. See [`HashCounter`] for the worker contract around
//! resizing.
//!
//! # Usage
//!
//! ```
//! use mercount::HashCounter;
//!
//! let counter = HashCounter::<u32>::builder()
//!     .key_bits(34)
//!     .capacity(1 << 12)
//!     .threads(1)
//!     .build();
//!
//! let mut handle = counter.handle();
//! handle.inc(0b1101);
//! handle.add(0b1101, 3);
//! drop(handle);
//!
//! let mut counter = counter;
//! assert_eq!(counter.iter().collect::<Vec<_>>(), vec![(0b1101, 4)]);
//! ```

mod counter;
mod error;
mod hash;
mod mapped;
mod raw;
mod stats;
mod value;

pub use counter::{CounterHandle, HashCounter, HashCounterBuilder, Iter};
pub use error::Error;
pub use hash::{murmur64a, DefaultHashBuilder, MurmurHasher};
pub use mapped::{MappedIter, MappedTable};
pub use stats::StatsSnapshot;
pub use value::Value;
