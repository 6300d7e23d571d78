use std::fmt;
use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicU8, Ordering};

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width saturating counter value.
///
/// Implemented for `u8`, `u16`, `u32` and `u64`. The all-ones pattern
/// ([`Value::MAX`]) means the counter is saturated; further additions are
/// absorbed silently.
pub trait Value:
    sealed::Sealed + Copy + Eq + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// The atomic cell backing one counter slot.
    #[doc(hidden)]
    type Atomic: Send + Sync;

    /// The saturated (all-ones) value.
    const MAX: Self;

    /// The unit increment used by `inc`.
    const ONE: Self;

    /// Serialized width in bytes.
    const BYTES: usize;

    #[doc(hidden)]
    fn new_atomic() -> Self::Atomic;

    #[doc(hidden)]
    fn load(cell: &Self::Atomic, order: Ordering) -> Self;

    #[doc(hidden)]
    fn compare_exchange(cell: &Self::Atomic, current: Self, new: Self) -> Result<Self, Self>;

    /// `None` when `self + rhs` does not fit the width, i.e. when the
    /// unsigned complement of `self` is smaller than `rhs`.
    #[doc(hidden)]
    fn checked_add(self, rhs: Self) -> Option<Self>;

    #[doc(hidden)]
    fn put_le(self, out: &mut [u8]);

    #[doc(hidden)]
    fn read_le(buf: &[u8]) -> Self;
}

macro_rules! impl_value {
    ($int:ty, $atomic:ty) => {
        impl sealed::Sealed for $int {}

        impl Value for $int {
            type Atomic = $atomic;

            const MAX: $int = <$int>::MAX;
            const ONE: $int = 1;
            const BYTES: usize = std::mem::size_of::<$int>();

            #[inline]
            fn new_atomic() -> $atomic {
                <$atomic>::new(0)
            }

            #[inline]
            fn load(cell: &$atomic, order: Ordering) -> $int {
                cell.load(order)
            }

            #[inline]
            fn compare_exchange(cell: &$atomic, current: $int, new: $int) -> Result<$int, $int> {
                cell.compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
            }

            #[inline]
            fn checked_add(self, rhs: $int) -> Option<$int> {
                <$int>::checked_add(self, rhs)
            }

            #[inline]
            fn put_le(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(buf: &[u8]) -> $int {
                <$int>::from_le_bytes(buf.try_into().unwrap())
            }
        }
    };
}

impl_value!(u8, AtomicU8);
impl_value!(u16, AtomicU16);
impl_value!(u32, AtomicU32);
impl_value!(u64, AtomicU64);
