pub(crate) mod packed;
pub(crate) mod probe;

use std::io;
use std::ptr;
use std::sync::atomic::{self, AtomicPtr, AtomicU32, AtomicU64, Ordering};

use crate::stats::Stats;
use crate::value::Value;

use self::packed::{PackedKeys, SetOutcome};

/// The number of chunks an old table is split into during copy-over.
///
/// Every participating worker claims chunks from a shared cursor, so this
/// bounds both the claim overhead and the copy imbalance between workers.
pub const COPY_CHUNKS: u32 = 128;

/// One sized table: packed keys, counter cells and the metadata that ties
/// a chain of generations together.
///
/// Generations are linked oldest-to-newest through `next` and freed oldest
/// first: the link from a generation to its successor counts as one
/// reference on the successor, so a generation can only die after every
/// older generation has died and dropped its link.
///
/// Construction is not thread safe; the resize lock serializes it.
pub struct Generation<V: Value> {
    /// Slot count, always a power of two.
    pub size: u64,
    /// `size - 1`, the index mask.
    pub mod_mask: u64,
    keys: PackedKeys,
    vals: Box<[V::Atomic]>,
    /// Approximate occupancy. Bumped on fresh installs only, read for the
    /// resize diagnostics; never used for correctness.
    nb_elt: AtomicU64,
    refs: AtomicU32,
    /// The younger generation, if this one has been superseded.
    next: AtomicPtr<Generation<V>>,
    copy_cursor: AtomicU32,
}

impl<V: Value> Generation<V> {
    /// Allocate a generation with at least `size` slots, rounded up to a
    /// power of two, and link it as the successor of `prev`.
    ///
    /// The returned pointer carries no references; the caller decides who
    /// holds it. When `prev` is non-null the link itself takes one
    /// reference on the new generation.
    pub fn alloc(key_bits: u32, size: u64, prev: *mut Generation<V>) -> *mut Generation<V> {
        let size = size.next_power_of_two().max(1);

        let gen = Box::into_raw(Box::new(Generation {
            size,
            mod_mask: size - 1,
            keys: PackedKeys::new(key_bits, size),
            vals: (0..size).map(|_| V::new_atomic()).collect(),
            nb_elt: AtomicU64::new(0),
            refs: AtomicU32::new(0),
            next: AtomicPtr::new(ptr::null_mut()),
            copy_cursor: AtomicU32::new(0),
        }));

        if !prev.is_null() {
            // Safety: the caller owns `prev` through at least one
            // reference, and construction runs under the resize lock.
            unsafe {
                (*gen).ref_inc();
                (*prev).next.store(gen, Ordering::Release);
            }
        }

        gen
    }

    /// Insert-or-increment `key` at slot `idx` with a saturating add of
    /// `val`. Returns `false` when the slot is owned by a different key
    /// and the caller must reprobe.
    pub fn add(&self, idx: u64, key: u64, val: V, stats: &Stats) -> bool {
        match self.keys.set(idx, key) {
            SetOutcome::Conflict => {
                stats.key_conflict();
                return false;
            }
            SetOutcome::Installed => {
                self.nb_elt.fetch_add(1, Ordering::Relaxed);
            }
            SetOutcome::Present => {}
        }

        let cell = &self.vals[idx as usize];
        let mut current = V::load(cell, Ordering::Acquire);

        loop {
            // Saturated is terminal; the addition is absorbed.
            if current == V::MAX {
                stats.maxed_out_val();
                return true;
            }

            let target = match current.checked_add(val) {
                Some(target) => target,
                // The addition would overflow the counter width, clamp.
                None => {
                    stats.maxed_out_val();
                    V::MAX
                }
            };

            match V::compare_exchange(cell, current, target) {
                Ok(_) => return true,
                Err(found) => {
                    stats.val_conflict();
                    current = found;
                }
            }
        }
    }

    /// Read slot `idx`, returning the key and counter when occupied.
    #[inline]
    pub fn get(&self, idx: u64) -> Option<(u64, V)> {
        let key = self.keys.get(idx)?;
        let val = V::load(&self.vals[idx as usize], Ordering::Acquire);
        Some((key, val))
    }

    /// Claim the next chunk of slots to copy over, or `None` when every
    /// chunk has been claimed.
    ///
    /// The cursor partitions the table into up to [`COPY_CHUNKS`] ranges;
    /// tables smaller than that degrade to one slot per chunk.
    pub fn claim_chunk(&self) -> Option<(u64, u64)> {
        let i = self.copy_cursor.fetch_add(1, Ordering::Relaxed);
        if i >= COPY_CHUNKS {
            return None;
        }

        let chunk = (self.size / COPY_CHUNKS as u64).max(1);
        let start = i as u64 * chunk;
        if start >= self.size {
            return None;
        }

        Some((start, (start + chunk).min(self.size)))
    }

    /// Approximate number of occupied slots.
    #[inline]
    pub fn occupancy(&self) -> u64 {
        self.nb_elt.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn ref_inc(&self) -> u32 {
        self.refs.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Drop one reference, returning the new count. The caller that sees
    /// zero owns the generation exclusively and must destroy it (normally
    /// via [`release`]).
    #[inline]
    pub fn ref_dec(&self) -> u32 {
        self.refs.fetch_sub(1, Ordering::Release) - 1
    }

    /// Serialize the packed key buffer followed by the raw little-endian
    /// counter array.
    pub fn write_to(&self, out: &mut impl io::Write) -> io::Result<()> {
        self.keys.write_to(out)?;

        let mut buf = [0u8; 8];
        for cell in self.vals.iter() {
            let buf = &mut buf[..V::BYTES];
            V::load(cell, Ordering::Relaxed).put_le(buf);
            out.write_all(buf)?;
        }

        Ok(())
    }
}

/// Drop one reference on `gen`, destroying it and cascading down the chain
/// when the count hits zero.
///
/// A dying generation holds one reference on its successor, so the release
/// can ripple from the oldest generation up to, at most, the current head.
///
/// # Safety
///
/// The caller must own one reference on `gen`.
pub unsafe fn release<V: Value>(mut gen: *mut Generation<V>, stats: &Stats) {
    unsafe {
        while !gen.is_null() && (*gen).ref_dec() == 0 {
            // Pair with the release decrements of every other owner so the
            // destructor observes all their writes.
            atomic::fence(Ordering::Acquire);

            let next = (*gen).next.load(Ordering::Relaxed);
            drop(Box::from_raw(gen));
            stats.destroyed();

            gen = next;
        }
    }
}
