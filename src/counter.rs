use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::io;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Barrier;

use parking_lot::Mutex;

use crate::hash::DefaultHashBuilder;
use crate::raw::{self, probe::Reprobe, Generation};
use crate::stats::{self, Stats, StatsSnapshot};
use crate::value::Value;

/// A concurrent counting hash table for fixed-width integer keys.
///
/// The table is built for one workload: many writer threads, each inserting
/// keys and bumping their saturating counters, with no deletions and no
/// readers while writers are active. Each worker drives the table through
/// its own [`CounterHandle`]; the read-only surface (iteration, dumping)
/// takes `&mut self`, so the borrow checker enforces the write quiescence
/// the dump formats rely on.
///
/// # Resizing
///
/// When a probe sequence runs past the reprobe limit, the triggering worker
/// allocates a generation of double the size and publishes it. Every worker
/// then meets at a barrier sized to the declared worker count and helps
/// copy the old generation over in chunks. Because the barrier is attended
/// by all workers, **exactly as many handles as the declared worker count
/// must participate in every resize**: create one handle per worker, and
/// keep idle workers calling [`CounterHandle::sync`] until all workers have
/// quiesced.
///
/// # Examples
///
/// ```
/// use mercount::HashCounter;
///
/// let counter = HashCounter::<u32>::builder()
///     .key_bits(64)
///     .capacity(1 << 10)
///     .threads(2)
///     .build();
///
/// std::thread::scope(|s| {
///     for t in 0u64..2 {
///         let mut handle = counter.handle();
///         s.spawn(move || {
///             for key in 1..=100 {
///                 handle.add(key * 2 + t, 1);
///             }
///         });
///     }
/// });
///
/// let mut counter = counter;
/// assert_eq!(counter.iter().count(), 200);
/// ```
pub struct HashCounter<V: Value, S = DefaultHashBuilder> {
    head: AtomicPtr<Generation<V>>,
    resize_lock: Mutex<()>,
    barrier: Barrier,
    stats: Stats,
    key_bits: u32,
    max_reprobe: u32,
    hash_builder: S,
}

/// A builder for a [`HashCounter`].
///
/// # Examples
///
/// ```
/// use mercount::HashCounter;
///
/// let counter = HashCounter::<u32>::builder()
///     // Width of a key cell, presence bit included.
///     .key_bits(42)
///     // Initial slot count, rounded up to a power of two.
///     .capacity(1 << 20)
///     // Probes tolerated before a resize is triggered.
///     .max_reprobe(64)
///     // Worker count; sizes the copy-over barrier.
///     .threads(8)
///     .build();
/// # drop(counter);
/// ```
pub struct HashCounterBuilder<V, S = DefaultHashBuilder> {
    key_bits: u32,
    capacity: u64,
    max_reprobe: u32,
    threads: usize,
    hasher: S,
    _v: PhantomData<V>,
}

impl<V: Value> HashCounterBuilder<V> {
    /// Set the hash builder used to spread keys over slots.
    ///
    /// The default is deterministic MurmurHash64A. A replacement must be a
    /// well-mixed 64-bit hash; the reprobe sequence assumes the full hash
    /// width carries entropy.
    pub fn hasher<S>(self, hasher: S) -> HashCounterBuilder<V, S> {
        HashCounterBuilder {
            key_bits: self.key_bits,
            capacity: self.capacity,
            max_reprobe: self.max_reprobe,
            threads: self.threads,
            hasher,
            _v: PhantomData,
        }
    }
}

impl<V: Value, S> HashCounterBuilder<V, S> {
    /// Set the key cell width in bits, presence bit included; keys may use
    /// up to `key_bits - 1` bits. Must be in `2..=64`.
    pub fn key_bits(mut self, key_bits: u32) -> Self {
        self.key_bits = key_bits;
        self
    }

    /// Set the initial slot count. Rounded up to the next power of two.
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set how many probes a worker tolerates before triggering a resize.
    /// Typical values are 32 to 256.
    pub fn max_reprobe(mut self, max_reprobe: u32) -> Self {
        self.max_reprobe = max_reprobe;
        self
    }

    /// Declare the number of worker threads. The copy-over barrier is sized
    /// to this count, so exactly this many handles must take part in every
    /// resize.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Construct the [`HashCounter`] with the configured options.
    ///
    /// # Panics
    ///
    /// Panics when `key_bits` is outside `2..=64`, or when `threads` or
    /// `max_reprobe` is zero.
    pub fn build(self) -> HashCounter<V, S> {
        assert!(
            (2..=64).contains(&self.key_bits),
            "key width {} out of range",
            self.key_bits
        );
        assert!(self.threads > 0, "at least one worker thread is required");
        assert!(self.max_reprobe > 0, "the reprobe limit must be non-zero");

        let head = Generation::<V>::alloc(self.key_bits, self.capacity, ptr::null_mut());

        // Safety: freshly allocated; this reference is the head reference,
        // dropped in `HashCounter::drop`.
        unsafe { (*head).ref_inc() };

        HashCounter {
            head: AtomicPtr::new(head),
            resize_lock: Mutex::new(()),
            barrier: Barrier::new(self.threads),
            stats: Stats::default(),
            key_bits: self.key_bits,
            max_reprobe: self.max_reprobe,
            hash_builder: self.hasher,
        }
    }
}

impl<V, S> fmt::Debug for HashCounterBuilder<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashCounterBuilder")
            .field("key_bits", &self.key_bits)
            .field("capacity", &self.capacity)
            .field("max_reprobe", &self.max_reprobe)
            .field("threads", &self.threads)
            .finish()
    }
}

impl<V: Value> HashCounter<V> {
    /// Creates a table with full-width keys, a small initial capacity and a
    /// single declared worker.
    ///
    /// # Examples
    ///
    /// ```
    /// use mercount::HashCounter;
    ///
    /// let counter = HashCounter::<u32>::new();
    /// let mut handle = counter.handle();
    /// handle.inc(7);
    /// ```
    pub fn new() -> HashCounter<V> {
        HashCounter::builder().build()
    }

    /// Returns a builder for a `HashCounter`.
    pub fn builder() -> HashCounterBuilder<V> {
        HashCounterBuilder {
            key_bits: 64,
            capacity: 1024,
            max_reprobe: 64,
            threads: 1,
            hasher: DefaultHashBuilder::default(),
            _v: PhantomData,
        }
    }
}

impl<V: Value> Default for HashCounter<V> {
    fn default() -> HashCounter<V> {
        HashCounter::new()
    }
}

impl<V: Value, S> HashCounter<V, S> {
    /// Creates a handle bound to this table. Every worker thread owns
    /// exactly one.
    ///
    /// All handles must exist before the first insert runs: a handle only
    /// helps copy a generation it has written, so one created between a
    /// resize and its copy-over would leave the barrier short.
    pub fn handle(&self) -> CounterHandle<'_, V, S> {
        // Serialized with resize so the loaded head cannot lose its head
        // reference before ours is taken.
        let _lock = self.resize_lock.lock();
        let head = self.head.load(Ordering::Acquire);

        // Safety: under the resize lock the head reference is live.
        unsafe { (*head).ref_inc() };

        CounterHandle { map: self, gen: head }
    }

    /// The slot count of the current generation.
    pub fn size(&mut self) -> u64 {
        self.current().size
    }

    /// The configured key cell width in bits.
    pub fn key_bits(&self) -> u32 {
        self.key_bits
    }

    /// An iterator over the `(key, count)` pairs of every occupied slot,
    /// in unspecified order.
    pub fn iter(&mut self) -> Iter<'_, V> {
        Iter {
            gen: self.current(),
            idx: 0,
        }
    }

    /// Serialize the current generation: the bit-packed key buffer followed
    /// by the counter array as raw little-endian values.
    ///
    /// [`MappedTable::from_bytes`](crate::MappedTable::from_bytes) restores
    /// a read-only view from the same layout.
    pub fn write(&mut self, out: &mut impl io::Write) -> io::Result<()> {
        self.current().write_to(out)
    }

    /// ASCII dump: one `"<key> <count>"` line per occupied slot.
    pub fn print(&mut self, out: &mut impl io::Write) -> io::Result<()> {
        let gen = self.current();
        for idx in 0..gen.size {
            if let Some((key, val)) = gen.get(idx) {
                writeln!(out, "{key} {val}")?;
            }
        }
        Ok(())
    }

    /// Whether stat recording was compiled in (the `stats` feature).
    pub fn has_stats(&self) -> bool {
        stats::enabled()
    }

    /// A snapshot of the global stat counters, `None` when recording is
    /// compiled out.
    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.stats.snapshot()
    }

    /// One `name: value` line per stat counter, `-` when recording is
    /// compiled out.
    pub fn print_stats(&self, out: &mut impl io::Write) -> io::Result<()> {
        self.stats.print(out)
    }

    fn current(&mut self) -> &Generation<V> {
        // Exclusive access means no handle is live, so the head is stable
        // and every write to it has been released.
        unsafe { &**self.head.get_mut() }
    }

    /// Replace the head with a generation of double the size.
    ///
    /// `current` is the generation the caller believes is the head. With
    /// `block` the resize lock is taken unconditionally; otherwise a
    /// contended lock fails the call. Returns `true` when the head differs
    /// from `current` on exit, i.e. the caller must re-check the head.
    fn resize(&self, current: *mut Generation<V>, block: bool) -> bool {
        let _lock = if block {
            self.resize_lock.lock()
        } else {
            match self.resize_lock.try_lock() {
                Some(lock) => lock,
                None => return false,
            }
        };

        // Another thread already superseded this generation.
        if self.head.load(Ordering::Acquire) != current {
            return true;
        }

        // Safety: `current` is the live head and the caller's handle holds
        // a reference on it.
        let (old_size, occupancy) = unsafe { ((*current).size, (*current).occupancy()) };

        let next = Generation::<V>::alloc(self.key_bits, old_size << 1, current);
        unsafe {
            // The new head reference.
            (*next).ref_inc();
            // The old generation is no longer the head. The caller's
            // reference keeps it alive, so this cannot be the last one.
            let _refs = (*current).ref_dec();
            debug_assert_ne!(_refs, 0);
        }
        self.head.store(next, Ordering::Release);
        drop(_lock);

        self.stats.resized();
        log::debug!(
            "resized table: {old_size} -> {} slots, ~{occupancy} occupied",
            old_size << 1,
        );

        true
    }
}

impl<V: Value, S: BuildHasher> HashCounter<V, S> {
    #[inline]
    fn hash(&self, key: u64) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        hasher.write_u64(key);
        hasher.finish()
    }
}

impl<V: Value, S> Drop for HashCounter<V, S> {
    fn drop(&mut self) {
        // Drop the head reference. Older generations were already released
        // by the handles that cached them, so at most the head dies here.
        unsafe { raw::release(*self.head.get_mut(), &self.stats) };
    }
}

impl<V: Value, S> fmt::Debug for HashCounter<V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashCounter")
            .field("key_bits", &self.key_bits)
            .field("max_reprobe", &self.max_reprobe)
            .finish()
    }
}

/// A per-worker handle to a [`HashCounter`].
///
/// The handle caches a pointer to the generation it last wrote, detects
/// when a resize superseded it, and takes part in the cooperative copy-over
/// before moving on. It is `Send` but not `Sync`: one worker, one handle.
pub struct CounterHandle<'map, V: Value, S = DefaultHashBuilder> {
    map: &'map HashCounter<V, S>,
    gen: *mut Generation<V>,
}

// Safety: the raw generation pointer is backed by a reference owned by the
// handle, and `add` requires `&mut self`, so the handle moves between
// threads but is never shared.
unsafe impl<V: Value, S: Sync> Send for CounterHandle<'_, V, S> {}

impl<V: Value, S: BuildHasher> CounterHandle<'_, V, S> {
    /// Insert `key` if absent and add `val` to its counter, saturating at
    /// the counter's all-ones value.
    ///
    /// May trigger or join a resize; see the table-level notes on the
    /// worker contract.
    pub fn add(&mut self, key: u64, val: V) {
        let hash = self.map.hash(key);

        // The probe limit may escalate once per call while another thread
        // finishes a resize.
        let mut limit = self.map.max_reprobe;

        'table: loop {
            self.catch_up();

            // Safety: the handle owns a reference on its cached generation.
            let gen = unsafe { &*self.gen };
            let mut probe = Reprobe::start(hash, gen.mod_mask);

            loop {
                if gen.add(probe.idx, key, val, &self.map.stats) {
                    return;
                }

                probe.next(gen.mod_mask);

                if probe.count > limit {
                    self.map.stats.maxed_reprobe();

                    // Grab the resize ourselves if nobody else has.
                    if self.map.resize(self.gen, false) {
                        continue 'table;
                    }

                    if limit > self.map.max_reprobe {
                        // Escalated already and the table still has no
                        // room: wait for the resize, then re-check the
                        // head rather than probing the stale generation.
                        self.map.resize(self.gen, true);
                        continue 'table;
                    }

                    // Another thread holds the resize lock. Tolerate longer
                    // probes while it finishes.
                    limit = self.map.max_reprobe.saturating_mul(4);
                }
            }
        }
    }

    /// Add one to `key`'s counter.
    pub fn inc(&mut self, key: u64) {
        self.add(key, V::ONE);
    }

    /// Adopt the newest generation, helping with any in-progress copy-over.
    ///
    /// A worker that has run out of input must keep calling this until all
    /// workers have quiesced, so that a resize triggered by a straggler is
    /// still attended by the full barrier complement. When no resize
    /// happened this is a cheap no-op.
    pub fn sync(&mut self) {
        self.catch_up();
    }

    fn catch_up(&mut self) {
        loop {
            let head = self.map.head.load(Ordering::Acquire);
            if head == self.gen {
                return;
            }

            let old = self.gen;

            // Safety: a superseded generation keeps its successor alive
            // through the link reference, and the successor cannot be
            // superseded in turn until every worker (including this one)
            // has passed the copy barrier.
            unsafe { (*head).ref_inc() };
            self.gen = head;

            self.copy_over(old);

            // Safety: `old` is the reference this handle held.
            unsafe { raw::release(old, &self.map.stats) };
        }
    }

    /// Help migrate `old` into the current generation.
    fn copy_over(&mut self, old: *mut Generation<V>) {
        // Rendezvous with every other worker. Past this point no worker
        // can still be writing `old`, and every worker has seen the new
        // head.
        self.map.barrier.wait();

        // Safety: this handle still holds its reference on `old`.
        let old = unsafe { &*old };

        log::trace!("copying over {} slots", old.size);

        while let Some((start, end)) = old.claim_chunk() {
            for idx in start..end {
                if let Some((key, val)) = old.get(idx) {
                    // Re-inserting through the handle lands in the current
                    // generation and follows any further resize.
                    self.add(key, val);
                }
            }
        }
    }
}

impl<V: Value, S> Drop for CounterHandle<'_, V, S> {
    fn drop(&mut self) {
        // Release the cached generation; if this worker was the last one
        // out, the release cascades down the chain.
        unsafe { raw::release(self.gen, &self.map.stats) };
    }
}

impl<V: Value, S> fmt::Debug for CounterHandle<'_, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterHandle").finish_non_exhaustive()
    }
}

/// An iterator over the occupied slots of a [`HashCounter`].
pub struct Iter<'a, V: Value> {
    gen: &'a Generation<V>,
    idx: u64,
}

impl<V: Value> Iterator for Iter<'_, V> {
    type Item = (u64, V);

    fn next(&mut self) -> Option<(u64, V)> {
        while self.idx < self.gen.size {
            let entry = self.gen.get(self.idx);
            self.idx += 1;
            if entry.is_some() {
                return entry;
            }
        }
        None
    }
}

impl<V: Value> fmt::Debug for Iter<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("idx", &self.idx).finish()
    }
}
