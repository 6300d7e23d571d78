//! Global event counters, compiled in with the `stats` cargo feature.
//!
//! The hot path calls these on every conflict, so they are a build-time
//! opt-in rather than a runtime flag; without the feature every recording
//! method is an empty inline function.

use std::io;

#[cfg(feature = "stats")]
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate table statistics.
#[derive(Default)]
pub(crate) struct Stats {
    #[cfg(feature = "stats")]
    inner: Counters,
}

#[cfg(feature = "stats")]
#[derive(Default)]
struct Counters {
    key_conflicts: AtomicU64,
    val_conflicts: AtomicU64,
    destroyed_keys: AtomicU64,
    destroyed_vals: AtomicU64,
    maxed_out_vals: AtomicU64,
    maxed_reprobes: AtomicU64,
    resized_tables: AtomicU64,
}

/// A point-in-time copy of the stat counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Probes that hit a slot owned by a different key.
    pub key_conflicts: u64,
    /// Counter updates that lost a compare-and-swap race.
    pub val_conflicts: u64,
    /// Key arrays freed when a generation was destroyed.
    pub destroyed_keys: u64,
    /// Counter arrays freed when a generation was destroyed.
    pub destroyed_vals: u64,
    /// Additions absorbed by an already-saturated counter.
    pub maxed_out_vals: u64,
    /// Probe sequences that ran past the reprobe limit.
    pub maxed_reprobes: u64,
    /// Resizes performed over the table's lifetime.
    pub resized_tables: u64,
}

/// Whether stat recording is compiled in.
pub const fn enabled() -> bool {
    cfg!(feature = "stats")
}

#[cfg(feature = "stats")]
impl Stats {
    #[inline]
    pub fn key_conflict(&self) {
        self.inner.key_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn val_conflict(&self) {
        self.inner.val_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn destroyed(&self) {
        self.inner.destroyed_keys.fetch_add(1, Ordering::Relaxed);
        self.inner.destroyed_vals.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn maxed_out_val(&self) {
        self.inner.maxed_out_vals.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn maxed_reprobe(&self) {
        self.inner.maxed_reprobes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn resized(&self) {
        self.inner.resized_tables.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Option<StatsSnapshot> {
        Some(StatsSnapshot {
            key_conflicts: self.inner.key_conflicts.load(Ordering::Relaxed),
            val_conflicts: self.inner.val_conflicts.load(Ordering::Relaxed),
            destroyed_keys: self.inner.destroyed_keys.load(Ordering::Relaxed),
            destroyed_vals: self.inner.destroyed_vals.load(Ordering::Relaxed),
            maxed_out_vals: self.inner.maxed_out_vals.load(Ordering::Relaxed),
            maxed_reprobes: self.inner.maxed_reprobes.load(Ordering::Relaxed),
            resized_tables: self.inner.resized_tables.load(Ordering::Relaxed),
        })
    }
}

#[cfg(not(feature = "stats"))]
impl Stats {
    #[inline(always)]
    pub fn key_conflict(&self) {}

    #[inline(always)]
    pub fn val_conflict(&self) {}

    #[inline(always)]
    pub fn destroyed(&self) {}

    #[inline(always)]
    pub fn maxed_out_val(&self) {}

    #[inline(always)]
    pub fn maxed_reprobe(&self) {}

    #[inline(always)]
    pub fn resized(&self) {}

    pub fn snapshot(&self) -> Option<StatsSnapshot> {
        None
    }
}

impl Stats {
    /// One `name: value` line per counter; `-` when recording is compiled
    /// out.
    pub fn print(&self, out: &mut impl io::Write) -> io::Result<()> {
        match self.snapshot() {
            Some(snap) => {
                writeln!(out, "key_conflicts: {}", snap.key_conflicts)?;
                writeln!(out, "val_conflicts: {}", snap.val_conflicts)?;
                writeln!(out, "destroyed_keys: {}", snap.destroyed_keys)?;
                writeln!(out, "destroyed_vals: {}", snap.destroyed_vals)?;
                writeln!(out, "maxed_out_vals: {}", snap.maxed_out_vals)?;
                writeln!(out, "maxed_reprobes: {}", snap.maxed_reprobes)?;
                writeln!(out, "resized_tables: {}", snap.resized_tables)
            }
            None => {
                for name in [
                    "key_conflicts",
                    "val_conflicts",
                    "destroyed_keys",
                    "destroyed_vals",
                    "maxed_out_vals",
                    "maxed_reprobes",
                    "resized_tables",
                ] {
                    writeln!(out, "{name}: -")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(all(test, feature = "stats"))]
mod tests {
    use super::*;

    #[test]
    fn records_and_snapshots() {
        let stats = Stats::default();
        stats.key_conflict();
        stats.key_conflict();
        stats.resized();

        let snap = stats.snapshot().unwrap();
        assert_eq!(snap.key_conflicts, 2);
        assert_eq!(snap.resized_tables, 1);
        assert_eq!(snap.val_conflicts, 0);
    }
}
