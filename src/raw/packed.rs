use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of installing a key into a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The cell was empty and now holds the key.
    Installed,
    /// The cell already held exactly this key.
    Present,
    /// The cell holds a different key.
    Conflict,
}

/// A dense array of bit-packed key cells with atomic install semantics.
///
/// Each cell is `bits` wide: one presence bit in the low position plus a
/// `bits - 1` bit payload. Cells are packed into 64-bit words but never
/// straddle a word boundary; leftover bits at the top of each word are
/// padding. An empty cell reads as all zeroes, and a key is installed with
/// a compare-and-swap on the word containing the cell, so a cell never
/// changes its key once set.
pub struct PackedKeys {
    words: Box<[AtomicU64]>,
    bits: u32,
}

impl PackedKeys {
    /// Allocate `len` empty cells of the given width. `bits` must be in
    /// `2..=64`: one presence bit plus at least one payload bit.
    pub fn new(bits: u32, len: u64) -> PackedKeys {
        assert!((2..=64).contains(&bits), "cell width {bits} out of range");

        let words = (0..word_count(bits, len))
            .map(|_| AtomicU64::new(0))
            .collect();

        PackedKeys { words, bits }
    }

    /// The widest payload a cell can hold.
    #[inline]
    pub fn payload_mask(&self) -> u64 {
        cell_mask(self.bits) >> 1
    }

    /// Attempt to install `key` at cell `i`.
    ///
    /// Concurrent callers on the same cell are safe: exactly one install
    /// wins and every caller observes the winning key.
    pub fn set(&self, i: u64, key: u64) -> SetOutcome {
        debug_assert!(key <= self.payload_mask(), "key does not fit cell payload");

        let (word, shift) = locate(self.bits, i);
        let mask = cell_mask(self.bits) << shift;
        let encoded = ((key << 1) | 1) << shift;

        let word = &self.words[word];
        let mut current = word.load(Ordering::Acquire);

        loop {
            let cell = current & mask;

            if cell == 0 {
                match word.compare_exchange(
                    current,
                    current | encoded,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return SetOutcome::Installed,
                    // A neighboring cell changed under us, or we lost the
                    // install race. Re-examine the cell.
                    Err(found) => {
                        current = found;
                        continue;
                    }
                }
            }

            if cell == encoded {
                return SetOutcome::Present;
            }

            return SetOutcome::Conflict;
        }
    }

    /// Read cell `i`, returning the payload when the cell is occupied.
    ///
    /// Once a key is installed it is stable, so a non-empty read here is
    /// final even with writers still running.
    #[inline]
    pub fn get(&self, i: u64) -> Option<u64> {
        let (word, shift) = locate(self.bits, i);
        let cell = (self.words[word].load(Ordering::Acquire) >> shift) & cell_mask(self.bits);
        decode(cell)
    }

    /// Total footprint of the packed buffer in bytes.
    #[inline]
    pub fn data_len(&self) -> usize {
        self.words.len() * 8
    }

    /// Serialize the raw packed buffer as little-endian words.
    pub fn write_to(&self, out: &mut impl io::Write) -> io::Result<()> {
        for word in self.words.iter() {
            out.write_all(&word.load(Ordering::Relaxed).to_le_bytes())?;
        }
        Ok(())
    }
}

/// Cells per 64-bit word for the given cell width.
#[inline]
pub fn cells_per_word(bits: u32) -> u64 {
    (64 / bits) as u64
}

/// Words needed to hold `len` cells.
#[inline]
pub fn word_count(bits: u32, len: u64) -> usize {
    let per_word = cells_per_word(bits);
    ((len + per_word - 1) / per_word) as usize
}

/// Byte length of the packed buffer for `len` cells of width `bits`.
#[inline]
pub fn data_len(bits: u32, len: u64) -> usize {
    word_count(bits, len) * 8
}

/// Word index and in-word bit offset of cell `i`.
#[inline]
pub fn locate(bits: u32, i: u64) -> (usize, u32) {
    let per_word = cells_per_word(bits);
    let word = (i / per_word) as usize;
    let shift = (i % per_word) as u32 * bits;
    (word, shift)
}

/// Mask covering one whole cell, presence bit included.
#[inline]
pub fn cell_mask(bits: u32) -> u64 {
    if bits == 64 {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

/// Split a raw cell into its payload, `None` when the presence bit is
/// clear.
#[inline]
pub fn decode(cell: u64) -> Option<u64> {
    if cell & 1 == 0 {
        None
    } else {
        Some(cell >> 1)
    }
}
