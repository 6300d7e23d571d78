use std::marker::PhantomData;

use crate::error::Error;
use crate::raw::packed;
use crate::value::Value;

/// A read-only table reconstructed from a dumped byte buffer.
///
/// The buffer layout is exactly what [`HashCounter::write`] produces: the
/// bit-packed key words followed by the counter array as raw little-endian
/// values. The view borrows the buffer, so a file can be memory-mapped by
/// the caller and handed in without copying.
///
/// [`HashCounter::write`]: crate::HashCounter::write
#[derive(Debug)]
pub struct MappedTable<'a, V: Value> {
    key_bits: u32,
    size: u64,
    keys: &'a [u8],
    vals: &'a [u8],
    _v: PhantomData<V>,
}

impl<'a, V: Value> Clone for MappedTable<'a, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, V: Value> Copy for MappedTable<'a, V> {}

impl<'a, V: Value> MappedTable<'a, V> {
    /// Interpret `bytes` as a dumped table of `size` slots with
    /// `key_bits`-wide key cells.
    ///
    /// Unlike construction of a live table, no rounding is permitted here:
    /// a `size` that is not a power of two fails with [`Error::BadSize`],
    /// and a buffer that does not match the layout exactly fails with
    /// [`Error::BadLength`].
    pub fn from_bytes(key_bits: u32, size: u64, bytes: &'a [u8]) -> Result<Self, Error> {
        assert!(
            (2..=64).contains(&key_bits),
            "key width {key_bits} out of range"
        );

        if !size.is_power_of_two() {
            return Err(Error::BadSize(size));
        }

        let key_len = packed::data_len(key_bits, size);
        let expected = key_len + size as usize * V::BYTES;
        if bytes.len() != expected {
            return Err(Error::BadLength {
                expected,
                actual: bytes.len(),
            });
        }

        let (keys, vals) = bytes.split_at(key_len);

        Ok(MappedTable {
            key_bits,
            size,
            keys,
            vals,
            _v: PhantomData,
        })
    }

    /// The slot count.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read slot `idx`, returning the key and counter when occupied.
    pub fn get(&self, idx: u64) -> Option<(u64, V)> {
        assert!(idx < self.size, "slot {idx} out of bounds");

        let (word, shift) = packed::locate(self.key_bits, idx);
        let word = u64::from_le_bytes(self.keys[word * 8..word * 8 + 8].try_into().unwrap());
        let key = packed::decode((word >> shift) & packed::cell_mask(self.key_bits))?;

        let at = idx as usize * V::BYTES;
        Some((key, V::read_le(&self.vals[at..at + V::BYTES])))
    }

    /// Iterate over the occupied slots in table order.
    pub fn iter(&self) -> MappedIter<'a, V> {
        MappedIter {
            table: *self,
            idx: 0,
        }
    }
}

impl<'a, V: Value> IntoIterator for &MappedTable<'a, V> {
    type Item = (u64, V);
    type IntoIter = MappedIter<'a, V>;

    fn into_iter(self) -> MappedIter<'a, V> {
        self.iter()
    }
}

/// Iterator over the occupied slots of a [`MappedTable`].
pub struct MappedIter<'a, V: Value> {
    table: MappedTable<'a, V>,
    idx: u64,
}

impl<V: Value> Iterator for MappedIter<'_, V> {
    type Item = (u64, V);

    fn next(&mut self) -> Option<(u64, V)> {
        while self.idx < self.table.size {
            let entry = self.table.get(self.idx);
            self.idx += 1;
            if entry.is_some() {
                return entry;
            }
        }
        None
    }
}
