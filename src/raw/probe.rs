// The arithmetic-sum reprobe sequence.
//
// The stride grows by one on every collision, so slot n of the sequence is
// `home + n(n+1)/2`. Triangular numbers modulo a power of two visit every
// residue, so the sequence covers the whole table.
pub struct Reprobe {
    // The current slot index.
    pub idx: u64,
    // How many collisions this probe has seen.
    pub count: u32,
}

impl Reprobe {
    // Start a probe sequence at the key's home slot.
    #[inline]
    pub fn start(hash: u64, mask: u64) -> Reprobe {
        Reprobe {
            idx: hash & mask,
            count: 0,
        }
    }

    // Step to the next slot in the sequence.
    #[inline]
    pub fn next(&mut self, mask: u64) {
        self.count += 1;
        self.idx = (self.idx + self.count as u64) & mask;
    }
}
