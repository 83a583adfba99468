//! The file checksum: the sum, modulo 2^32, of every 4th byte of the page
//! bytes (positions 0, 4, 8, ...), counted across all pages concatenated.
//!
//! [`Checksum`] is fed page by page and keeps track of the 4-byte phase, so
//! a page whose length is not a multiple of 4 does not reset the stride.

#[derive(Debug, Clone, Default)]
pub struct Checksum {
    sum: u32,
    pos: usize,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        let skip = (4 - self.pos % 4) % 4;
        for &b in bytes.iter().skip(skip).step_by(4) {
            self.sum = self.sum.wrapping_add(u32::from(b));
        }
        self.pos += bytes.len();
    }

    pub fn finalize(&self) -> u32 {
        self.sum
    }
}

/// Checksum of a single contiguous run of page bytes.
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut c = Checksum::new();
    c.update(bytes);
    c.finalize()
}
