use zerocopy::{AsBytes, FromBytes};

const BLOCK_SIZE: usize = 4096;

#[derive(Debug, PartialEq)]
pub enum State {
    Free,
    Used,
}

#[repr(C)]
#[derive(AsBytes, FromBytes, Clone, Copy)]
pub struct Bitmap {
    /// Stores 4096 bits mapping each bit to a logical block on disk. A 4K bitmap
    /// supports tracking up to 4096 * 8 logical blocks for a total of 32,768 blocks
    /// per bitmap block.
    bitmap: [u64; BLOCK_SIZE / 8],
}

impl Bitmap {
    pub fn new() -> Self {
        Self {
            bitmap: [0; BLOCK_SIZE / 8],
        }
    }

    /// Reads a bitmap back from a serialized block. Returns `None` if the
    /// buffer is not exactly one block long.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        Self::read_from(buf)
    }

    pub fn serialize(&self) -> &[u8] {
        self.as_bytes()
    }

    pub fn get(&self, blocknr: usize) -> State {
        assert!(blocknr < BLOCK_SIZE * 8);
        let word = self.bitmap[blocknr / 64];
        let mask = 0b01_u64 << (blocknr % 64);
        if word & mask == 0 {
            State::Free
        } else {
            State::Used
        }
    }

    pub fn set_reserved(&mut self, blocknr: usize) {
        assert!(blocknr < BLOCK_SIZE * 8);
        self.bitmap[blocknr / 64] |= 0b01_u64 << (blocknr % 64);
    }

    pub fn set_free(&mut self, blocknr: usize) {
        assert!(blocknr < BLOCK_SIZE * 8);
        self.bitmap[blocknr / 64] &= !(0b01_u64 << (blocknr % 64));
    }
}

/// Implements a naive allocation policy for new block requirements. This policy
/// will retrieve the next available sequential block and on each call to the
/// iterator will return the next consecutive available block.
///
/// ## Other Pre-Allocation Policies
///
/// 1. Allocation that attempts to find enough contiguous available blocks so data can be allocated
///    close together (speed ups through sequential reads).
/// 2. Allocation that attempts to spread randomly over blocks to prevent wear of physical devices
///    in the front section (that may be rewritten many times before allocating to the back).
pub struct NextAvailableAllocation {
    /// Keeps track of the next starting place for looking for available blocks.
    marker: usize,
    /// A simple bitmap tracking which blocks are allocated and which are free.
    bitmap: Bitmap,
    /// The maximum allocatable value available in hardware. For example, if you
    /// have 80 inode slots available on disk, this value would be 80.
    cap: usize,
}

impl NextAvailableAllocation {
    pub fn new(bitmap: Bitmap, cap: Option<usize>) -> Self {
        let cap = cap.unwrap_or(BLOCK_SIZE * 8);
        Self {
            marker: 0,
            bitmap,
            cap,
        }
    }
}

impl Iterator for NextAvailableAllocation {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        for i in self.marker..self.cap {
            if let State::Free = self.bitmap.get(i) {
                self.marker = i + 1;
                return Some(i);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_read_and_write_values_to_bitmap() {
        let mut bmp = Bitmap::new();

        bmp.set_reserved(2);

        assert_eq!(bmp.get(0), State::Free);
        assert_eq!(bmp.get(2), State::Used);
    }

    #[test]
    fn can_set_values_at_ends_of_bitmap() {
        let mut bmp = Bitmap::new();

        bmp.set_reserved(0);
        bmp.set_reserved(4095);

        assert_eq!(bmp.get(0), State::Used);
        assert_eq!(bmp.get(4095), State::Used);
    }

    #[test]
    fn can_toggle_block_between_free_and_used() {
        let mut bmp = Bitmap::new();

        bmp.set_reserved(10);
        bmp.set_reserved(11);
        assert_eq!(bmp.get(10), State::Used);

        bmp.set_free(10);
        assert_eq!(bmp.get(10), State::Free);
        // Neighboring bits are untouched.
        assert_eq!(bmp.get(11), State::Used);
    }

    #[test]
    fn can_serialize_and_deserialize_state() {
        let mut bmp = Bitmap::new();
        bmp.set_reserved(10);
        bmp.set_reserved(4000);

        let read_bmp = Bitmap::parse(bmp.serialize()).unwrap();
        assert_eq!(read_bmp.get(10), State::Used);
        assert_eq!(read_bmp.get(4000), State::Used);
        assert_eq!(read_bmp.get(11), State::Free);
    }

    #[test]
    fn parsing_short_buffer_returns_none() {
        assert!(Bitmap::parse(&[0u8; 512]).is_none());
    }

    #[test]
    fn allocation_skips_reserved_blocks() {
        let mut bmp = Bitmap::new();
        bmp.set_reserved(0);
        bmp.set_reserved(2);

        let mut gen = NextAvailableAllocation::new(bmp, Some(8));
        assert_eq!(gen.next(), Some(1));
        assert_eq!(gen.next(), Some(3));
    }

    #[test]
    fn allocation_stops_at_cap() {
        let mut bmp = Bitmap::new();
        bmp.set_reserved(0);
        bmp.set_reserved(1);

        let mut gen = NextAvailableAllocation::new(bmp, Some(2));
        assert_eq!(gen.next(), None);
    }
}
