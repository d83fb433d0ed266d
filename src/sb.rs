use std::convert::TryInto;

use crate::FsError;

const BLOCK_SIZE: usize = 4096;

const SB_MAGIC: u32 = 0x464C4653; // FLFS

/// The first block of the file system storing information critical for mounting
/// the file system and verifying the underlying disk is formatted correctly.
///
/// Keeps the size of the file system by tracking the number of blocks allocated
/// to the inode and data block groups. The number of inodes available in the
/// filesystem ultimately sets the upper bound on how many files can exist.
#[derive(Debug, PartialEq)]
pub struct SuperBlock {
    /// A 32-bit identifying string, in this case FLFS.
    pub sb_magic: u32,
    /// Total inode records in the inode table.
    pub inodes_count: u32,
    /// Blocks in the data region.
    pub blocks_count: u32,
    /// Blocks in use by filesystem metadata (superblock, bitmaps, inode table).
    pub reserved_blocks_count: u32,
    /// Data blocks available to be allocated.
    pub free_blocks_count: u32,
    /// The number of remaining available inodes.
    pub free_inodes_count: u32,
}

impl SuperBlock {
    pub fn new() -> Self {
        Self {
            sb_magic: SB_MAGIC,
            inodes_count: 0,
            blocks_count: 0,
            reserved_blocks_count: 0,
            free_blocks_count: 0,
            free_inodes_count: 0,
        }
    }

    /// Reads the super block from a buffer of exactly BLOCK_SIZE bytes.
    pub fn parse(buf: &[u8]) -> Result<Self, FsError> {
        if buf.len() != BLOCK_SIZE {
            return Err(FsError::InvalidImage("superblock buffer is not one block"));
        }

        let read_magic = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        if read_magic != SB_MAGIC {
            return Err(FsError::InvalidImage("superblock magic mismatch"));
        }

        let mut sb = Self::new();
        sb.inodes_count = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        sb.blocks_count = u32::from_be_bytes(buf[8..12].try_into().unwrap());
        sb.reserved_blocks_count = u32::from_be_bytes(buf[12..16].try_into().unwrap());
        sb.free_blocks_count = u32::from_be_bytes(buf[16..20].try_into().unwrap());
        sb.free_inodes_count = u32::from_be_bytes(buf[20..24].try_into().unwrap());
        Ok(sb)
    }

    /// Serializes the SuperBlock into a BLOCK_SIZE buffer for writing to disk.
    /// The encoding is a series of struct fields with big endian alignment.
    pub fn serialize(&self) -> Vec<u8> {
        let mut sb_encoded = vec![];
        sb_encoded.extend_from_slice(&self.sb_magic.to_be_bytes());
        sb_encoded.extend_from_slice(&self.inodes_count.to_be_bytes());
        sb_encoded.extend_from_slice(&self.blocks_count.to_be_bytes());
        sb_encoded.extend_from_slice(&self.reserved_blocks_count.to_be_bytes());
        sb_encoded.extend_from_slice(&self.free_blocks_count.to_be_bytes());
        sb_encoded.extend_from_slice(&self.free_inodes_count.to_be_bytes());
        sb_encoded.resize(BLOCK_SIZE, 0);
        sb_encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_encode_and_decode_superblocks() {
        let mut sb = SuperBlock::new();
        sb.inodes_count = 80;
        sb.blocks_count = 56;
        sb.free_inodes_count = 80;
        let encoded = sb.serialize();

        let parsed = SuperBlock::parse(&encoded).unwrap();

        assert_eq!(parsed, sb);
    }

    #[test]
    fn parsing_buffer_with_invalid_magic_fails() {
        let zero_buffer_with_right_size = vec![0; BLOCK_SIZE];
        match SuperBlock::parse(&zero_buffer_with_right_size) {
            Err(FsError::InvalidImage(_)) => (),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn parsing_buffer_with_invalid_size_fails() {
        let wrong_size_buffer = vec![0; 512];
        assert!(SuperBlock::parse(&wrong_size_buffer).is_err());
    }
}
