use zerocopy::{AsBytes, FromBytes};

use crate::store::BlockId;

/// On-disk inode record size; sixteen records fit a 4K block.
pub const RAW_INODE_SIZE: usize = 256;
/// Longest file name the on-disk record can hold.
pub const RAW_NAME_LEN: usize = 32;
/// Direct block references per on-disk record.
pub const RAW_DIRECT_BLOCKS: usize = 48;

/// Marks an unassigned direct block slot in the on-disk encoding.
const BLOCK_UNASSIGNED: u32 = u32::MAX;

const STATUS_FREE: u32 = 0;
const STATUS_IN_USE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeStatus {
    Free,
    InUse,
}

/// Metadata record for one file.
///
/// Assigned direct block references always form a contiguous prefix of
/// `blocks` covering exactly `ceil(size / block_size)` entries; the remaining
/// slots are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Inode {
    pub status: InodeStatus,
    pub name: String,
    /// Total size of the file in bytes.
    pub size: u64,
    /// Direct block references, `None` where no block is assigned.
    pub blocks: Vec<Option<BlockId>>,
}

impl Inode {
    /// An unallocated record with every block slot unassigned.
    pub fn free(max_blocks: usize) -> Self {
        Self {
            status: InodeStatus::Free,
            name: String::new(),
            size: 0,
            blocks: vec![None; max_blocks],
        }
    }

    /// A freshly created empty file.
    pub fn new(name: String, max_blocks: usize) -> Self {
        Self {
            status: InodeStatus::InUse,
            name,
            size: 0,
            blocks: vec![None; max_blocks],
        }
    }

    /// Number of assigned direct block references.
    pub fn assigned_blocks(&self) -> usize {
        self.blocks.iter().filter(|slot| slot.is_some()).count()
    }
}

/// On-disk inode record. __Must stay exactly 256 bytes.__
#[repr(C)]
#[derive(AsBytes, FromBytes, Copy, Clone)]
pub(crate) struct RawInode {
    /// 0 = free, 1 = in use.
    status: u32,
    /// Total size of the file in bytes.
    size: u32,
    /// NUL-padded file name.
    name: [u8; RAW_NAME_LEN],
    /// Direct block references; `u32::MAX` marks an unassigned slot.
    blocks: [u32; RAW_DIRECT_BLOCKS],
    /// Reserved up to the 256 byte record limit.
    padding: [u8; 24],
}

impl RawInode {
    /// Decodes a record from a 256-byte slice. Returns `None` on any other
    /// length.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        Self::read_from(buf)
    }

    pub fn serialize(&self) -> &[u8] {
        self.as_bytes()
    }

    pub fn to_inode(&self) -> Inode {
        let name_end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(RAW_NAME_LEN);
        let blocks = self
            .blocks
            .iter()
            .map(|&slot| {
                if slot == BLOCK_UNASSIGNED {
                    None
                } else {
                    Some(slot)
                }
            })
            .collect();

        Inode {
            status: if self.status == STATUS_FREE {
                InodeStatus::Free
            } else {
                InodeStatus::InUse
            },
            name: String::from_utf8_lossy(&self.name[..name_end]).into_owned(),
            size: u64::from(self.size),
            blocks,
        }
    }
}

impl From<&Inode> for RawInode {
    fn from(node: &Inode) -> Self {
        let mut name = [0u8; RAW_NAME_LEN];
        let name_len = node.name.as_bytes().len().min(RAW_NAME_LEN);
        name[..name_len].copy_from_slice(&node.name.as_bytes()[..name_len]);

        let mut blocks = [BLOCK_UNASSIGNED; RAW_DIRECT_BLOCKS];
        for (raw, slot) in blocks.iter_mut().zip(node.blocks.iter()) {
            if let Some(id) = slot {
                *raw = *id;
            }
        }

        Self {
            status: match node.status {
                InodeStatus::Free => STATUS_FREE,
                InodeStatus::InUse => STATUS_IN_USE,
            },
            size: node.size as u32,
            name,
            blocks,
            padding: [0; 24],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn raw_record_is_exactly_256_bytes() {
        assert_eq!(mem::size_of::<RawInode>(), RAW_INODE_SIZE);
    }

    #[test]
    fn can_round_trip_an_in_use_record() {
        let mut node = Inode::new("journal.log".to_string(), RAW_DIRECT_BLOCKS);
        node.size = 4097;
        node.blocks[0] = Some(7);
        node.blocks[1] = Some(3);

        let raw = RawInode::from(&node);
        let decoded = RawInode::parse(raw.serialize()).unwrap().to_inode();

        assert_eq!(decoded, node);
    }

    #[test]
    fn free_records_decode_with_no_assigned_blocks() {
        let raw = RawInode::from(&Inode::free(RAW_DIRECT_BLOCKS));
        let decoded = RawInode::parse(raw.serialize()).unwrap().to_inode();

        assert_eq!(decoded.status, InodeStatus::Free);
        assert_eq!(decoded.assigned_blocks(), 0);
        assert_eq!(decoded.size, 0);
    }

    #[test]
    fn parsing_wrong_length_returns_none() {
        assert!(RawInode::parse(&[0u8; 255]).is_none());
    }
}
