use log::info;

use crate::alloc::{Bitmap, NextAvailableAllocation};
use crate::io::BlockStorage;
use crate::node::{Inode, RawInode, RAW_DIRECT_BLOCKS, RAW_INODE_SIZE, RAW_NAME_LEN};
use crate::sb::SuperBlock;
use crate::store::{BlockId, Geometry, InodeId, Store};
use crate::{FsError, Resource};

pub const BLOCK_SIZE: usize = 4096;
const NODES_PER_BLOCK: usize = BLOCK_SIZE / RAW_INODE_SIZE;

/// Known locations.
const SUPERBLOCK_INDEX: usize = 0;
const DATA_REGION_BMP: usize = 1;
const INODE_BMP: usize = 2;
const INODE_START: usize = 3;
const INODE_BLOCKS: usize = 5;
const DATA_START: usize = INODE_START + INODE_BLOCKS;

/// Total inode records in the fixed table.
pub const INODE_COUNT: usize = INODE_BLOCKS * NODES_PER_BLOCK;
/// Data blocks in the region following the inode table.
pub const DATA_BLOCKS: usize = 56;
/// Total device blocks a formatted image occupies.
pub const DEVICE_BLOCKS: usize = DATA_START + DATA_BLOCKS;

/// A fixed 64 4k block store. Currently hard coded for simplicity with one
/// super block, one data-region bitmap, one inode bitmap, five inode blocks,
/// and 56 blocks for data storage.
///
/// # Layout
/// ==============================================================================
/// | SuperBlock | Bitmap (data region) | Bitmap (inodes) | Inodes | Data Region |
/// ==============================================================================
pub struct DiskStore<T: BlockStorage> {
    dev: T,
    super_block: SuperBlock,
    data_map: Bitmap,
    inode_map: Bitmap,
}

impl<T: BlockStorage> DiskStore<T> {
    /// Formats the device with an empty image and returns the mounted store.
    /// The device must have at least [`DEVICE_BLOCKS`] blocks.
    pub fn format(mut dev: T) -> Result<Self, FsError> {
        let mut super_block = SuperBlock::new();
        super_block.inodes_count = INODE_COUNT as u32;
        super_block.blocks_count = DATA_BLOCKS as u32;
        super_block.reserved_blocks_count = DATA_START as u32;
        super_block.free_blocks_count = DATA_BLOCKS as u32;
        super_block.free_inodes_count = INODE_COUNT as u32;
        dev.write_block(SUPERBLOCK_INDEX, &super_block.serialize())?;

        let data_map = Bitmap::new();
        dev.write_block(DATA_REGION_BMP, data_map.serialize())?;

        let inode_map = Bitmap::new();
        dev.write_block(INODE_BMP, inode_map.serialize())?;

        // Every record in the table starts out free.
        let free_record = RawInode::from(&Inode::free(RAW_DIRECT_BLOCKS));
        let mut table_block = vec![0u8; BLOCK_SIZE];
        for chunk in table_block.chunks_mut(RAW_INODE_SIZE) {
            chunk.copy_from_slice(free_record.serialize());
        }
        for blocknr in INODE_START..DATA_START {
            dev.write_block(blocknr, &table_block)?;
        }
        dev.sync_disk()?;

        info!(
            "formatted device: {} inodes, {} data blocks",
            INODE_COUNT, DATA_BLOCKS
        );
        Ok(Self {
            dev,
            super_block,
            data_map,
            inode_map,
        })
    }

    /// Mounts an already formatted device, validating the superblock.
    pub fn open(mut dev: T) -> Result<Self, FsError> {
        let mut block_buf = vec![0u8; BLOCK_SIZE];

        dev.read_block(SUPERBLOCK_INDEX, &mut block_buf)?;
        let super_block = SuperBlock::parse(&block_buf)?;
        if super_block.inodes_count != INODE_COUNT as u32
            || super_block.blocks_count != DATA_BLOCKS as u32
        {
            return Err(FsError::InvalidImage("unsupported block layout"));
        }

        dev.read_block(DATA_REGION_BMP, &mut block_buf)?;
        let data_map =
            Bitmap::parse(&block_buf).ok_or(FsError::InvalidImage("truncated data bitmap"))?;

        dev.read_block(INODE_BMP, &mut block_buf)?;
        let inode_map =
            Bitmap::parse(&block_buf).ok_or(FsError::InvalidImage("truncated inode bitmap"))?;

        Ok(Self {
            dev,
            super_block,
            data_map,
            inode_map,
        })
    }

    /// Flushes any buffered device writes.
    pub fn sync(&mut self) -> Result<(), FsError> {
        self.dev.sync_disk()?;
        Ok(())
    }

    pub fn free_inodes(&self) -> usize {
        self.super_block.free_inodes_count as usize
    }

    pub fn free_blocks(&self) -> usize {
        self.super_block.free_blocks_count as usize
    }

    fn flush_super(&mut self) -> Result<(), FsError> {
        self.dev
            .write_block(SUPERBLOCK_INDEX, &self.super_block.serialize())?;
        Ok(())
    }

    fn flush_data_map(&mut self) -> Result<(), FsError> {
        self.dev
            .write_block(DATA_REGION_BMP, self.data_map.serialize())?;
        Ok(())
    }

    fn flush_inode_map(&mut self) -> Result<(), FsError> {
        self.dev.write_block(INODE_BMP, self.inode_map.serialize())?;
        Ok(())
    }

    fn check_inode_id(id: InodeId) -> Result<(), FsError> {
        if id as usize >= INODE_COUNT {
            return Err(FsError::Inconsistent("inode id out of range"));
        }
        Ok(())
    }

    fn check_block_id(id: BlockId) -> Result<(), FsError> {
        if id as usize >= DATA_BLOCKS {
            return Err(FsError::Inconsistent("data block id out of range"));
        }
        Ok(())
    }
}

impl<T: BlockStorage> Store for DiskStore<T> {
    fn geometry(&self) -> Geometry {
        Geometry {
            block_size: BLOCK_SIZE,
            inode_count: INODE_COUNT,
            max_blocks_per_file: RAW_DIRECT_BLOCKS,
            max_name_len: RAW_NAME_LEN,
        }
    }

    fn read_inode(&mut self, id: InodeId) -> Result<Inode, FsError> {
        Self::check_inode_id(id)?;
        let mut block_buf = vec![0u8; BLOCK_SIZE];
        self.dev
            .read_block(INODE_START + id as usize / NODES_PER_BLOCK, &mut block_buf)?;

        let start = (id as usize % NODES_PER_BLOCK) * RAW_INODE_SIZE;
        let raw = RawInode::parse(&block_buf[start..start + RAW_INODE_SIZE])
            .ok_or(FsError::Inconsistent("undecodable inode record"))?;
        Ok(raw.to_inode())
    }

    fn write_inode(&mut self, id: InodeId, node: &Inode) -> Result<(), FsError> {
        Self::check_inode_id(id)?;
        let blocknr = INODE_START + id as usize / NODES_PER_BLOCK;
        let mut block_buf = vec![0u8; BLOCK_SIZE];
        self.dev.read_block(blocknr, &mut block_buf)?;

        let start = (id as usize % NODES_PER_BLOCK) * RAW_INODE_SIZE;
        block_buf[start..start + RAW_INODE_SIZE].copy_from_slice(RawInode::from(node).serialize());
        self.dev.write_block(blocknr, &block_buf)?;
        Ok(())
    }

    fn alloc_inode(&mut self) -> Result<InodeId, FsError> {
        let id = NextAvailableAllocation::new(self.inode_map, Some(INODE_COUNT))
            .next()
            .ok_or(FsError::Exhausted(Resource::Inodes))?;
        self.inode_map.set_reserved(id);
        self.super_block.free_inodes_count -= 1;
        self.flush_inode_map()?;
        self.flush_super()?;
        Ok(id as InodeId)
    }

    fn free_inode(&mut self, id: InodeId) -> Result<(), FsError> {
        Self::check_inode_id(id)?;
        self.write_inode(id, &Inode::free(RAW_DIRECT_BLOCKS))?;
        self.inode_map.set_free(id as usize);
        self.super_block.free_inodes_count += 1;
        self.flush_inode_map()?;
        self.flush_super()?;
        Ok(())
    }

    fn read_block(&mut self, id: BlockId, buf: &mut [u8]) -> Result<(), FsError> {
        Self::check_block_id(id)?;
        self.dev.read_block(DATA_START + id as usize, buf)?;
        Ok(())
    }

    fn write_block(&mut self, id: BlockId, buf: &[u8]) -> Result<(), FsError> {
        Self::check_block_id(id)?;
        self.dev.write_block(DATA_START + id as usize, buf)?;
        Ok(())
    }

    fn alloc_block(&mut self) -> Result<BlockId, FsError> {
        let id = NextAvailableAllocation::new(self.data_map, Some(DATA_BLOCKS))
            .next()
            .ok_or(FsError::Exhausted(Resource::DataBlocks))?;
        self.data_map.set_reserved(id);
        self.super_block.free_blocks_count -= 1;
        self.flush_data_map()?;
        self.flush_super()?;
        Ok(id as BlockId)
    }

    fn free_block(&mut self, id: BlockId) -> Result<(), FsError> {
        Self::check_block_id(id)?;
        self.data_map.set_free(id as usize);
        self.super_block.free_blocks_count += 1;
        self.flush_data_map()?;
        self.flush_super()?;
        Ok(())
    }
}
