use crate::node::Inode;
use crate::store::{BlockId, Geometry, InodeId, Store};
use crate::{FsError, Resource};

/// An in-memory store with a caller-chosen geometry.
///
/// Plays the role a block-device emulator plays one layer down: it lets the
/// file layer run against tiny geometries (a handful of bytes per block, one
/// or two blocks per file) so bounds and rollback behavior can be exercised
/// directly.
pub struct MemStore {
    geom: Geometry,
    inodes: Vec<Inode>,
    inode_used: Vec<bool>,
    blocks: Vec<Vec<u8>>,
    block_used: Vec<bool>,
}

impl MemStore {
    /// Creates a store with `block_count` allocatable data blocks.
    pub fn new(geom: Geometry, block_count: usize) -> Self {
        Self {
            inodes: (0..geom.inode_count)
                .map(|_| Inode::free(geom.max_blocks_per_file))
                .collect(),
            inode_used: vec![false; geom.inode_count],
            blocks: vec![vec![0; geom.block_size]; block_count],
            block_used: vec![false; block_count],
            geom,
        }
    }

    pub fn free_inodes(&self) -> usize {
        self.inode_used.iter().filter(|used| !**used).count()
    }

    pub fn free_blocks(&self) -> usize {
        self.block_used.iter().filter(|used| !**used).count()
    }
}

impl Store for MemStore {
    fn geometry(&self) -> Geometry {
        self.geom
    }

    fn read_inode(&mut self, id: InodeId) -> Result<Inode, FsError> {
        self.inodes
            .get(id as usize)
            .cloned()
            .ok_or(FsError::Inconsistent("inode id out of range"))
    }

    fn write_inode(&mut self, id: InodeId, node: &Inode) -> Result<(), FsError> {
        let slot = self
            .inodes
            .get_mut(id as usize)
            .ok_or(FsError::Inconsistent("inode id out of range"))?;
        *slot = node.clone();
        Ok(())
    }

    fn alloc_inode(&mut self) -> Result<InodeId, FsError> {
        let id = self
            .inode_used
            .iter()
            .position(|used| !*used)
            .ok_or(FsError::Exhausted(Resource::Inodes))?;
        self.inode_used[id] = true;
        Ok(id as InodeId)
    }

    fn free_inode(&mut self, id: InodeId) -> Result<(), FsError> {
        let used = self
            .inode_used
            .get_mut(id as usize)
            .ok_or(FsError::Inconsistent("inode id out of range"))?;
        *used = false;
        self.inodes[id as usize] = Inode::free(self.geom.max_blocks_per_file);
        Ok(())
    }

    fn read_block(&mut self, id: BlockId, buf: &mut [u8]) -> Result<(), FsError> {
        let block = self
            .blocks
            .get(id as usize)
            .ok_or(FsError::Inconsistent("data block id out of range"))?;
        let len = buf.len().min(block.len());
        buf[..len].copy_from_slice(&block[..len]);
        Ok(())
    }

    fn write_block(&mut self, id: BlockId, buf: &[u8]) -> Result<(), FsError> {
        let block = self
            .blocks
            .get_mut(id as usize)
            .ok_or(FsError::Inconsistent("data block id out of range"))?;
        let len = buf.len().min(block.len());
        block[..len].copy_from_slice(&buf[..len]);
        Ok(())
    }

    fn alloc_block(&mut self) -> Result<BlockId, FsError> {
        let id = self
            .block_used
            .iter()
            .position(|used| !*used)
            .ok_or(FsError::Exhausted(Resource::DataBlocks))?;
        self.block_used[id] = true;
        Ok(id as BlockId)
    }

    fn free_block(&mut self, id: BlockId) -> Result<(), FsError> {
        let used = self
            .block_used
            .get_mut(id as usize)
            .ok_or(FsError::Inconsistent("data block id out of range"))?;
        *used = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> MemStore {
        MemStore::new(
            Geometry {
                block_size: 4,
                inode_count: 2,
                max_blocks_per_file: 2,
                max_name_len: 8,
            },
            2,
        )
    }

    #[test]
    fn allocations_draw_down_the_free_pool() {
        let mut store = tiny();
        assert_eq!(store.free_blocks(), 2);

        let block = store.alloc_block().unwrap();
        assert_eq!(store.free_blocks(), 1);

        store.free_block(block).unwrap();
        assert_eq!(store.free_blocks(), 2);
    }

    #[test]
    fn exhausted_pools_report_the_resource() {
        let mut store = tiny();
        store.alloc_inode().unwrap();
        store.alloc_inode().unwrap();
        match store.alloc_inode() {
            Err(FsError::Exhausted(Resource::Inodes)) => (),
            _ => panic!("expected inode exhaustion"),
        }
    }

    #[test]
    fn freed_inodes_reset_to_free_records() {
        let mut store = tiny();
        let id = store.alloc_inode().unwrap();
        store
            .write_inode(id, &Inode::new("a".to_string(), 2))
            .unwrap();

        store.free_inode(id).unwrap();
        assert_eq!(store.read_inode(id).unwrap().assigned_blocks(), 0);
        assert_eq!(store.read_inode(id).unwrap().size, 0);
    }
}
