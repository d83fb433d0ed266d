pub mod disk;
pub mod mem;

pub use disk::DiskStore;
pub use mem::MemStore;

use crate::node::Inode;
use crate::FsError;

pub type InodeId = u32;
pub type BlockId = u32;

/// Shape of the storage behind a [`Store`] implementation. The file layer
/// reads these limits at run time instead of baking them in, so stores with
/// very small geometries can be used to exercise edge cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Bytes per data block.
    pub block_size: usize,
    /// Total inode records.
    pub inode_count: usize,
    /// Direct block references per inode.
    pub max_blocks_per_file: usize,
    /// Longest accepted file name in bytes.
    pub max_name_len: usize,
}

impl Geometry {
    /// Largest file the direct block table can address.
    pub fn max_file_size(&self) -> u64 {
        (self.block_size * self.max_blocks_per_file) as u64
    }
}

/// The inode and data-block allocator the file layer runs on.
///
/// Implementations own persistence and free-pool bookkeeping; the file layer
/// assumes any id handed out by `alloc_inode`/`alloc_block` stays valid until
/// the matching free call. Allocation failure is reported as
/// [`FsError::Exhausted`].
pub trait Store {
    fn geometry(&self) -> Geometry;

    fn read_inode(&mut self, id: InodeId) -> Result<Inode, FsError>;
    fn write_inode(&mut self, id: InodeId, node: &Inode) -> Result<(), FsError>;
    fn alloc_inode(&mut self) -> Result<InodeId, FsError>;
    fn free_inode(&mut self, id: InodeId) -> Result<(), FsError>;

    fn read_block(&mut self, id: BlockId, buf: &mut [u8]) -> Result<(), FsError>;
    fn write_block(&mut self, id: BlockId, buf: &[u8]) -> Result<(), FsError>;
    fn alloc_block(&mut self) -> Result<BlockId, FsError>;
    fn free_block(&mut self, id: BlockId) -> Result<(), FsError>;
}
