use log::{debug, warn};

use crate::dir;
use crate::handle::HandleTable;
use crate::node::Inode;
use crate::store::{InodeId, Store};
use crate::FsError;

/// Default capacity of the open file table.
pub const MAX_OPEN_FILES: usize = 16;

/// A mounted flat-namespace file system.
///
/// Owns its store and its open file table, so isolated instances can coexist
/// in one process. Every operation is synchronous; there is no internal
/// locking.
pub struct FlatFs<S: Store> {
    store: S,
    handles: HandleTable,
}

impl<S: Store> FlatFs<S> {
    pub fn new(store: S) -> Self {
        Self::with_handle_capacity(store, MAX_OPEN_FILES)
    }

    pub fn with_handle_capacity(store: S, capacity: usize) -> Self {
        Self {
            store,
            handles: HandleTable::new(capacity),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Creates an empty file and returns its inode id. Fails with
    /// [`FsError::NameConflict`] if the name is taken and
    /// [`FsError::Exhausted`] if no inode is free.
    pub fn create(&mut self, name: &str) -> Result<InodeId, FsError> {
        dir::create(&mut self.store, name)
    }

    /// Deletes a file, returning its blocks and inode to the free pools.
    /// Deleting a name that does not exist succeeds silently. Handles still
    /// bound to the inode are not invalidated and will dangle.
    pub fn delete(&mut self, name: &str) -> Result<(), FsError> {
        dir::remove(&mut self.store, name)
    }

    /// Opens an existing file and returns a handle with offset 0. Any number
    /// of handles may be bound to the same file, each with an independent
    /// offset.
    pub fn open(&mut self, name: &str) -> Result<u32, FsError> {
        let (inode, _) = dir::find_by_name(&mut self.store, name)?
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        self.handles.bind(inode)
    }

    /// Releases a handle. Closing an out-of-range or already-closed handle is
    /// a no-op.
    pub fn close(&mut self, handle: u32) {
        self.handles.release(handle);
    }

    /// Fills `buf` from the file starting at the handle's current offset.
    ///
    /// The whole request must fit inside the file: if `offset + buf.len()`
    /// exceeds the file size the call fails with [`FsError::OutOfRange`] and
    /// `buf` is untouched. There are no short reads. The handle's offset is
    /// not advanced; callers reposition explicitly with [`FlatFs::seek`].
    pub fn read(&mut self, handle: u32, buf: &mut [u8]) -> Result<(), FsError> {
        let open = *self.handles.get(handle)?;
        let node = self.store.read_inode(open.inode)?;
        if open.offset + buf.len() as u64 > node.size {
            return Err(FsError::OutOfRange);
        }

        let block_size = self.store.geometry().block_size;
        let mut scratch = vec![0u8; block_size];
        let mut copied = 0;
        let mut pos = open.offset as usize;
        while copied < buf.len() {
            let index = pos / block_size;
            let intra = pos % block_size;
            let take = (block_size - intra).min(buf.len() - copied);

            // Unreachable while the contiguous-prefix invariant holds.
            let block = node
                .blocks
                .get(index)
                .copied()
                .flatten()
                .ok_or(FsError::Inconsistent("read range covers an unassigned block"))?;
            self.store.read_block(block, &mut scratch)?;
            buf[copied..copied + take].copy_from_slice(&scratch[intra..intra + take]);

            copied += take;
            pos += take;
        }
        Ok(())
    }

    /// Writes `data` to the file starting at the handle's current offset,
    /// growing the file if the range extends past the end.
    ///
    /// Fails with [`FsError::FileTooLarge`] if the range extends past what the
    /// direct block table can address. Atomic with respect to allocation
    /// growth: on any failure every block allocated by this call is freed
    /// again and the inode's size and assigned-block set are exactly as
    /// before. The handle's offset is not advanced.
    pub fn write(&mut self, handle: u32, data: &[u8]) -> Result<(), FsError> {
        let open = *self.handles.get(handle)?;
        let mut node = self.store.read_inode(open.inode)?;
        let end = open.offset + data.len() as u64;
        if end > self.store.geometry().max_file_size() {
            return Err(FsError::FileTooLarge);
        }

        let original_size = node.size;
        let mut fresh = Vec::new();
        if let Err(err) = self.write_blocks(&mut node, open.offset, data, &mut fresh) {
            return Err(self.rollback(open.inode, node, original_size, fresh, err));
        }

        node.size = node.size.max(end);
        if let Err(err) = self.store.write_inode(open.inode, &node) {
            return Err(self.rollback(open.inode, node, original_size, fresh, err));
        }
        Ok(())
    }

    /// Moves the handle's offset by `delta` bytes in either direction. The
    /// result must stay within `0..=size`; seeking can never grow a file.
    pub fn seek(&mut self, handle: u32, delta: i64) -> Result<(), FsError> {
        let open = *self.handles.get(handle)?;
        let node = self.store.read_inode(open.inode)?;

        let target = (open.offset as i64)
            .checked_add(delta)
            .ok_or(FsError::OutOfRange)?;
        if target < 0 || target as u64 > node.size {
            return Err(FsError::OutOfRange);
        }

        self.handles.get_mut(handle)?.offset = target as u64;
        Ok(())
    }

    /// Copies `data` into the blocks covering `[offset, offset + data.len())`,
    /// allocating and zero-filling blocks where the inode has none assigned.
    /// Indices of slots assigned by this call are pushed onto `fresh` so the
    /// caller can undo them.
    fn write_blocks(
        &mut self,
        node: &mut Inode,
        offset: u64,
        data: &[u8],
        fresh: &mut Vec<usize>,
    ) -> Result<(), FsError> {
        let block_size = self.store.geometry().block_size;
        let mut scratch = vec![0u8; block_size];
        let mut written = 0;
        let mut pos = offset as usize;
        while written < data.len() {
            let index = pos / block_size;
            let intra = pos % block_size;
            let take = (block_size - intra).min(data.len() - written);

            let slot = node
                .blocks
                .get(index)
                .copied()
                .ok_or(FsError::Inconsistent("write past the direct block table"))?;
            let block = match slot {
                Some(block) => {
                    // Read-modify-write preserves bytes outside the sub-range.
                    self.store.read_block(block, &mut scratch)?;
                    block
                }
                None => {
                    let block = self.store.alloc_block()?;
                    node.blocks[index] = Some(block);
                    fresh.push(index);
                    scratch.iter_mut().for_each(|byte| *byte = 0);
                    block
                }
            };

            scratch[intra..intra + take].copy_from_slice(&data[written..written + take]);
            self.store.write_block(block, &scratch)?;

            written += take;
            pos += take;
        }
        Ok(())
    }

    /// Frees every block allocated by the failing write and persists the
    /// inode with its pre-call size and block set, then hands back the
    /// original error.
    fn rollback(
        &mut self,
        id: InodeId,
        mut node: Inode,
        original_size: u64,
        fresh: Vec<usize>,
        err: FsError,
    ) -> FsError {
        for index in fresh {
            if let Some(block) = node.blocks[index].take() {
                if let Err(free_err) = self.store.free_block(block) {
                    warn!("rollback could not free block {}: {}", block, free_err);
                }
            }
        }
        node.size = original_size;
        if let Err(persist_err) = self.store.write_inode(id, &node) {
            warn!("rollback could not persist inode {}: {}", id, persist_err);
        }
        debug!("write to inode {} rolled back: {}", id, err);
        err
    }
}
