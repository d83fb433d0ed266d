//! The open file table: a fixed-capacity set of handle slots, each binding an
//! inode id to an independent byte offset.

use crate::store::InodeId;
use crate::{FsError, Resource};

/// One bound slot in the open file table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpenFile {
    pub inode: InodeId,
    /// Current position in bytes, always within `0..=size` of the bound file.
    pub offset: u64,
}

pub(crate) struct HandleTable {
    slots: Vec<Option<OpenFile>>,
}

impl HandleTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Binds the lowest unbound slot to `inode` with offset 0.
    pub fn bind(&mut self, inode: InodeId) -> Result<u32, FsError> {
        let free = self
            .slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(FsError::Exhausted(Resource::FileHandles))?;
        self.slots[free] = Some(OpenFile { inode, offset: 0 });
        Ok(free as u32)
    }

    pub fn get(&self, handle: u32) -> Result<&OpenFile, FsError> {
        self.slots
            .get(handle as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or(FsError::InvalidHandle(handle))
    }

    pub fn get_mut(&mut self, handle: u32) -> Result<&mut OpenFile, FsError> {
        self.slots
            .get_mut(handle as usize)
            .and_then(|slot| slot.as_mut())
            .ok_or(FsError::InvalidHandle(handle))
    }

    /// Unbinds a slot. Out-of-range and already-unbound handles are ignored.
    pub fn release(&mut self, handle: u32) {
        if let Some(slot) = self.slots.get_mut(handle as usize) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_fill_the_lowest_free_slot() {
        let mut table = HandleTable::new(2);
        assert_eq!(table.bind(7).unwrap(), 0);
        assert_eq!(table.bind(7).unwrap(), 1);

        table.release(0);
        assert_eq!(table.bind(3).unwrap(), 0);
        assert_eq!(table.get(0).unwrap().inode, 3);
    }

    #[test]
    fn binding_past_capacity_fails() {
        let mut table = HandleTable::new(1);
        table.bind(0).unwrap();
        match table.bind(1) {
            Err(FsError::Exhausted(Resource::FileHandles)) => (),
            _ => panic!("expected handle exhaustion"),
        }
    }

    #[test]
    fn unbound_and_out_of_range_handles_are_invalid() {
        let mut table = HandleTable::new(2);
        table.bind(0).unwrap();
        table.release(0);

        assert!(matches!(table.get(0), Err(FsError::InvalidHandle(0))));
        assert!(matches!(table.get(9), Err(FsError::InvalidHandle(9))));
    }

    #[test]
    fn release_is_lenient_about_bad_handles() {
        let mut table = HandleTable::new(1);
        table.release(0);
        table.release(42);
    }
}
