//! The flat name directory: maps file names to inode records by scanning the
//! inode table. Names are unique among in-use inodes; `create` enforces this
//! before allocating.

use log::debug;

use crate::node::{Inode, InodeStatus};
use crate::store::{InodeId, Store};
use crate::FsError;

/// Scans the inode table for an in-use record with a matching name. Returns
/// the first match, which by the uniqueness invariant is the only one.
pub(crate) fn find_by_name<S: Store>(
    store: &mut S,
    name: &str,
) -> Result<Option<(InodeId, Inode)>, FsError> {
    for id in 0..store.geometry().inode_count as InodeId {
        let node = store.read_inode(id)?;
        if node.status == InodeStatus::InUse && node.name == name {
            return Ok(Some((id, node)));
        }
    }
    Ok(None)
}

/// Creates an empty file, truncating the name to the store's limit.
pub(crate) fn create<S: Store>(store: &mut S, name: &str) -> Result<InodeId, FsError> {
    let geom = store.geometry();
    let name = bounded_name(name, geom.max_name_len);
    if find_by_name(store, &name)?.is_some() {
        return Err(FsError::NameConflict(name));
    }

    let id = store.alloc_inode()?;
    let node = Inode::new(name, geom.max_blocks_per_file);
    store.write_inode(id, &node)?;
    debug!("created `{}` as inode {}", node.name, id);
    Ok(id)
}

/// Removes a file, returning every assigned block and the inode itself to the
/// store's free pools. Removing a name that does not exist succeeds silently.
pub(crate) fn remove<S: Store>(store: &mut S, name: &str) -> Result<(), FsError> {
    let (id, mut node) = match find_by_name(store, name)? {
        Some(found) => found,
        None => return Ok(()),
    };

    for slot in node.blocks.iter_mut() {
        if let Some(block) = slot.take() {
            store.free_block(block)?;
        }
    }
    store.free_inode(id)?;
    debug!("deleted `{}` (inode {})", name, id);
    Ok(())
}

/// Truncates a name to at most `max` bytes, backing up to a char boundary.
fn bounded_name(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Geometry, MemStore};
    use crate::Resource;

    fn test_store() -> MemStore {
        MemStore::new(
            Geometry {
                block_size: 4,
                inode_count: 3,
                max_blocks_per_file: 2,
                max_name_len: 8,
            },
            4,
        )
    }

    #[test]
    fn created_files_resolve_by_name() {
        let mut store = test_store();
        let id = create(&mut store, "a").unwrap();

        let (found, node) = find_by_name(&mut store, "a").unwrap().unwrap();
        assert_eq!(found, id);
        assert_eq!(node.size, 0);
        assert_eq!(node.assigned_blocks(), 0);
    }

    #[test]
    fn duplicate_names_conflict() {
        let mut store = test_store();
        create(&mut store, "a").unwrap();

        match create(&mut store, "a") {
            Err(FsError::NameConflict(name)) => assert_eq!(name, "a"),
            _ => panic!("expected a name conflict"),
        }
    }

    #[test]
    fn long_names_are_truncated_and_still_conflict() {
        let mut store = test_store();
        create(&mut store, "a-very-long-name").unwrap();

        assert!(find_by_name(&mut store, "a-very-l").unwrap().is_some());
        match create(&mut store, "a-very-long-name-2") {
            Err(FsError::NameConflict(_)) => (),
            _ => panic!("expected a name conflict on the truncated name"),
        }
    }

    #[test]
    fn create_fails_once_inodes_run_out() {
        let mut store = test_store();
        create(&mut store, "a").unwrap();
        create(&mut store, "b").unwrap();
        create(&mut store, "c").unwrap();

        match create(&mut store, "d") {
            Err(FsError::Exhausted(Resource::Inodes)) => (),
            _ => panic!("expected inode exhaustion"),
        }
    }

    #[test]
    fn remove_is_a_no_op_for_unknown_names() {
        let mut store = test_store();
        remove(&mut store, "missing").unwrap();
        remove(&mut store, "missing").unwrap();
    }

    #[test]
    fn remove_returns_blocks_and_inode_to_the_free_pools() {
        let mut store = test_store();
        let id = create(&mut store, "a").unwrap();

        let mut node = store.read_inode(id).unwrap();
        node.blocks[0] = Some(store.alloc_block().unwrap());
        node.blocks[1] = Some(store.alloc_block().unwrap());
        node.size = 8;
        store.write_inode(id, &node).unwrap();
        assert_eq!(store.free_blocks(), 2);

        remove(&mut store, "a").unwrap();
        assert_eq!(store.free_blocks(), 4);
        assert_eq!(store.free_inodes(), 3);
        assert!(find_by_name(&mut store, "a").unwrap().is_none());
    }
}
