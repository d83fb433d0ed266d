//! A minimal flat-namespace file system.
//!
//! `flatfs` stores files as sequences of fixed-size blocks on top of an
//! inode/block allocator abstracted behind the [`Store`] trait. There are no
//! directories: every file lives in a single flat namespace keyed by name.
//!
//! The crate ships two stores. [`store::DiskStore`] persists everything to a
//! block device (typically the file-backed emulator in [`io`]), while
//! [`store::MemStore`] keeps the same structures in memory with a
//! caller-chosen geometry, which makes it convenient for tests and
//! experiments.
//!
//! All operations are synchronous and take `&mut self`; a [`FlatFs`] instance
//! provides no internal locking, so callers that share one across threads
//! must serialize access themselves.

mod alloc;
mod dir;
mod fs;
mod handle;
pub mod io;
mod node;
mod sb;
pub mod store;

use std::fmt;

use thiserror::Error;

pub use crate::fs::{FlatFs, MAX_OPEN_FILES};
pub use crate::node::{Inode, InodeStatus};
pub use crate::store::{BlockId, Geometry, InodeId, Store};

/// A pool of identifiers an operation can run out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Inodes,
    DataBlocks,
    FileHandles,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Inodes => f.write_str("inodes"),
            Resource::DataBlocks => f.write_str("data blocks"),
            Resource::FileHandles => f.write_str("file handles"),
        }
    }
}

#[derive(Error, Debug)]
pub enum FsError {
    #[error("a file named `{0}` already exists")]
    NameConflict(String),
    #[error("no free {0} left")]
    Exhausted(Resource),
    #[error("no file named `{0}`")]
    NotFound(String),
    #[error("handle {0} is not bound to an open file")]
    InvalidHandle(u32),
    #[error("offset out of range")]
    OutOfRange,
    #[error("write would exceed the maximum file size")]
    FileTooLarge,
    #[error("not a flatfs image: {0}")]
    InvalidImage(&'static str),
    #[error("file system inconsistency: {0}")]
    Inconsistent(&'static str),
    #[error("block device error")]
    Io(#[from] std::io::Error),
}
