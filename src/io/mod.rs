mod block;
mod emulator;

pub use block::{BlockNumber, BlockStorage};
pub use emulator::{FileBlockEmulator, FileBlockEmulatorBuilder};
