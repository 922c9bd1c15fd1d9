//! Local implementations of the storage traits.

pub mod disk;
pub mod memory;
pub mod session;

pub use disk::DiskDocumentStore;
pub use memory::{MemoryDocumentStore, MemorySessionStore};
pub use session::FileSessionStore;
