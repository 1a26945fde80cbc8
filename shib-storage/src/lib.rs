pub mod identity;
mod mariadb;
mod memory;
mod pool;

pub use identity::{Identity, IdentityStore};
pub use mariadb::*;
pub use memory::MemoryStore;
pub use pool::connection_manager;
