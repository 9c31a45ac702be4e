mod memory;
mod retry;
mod rocksdb;

pub use memory::MemorySequenceStore;
pub use retry::RetryConfig;
pub use rocksdb::{RocksDbConfig, RocksDbSequenceStore};
