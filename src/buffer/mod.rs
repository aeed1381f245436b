mod buffer_pool;
mod lru_replacer;

pub use buffer_pool::{BufferPool, PageRef};
pub use lru_replacer::LruReplacer;
