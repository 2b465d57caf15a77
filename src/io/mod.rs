mod block_cache;
mod memory;
mod reader;
mod stream;

pub use block_cache::{CachedStream, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY};
pub use memory::{MemoryStream, DEFAULT_MAX_STREAM_SIZE};
pub use reader::ReaderStream;
pub use stream::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, resolve_seek,
    Stream,
};
