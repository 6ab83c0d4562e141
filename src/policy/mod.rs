pub mod async_buffer;
pub mod buffer;
pub mod cache;
pub mod lru;
pub mod sieve;

pub use async_buffer::{AsyncBuffer, FetchHandle, MissingPolicy};
pub use buffer::Buffer;
pub use cache::Cache;
pub use lru::Lru;
pub use sieve::Sieve;
