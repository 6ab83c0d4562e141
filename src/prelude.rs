pub use crate::builder::{BufferBuilder, LruBuilder};
pub use crate::ds::InsertionSortedSet;
pub use crate::error::{BulkError, ConfigError, Error};
pub use crate::offload::{Executor, OffloadExecutor};
pub use crate::policy::{AsyncBuffer, Buffer, Cache, FetchHandle, Lru, MissingPolicy, Sieve};
pub use crate::store::{MemStore, WeakValueMapping};
pub use crate::traits::{MapMetrics, Mapping};
