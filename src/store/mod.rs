pub mod hashmap;
pub mod weak;

pub use hashmap::MemStore;
pub use weak::WeakValueMapping;
