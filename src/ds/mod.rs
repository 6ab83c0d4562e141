pub mod ordered_set;

pub use ordered_set::InsertionSortedSet;
