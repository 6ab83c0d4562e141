//! mapstack: composable mutable mapping layers.
//!
//! Every component implements the [`Mapping`](traits::Mapping) contract
//! and wraps other mappings, so eviction, tiering, routing, and caching
//! policies stack without glue code. See `DESIGN.md` for internal
//! architecture and invariants.

pub mod ds;
pub mod policy;
pub mod store;

pub mod builder;
pub mod error;
pub mod offload;
pub mod prelude;
pub mod traits;
