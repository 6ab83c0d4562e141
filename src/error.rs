//! Error types for the mapstack library.
//!
//! ## Key Components
//!
//! - [`Error`]: The single-key error taxonomy shared by every mapping layer
//!   (lookup misses, closed handles, backend and callback failures).
//! - [`BulkError`]: Returned by bulk operations; carries the missing key
//!   subset so callers can retry or source them elsewhere.
//! - [`ConfigError`]: Returned when layer configuration parameters are
//!   invalid (e.g. duplicate route labels, unknown selector output).
//!
//! ## Example Usage
//!
//! ```
//! use mapstack::error::Error;
//! use mapstack::store::hashmap::MemStore;
//! use mapstack::traits::Mapping;
//!
//! let store: MemStore<&str, i32> = MemStore::new();
//! assert!(matches!(store.get(&"absent"), Err(Error::NotFound)));
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error raised by single-key mapping operations.
///
/// Backend failures propagate through policy layers verbatim: a layer
/// restores its own bookkeeping before re-raising, so a failed operation
/// leaves the layer indistinguishable from one where the call never
/// happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Lookup of an absent key.
    NotFound,
    /// The mapping has been closed; only `close()` itself remains legal.
    AlreadyClosed,
    /// A child mapping failed. The message is preserved unchanged.
    Backend(String),
    /// An eviction callback failed and no error handler claimed it.
    Callback(String),
    /// Work was abandoned because the component shut down mid-flight.
    Cancelled,
    /// Invalid configuration parameter.
    Config(ConfigError),
}

impl Error {
    /// Wraps an arbitrary backend failure, preserving its message.
    pub fn backend(err: impl fmt::Display) -> Self {
        Error::Backend(err.to_string())
    }

    /// Wraps a callback failure, preserving its message.
    pub fn callback(err: impl fmt::Display) -> Self {
        Error::Callback(err.to_string())
    }

    /// Returns `true` for a plain single-key miss.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => f.write_str("key not found"),
            Error::AlreadyClosed => f.write_str("mapping is closed"),
            Error::Backend(msg) => write!(f, "backend failure: {msg}"),
            Error::Callback(msg) => write!(f, "eviction callback failure: {msg}"),
            Error::Cancelled => f.write_str("operation cancelled"),
            Error::Config(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

// ---------------------------------------------------------------------------
// BulkError
// ---------------------------------------------------------------------------

/// Error raised by bulk mapping operations.
///
/// `NotFoundAny` carries the subset of requested keys that were absent, in
/// request order, so callers such as
/// [`AsyncBuffer::async_get`](crate::policy::async_buffer::AsyncBuffer::async_get)
/// can go fetch exactly those keys from another tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkError<K> {
    /// At least one requested key was absent; carries the missing subset.
    NotFoundAny(Vec<K>),
    /// A non-miss failure occurred partway through the bulk operation.
    Op(Error),
}

impl<K> BulkError<K> {
    /// Returns the missing key subset, if this is a bulk miss.
    pub fn missing(&self) -> Option<&[K]> {
        match self {
            BulkError::NotFoundAny(keys) => Some(keys),
            BulkError::Op(_) => None,
        }
    }
}

impl<K> fmt::Display for BulkError<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BulkError::NotFoundAny(keys) => {
                write!(f, "{} requested key(s) not found", keys.len())
            }
            BulkError::Op(err) => err.fmt(f),
        }
    }
}

impl<K: fmt::Debug> std::error::Error for BulkError<K> {}

impl<K> From<Error> for BulkError<K> {
    fn from(err: Error) -> Self {
        BulkError::Op(err)
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when layer configuration parameters are invalid.
///
/// Produced by fallible constructors such as
/// [`Sieve::try_new`](crate::policy::sieve::Sieve::try_new). Carries a
/// human-readable description of which parameter failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
