//! A persistent dictionary column: a clustered, slot-id-keyed store with
//! link-aware value normalization and backlink/replication hooks, built for
//! embedding inside a larger object database rather than standing alone.
//!
//! The pieces, bottom-up:
//!
//! - [`slot`] derives the internal 63-bit slot id from an application key.
//! - [`cluster`] and [`tree`] hold `(slot, key, value)` triples in sorted,
//!   splitting leaves.
//! - [`value`] is the tagged value union stored in each entry, plus the
//!   total order used by [`dictionary::DictionaryHandle::sort_by_value`].
//! - [`normalize`] validates and rewrites values crossing the dictionary
//!   boundary (link validation, null handling).
//! - [`arena`], [`resolver`], [`replication`] are the collaborator traits
//!   the enclosing database plugs in, each with a reference in-memory
//!   implementation for tests and standalone use.
//! - [`dictionary`] ties all of the above into the public façade.

pub mod accumulate;
pub mod arena;
pub mod cluster;
pub mod dictionary;
pub mod error;
pub mod normalize;
pub mod replication;
pub mod resolver;
pub mod slot;
pub mod tree;
pub mod value;

pub use dictionary::{DictConfig, DictionaryHandle};
pub use error::{DictError, Result};
pub use value::{Key, KeyType, Value, ValueType};

/// Initializes [`env_logger`] from the environment, if the `init_env_logger`
/// feature is enabled. Intended for use by binaries embedding this crate and
/// by its own integration tests; a no-op otherwise.
#[cfg(feature = "init_env_logger")]
pub fn init_env_logger() {
    let _ = env_logger::try_init();
}

#[cfg(not(feature = "init_env_logger"))]
pub fn init_env_logger() {}
