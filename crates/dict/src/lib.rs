//! In-memory hash tables with incremental rehashing.
//!
//! Tables are always a power of two in size and collisions are handled by
//! chaining. Growing (or shrinking) a table never moves every entry at once:
//! the dictionary keeps the old and the new table side by side and migrates
//! one bucket per operation until the old table is drained.

mod chain;
mod dict;
mod entry;
mod hash;
mod iter;
mod stats;
mod table;
mod types;

use thiserror::Error;

pub use dict::{Dict, FORCE_RESIZE_RATIO, HT_INITIAL_SIZE, REHASH_BATCH, Replaced};
pub use entry::{Entry, EntryId, Value};
pub use hash::{
    DEFAULT_HASH_SEED, gen_case_hash, gen_case_hash_with_seed, gen_hash, gen_hash_with_seed,
    hash_seed, identity_hash, int_hash, set_hash_seed,
};
pub use iter::{Iter, SafeIter};
pub use stats::{DictStats, STATS_VECTLEN, TableStats};
pub use types::{CaseStringKeys, DictType, IntKeys, StringKeys};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictError {
    /// Insert of a key that is already present
    #[error("key already exists")]
    KeyExists,

    /// Lookup or delete of a key that is not present (or on an unallocated table)
    #[error("key not found")]
    KeyNotFound,

    #[error("a rehash is already in progress")]
    AlreadyRehashing,

    /// Tried to size a table below the number of live entries
    #[error("requested size {requested} is smaller than the {used} entries in use")]
    RequestedSizeTooSmall { requested: usize, used: usize },

    #[error("dictionary is empty")]
    EmptyDictionary,

    #[error("resizing is disabled for this dictionary")]
    ResizeDisabled,

    /// The hash seed can only be chosen once, before anything hashed with it
    #[error("hash function seed was already set or used")]
    SeedAlreadySet,
}
