//! Periodic housekeeping of the server's dictionaries.
//!
//! Growing happens inside the dictionary on insert, but shrinking and
//! finishing a rehash on an idle dictionary need someone to ask for it.

use std::time::Duration;

use dict::{Dict, DictType, HT_INITIAL_SIZE};
use log::{debug, trace};

/// Tables filled below this percentage get shrunk
pub const MIN_FILL_PERCENT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maintenance {
    Idle,
    /// Ran this many rehash steps
    Rehashed(usize),
    /// Started shrinking the table
    Shrunk,
}

/// Whether the table has grown far beyond what it holds
pub fn needs_resize<T: DictType>(d: &Dict<T>) -> bool {
    let size = d.slots();
    size > HT_INITIAL_SIZE && d.len() * 100 / size < MIN_FILL_PERCENT
}

/// Moves an ongoing rehash along for at most `budget`, or starts shrinking
/// a sparse table
pub fn maintain<T: DictType>(d: &mut Dict<T>, budget: Duration) -> Maintenance {
    if d.is_rehashing() {
        let steps = d.rehash_for_duration(budget);
        trace!(target: "maintenance", "{steps} rehash steps");
        return Maintenance::Rehashed(steps);
    }

    if !needs_resize(d) {
        return Maintenance::Idle;
    }
    match d.resize_to_fit() {
        Ok(()) => {
            debug!(target: "maintenance", "shrinking table of {} slots holding {}", d.slots(), d.len());
            Maintenance::Shrunk
        }
        Err(e) => {
            trace!(target: "maintenance", "not shrinking: {e}");
            Maintenance::Idle
        }
    }
}
