use std::{
    cell::Cell,
    fmt, mem,
    rc::Rc,
    time::{Duration, Instant},
};

use log::trace;
use rand::Rng;

use crate::DictError;
use crate::chain::{self, Arena};
use crate::entry::{Entry, EntryId, Value};
use crate::iter::{Iter, SafeIter};
use crate::stats::{DictStats, TableStats};
use crate::table::{HashTable, next_power};
use crate::types::DictType;

/// Size of a freshly allocated table
pub const HT_INITIAL_SIZE: usize = 4;

/// Load factor above which a table grows even when resizing is disabled
pub const FORCE_RESIZE_RATIO: usize = 5;

/// Buckets migrated per batch by [`Dict::rehash_for_duration`]
pub const REHASH_BATCH: usize = 100;

/// Outcome of [`Dict::insert_or_replace`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replaced {
    Inserted,
    Replaced,
}

/// Where a key lives, or which bucket it would be linked into
enum Slot {
    Occupied(EntryId),
    Vacant(usize),
}

#[derive(Debug)]
pub(crate) enum Tables {
    Stable(HashTable),
    /// Entries move bucket by bucket from `primary` into `target`.
    /// Every primary bucket below `cursor` is already empty.
    Rehashing {
        primary: HashTable,
        target: HashTable,
        cursor: usize,
    },
}

impl Default for Tables {
    fn default() -> Self {
        Tables::Stable(HashTable::EMPTY_TABLE)
    }
}

impl Tables {
    pub(crate) fn primary(&self) -> &HashTable {
        match self {
            Tables::Stable(primary) | Tables::Rehashing { primary, .. } => primary,
        }
    }

    pub(crate) fn target(&self) -> Option<&HashTable> {
        match self {
            Tables::Stable(_) => None,
            Tables::Rehashing { target, .. } => Some(target),
        }
    }

    /// `0` is the primary table, `1` the rehash target
    pub(crate) fn get(&self, table: usize) -> Option<&HashTable> {
        match table {
            0 => Some(self.primary()),
            1 => self.target(),
            _ => None,
        }
    }

    fn get_mut(&mut self, table: usize) -> Option<&mut HashTable> {
        match (self, table) {
            (Tables::Stable(primary) | Tables::Rehashing { primary, .. }, 0) => Some(primary),
            (Tables::Rehashing { target, .. }, 1) => Some(target),
            _ => None,
        }
    }

    /// Primary first, then the rehash target if there is one
    pub(crate) fn iter(&self) -> impl Iterator<Item = &HashTable> {
        std::iter::once(self.primary()).chain(self.target())
    }

    /// New entries always go to the newest table
    fn insert_table_mut(&mut self) -> &mut HashTable {
        match self {
            Tables::Stable(primary) => primary,
            Tables::Rehashing { target, .. } => target,
        }
    }

    fn is_rehashing(&self) -> bool {
        matches!(self, Tables::Rehashing { .. })
    }
}

/// A chained hash table that grows and shrinks incrementally.
///
/// Resizing allocates a second table and from then on every lookup or
/// mutation moves one bucket of the old table into the new one, so no
/// single call ever pays for rehashing the whole table.
///
/// `Dict` is single threaded by construction (it is neither `Send` nor
/// `Sync`).
pub struct Dict<T: DictType> {
    ty: T,
    pub(crate) arena: Arena<T::Key, T::Value>,
    pub(crate) tables: Tables,
    /// Number of registered [`SafeIter`]s, rehashing pauses while non zero
    pub(crate) iterators: Rc<Cell<usize>>,
    can_resize: bool,
}

impl<T: DictType> Dict<T> {
    /// Creates an empty dictionary, nothing is allocated until the first insert
    pub fn new(ty: T) -> Self {
        Self {
            ty,
            arena: Arena::with_key(),
            tables: Tables::default(),
            iterators: Rc::new(Cell::new(0)),
            can_resize: true,
        }
    }

    /// Creates an empty dictionary with room for `size` entries
    pub fn with_capacity(ty: T, size: usize) -> Self {
        let mut d = Self::new(ty);
        d.install_table(size);
        d
    }

    /// The type descriptor this dictionary was created with
    pub fn context(&self) -> &T {
        &self.ty
    }

    /// Number of entries, across both tables
    pub fn len(&self) -> usize {
        self.tables.iter().map(|t| t.used).sum()
    }

    /// Shorthand for `self.len() == 0`
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_rehashing(&self) -> bool {
        self.tables.is_rehashing()
    }

    /// Number of buckets, across both tables
    pub fn slots(&self) -> usize {
        self.tables.iter().map(HashTable::size).sum()
    }

    /// Number of safe iterators currently holding off rehashing
    pub fn live_iterators(&self) -> usize {
        self.iterators.get()
    }

    pub fn can_resize(&self) -> bool {
        self.can_resize
    }

    pub fn enable_resize(&mut self) {
        self.can_resize = true;
    }

    /// Stops the table from growing at a 1:1 load factor.
    ///
    /// Useful while the process wants to avoid moving memory around.
    /// Tables still grow once their load factor exceeds
    /// [`FORCE_RESIZE_RATIO`].
    pub fn disable_resize(&mut self) {
        self.can_resize = false;
    }

    // [sizing]

    /// Shrinks (or grows) the table to the smallest size that holds every
    /// entry with a load factor of at most 1
    pub fn resize_to_fit(&mut self) -> Result<(), DictError> {
        if !self.can_resize {
            return Err(DictError::ResizeDisabled);
        }
        if self.is_rehashing() {
            return Err(DictError::AlreadyRehashing);
        }

        let minimal = self.tables.primary().used.max(HT_INITIAL_SIZE);
        self.expand(minimal)
    }

    /// Starts moving the entries into a table of at least `size` buckets.
    ///
    /// On a dictionary that was never allocated the new table is used
    /// right away, otherwise an incremental rehash begins.
    pub fn expand(&mut self, size: usize) -> Result<(), DictError> {
        if self.is_rehashing() {
            return Err(DictError::AlreadyRehashing);
        }

        let used = self.tables.primary().used;
        if used > size {
            return Err(DictError::RequestedSizeTooSmall {
                requested: size,
                used,
            });
        }

        self.install_table(size);
        Ok(())
    }

    /// Performs up to `n` rehash steps, each migrating one non-empty bucket.
    ///
    /// Returns `true` while there are still buckets left to move. Does
    /// nothing while a [`SafeIter`] is live.
    pub fn rehash(&mut self, n: usize) -> bool {
        if self.iterators.get() > 0 {
            return self.is_rehashing();
        }

        for _ in 0..n {
            if !self.rehash_bucket() {
                return false;
            }
        }
        self.is_rehashing()
    }

    /// Rehashes in batches of [`REHASH_BATCH`] buckets until done or until
    /// more than `budget` elapsed. Returns the number of steps performed.
    pub fn rehash_for_duration(&mut self, budget: Duration) -> usize {
        if self.iterators.get() > 0 {
            return 0;
        }

        let start = Instant::now();
        let mut rehashes = 0;
        while self.rehash(REHASH_BATCH) {
            rehashes += REHASH_BATCH;
            if start.elapsed() > budget {
                break;
            }
        }
        rehashes
    }

    // [lookup & mutation]

    /// Adds `key` with `val`, fails if the key is already present
    pub fn insert(&mut self, key: T::Key, val: T::Value) -> Result<(), DictError> {
        self.rehash_step();

        match self.slot(&key) {
            Slot::Occupied(_) => Err(DictError::KeyExists),
            Slot::Vacant(idx) => {
                let val = Value::Val(self.ty.dup_val(val));
                self.link(idx, key, val);
                Ok(())
            }
        }
    }

    /// Adds `key` without a value and hands the entry back so the caller
    /// can store whatever it wants in it, fails if the key is already present
    pub fn add_raw(&mut self, key: T::Key) -> Result<&mut Entry<T::Key, T::Value>, DictError> {
        self.rehash_step();

        match self.slot(&key) {
            Slot::Occupied(_) => Err(DictError::KeyExists),
            Slot::Vacant(idx) => {
                let id = self.link(idx, key, Value::Unset);
                Ok(&mut self.arena[id])
            }
        }
    }

    /// Adds `key` or overwrites the value it already has
    pub fn insert_or_replace(&mut self, key: T::Key, val: T::Value) -> Replaced {
        self.rehash_step();

        let val = Value::Val(self.ty.dup_val(val));
        match self.slot(&key) {
            Slot::Vacant(idx) => {
                self.link(idx, key, val);
                Replaced::Inserted
            }
            Slot::Occupied(id) => {
                // install the new value before freeing the old one,
                // both may refer to the same underlying object
                let old = mem::replace(&mut self.arena[id].val, val);
                self.free_value(old);
                Replaced::Replaced
            }
        }
    }

    /// Returns the entry of `key`, adding it with an unset value first if
    /// it is not present. The key is hashed once either way.
    pub fn get_or_create_slot(&mut self, key: T::Key) -> &mut Entry<T::Key, T::Value> {
        self.rehash_step();

        let id = match self.slot(&key) {
            Slot::Occupied(id) => id,
            Slot::Vacant(idx) => self.link(idx, key, Value::Unset),
        };
        &mut self.arena[id]
    }

    pub fn find(&mut self, key: &T::Key) -> Result<&mut Entry<T::Key, T::Value>, DictError> {
        let id = self.find_id(key).ok_or(DictError::KeyNotFound)?;
        Ok(&mut self.arena[id])
    }

    pub fn get(&mut self, key: &T::Key) -> Result<&Value<T::Value>, DictError> {
        self.find(key).map(|e| &e.val)
    }

    pub fn contains_key(&mut self, key: &T::Key) -> bool {
        self.find_id(key).is_some()
    }

    /// Looks up an entry handed out by a [`SafeIter`]
    pub fn entry(&self, id: EntryId) -> Option<&Entry<T::Key, T::Value>> {
        self.arena.get(id)
    }

    pub fn entry_mut(&mut self, id: EntryId) -> Option<&mut Entry<T::Key, T::Value>> {
        self.arena.get_mut(id)
    }

    /// Removes `key`, running the key and value destructors
    pub fn delete(&mut self, key: &T::Key) -> Result<(), DictError> {
        let entry = self.remove_entry(key)?;
        self.free_entry(entry);
        Ok(())
    }

    /// Removes `key` without running the destructors, the stored key and
    /// value are handed back instead
    pub fn unlink(&mut self, key: &T::Key) -> Result<(T::Key, Value<T::Value>), DictError> {
        let entry = self.remove_entry(key)?;
        Ok((entry.key, entry.val))
    }

    /// Returns a random entry.
    ///
    /// A random non-empty bucket is picked first, then a random entry of
    /// its chain, so entries sharing a bucket are less likely to come up
    /// than entries alone in theirs.
    pub fn random_entry(&mut self) -> Result<&Entry<T::Key, T::Value>, DictError> {
        if self.is_empty() {
            return Err(DictError::EmptyDictionary);
        }
        self.rehash_step();

        let mut rng = rand::rng();
        let head = match &self.tables {
            Tables::Rehashing { primary, target, .. } => loop {
                // both tables form one address space, primary buckets first
                let h = rng.random_range(0..primary.size() + target.size());
                let head = match h.checked_sub(primary.size()) {
                    Some(h) => target.head(h),
                    None => primary.head(h),
                };
                if let Some(id) = head {
                    break id;
                }
            },
            Tables::Stable(primary) => loop {
                if let Some(id) = primary.head(rng.random_range(0..=primary.mask)) {
                    break id;
                }
            },
        };

        let len = chain::iter(&self.arena, Some(head)).count();
        chain::iter(&self.arena, Some(head))
            .nth(rng.random_range(0..len))
            .map(|(_, e)| e)
            .ok_or(DictError::EmptyDictionary)
    }

    /// Destroys every entry and frees both tables
    pub fn clear(&mut self) {
        self.free_all();
        // safe iterators still out there hold on to the old counter,
        // which detaches them from this dictionary
        self.iterators = Rc::new(Cell::new(0));
    }

    /// Destroys the dictionary, running the destructors of every entry
    pub fn release(self) {
        drop(self);
    }

    // [iteration & introspection]

    /// Iterates over every entry, the dictionary can't change meanwhile
    pub fn iter(&self) -> Iter<'_, T::Key, T::Value> {
        Iter::new(&self.arena, &self.tables)
    }

    /// Creates an iterator that tolerates changes to the dictionary
    /// between steps, see [`SafeIter`]
    pub fn safe_iter(&self) -> SafeIter {
        SafeIter::new(Rc::clone(&self.iterators))
    }

    pub fn stats(&self) -> DictStats {
        DictStats {
            primary: TableStats::collect(self.tables.primary(), &self.arena),
            rehash_target: self
                .tables
                .target()
                .map(|t| TableStats::collect(t, &self.arena)),
        }
    }

    // [private]

    /// One cooperative rehash step, the price every operation pays while
    /// a rehash is in progress
    fn rehash_step(&mut self) {
        if self.is_rehashing() {
            self.rehash(1);
        }
    }

    /// Moves the next non-empty bucket of the primary table to the target
    /// table, returns `false` once the rehash is complete
    fn rehash_bucket(&mut self) -> bool {
        let Tables::Rehashing {
            primary,
            target,
            cursor,
        } = &mut self.tables
        else {
            return false;
        };

        if primary.used > 0 {
            // cursor can't run off the end, there are entries left past it
            while primary.buckets[*cursor].is_none() {
                *cursor += 1;
            }

            let mut bucket = primary.buckets[*cursor].take();
            while let Some(id) = chain::pop_front(&mut bucket, &mut self.arena) {
                let idx = target.index(self.ty.hash(&self.arena[id].key));
                chain::push_front(&mut target.buckets[idx], &mut self.arena, id);
                primary.used -= 1;
                target.used += 1;
            }
            *cursor += 1;
        }

        if primary.used > 0 {
            return true;
        }
        self.finish_rehash();
        false
    }

    fn finish_rehash(&mut self) {
        self.tables = match mem::take(&mut self.tables) {
            Tables::Rehashing { target, .. } => {
                trace!(target: "dict", "rehash finished, {} buckets, {} entries", target.size(), target.used);
                Tables::Stable(target)
            }
            stable => stable,
        };
    }

    /// Allocates a table for `size` entries, either as the primary table
    /// or as the target of a new rehash
    fn install_table(&mut self, size: usize) {
        debug_assert!(!self.is_rehashing(), "installing a table mid rehash");

        let fresh = HashTable::new_with_buckets(next_power(size));
        self.tables = match mem::take(&mut self.tables) {
            Tables::Stable(primary) if primary.is_allocated() => {
                trace!(target: "dict", "rehash started, {} -> {} buckets", primary.size(), fresh.size());
                Tables::Rehashing {
                    primary,
                    target: fresh,
                    cursor: 0,
                }
            }
            Tables::Stable(_) => Tables::Stable(fresh),
            rehashing => rehashing,
        };
    }

    /// Grows the table once it reaches a 1:1 load factor,
    /// or allocates it if it was never used
    fn expand_if_needed(&mut self) {
        let (used, size, load_factor) = match &self.tables {
            Tables::Stable(primary) => (primary.used, primary.size(), primary.load_factor()),
            Tables::Rehashing { .. } => return,
        };

        if size == 0 {
            self.install_table(HT_INITIAL_SIZE);
        } else if used >= size && (self.can_resize || load_factor > FORCE_RESIZE_RATIO) {
            self.install_table(used.saturating_mul(2));
        }
    }

    /// Finds `key`, or the bucket a new entry for it belongs to.
    ///
    /// Grows the table first if needed, so the returned bucket index is
    /// always relative to the table that receives new entries.
    fn slot(&mut self, key: &T::Key) -> Slot {
        self.expand_if_needed();

        let hash = self.ty.hash(key);
        let mut idx = 0;
        for table in self.tables.iter() {
            idx = table.index(hash);
            let found = chain::find(&self.arena, table.head(idx), |e| self.ty.key_eq(key, &e.key));
            if let Some(id) = found {
                return Slot::Occupied(id);
            }
        }
        Slot::Vacant(idx)
    }

    fn link(&mut self, idx: usize, key: T::Key, val: Value<T::Value>) -> EntryId {
        let key = self.ty.dup_key(key);
        let id = self.arena.insert(Entry::new(key, val));
        self.tables.insert_table_mut().link(&mut self.arena, idx, id);
        id
    }

    fn find_id(&mut self, key: &T::Key) -> Option<EntryId> {
        // never allocated, nothing to look at
        if !self.tables.primary().is_allocated() {
            return None;
        }
        self.rehash_step();

        let hash = self.ty.hash(key);
        self.tables.iter().find_map(|table| {
            chain::find(&self.arena, table.head(table.index(hash)), |e| {
                self.ty.key_eq(key, &e.key)
            })
        })
    }

    fn remove_entry(&mut self, key: &T::Key) -> Result<Entry<T::Key, T::Value>, DictError> {
        if !self.tables.primary().is_allocated() {
            return Err(DictError::KeyNotFound);
        }
        self.rehash_step();

        let hash = self.ty.hash(key);
        for table in 0..2 {
            let Some(ht) = self.tables.get_mut(table) else {
                break;
            };

            let idx = ht.index(hash);
            let found = chain::find(&self.arena, ht.head(idx), |e| self.ty.key_eq(key, &e.key));
            if let Some(id) = found {
                ht.unlink(&mut self.arena, idx, id);
                return self.arena.remove(id).ok_or(DictError::KeyNotFound);
            }
        }
        Err(DictError::KeyNotFound)
    }

    fn free_entry(&self, entry: Entry<T::Key, T::Value>) {
        self.ty.free_key(entry.key);
        self.free_value(entry.val);
    }

    fn free_value(&self, val: Value<T::Value>) {
        if let Value::Val(v) = val {
            self.ty.free_val(v);
        }
    }

    fn free_all(&mut self) {
        self.tables = Tables::default();
        for (_, entry) in mem::take(&mut self.arena) {
            self.free_entry(entry);
        }
    }
}

impl<T: DictType> Drop for Dict<T> {
    fn drop(&mut self) {
        self.free_all();
    }
}

impl<'a, T: DictType> IntoIterator for &'a Dict<T> {
    type Item = &'a Entry<T::Key, T::Value>;
    type IntoIter = Iter<'a, T::Key, T::Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> fmt::Debug for Dict<T>
where
    T: DictType,
    T::Key: fmt::Debug,
    T::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dict")
            .field("len", &self.len())
            .field("tables", &self.tables)
            .field("entries", &self.iter().collect::<Vec<_>>())
            .field("iterators", &self.iterators.get())
            .field("can_resize", &self.can_resize)
            .finish()
    }
}
