//! Iteration over a [`Dict`].
//!
//! [`Iter`] borrows the dictionary and is the one to reach for by default.
//! [`SafeIter`] does not borrow it at all and hands out [`EntryId`]s, so the
//! caller may add, look up and delete entries between two steps (most
//! commonly: delete the entry it was just given). Rehashing is paused
//! while a `SafeIter` is live so no entry is visited twice.

use std::{cell::Cell, rc::Rc};

use crate::chain::{self, Arena};
use crate::dict::{Dict, Tables};
use crate::entry::{Entry, EntryId};
use crate::types::DictType;

/// Borrowing iterator, visits the primary table then the rehash target
pub struct Iter<'a, K, V> {
    arena: &'a Arena<K, V>,
    tables: &'a Tables,
    table: usize,
    bucket: usize,
    chain: chain::Iter<'a, K, V>,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(arena: &'a Arena<K, V>, tables: &'a Tables) -> Self {
        Self {
            arena,
            tables,
            table: 0,
            bucket: 0,
            chain: chain::iter(arena, None),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = &'a Entry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((_, entry)) = self.chain.next() {
                return Some(entry);
            }

            let ht = self.tables.get(self.table)?;
            if self.bucket >= ht.size() {
                self.table += 1;
                self.bucket = 0;
                continue;
            }
            self.chain = ht.chain(self.arena, self.bucket);
            self.bucket += 1;
        }
    }
}

/// Iterator that survives changes to the dictionary between steps.
///
/// The iterator registers itself on its first call to [`SafeIter::next`]
/// and unregisters when dropped. It remembers the entry it returned last
/// and that entry's successor, so deleting either of them between two steps
/// never hides an entry that is still present.
///
/// Entries added during iteration may or may not be visited. After
/// [`Dict::clear`] the iterator is detached and yields nothing.
#[derive(Debug)]
pub struct SafeIter {
    iterators: Rc<Cell<usize>>,
    registered: bool,
    table: usize,
    bucket: usize,
    current: Option<EntryId>,
    next: Option<EntryId>,
    done: bool,
}

impl SafeIter {
    pub(crate) fn new(iterators: Rc<Cell<usize>>) -> Self {
        Self {
            iterators,
            registered: false,
            table: 0,
            bucket: 0,
            current: None,
            next: None,
            done: false,
        }
    }

    /// Returns the next entry of `dict`, which must be the dictionary this
    /// iterator was created from. Any other dictionary yields `None`.
    pub fn next<T: DictType>(&mut self, dict: &Dict<T>) -> Option<EntryId> {
        if self.done || !Rc::ptr_eq(&self.iterators, &dict.iterators) {
            return None;
        }
        if !self.registered {
            self.registered = true;
            self.iterators.set(self.iterators.get() + 1);
        }

        loop {
            let candidate = match self.next.take() {
                Some(id) if dict.arena.contains_key(id) => Some(id),
                // successor was deleted, unlinking it re-pointed the current entry past it
                Some(_) => self
                    .current
                    .and_then(|id| dict.arena.get(id))
                    .and_then(|entry| entry.next),
                None => None,
            };
            if let Some((id, entry)) = candidate.and_then(|id| dict.arena.get(id).map(|entry| (id, entry))) {
                self.current = Some(id);
                self.next = entry.next;
                return Some(id);
            }

            let Some(ht) = dict.tables.get(self.table) else {
                self.done = true;
                return None;
            };
            if self.bucket >= ht.size() {
                self.table += 1;
                self.bucket = 0;
                continue;
            }
            self.current = None;
            self.next = ht.head(self.bucket);
            self.bucket += 1;
        }
    }

    /// Same as dropping the iterator
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for SafeIter {
    fn drop(&mut self) {
        if self.registered {
            self.iterators.set(self.iterators.get().saturating_sub(1));
        }
    }
}

#[cfg(test)]
mod test {
    use std::{collections::HashSet, time::Duration};

    use crate::{Dict, DictType, IntKeys, StringKeys};

    /// Every key lands in bucket 0
    struct Collide;

    impl DictType for Collide {
        type Key = u32;
        type Value = u32;

        fn hash(&self, _key: &u32) -> u32 {
            0
        }
        fn key_eq(&self, a: &u32, b: &u32) -> bool {
            a == b
        }
    }

    fn ints(n: u32) -> Dict<IntKeys<u32>> {
        let mut d = Dict::new(IntKeys::new());
        for i in 0..n {
            d.insert(i, i).unwrap();
        }
        d
    }

    /// 5 entries, right after the table started growing from 4 to 8
    fn rehashing() -> Dict<IntKeys<u32>> {
        let d = ints(5);
        assert!(d.is_rehashing());
        d
    }

    #[test]
    fn iter_visits_everything() {
        let d = ints(100);
        let keys: HashSet<u32> = d.iter().map(|e| *e.key()).collect();
        assert_eq!(keys, (0..100).collect());
        assert_eq!(d.iter().count(), d.len());

        let mut total = 0;
        for e in &d {
            total += e.value().val().unwrap();
        }
        assert_eq!(total, (0..100).sum());
    }

    #[test]
    fn iter_covers_both_tables() {
        let d = rehashing();
        assert_eq!(d.iter().count(), 5);
    }

    #[test]
    fn iter_on_empty() {
        let d = Dict::new(StringKeys::<()>::new());
        assert_eq!(d.iter().next(), None);
    }

    #[test]
    fn safe_iter_delete_current() {
        let mut d = ints(200);
        let mut it = d.safe_iter();
        let mut seen = HashSet::new();

        while let Some(id) = it.next(&d) {
            let key = *d.entry(id).unwrap().key();
            assert!(seen.insert(key), "{key} visited twice");
            d.delete(&key).unwrap();
        }
        it.release();

        assert_eq!(seen.len(), 200);
        assert!(d.is_empty());
        assert_eq!(d.live_iterators(), 0);
    }

    #[test]
    fn safe_iter_delete_saved_successor() {
        // one chain: 3 -> 2 -> 1 -> 0
        let mut d = Dict::new(Collide);
        for i in 0..4 {
            d.insert(i, i).unwrap();
        }
        assert!(!d.is_rehashing());

        let mut it = d.safe_iter();
        let first = it.next(&d).unwrap();
        assert_eq!(*d.entry(first).unwrap().key(), 3);
        d.delete(&2).unwrap();

        let mut seen = vec![3];
        while let Some(id) = it.next(&d) {
            seen.push(*d.entry(id).unwrap().key());
        }
        it.release();

        assert_eq!(seen, vec![3, 1, 0]);
    }

    #[test]
    fn safe_iter_insert_during_iteration() {
        let mut d = ints(50);
        let mut it = d.safe_iter();
        let mut originals = Vec::new();

        while let Some(id) = it.next(&d) {
            let key = *d.entry(id).unwrap().key();
            if key < 50 {
                originals.push(key);
                d.insert(key + 1000, 0).unwrap();
            }
        }
        drop(it);

        originals.sort_unstable();
        assert_eq!(originals, (0..50).collect::<Vec<_>>(), "every original exactly once");
        assert_eq!(d.len(), 100);
    }

    #[test]
    fn safe_iter_modify_values() {
        let mut d = ints(20);
        let mut it = d.safe_iter();
        while let Some(id) = it.next(&d) {
            let e = d.entry_mut(id).unwrap();
            let doubled = e.value().val().unwrap() * 2;
            e.set_val(doubled);
        }
        drop(it);
        assert!((0..20).all(|i| d.get(&i).unwrap().val() == Some(&(i * 2))));
    }

    #[test]
    fn live_safe_iter_pauses_rehash() {
        let mut d = rehashing();
        let mut it = d.safe_iter();
        assert!(it.next(&d).is_some());
        assert_eq!(d.live_iterators(), 1);

        let pending = d.tables.primary().used;
        assert!(d.rehash(10));
        assert_eq!(d.rehash_for_duration(Duration::from_secs(1)), 0);
        d.insert(100, 100).unwrap();
        assert!(d.contains_key(&0));
        d.delete(&100).unwrap();
        assert_eq!(d.tables.primary().used, pending, "no bucket moved");

        drop(it);
        assert_eq!(d.live_iterators(), 0);
        while d.rehash(1) {}
        assert!(!d.is_rehashing());
    }

    #[test]
    fn unadvanced_iterator_does_not_register() {
        let mut d = rehashing();
        let it = d.safe_iter();
        assert_eq!(d.live_iterators(), 0);

        assert!(!d.rehash(100), "rehash runs, nobody is iterating yet");
        it.release();
        assert_eq!(d.live_iterators(), 0);
    }

    #[test]
    fn exhausted_iterator_keeps_returning_none() {
        let d = ints(3);
        let mut it = d.safe_iter();
        assert_eq!((0..3).filter_map(|_| it.next(&d)).count(), 3);
        assert_eq!(it.next(&d), None);
        assert_eq!(it.next(&d), None);
        assert_eq!(d.live_iterators(), 1);
    }

    #[test]
    fn clear_detaches_iterators() {
        let mut d = ints(10);
        let mut it = d.safe_iter();
        it.next(&d).unwrap();
        assert_eq!(d.live_iterators(), 1);

        d.clear();
        assert_eq!(d.live_iterators(), 0);
        d.insert(1, 1).unwrap();
        assert_eq!(it.next(&d), None);

        drop(it);
        assert_eq!(d.live_iterators(), 0);
    }

    #[test]
    fn iterator_of_another_dict() {
        let a = ints(3);
        let b = ints(3);
        let mut it = a.safe_iter();
        assert_eq!(it.next(&b), None);
        assert_eq!(b.live_iterators(), 0);
        assert!(it.next(&a).is_some());
    }
}
