use crate::chain::{self, Arena};
use crate::entry::EntryId;

/// One bucket array plus its bookkeeping.
///
/// The size is 0 for a table that was never allocated, and a power
/// of two otherwise, so that `mask == size - 1` always holds.
#[derive(Debug, Default)]
pub(crate) struct HashTable {
    pub(crate) buckets: Vec<Option<EntryId>>,
    pub(crate) used: usize,
    pub(crate) mask: usize,
}

impl HashTable {
    pub(crate) const EMPTY_TABLE: HashTable = HashTable {
        buckets: Vec::new(),
        used: 0,
        mask: 0,
    };

    /// Creates a new `HashTable` with `size` many empty buckets
    ///
    /// # Note
    ///
    /// `size` must be a power of two, see [`next_power`]
    pub(crate) fn new_with_buckets(size: usize) -> Self {
        debug_assert!(size.is_power_of_two(), "table size {size} is not a power of two");

        Self {
            buckets: vec![None; size],
            used: 0,
            mask: size - 1,
        }
    }

    /// Returns the number of buckets, or "slots" of the hash table
    pub(crate) fn size(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn is_allocated(&self) -> bool {
        !self.buckets.is_empty()
    }

    /// Returns the loadfactor of the hash table
    /// computed as num of items / num of buckets
    pub(crate) fn load_factor(&self) -> usize {
        self.used.checked_div(self.size()).unwrap_or(0)
    }

    pub(crate) fn index(&self, hash: u32) -> usize {
        hash as usize & self.mask
    }

    pub(crate) fn head(&self, idx: usize) -> Option<EntryId> {
        self.buckets.get(idx).copied().flatten()
    }

    /// Walks the chain of bucket `idx`
    pub(crate) fn chain<'a, K, V>(&self, arena: &'a Arena<K, V>, idx: usize) -> chain::Iter<'a, K, V> {
        chain::iter(arena, self.head(idx))
    }

    /// Links an entry already living in `arena` at the head of bucket `idx`
    pub(crate) fn link<K, V>(&mut self, arena: &mut Arena<K, V>, idx: usize, id: EntryId) {
        chain::push_front(&mut self.buckets[idx], arena, id);
        self.used += 1;
    }

    /// Inverse of [`Self::link`], the entry is left in `arena`
    pub(crate) fn unlink<K, V>(&mut self, arena: &mut Arena<K, V>, idx: usize, id: EntryId) -> bool {
        let unlinked = chain::unlink(&mut self.buckets[idx], arena, id);
        if unlinked {
            self.used -= 1;
        }
        unlinked
    }
}

/// Returns the capacity to allocate for a table asked to hold `size` entries:
/// the smallest power of two that is at least `size`, and never less than
/// [`HT_INITIAL_SIZE`](crate::HT_INITIAL_SIZE)
pub(crate) fn next_power(size: usize) -> usize {
    const LARGEST: usize = 1 << (usize::BITS - 1);

    size.max(crate::HT_INITIAL_SIZE)
        .checked_next_power_of_two()
        .unwrap_or(LARGEST)
}

#[cfg(test)]
mod test {
    use super::{HashTable, next_power};
    use crate::chain::Arena;
    use crate::entry::{Entry, Value};

    #[test]
    fn next_power_rounds_up() {
        assert_eq!(next_power(0), 4);
        assert_eq!(next_power(3), 4);
        assert_eq!(next_power(4), 4);
        assert_eq!(next_power(5), 8);
        assert_eq!(next_power(1000), 1024);
        assert_eq!(next_power(usize::MAX), 1 << (usize::BITS - 1));
    }

    #[test]
    fn empty_table() {
        let t = HashTable::EMPTY_TABLE;
        assert!(!t.is_allocated());
        assert_eq!(t.size(), 0);
        assert_eq!(t.load_factor(), 0);
        assert_eq!(t.head(0), None);
    }

    #[test]
    fn link_and_unlink() {
        let mut arena: Arena<&str, &str> = Arena::with_key();
        let mut t = HashTable::new_with_buckets(4);
        assert_eq!(t.mask + 1, t.size());

        let peti = arena.insert(Entry::new("peti", Value::Val("is a baby")));
        let sina = arena.insert(Entry::new("sina", Value::Val("is a tiny baby")));
        t.link(&mut arena, 1, peti);
        t.link(&mut arena, 1, sina);
        assert_eq!(t.used, 2);

        let chain: Vec<_> = t.chain(&arena, 1).map(|(_, e)| *e.key()).collect();
        assert_eq!(chain, ["sina", "peti"]);

        assert!(t.unlink(&mut arena, 1, peti));
        assert!(!t.unlink(&mut arena, 1, peti));
        assert_eq!(t.used, 1);
        assert_eq!(t.head(1), Some(sina));
    }

    #[test]
    fn index_masks_the_hash() {
        let t = HashTable::new_with_buckets(8);
        assert_eq!(t.index(0), 0);
        assert_eq!(t.index(9), 1);
        assert_eq!(t.index(u32::MAX), 7);
    }
}
