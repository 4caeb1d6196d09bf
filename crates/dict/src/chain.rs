//! Collision chains.
//!
//! A chain is a singly linked list threaded through the entry arena: the
//! bucket holds the handle of the head, every entry holds the handle of its
//! successor. Moving a chain (or one entry of it) between tables only
//! rewrites handles, entries themselves never move.

use slotmap::SlotMap;

use crate::entry::{Entry, EntryId};

pub(crate) type Arena<K, V> = SlotMap<EntryId, Entry<K, V>>;

/// Links `id` in front of the chain starting at `head`
pub(crate) fn push_front<K, V>(head: &mut Option<EntryId>, arena: &mut Arena<K, V>, id: EntryId) {
    arena[id].next = head.replace(id);
}

/// Detaches the first entry of the chain, leaving its successor as the new head
pub(crate) fn pop_front<K, V>(head: &mut Option<EntryId>, arena: &mut Arena<K, V>) -> Option<EntryId> {
    let id = head.take()?;
    *head = arena[id].next.take();
    Some(id)
}

/// Unlinks `target` from the chain, returns `false` if it is not part of it.
/// The entry stays in the arena.
pub(crate) fn unlink<K, V>(head: &mut Option<EntryId>, arena: &mut Arena<K, V>, target: EntryId) -> bool {
    let Some(first) = *head else {
        return false;
    };
    if first == target {
        *head = arena[target].next.take();
        return true;
    }

    let mut prev = first;
    while let Some(curr) = arena[prev].next {
        if curr == target {
            arena[prev].next = arena[curr].next.take();
            return true;
        }
        prev = curr;
    }
    false
}

pub(crate) fn iter<K, V>(arena: &Arena<K, V>, head: Option<EntryId>) -> Iter<'_, K, V> {
    Iter {
        arena,
        current: head,
    }
}

/// First entry of the chain matching `pred`
pub(crate) fn find<K, V>(
    arena: &Arena<K, V>,
    head: Option<EntryId>,
    mut pred: impl FnMut(&Entry<K, V>) -> bool,
) -> Option<EntryId> {
    iter(arena, head).find(|(_, e)| pred(e)).map(|(id, _)| id)
}

pub(crate) struct Iter<'a, K, V> {
    arena: &'a Arena<K, V>,
    current: Option<EntryId>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (EntryId, &'a Entry<K, V>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current.take()?;
        let entry = self.arena.get(id)?;
        self.current = entry.next;
        Some((id, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::{Arena, find, iter, pop_front, push_front, unlink};
    use crate::entry::{Entry, Value};

    fn keys(arena: &Arena<String, ()>, head: Option<crate::EntryId>) -> Vec<String> {
        iter(arena, head).map(|(_, e)| e.key.clone()).collect()
    }

    #[test]
    fn push() {
        let mut arena = Arena::with_key();
        let mut head = None;

        for i in 0..10 {
            let id = arena.insert(Entry::new(format!("key{i}"), Value::Unset));
            push_front(&mut head, &mut arena, id);
        }

        // head insertion, so newest first
        let expected: Vec<String> = (0..10).rev().map(|i| format!("key{i}")).collect();
        assert_eq!(keys(&arena, head), expected);
    }

    #[test]
    fn pop() {
        let mut arena: Arena<String, ()> = Arena::with_key();
        let mut head = None;

        // Check empty chain behaves right
        assert!(pop_front(&mut head, &mut arena).is_none());

        for k in ["k1", "k2", "k3"] {
            let id = arena.insert(Entry::new(k.into(), Value::Unset));
            push_front(&mut head, &mut arena, id);
        }

        let p = pop_front(&mut head, &mut arena).unwrap();
        assert_eq!(arena[p].key, "k3");
        assert!(arena[p].next.is_none());
        assert_eq!(keys(&arena, head), ["k2", "k1"]);

        pop_front(&mut head, &mut arena).unwrap();
        pop_front(&mut head, &mut arena).unwrap();
        assert!(pop_front(&mut head, &mut arena).is_none());
        assert!(head.is_none());
    }

    #[test]
    fn unlink_head_middle_tail() {
        let mut arena: Arena<String, ()> = Arena::with_key();
        let mut head = None;
        let ids: Vec<_> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|k| {
                let id = arena.insert(Entry::new(k.into(), Value::Unset));
                push_front(&mut head, &mut arena, id);
                id
            })
            .collect();
        // chain is d -> c -> b -> a

        assert!(unlink(&mut head, &mut arena, ids[2]));
        assert_eq!(keys(&arena, head), ["d", "b", "a"]);

        assert!(unlink(&mut head, &mut arena, ids[3]));
        assert_eq!(keys(&arena, head), ["b", "a"]);

        assert!(unlink(&mut head, &mut arena, ids[0]));
        assert_eq!(keys(&arena, head), ["b"]);

        // already gone
        assert!(!unlink(&mut head, &mut arena, ids[0]));
        assert_eq!(keys(&arena, head), ["b"]);
    }

    #[test]
    fn find_by_predicate() {
        let mut arena: Arena<String, ()> = Arena::with_key();
        let mut head = None;
        for k in ["x", "y", "z"] {
            let id = arena.insert(Entry::new(k.into(), Value::Unset));
            push_front(&mut head, &mut arena, id);
        }

        let y = find(&arena, head, |e| e.key == "y").unwrap();
        assert_eq!(arena[y].key, "y");
        assert!(find(&arena, head, |e| e.key == "w").is_none());
        assert!(find(&arena, None, |_| true).is_none());
    }
}
