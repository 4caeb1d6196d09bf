use std::fmt;

slotmap::new_key_type! {
    /// Stable handle to an entry living in a dictionary.
    ///
    /// Handles are versioned: once the entry is deleted, the handle
    /// never resolves again, even if its slot gets reused.
    pub struct EntryId;
}

/// The value half of an entry.
///
/// Besides an owned `V`, an entry can carry a plain number so counters
/// and timestamps don't need a value type of their own.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value<V> {
    /// Key only, waiting for the caller to fill in the value
    #[default]
    Unset,
    Val(V),
    Signed(i64),
    Unsigned(u64),
    Double(f64),
}

impl<V> Value<V> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    pub fn val(&self) -> Option<&V> {
        match self {
            Value::Val(v) => Some(v),
            _ => None,
        }
    }

    pub fn val_mut(&mut self) -> Option<&mut V> {
        match self {
            Value::Val(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_val(self) -> Option<V> {
        match self {
            Value::Val(v) => Some(v),
            _ => None,
        }
    }

    pub fn signed(&self) -> Option<i64> {
        match *self {
            Value::Signed(i) => Some(i),
            _ => None,
        }
    }

    pub fn unsigned(&self) -> Option<u64> {
        match *self {
            Value::Unsigned(u) => Some(u),
            _ => None,
        }
    }

    pub fn double(&self) -> Option<f64> {
        match *self {
            Value::Double(d) => Some(d),
            _ => None,
        }
    }
}

/// One key/value pair, linked to the next entry of its bucket chain.
pub struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) val: Value<V>,
    pub(crate) next: Option<EntryId>,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(key: K, val: Value<V>) -> Self {
        Self {
            key,
            val,
            next: None,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &Value<V> {
        &self.val
    }

    pub fn value_mut(&mut self) -> &mut Value<V> {
        &mut self.val
    }

    /// Shorthand for `self.value().val()`
    pub fn val(&self) -> Option<&V> {
        self.val.val()
    }

    pub fn val_mut(&mut self) -> Option<&mut V> {
        self.val.val_mut()
    }

    /// Stores `val` as is, returning whatever was there before.
    ///
    /// # Note
    ///
    /// This bypasses the dictionary's `dup_val`/`free_val` hooks,
    /// it is meant for filling slots handed out by
    /// [`Dict::add_raw`](crate::Dict::add_raw) and friends.
    pub fn set_val(&mut self, val: V) -> Value<V> {
        std::mem::replace(&mut self.val, Value::Val(val))
    }

    pub fn set_signed(&mut self, val: i64) -> Value<V> {
        std::mem::replace(&mut self.val, Value::Signed(val))
    }

    pub fn set_unsigned(&mut self, val: u64) -> Value<V> {
        std::mem::replace(&mut self.val, Value::Unsigned(val))
    }

    pub fn set_double(&mut self, val: f64) -> Value<V> {
        std::mem::replace(&mut self.val, Value::Double(val))
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for Entry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.val == other.val
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Entry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:?}, {:?}>", self.key, self.val)
    }
}

#[cfg(test)]
mod test {
    use super::{Entry, Value};

    #[test]
    fn setters_hand_back_the_old_value() {
        let mut e: Entry<&str, String> = Entry::new("k", Value::Unset);
        assert!(e.value().is_unset());

        let old = e.set_val("v1".into());
        assert_eq!(old, Value::Unset);
        assert_eq!(e.val(), Some(&"v1".to_string()));

        let old = e.set_signed(-7);
        assert_eq!(old.into_val(), Some("v1".to_string()));
        assert_eq!(e.value().signed(), Some(-7));
        assert_eq!(e.val(), None);

        e.set_unsigned(7);
        assert_eq!(e.value().unsigned(), Some(7));
        e.set_double(0.5);
        assert_eq!(e.value().double(), Some(0.5));
    }

    #[test]
    fn val_mut() {
        let mut e: Entry<u32, Vec<u8>> = Entry::new(1, Value::Val(vec![1]));
        e.val_mut().unwrap().push(2);
        assert_eq!(e.val(), Some(&vec![1, 2]));
        assert_eq!(format!("{e:?}"), "<1, Val([1, 2])>");
    }
}
