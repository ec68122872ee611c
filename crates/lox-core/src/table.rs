// SPDX-License-Identifier: MIT

//! Open-addressed, linearly-probed hash table keyed by interned-string
//! identity. Used for globals, instance fields, class method tables, and
//! (via [`crate::Heap::intern`]) the string intern set itself.
//!
//! See `SPEC_FULL.md` §4.2. Keys are [`ObjRef`]s; because strings are
//! interned, key equality is index equality — callers supply the string's
//! precomputed hash alongside the key so the table never has to dereference
//! the heap to place an entry.

use crate::heap::ObjRef;
use crate::value::Value;

const MAX_LOAD_FACTOR: f64 = 0.75;
const INITIAL_CAPACITY: usize = 8;

#[derive(Clone, Copy)]
struct Entry {
    /// `None` + `Value::Nil` = empty slot. `None` + `Value::Bool(true)` =
    /// tombstone (deleted, but still blocks a probe chain). `Some(_)` = live.
    key: Option<ObjRef>,
    hash: u32,
    value: Value,
}

impl Entry {
    const fn empty() -> Self {
        Entry { key: None, hash: 0, value: Value::Nil }
    }

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && matches!(self.value, Value::Bool(true))
    }

    fn is_empty_slot(&self) -> bool {
        self.key.is_none() && !self.is_tombstone()
    }
}

/// A string-keyed open-addressing table with linear probing.
#[derive(Clone)]
pub struct Table {
    entries: Vec<Entry>,
    count: usize, // live entries + tombstones
    live: usize,  // live entries only
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    #[must_use]
    pub fn new() -> Self {
        Table { entries: Vec::new(), count: 0, live: 0 }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Find the slot index for `hash`, either a live entry matching
    /// `matches`, or the first empty/tombstone slot suitable for insertion
    /// (returns the *first* tombstone seen so inserts reuse them).
    fn probe(&self, hash: u32, matches: impl Fn(ObjRef) -> bool) -> usize {
        let cap = self.entries.len();
        let mut index = (hash as usize) % cap;
        let mut tombstone: Option<usize> = None;
        loop {
            let entry = &self.entries[index];
            match entry.key {
                Some(k) if matches(k) => return index,
                None if entry.is_tombstone() => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                None => return tombstone.unwrap_or(index),
                Some(_) => {}
            }
            index = (index + 1) % cap;
        }
    }

    fn grow(&mut self) {
        let new_cap = if self.entries.is_empty() { INITIAL_CAPACITY } else { self.entries.len() * 2 };
        let old = std::mem::replace(&mut self.entries, vec![Entry::empty(); new_cap]);
        self.count = 0;
        self.live = 0;
        for entry in old {
            if let Some(key) = entry.key {
                self.insert_fresh(key, entry.hash, entry.value);
            }
        }
    }

    fn insert_fresh(&mut self, key: ObjRef, hash: u32, value: Value) {
        let index = self.probe(hash, |k| k == key);
        self.entries[index] = Entry { key: Some(key), hash, value };
        self.count += 1;
        self.live += 1;
    }

    /// Look up `key` (identified by `hash` and pointer equality).
    #[must_use]
    pub fn get(&self, key: ObjRef, hash: u32) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let index = self.probe(hash, |k| k == key);
        self.entries[index].key.map(|_| self.entries[index].value)
    }

    /// Insert or overwrite `key => value`. Returns `true` if this created a
    /// new entry (the key was not already present).
    pub fn set(&mut self, key: ObjRef, hash: u32, value: Value) -> bool {
        if (self.count + 1) as f64 > self.entries.len() as f64 * MAX_LOAD_FACTOR {
            self.grow();
        }
        let index = self.probe(hash, |k| k == key);
        let entry = &mut self.entries[index];
        let is_new = entry.key.is_none();
        if is_new && !entry.is_tombstone() {
            self.count += 1;
        }
        *entry = Entry { key: Some(key), hash, value };
        if is_new {
            self.live += 1;
        }
        is_new
    }

    /// Delete `key`, converting its slot into a tombstone. Returns `true`
    /// if the key was present.
    pub fn delete(&mut self, key: ObjRef, hash: u32) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let index = self.probe(hash, |k| k == key);
        if self.entries[index].key.is_none() {
            return false;
        }
        self.entries[index] = Entry { key: None, hash: 0, value: Value::Bool(true) };
        self.live -= 1;
        true
    }

    /// Find a live key matching a content predicate rather than identity —
    /// used by the string interner to check "is this byte sequence already
    /// interned" before an [`ObjRef`] for it exists.
    pub fn find_matching(&self, hash: u32, matches: impl Fn(ObjRef) -> bool) -> Option<ObjRef> {
        if self.entries.is_empty() {
            return None;
        }
        let cap = self.entries.len();
        let mut index = (hash as usize) % cap;
        for _ in 0..cap {
            let entry = &self.entries[index];
            match entry.key {
                Some(k) if matches(k) => return Some(k),
                None if !entry.is_tombstone() => return None,
                _ => {}
            }
            index = (index + 1) % cap;
        }
        None
    }

    /// Copy every live entry from `self` into `dst`, overwriting existing
    /// keys. Used for `OP_INHERIT`.
    pub fn add_all(&self, dst: &mut Table) {
        for entry in &self.entries {
            if let Some(key) = entry.key {
                dst.set(key, entry.hash, entry.value);
            }
        }
    }

    /// Remove every entry whose key is not in `keep`. Used by the
    /// weak-clear-interned-strings phase of the collector.
    pub fn retain_keys(&mut self, mut keep: impl FnMut(ObjRef) -> bool) {
        for entry in &mut self.entries {
            if let Some(key) = entry.key {
                if !keep(key) {
                    *entry = Entry { key: None, hash: 0, value: Value::Bool(true) };
                    self.live -= 1;
                }
            }
        }
    }

    /// Iterate live `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (ObjRef, Value)> + '_ {
        self.entries.iter().filter_map(|e| e.key.map(|k| (k, e.value)))
    }
}

#[cfg(test)]
mod table_test {
    use super::*;

    fn r(i: u32) -> ObjRef {
        ObjRef::for_test(i)
    }

    #[test]
    fn set_then_get_roundtrips() {
        let mut t = Table::new();
        assert!(t.set(r(1), 100, Value::Number(42.0)));
        assert_eq!(t.get(r(1), 100), Some(Value::Number(42.0)));
    }

    #[test]
    fn set_existing_key_returns_false_and_overwrites() {
        let mut t = Table::new();
        assert!(t.set(r(1), 100, Value::Number(1.0)));
        assert!(!t.set(r(1), 100, Value::Number(2.0)));
        assert_eq!(t.get(r(1), 100), Some(Value::Number(2.0)));
    }

    #[test]
    fn delete_then_get_misses_but_reuses_tombstone() {
        let mut t = Table::new();
        t.set(r(1), 1, Value::Bool(false));
        assert!(t.delete(r(1), 1));
        assert_eq!(t.get(r(1), 1), None);
        assert!(t.set(r(2), 1, Value::Bool(true)));
        assert_eq!(t.get(r(2), 1), Some(Value::Bool(true)));
    }

    #[test]
    fn grows_past_load_factor() {
        let mut t = Table::new();
        for i in 0..100 {
            t.set(r(i), i, Value::Number(f64::from(i)));
        }
        assert_eq!(t.len(), 100);
        for i in 0..100 {
            assert_eq!(t.get(r(i), i), Some(Value::Number(f64::from(i))));
        }
    }

    #[test]
    fn add_all_copies_live_entries() {
        let mut src = Table::new();
        src.set(r(1), 1, Value::Number(1.0));
        src.set(r(2), 2, Value::Number(2.0));
        let mut dst = Table::new();
        dst.set(r(3), 3, Value::Number(3.0));
        src.add_all(&mut dst);
        assert_eq!(dst.len(), 3);
        assert_eq!(dst.get(r(1), 1), Some(Value::Number(1.0)));
    }

    #[test]
    fn retain_keys_drops_unmarked() {
        let mut t = Table::new();
        t.set(r(1), 1, Value::Nil);
        t.set(r(2), 2, Value::Nil);
        t.retain_keys(|k| k == r(1));
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(r(1), 1), Some(Value::Nil));
        assert_eq!(t.get(r(2), 2), None);
    }
}
