// SPDX-License-Identifier: MIT

//! Open/closed upvalue lifecycle. See `SPEC_FULL.md` §4.5.
//!
//! The VM keeps a list of currently-open upvalues sorted by descending
//! stack address of `location`, so that `capture_upvalue` can find (or
//! confirm the absence of) a shared capture with one linear scan, and
//! `close_upvalues` can close a contiguous suffix of the list in one pass.

use lox_core::{Heap, ObjRef, UpvalueState, Value};

/// Owns the VM's open-upvalue list. Closed upvalues are no longer tracked
/// here — they live only as heap objects reachable from whatever closure
/// captured them.
#[derive(Default)]
pub struct UpvalueManager {
    /// Open upvalues, strictly descending by `location` (§3 invariant 3).
    open: Vec<ObjRef>,
}

impl UpvalueManager {
    #[must_use]
    pub fn new() -> Self {
        UpvalueManager { open: Vec::new() }
    }

    fn location_of(heap: &Heap, upvalue: ObjRef) -> Option<usize> {
        match heap.upvalue(upvalue).state {
            UpvalueState::Open(slot) => Some(slot),
            UpvalueState::Closed(_) => None,
        }
    }

    /// Find or create the open upvalue for stack slot `slot`. Reuses an
    /// existing open upvalue at exactly that slot so that two closures
    /// capturing the same local observe each other's writes.
    pub fn capture_upvalue(&mut self, heap: &mut Heap, slot: usize) -> ObjRef {
        let mut insert_at = self.open.len();
        for (i, &r) in self.open.iter().enumerate() {
            match Self::location_of(heap, r) {
                Some(loc) if loc == slot => return r,
                Some(loc) if loc < slot => {
                    insert_at = i;
                    break;
                }
                _ => {}
            }
        }

        let upvalue = heap.alloc_upvalue(UpvalueState::Open(slot));
        self.open.insert(insert_at, upvalue);
        upvalue
    }

    /// Close every open upvalue whose `location` is `>= threshold`, copying
    /// the current stack value into the upvalue's own cell. Used both at
    /// function return (threshold = frame base) and by `OP_CLOSE_UPVALUE`
    /// (threshold = `stack.len() - 1`).
    pub fn close_upvalues(&mut self, heap: &mut Heap, stack: &[Value], threshold: usize) {
        while let Some(&r) = self.open.last() {
            let Some(loc) = Self::location_of(heap, r) else {
                self.open.pop();
                continue;
            };
            if loc < threshold {
                break;
            }
            let value = stack[loc];
            heap.upvalue_mut(r).state = UpvalueState::Closed(value);
            self.open.pop();
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    /// Every currently-open upvalue, for GC rooting.
    pub fn iter(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.open.iter().copied()
    }
}

#[cfg(test)]
mod upvalues_test {
    use super::*;

    #[test]
    fn capturing_the_same_slot_twice_shares_the_upvalue() {
        let mut heap = Heap::new();
        let mut mgr = UpvalueManager::new();
        let a = mgr.capture_upvalue(&mut heap, 3);
        let b = mgr.capture_upvalue(&mut heap, 3);
        assert_eq!(a, b);
        assert_eq!(mgr.open_len(), 1);
    }

    #[test]
    fn list_stays_sorted_descending_by_location() {
        let mut heap = Heap::new();
        let mut mgr = UpvalueManager::new();
        mgr.capture_upvalue(&mut heap, 1);
        mgr.capture_upvalue(&mut heap, 5);
        mgr.capture_upvalue(&mut heap, 3);

        let locations: Vec<usize> = mgr
            .iter()
            .map(|r| match heap.upvalue(r).state {
                UpvalueState::Open(slot) => slot,
                UpvalueState::Closed(_) => unreachable!(),
            })
            .collect();
        assert_eq!(locations, vec![5, 3, 1]);
    }

    #[test]
    fn close_upvalues_closes_the_suffix_at_or_above_threshold() {
        let mut heap = Heap::new();
        let mut mgr = UpvalueManager::new();
        mgr.capture_upvalue(&mut heap, 1);
        mgr.capture_upvalue(&mut heap, 5);
        mgr.capture_upvalue(&mut heap, 3);

        let stack = vec![Value::Nil; 8]
            .into_iter()
            .enumerate()
            .map(|(i, _)| Value::Number(i as f64))
            .collect::<Vec<_>>();
        mgr.close_upvalues(&mut heap, &stack, 3);

        assert_eq!(mgr.open_len(), 1);
        let remaining = mgr.iter().next().unwrap();
        assert_eq!(heap.upvalue(remaining).state, UpvalueState::Open(1));
    }
}
