// SPDX-License-Identifier: MIT

//! The heap: a pool of tagged objects plus the string intern set.
//!
//! Objects are addressed by [`ObjRef`], an index into the heap's object
//! pool, rather than by raw pointer — the idiomatic Rust substitute for the
//! intrusive object list the original engine threads through raw pointers
//! (see `spec.md` §9, "Computed ip/frame pointers").

use crate::chunk::Chunk;
use crate::table::Table;
use crate::value::Value;
use std::fmt;

/// A handle to a heap object: an index into `Heap`'s object pool.
///
/// Two `ObjRef`s are equal iff they name the same slot. Because strings are
/// interned, this makes string equality pointer (index) equality, per
/// `spec.md` §3.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(u32);

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl ObjRef {
    #[cfg(test)]
    #[must_use]
    pub fn for_test(index: u32) -> Self {
        ObjRef(index)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// An immutable interned string: bytes plus a precomputed FNV-1a-style hash.
pub struct LoxString {
    pub bytes: String,
    pub hash: u32,
}

/// A compiled function: arity, captured-upvalue count, optional name, and
/// its owned chunk.
pub struct Function {
    pub arity: u8,
    pub upvalue_count: usize,
    pub name: Option<ObjRef>,
    pub chunk: Chunk,
}

/// A host-provided native function. Declared arity is checked by the VM
/// before invocation; see `SPEC_FULL.md` §4.10/§6.
pub type NativeFnPtr = fn(&[Value]) -> Result<Value, String>;

pub struct NativeFn {
    pub name: ObjRef,
    pub arity: u8,
    pub function: NativeFnPtr,
}

/// A closure: a function plus its captured upvalues, one per
/// `function.upvalue_count`.
pub struct Closure {
    pub function: ObjRef,
    pub upvalues: Vec<ObjRef>,
}

/// An upvalue's lifecycle state: open while it aliases a live stack slot,
/// closed once it owns a copied value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpvalueState {
    Open(usize),
    Closed(Value),
}

pub struct Upvalue {
    pub state: UpvalueState,
}

/// A class: its name and method table (method name -> `Value::Obj(Closure)`).
pub struct Class {
    pub name: ObjRef,
    pub methods: Table,
}

/// An instance: its class and field table.
pub struct Instance {
    pub class: ObjRef,
    pub fields: Table,
}

/// A closure pre-bound to a receiver, produced by method access.
pub struct BoundMethod {
    pub receiver: Value,
    pub method: ObjRef,
}

/// The variant data behind an [`ObjRef`].
pub enum Obj {
    String(LoxString),
    Function(Function),
    Native(NativeFn),
    Closure(Closure),
    Upvalue(Upvalue),
    Class(Class),
    Instance(Instance),
    BoundMethod(BoundMethod),
}

impl Obj {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Obj::String(_) => "string",
            Obj::Function(_) => "function",
            Obj::Native(_) => "native function",
            Obj::Closure(_) => "closure",
            Obj::Upvalue(_) => "upvalue",
            Obj::Class(_) => "class",
            Obj::Instance(_) => "instance",
            Obj::BoundMethod(_) => "bound method",
        }
    }
}

struct Slot {
    marked: bool,
    size: usize,
    data: Obj,
}

/// GC growth factor: after a sweep, the next collection triggers once
/// `bytes_allocated` doubles from what remained. `spec.md` §4.4.
const GC_GROWTH_FACTOR: usize = 2;

/// Initial threshold before the very first collection is considered.
const INITIAL_NEXT_GC: usize = 1024 * 1024;

/// FNV-1a over bytes, matching the teacher's precomputed-hash string
/// representation (`spec.md` §3).
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

/// The object heap: a pool of live objects (with a free list for reused
/// slots after a sweep) plus the string intern set.
pub struct Heap {
    slots: Vec<Option<Slot>>,
    free: Vec<u32>,
    strings: Table,
    pub bytes_allocated: usize,
    pub next_gc: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
            strings: Table::new(),
            bytes_allocated: 0,
            next_gc: INITIAL_NEXT_GC,
        }
    }

    /// Whether `bytes_allocated` has crossed `next_gc`; the VM should call
    /// [`crate::gc::collect`] when this is true, at a well-defined safe
    /// point (`spec.md` §4.4).
    #[must_use]
    pub fn should_collect(&self) -> bool {
        self.bytes_allocated >= self.next_gc
    }

    /// Recompute `next_gc` after a sweep.
    pub fn update_next_gc(&mut self) {
        self.next_gc = self.bytes_allocated * GC_GROWTH_FACTOR;
    }

    fn alloc(&mut self, data: Obj, size: usize) -> ObjRef {
        self.bytes_allocated += size;
        let slot = Slot { marked: false, size, data };
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(slot);
            return ObjRef(index);
        }
        self.slots.push(Some(slot));
        ObjRef((self.slots.len() - 1) as u32)
    }

    fn slot(&self, r: ObjRef) -> &Obj {
        &self.slots[r.index()].as_ref().expect("dangling ObjRef").data
    }

    fn slot_mut(&mut self, r: ObjRef) -> &mut Obj {
        &mut self.slots[r.index()].as_mut().expect("dangling ObjRef").data
    }

    /// Intern a string: return the existing `ObjRef` for an equal byte
    /// sequence, or allocate a new one and install it in the intern set.
    /// See `SPEC_FULL.md`/`spec.md` §4.3.
    pub fn intern(&mut self, s: &str) -> ObjRef {
        let hash = fnv1a(s.as_bytes());
        if let Some(existing) = self.strings.find_matching(hash, |r| self.string_bytes(r) == s) {
            return existing;
        }
        let size = std::mem::size_of::<LoxString>() + s.len();
        let r = self.alloc(Obj::String(LoxString { bytes: s.to_owned(), hash }), size);
        self.strings.set(r, hash, Value::Nil);
        r
    }

    #[must_use]
    pub fn string_bytes(&self, r: ObjRef) -> &str {
        match self.slot(r) {
            Obj::String(s) => &s.bytes,
            other => panic!("ObjRef is not a string: {}", other.type_name()),
        }
    }

    #[must_use]
    pub fn string_hash(&self, r: ObjRef) -> u32 {
        match self.slot(r) {
            Obj::String(s) => s.hash,
            other => panic!("ObjRef is not a string: {}", other.type_name()),
        }
    }

    pub fn alloc_function(&mut self, function: Function) -> ObjRef {
        let size = std::mem::size_of::<Function>();
        self.alloc(Obj::Function(function), size)
    }

    pub fn alloc_native(&mut self, native: NativeFn) -> ObjRef {
        let size = std::mem::size_of::<NativeFn>();
        self.alloc(Obj::Native(native), size)
    }

    pub fn alloc_closure(&mut self, closure: Closure) -> ObjRef {
        let size = std::mem::size_of::<Closure>() + closure.upvalues.len() * 4;
        self.alloc(Obj::Closure(closure), size)
    }

    pub fn alloc_upvalue(&mut self, state: UpvalueState) -> ObjRef {
        let size = std::mem::size_of::<Upvalue>();
        self.alloc(Obj::Upvalue(Upvalue { state }), size)
    }

    pub fn alloc_class(&mut self, name: ObjRef) -> ObjRef {
        let size = std::mem::size_of::<Class>();
        self.alloc(Obj::Class(Class { name, methods: Table::new() }), size)
    }

    pub fn alloc_instance(&mut self, class: ObjRef) -> ObjRef {
        let size = std::mem::size_of::<Instance>();
        self.alloc(Obj::Instance(Instance { class, fields: Table::new() }), size)
    }

    pub fn alloc_bound_method(&mut self, receiver: Value, method: ObjRef) -> ObjRef {
        let size = std::mem::size_of::<BoundMethod>();
        self.alloc(Obj::BoundMethod(BoundMethod { receiver, method }), size)
    }

    pub fn function(&self, r: ObjRef) -> &Function {
        match self.slot(r) {
            Obj::Function(f) => f,
            other => panic!("ObjRef is not a function: {}", other.type_name()),
        }
    }

    pub fn function_mut(&mut self, r: ObjRef) -> &mut Function {
        match self.slot_mut(r) {
            Obj::Function(f) => f,
            _ => panic!("ObjRef is not a function"),
        }
    }

    pub fn native(&self, r: ObjRef) -> &NativeFn {
        match self.slot(r) {
            Obj::Native(n) => n,
            other => panic!("ObjRef is not a native function: {}", other.type_name()),
        }
    }

    pub fn closure(&self, r: ObjRef) -> &Closure {
        match self.slot(r) {
            Obj::Closure(c) => c,
            other => panic!("ObjRef is not a closure: {}", other.type_name()),
        }
    }

    pub fn upvalue(&self, r: ObjRef) -> &Upvalue {
        match self.slot(r) {
            Obj::Upvalue(u) => u,
            other => panic!("ObjRef is not an upvalue: {}", other.type_name()),
        }
    }

    pub fn upvalue_mut(&mut self, r: ObjRef) -> &mut Upvalue {
        match self.slot_mut(r) {
            Obj::Upvalue(u) => u,
            _ => panic!("ObjRef is not an upvalue"),
        }
    }

    pub fn class(&self, r: ObjRef) -> &Class {
        match self.slot(r) {
            Obj::Class(c) => c,
            other => panic!("ObjRef is not a class: {}", other.type_name()),
        }
    }

    pub fn class_mut(&mut self, r: ObjRef) -> &mut Class {
        match self.slot_mut(r) {
            Obj::Class(c) => c,
            _ => panic!("ObjRef is not a class"),
        }
    }

    pub fn instance(&self, r: ObjRef) -> &Instance {
        match self.slot(r) {
            Obj::Instance(i) => i,
            other => panic!("ObjRef is not an instance: {}", other.type_name()),
        }
    }

    pub fn instance_mut(&mut self, r: ObjRef) -> &mut Instance {
        match self.slot_mut(r) {
            Obj::Instance(i) => i,
            _ => panic!("ObjRef is not an instance"),
        }
    }

    pub fn bound_method(&self, r: ObjRef) -> &BoundMethod {
        match self.slot(r) {
            Obj::BoundMethod(b) => b,
            other => panic!("ObjRef is not a bound method: {}", other.type_name()),
        }
    }

    #[must_use]
    pub fn type_name(&self, r: ObjRef) -> &'static str {
        self.slot(r).type_name()
    }

    #[must_use]
    pub fn is_marked(&self, r: ObjRef) -> bool {
        self.slots[r.index()].as_ref().expect("dangling ObjRef").marked
    }

    pub fn mark(&mut self, r: ObjRef) -> bool {
        let slot = self.slots[r.index()].as_mut().expect("dangling ObjRef");
        let was_marked = slot.marked;
        slot.marked = true;
        !was_marked
    }

    /// Direct children of `r` for the mark phase's blacken step.
    /// `spec.md` §4.4.
    #[must_use]
    pub fn children(&self, r: ObjRef) -> Vec<ObjRef> {
        match self.slot(r) {
            Obj::String(_) | Obj::Native(_) => vec![],
            Obj::Function(f) => {
                let mut out: Vec<ObjRef> = f.name.into_iter().collect();
                out.extend(f.chunk.constants.iter().filter_map(Value::as_obj));
                out
            }
            Obj::Closure(c) => {
                let mut out = vec![c.function];
                out.extend(c.upvalues.iter().copied());
                out
            }
            Obj::Upvalue(u) => match u.state {
                UpvalueState::Closed(Value::Obj(r)) => vec![r],
                _ => vec![],
            },
            Obj::Class(c) => {
                let mut out = vec![c.name];
                out.extend(c.methods.iter().filter_map(|(_, v)| v.as_obj()));
                out
            }
            Obj::Instance(i) => {
                let mut out = vec![i.class];
                out.extend(i.fields.iter().filter_map(|(_, v)| v.as_obj()));
                out
            }
            Obj::BoundMethod(b) => {
                let mut out = vec![b.method];
                if let Some(r) = b.receiver.as_obj() {
                    out.push(r);
                }
                out
            }
        }
    }

    /// Drop every interned-string entry whose key is unmarked. Must run
    /// after marking, before sweeping (`spec.md` §4.4 step 3).
    pub fn clear_unmarked_strings(&mut self) {
        let marked = &self.slots;
        self.strings.retain_keys(|r| marked[r.index()].as_ref().is_some_and(|s| s.marked));
    }

    /// Free every unmarked slot, then clear mark bits on survivors.
    /// Returns the number of objects freed.
    pub fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            match slot {
                Some(s) if s.marked => s.marked = false,
                Some(s) => {
                    self.bytes_allocated = self.bytes_allocated.saturating_sub(s.size);
                    *slot = None;
                    self.free.push(i as u32);
                    freed += 1;
                }
                None => {}
            }
        }
        self.update_next_gc();
        freed
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod heap_test {
    use super::*;

    #[test]
    fn interning_the_same_bytes_twice_returns_the_same_ref() {
        let mut heap = Heap::new();
        let a = heap.intern("hello");
        let b = heap.intern("hello");
        assert_eq!(a, b);
        assert_eq!(heap.live_count(), 1);
    }

    #[test]
    fn interning_different_bytes_returns_distinct_refs() {
        let mut heap = Heap::new();
        let a = heap.intern("hello");
        let b = heap.intern("goodbye");
        assert_ne!(a, b);
    }

    #[test]
    fn freed_slot_is_reused_by_the_next_allocation() {
        let mut heap = Heap::new();
        let r = heap.intern("temporary");
        let no_roots: [ObjRef; 0] = [];
        for obj in &no_roots {
            heap.mark(*obj);
        }
        heap.clear_unmarked_strings();
        heap.sweep();
        assert_eq!(heap.live_count(), 0);
        let _ = r;
        let next = heap.intern("reused");
        assert_eq!(heap.live_count(), 1);
    }
}
