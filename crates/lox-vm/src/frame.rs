// SPDX-License-Identifier: MIT

//! Call-frame stack: one [`CallFrame`] per active function/method
//! invocation. See `SPEC_FULL.md` §4.6.

use lox_core::ObjRef;

/// Maximum number of nested call frames. Exceeding this on `CALL` raises
/// `RuntimeError::StackOverflow`.
pub const FRAMES_MAX: usize = 64;

/// Maximum number of value-stack slots (`FRAMES_MAX * 256`, §3 invariant 6).
pub const STACK_MAX: usize = FRAMES_MAX * 256;

/// One suspended or active invocation.
///
/// `ip` is the index of the next instruction to execute in the closure's
/// function's chunk. `base` is the value-stack index of slot 0 of this
/// call — the callee itself for top-level calls, `this` for methods.
#[derive(Debug, Clone, Copy)]
pub struct CallFrame {
    pub closure: ObjRef,
    pub ip: usize,
    pub base: usize,
}

impl CallFrame {
    #[must_use]
    pub fn new(closure: ObjRef, base: usize) -> Self {
        CallFrame { closure, ip: 0, base }
    }
}
