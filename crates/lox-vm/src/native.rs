// SPDX-License-Identifier: MIT

//! Native-function surface. See `SPEC_FULL.md` §4.10/§6.
//!
//! A native is a plain Rust `fn(&[Value]) -> Result<Value, String>`
//! registered into the globals table at startup, mirroring
//! `defineNative` in the original engine. The `Err` arm is the native's
//! error-reporting channel (`hasError`/`errorMsg` in the ABI description);
//! the VM converts it into `RuntimeError::Native`.

use lox_core::Value;

pub type NativeResult = Result<Value, String>;

/// `clock()`: returns process uptime in fractional seconds, the one
/// native the reference engine ships. Grounded on the original engine's
/// `clockNative`, adapted from a raw C `clock()` call to
/// `std::time::Instant` since this is a hosted build, not `no_std`.
pub fn clock(_args: &[Value]) -> NativeResult {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    Ok(Value::Number(start.elapsed().as_secs_f64()))
}

#[cfg(test)]
mod native_test {
    use super::*;

    #[test]
    fn clock_returns_a_non_negative_number() {
        let Value::Number(n) = clock(&[]).unwrap() else {
            panic!("clock must return a number");
        };
        assert!(n >= 0.0);
    }
}
