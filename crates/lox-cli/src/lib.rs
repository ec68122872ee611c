// SPDX-License-Identifier: MIT

//! Driver logic shared by the `lox` binary and its integration tests:
//! compile-and-run one chunk of source against a persistent [`Vm`], and
//! the exit-code mapping from `SPEC_FULL.md` §6.

use lox_vm::Vm;

/// Successful run.
pub const EX_OK: u8 = 0;
/// Compile error (`lox-compiler` rejected the source).
pub const EX_DATAERR: u8 = 65;
/// Runtime error (`Vm::interpret` unwound with a `RuntimeFailure`).
pub const EX_SOFTWARE: u8 = 70;
/// Source file could not be read. Not part of `spec.md`'s three-way
/// result, but every real driver needs something for this case;
/// `sysexits.h`'s `EX_IOERR` is the conventional choice.
pub const EX_IOERR: u8 = 74;

/// Compile and run one chunk of source against `vm`, printing compile
/// diagnostics or the runtime backtrace to stderr. Returns the process
/// exit code `SPEC_FULL.md` §6 specifies.
pub fn run(vm: &mut Vm, source: &str) -> u8 {
    let script = match lox_compiler::compile(source, vm.heap_mut()) {
        Ok(script) => script,
        Err(errors) => {
            for error in &errors {
                eprintln!("{}", error.message);
            }
            return EX_DATAERR;
        }
    };

    match vm.interpret(script) {
        Ok(_) => EX_OK,
        Err(failure) => {
            eprintln!("{}", failure.report);
            EX_SOFTWARE
        }
    }
}
