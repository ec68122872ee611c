// SPDX-License-Identifier: MIT

//! Thin driver binary: REPL when invoked with no arguments, single-shot
//! file runner when given a path. See `SPEC_FULL.md` §4.11/§6.

use clap::Parser;
use lox_cli::{run, EX_IOERR, EX_OK};
use lox_vm::Vm;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "lox", version, about = "A bytecode interpreter for Lox")]
struct Args {
    /// Script to run. Omit to start a REPL.
    file: Option<PathBuf>,

    /// Log every dispatched instruction via `tracing`.
    #[arg(long)]
    trace: bool,

    /// Collect garbage before every instruction instead of waiting for
    /// the heap's growth threshold. Exercises the collector harder.
    #[arg(long)]
    gc_stress: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.trace {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    let mut vm = Vm::with_config(args.trace, args.gc_stress);

    match args.file {
        Some(path) => run_file(&mut vm, &path),
        None => run_repl(&mut vm),
    }
}

fn run_file(vm: &mut Vm, path: &std::path::Path) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read file \"{}\": {e}", path.display());
            return ExitCode::from(EX_IOERR);
        }
    };
    ExitCode::from(run(vm, &source))
}

fn run_repl(vm: &mut Vm) -> ExitCode {
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        if std::io::stdout().flush().is_err() {
            return ExitCode::from(EX_IOERR);
        }

        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => {
                println!();
                return ExitCode::from(EX_OK);
            }
            Ok(_) => {
                // A line's exit code doesn't end the session; only its own
                // diagnostics are surfaced, and the Vm's globals persist
                // across lines, per `SPEC_FULL.md` §4.11.
                run(vm, &line);
            }
            Err(e) => {
                eprintln!("Error reading input: {e}");
                return ExitCode::from(EX_IOERR);
            }
        }
    }
}
