//! Example: Running a reactor module from disk.
//!
//! Loads a `.wasm` reactor, forwards any extra command-line arguments to the
//! guest, and drives it until it goes idle or exits.

use reactor_host::{CancelSignal, Reactor, ReactorConfig, Result, RunOutcome};
use wasmtime::Engine;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <path-to-reactor.wasm> [guest args...]", args[0]);
        eprintln!("\nThe module must export _initialize, go_start_main and go_tick.");
        std::process::exit(1);
    }

    let wasm_path = &args[1];
    println!("Loading reactor from: {}", wasm_path);

    let config = ReactorConfig::new().with_args(args[1..].iter().cloned());
    let engine = Engine::default();
    let mut reactor = Reactor::from_file(&engine, wasm_path, config)?;

    println!("Running reactor {}...\n", reactor.id());
    match reactor.run_blocking(&CancelSignal::never())? {
        RunOutcome::Idle => println!("\nReactor completed after {} ticks.", reactor.ticks()),
        RunOutcome::Exited(code) => {
            println!("\nGuest exited with code {}.", code);
            std::process::exit(code);
        }
    }
    Ok(())
}
