//! # reactor-host
//!
//! Host-side driver for WebAssembly "reactor" modules whose language runtime
//! schedules its own tasks cooperatively.
//!
//! A command module runs `_start` to completion. A reactor instead exports
//! entry points and lets the host decide when guest code runs:
//!
//! - `_initialize` sets up the guest runtime, once
//! - `go_start_main` queues the program's main task without running it
//! - `go_tick` runs the guest scheduler for a bounded amount of work and
//!   reports what should happen next
//!
//! ## The tick protocol
//!
//! | `go_tick` returns | Meaning                         | Host action                 |
//! |-------------------|---------------------------------|-----------------------------|
//! | `-1`              | nothing left to run             | stop, the run succeeded     |
//! | `0`               | tasks are runnable              | yield once, tick again      |
//! | `n > 0`           | next timer fires in `n` ms      | sleep `n` ms, tick again    |
//! | anything else     | protocol violation              | fault the run               |
//!
//! ## System interface
//!
//! Guests import a small slice of `wasi_snapshot_preview1`: arguments,
//! environment, clocks, random bytes and writes to stdout/stderr. Calls that
//! would touch files or sockets are not emulated. See [`wasi`].
//!
//! ## Example
//!
//! ```ignore
//! use reactor_host::{CancelSignal, Reactor, ReactorConfig, RunOutcome};
//! use wasmtime::Engine;
//!
//! let engine = Engine::default();
//! let config = ReactorConfig::new()
//!     .with_args(["app", "--verbose"])
//!     .with_env("LANG", "C");
//! let mut reactor = Reactor::from_file(&engine, "app.wasm", config)?;
//!
//! let cancel = CancelSignal::new();
//! match reactor.run(&cancel).await? {
//!     RunOutcome::Idle => println!("done"),
//!     RunOutcome::Exited(code) => println!("exited with {}", code),
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod guest;
pub mod memory;
pub mod reactor;
pub mod tick;
pub mod wasi;

pub use cancel::CancelSignal;
pub use config::{ReactorConfig, SharedBuffer};
pub use error::{Phase, ReactorError, Result};
pub use memory::{GuestMemory, MemoryError};
pub use reactor::{Reactor, ReactorId, ReactorState, RunOutcome};
pub use tick::TickResult;
pub use wasi::{GuestExit, HostState, MinimalWasi, SystemInterface, WasiSession};
