//! The system interface offered to reactor guests.
//!
//! The guest imports its system calls from `wasi_snapshot_preview1`. This
//! module defines the per-instance state those calls operate on
//! ([`WasiSession`]), the seam through which an implementation is wired into
//! a Wasmtime [`Linker`] ([`SystemInterface`]), and [`MinimalWasi`], the
//! default implementation covering arguments, environment, stdio, clocks and
//! randomness.
//!
//! Anything that touches real files or sockets is not emulated. An embedder
//! that needs those can provide its own [`SystemInterface`].

pub mod calls;
pub mod minimal;
pub mod types;

use std::fmt;
use std::io::Write;
use std::time::Instant;

use thiserror::Error;
use wasmtime::{Linker, Memory};

use crate::config::{ReactorConfig, Sink, Source};

pub use minimal::MinimalWasi;
pub use types::Errno;

/// Raised by `proc_exit` to unwind the guest back to the host.
///
/// It travels through Wasmtime as a host error and is recovered by
/// downcasting the error returned from the guest call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("guest exited with code {0}")]
pub struct GuestExit(pub i32);

/// Per-instance state for system calls.
pub struct WasiSession {
    args: Vec<String>,
    env: Vec<String>,
    memory: Option<Memory>,
    stdout: Sink,
    stderr: Sink,
    stdin: Option<Source>,
    epoch: Instant,
}

impl WasiSession {
    pub fn new(config: ReactorConfig) -> Self {
        Self {
            args: config.args,
            env: config
                .env
                .into_iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect(),
            memory: None,
            stdout: config.stdout,
            stderr: config.stderr,
            stdin: config.stdin,
            epoch: Instant::now(),
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Environment as `KEY=VALUE` strings, in declaration order.
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// The guest's memory export, once the instance exists.
    pub fn memory(&self) -> Option<Memory> {
        self.memory
    }

    pub fn set_memory(&mut self, memory: Memory) {
        self.memory = Some(memory);
    }

    /// The sink for a descriptor, if it is one of the output streams.
    pub fn output(&mut self, fd: u32) -> Option<&mut Sink> {
        match fd {
            types::STDOUT => Some(&mut self.stdout),
            types::STDERR => Some(&mut self.stderr),
            _ => None,
        }
    }

    pub fn stdin(&mut self) -> Option<&mut Source> {
        self.stdin.as_mut()
    }

    /// Nanoseconds on the session's monotonic clock.
    pub fn monotonic_nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Flush both output sinks, ignoring failures.
    pub fn flush(&mut self) {
        let _ = self.stdout.flush();
        let _ = self.stderr.flush();
    }
}

impl fmt::Debug for WasiSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WasiSession")
            .field("args", &self.args)
            .field("env", &self.env)
            .field("memory", &self.memory.is_some())
            .finish_non_exhaustive()
    }
}

/// Data held by the Wasmtime store for each reactor.
#[derive(Debug)]
pub struct HostState {
    pub session: WasiSession,
}

impl HostState {
    pub fn new(config: ReactorConfig) -> Self {
        Self {
            session: WasiSession::new(config),
        }
    }
}

/// A set of host functions that satisfies a guest's system imports.
pub trait SystemInterface {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Define this interface's functions in `linker`.
    fn link(&self, linker: &mut Linker<HostState>) -> wasmtime::Result<()>;
}
