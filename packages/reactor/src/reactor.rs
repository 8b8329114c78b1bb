//! The host-side scheduler loop for a reactor instance.
//!
//! A [`Reactor`] owns one guest instance and walks it through its lifecycle:
//!
//! ```text
//! Uninitialized --_initialize--> Initialized --go_start_main--> MainQueued
//!     MainQueued --go_tick--> Running --go_tick--> ... --> Idle
//!                                                     \--> Cancelled | Faulted | Exited
//! ```
//!
//! Every driving operation takes `&mut self`, so a single instance can never
//! be ticked by two drivers at once.

use std::fmt;
use std::path::Path;

use uuid::Uuid;
use wasmtime::{Engine, Linker, Memory, Module, Store};

use crate::cancel::CancelSignal;
use crate::config::ReactorConfig;
use crate::error::{Phase, ReactorError, Result};
use crate::guest::{self, GuestExports};
use crate::tick::TickResult;
use crate::wasi::minimal::stub_unsupported_imports;
use crate::wasi::{GuestExit, HostState, MinimalWasi, SystemInterface};

/// Unique identifier for a reactor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReactorId(Uuid);

impl ReactorId {
    /// Create a new random ReactorId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ReactorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorState {
    /// Instantiated; `_initialize` has not run.
    Uninitialized,
    /// `_initialize` has run.
    Initialized,
    /// `go_start_main` has queued the main task.
    MainQueued,
    /// At least one tick has run and the guest still has work.
    Running,
    /// The guest reported no remaining work.
    Idle,
    /// The host cancelled the run.
    Cancelled,
    /// A guest call failed or broke the tick protocol.
    Faulted,
    /// The guest called `proc_exit` with this code.
    Exited(i32),
}

impl ReactorState {
    /// True once no further guest entry points may be called.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReactorState::Idle
                | ReactorState::Cancelled
                | ReactorState::Faulted
                | ReactorState::Exited(_)
        )
    }
}

impl fmt::Display for ReactorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactorState::Uninitialized => write!(f, "uninitialized"),
            ReactorState::Initialized => write!(f, "initialized"),
            ReactorState::MainQueued => write!(f, "main-queued"),
            ReactorState::Running => write!(f, "running"),
            ReactorState::Idle => write!(f, "idle"),
            ReactorState::Cancelled => write!(f, "cancelled"),
            ReactorState::Faulted => write!(f, "faulted"),
            ReactorState::Exited(code) => write!(f, "exited({})", code),
        }
    }
}

/// How a run to completion ended, when it ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The guest went idle.
    Idle,
    /// The guest called `proc_exit` with this code.
    Exited(i32),
}

/// A reactor module instance driven from the host.
///
/// # Example
///
/// ```ignore
/// let engine = Engine::default();
/// let mut reactor = Reactor::from_file(&engine, "app.wasm", ReactorConfig::default())?;
/// let outcome = reactor.run(&CancelSignal::never()).await?;
/// ```
pub struct Reactor {
    id: ReactorId,
    store: Store<HostState>,
    exports: GuestExports,
    state: ReactorState,
    ticks: u64,
}

impl Reactor {
    /// Instantiate `module` with the minimal system interface and run its
    /// initializer.
    pub fn new(engine: &Engine, module: &Module, config: ReactorConfig) -> Result<Self> {
        let mut reactor = Self::instantiate(engine, module, config)?;
        reactor.initialize()?;
        Ok(reactor)
    }

    /// Compile `bytes` (binary or text format) and create an initialized
    /// reactor from it.
    pub fn from_bytes(
        engine: &Engine,
        bytes: impl AsRef<[u8]>,
        config: ReactorConfig,
    ) -> Result<Self> {
        let module = Module::new(engine, bytes).map_err(ReactorError::Compile)?;
        Self::new(engine, &module, config)
    }

    /// Load a module from a file and create an initialized reactor from it.
    pub fn from_file(
        engine: &Engine,
        path: impl AsRef<Path>,
        config: ReactorConfig,
    ) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(engine, bytes, config)
    }

    /// Instantiate `module` with the minimal system interface, without
    /// running any guest code.
    pub fn instantiate(engine: &Engine, module: &Module, config: ReactorConfig) -> Result<Self> {
        Self::instantiate_with(engine, module, config, &MinimalWasi)
    }

    /// Instantiate `module` against a caller-provided system interface.
    ///
    /// System imports the interface does not define are stubbed to return
    /// `ENOSYS`.
    pub fn instantiate_with(
        engine: &Engine,
        module: &Module,
        config: ReactorConfig,
        interface: &dyn SystemInterface,
    ) -> Result<Self> {
        guest::validate(module)?;

        let mut linker = Linker::new(engine);
        stub_unsupported_imports(&mut linker, module).map_err(|cause| ReactorError::Link {
            interface: "unsupported-stubs".to_string(),
            cause,
        })?;
        linker.allow_shadowing(true);
        interface
            .link(&mut linker)
            .map_err(|cause| ReactorError::Link {
                interface: interface.name().to_string(),
                cause,
            })?;

        let mut store = Store::new(engine, HostState::new(config));
        let instance = linker
            .instantiate(&mut store, module)
            .map_err(ReactorError::Instantiate)?;
        let exports = GuestExports::resolve(&mut store, &instance)?;
        store.data_mut().session.set_memory(exports.memory);

        let id = ReactorId::new();
        tracing::debug!(reactor = %id, interface = interface.name(), "reactor instantiated");

        Ok(Self {
            id,
            store,
            exports,
            state: ReactorState::Uninitialized,
            ticks: 0,
        })
    }

    pub fn id(&self) -> ReactorId {
        self.id
    }

    pub fn state(&self) -> ReactorState {
        self.state
    }

    /// Number of `go_tick` invocations so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The guest's memory export.
    pub fn memory(&self) -> Memory {
        self.exports.memory
    }

    pub fn store(&self) -> &Store<HostState> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store<HostState> {
        &mut self.store
    }

    fn invalid_state(&self, operation: &'static str) -> ReactorError {
        ReactorError::InvalidState {
            operation,
            state: self.state.to_string(),
        }
    }

    /// Record a failed guest call and turn it into the matching error.
    fn call_failed(&mut self, phase: Phase, cause: wasmtime::Error) -> ReactorError {
        if let Some(GuestExit(code)) = cause.downcast_ref::<GuestExit>().copied() {
            self.state = ReactorState::Exited(code);
            tracing::debug!(reactor = %self.id, code, %phase, "guest exited");
            return ReactorError::GuestExit { code, phase };
        }
        self.state = ReactorState::Faulted;
        tracing::warn!(
            reactor = %self.id,
            %phase,
            error = %format!("{:#}", cause),
            "guest call failed"
        );
        ReactorError::Call { phase, cause }
    }

    /// Run the guest's `_initialize` export. Allowed exactly once.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != ReactorState::Uninitialized {
            return Err(self.invalid_state("initialize"));
        }
        if let Err(cause) = self.exports.initialize.call(&mut self.store, ()) {
            return Err(self.call_failed(Phase::Initialize, cause));
        }
        self.state = ReactorState::Initialized;
        tracing::debug!(reactor = %self.id, "initialized");
        Ok(())
    }

    /// Queue the guest's main task.
    ///
    /// Calling this again once main is queued is a no-op.
    pub fn start_main(&mut self) -> Result<()> {
        match self.state {
            ReactorState::Initialized => {}
            ReactorState::MainQueued | ReactorState::Running => return Ok(()),
            _ => return Err(self.invalid_state("start main")),
        }
        if let Err(cause) = self.exports.start_main.call(&mut self.store, ()) {
            return Err(self.call_failed(Phase::StartMain, cause));
        }
        self.state = ReactorState::MainQueued;
        tracing::debug!(reactor = %self.id, "main queued");
        Ok(())
    }

    /// Advance the guest scheduler by one tick.
    ///
    /// Only allowed after [`start_main`](Self::start_main) and before the
    /// reactor reaches a terminal state.
    pub fn tick(&mut self) -> Result<TickResult> {
        if !matches!(
            self.state,
            ReactorState::MainQueued | ReactorState::Running
        ) {
            return Err(self.invalid_state("tick"));
        }
        self.ticks += 1;
        let iteration = self.ticks;
        self.state = ReactorState::Running;

        let raw = match self.exports.tick.call(&mut self.store, ()) {
            Ok(raw) => raw,
            Err(cause) => return Err(self.call_failed(Phase::Tick(iteration), cause)),
        };
        let Some(result) = TickResult::from_raw(raw) else {
            self.state = ReactorState::Faulted;
            tracing::warn!(reactor = %self.id, iteration, value = raw, "invalid tick result");
            return Err(ReactorError::ProtocolViolation {
                iteration,
                value: raw,
            });
        };
        tracing::trace!(reactor = %self.id, iteration, ?result, "tick");
        if result == TickResult::Idle {
            self.state = ReactorState::Idle;
            tracing::debug!(reactor = %self.id, ticks = iteration, "idle");
        }
        Ok(result)
    }

    fn cancel_run(&mut self) -> ReactorError {
        self.state = ReactorState::Cancelled;
        tracing::debug!(reactor = %self.id, ticks = self.ticks, "cancelled");
        ReactorError::Cancelled
    }

    /// Run the guest until it goes idle, exits or `cancel` fires.
    pub async fn run(&mut self, cancel: &CancelSignal) -> Result<RunOutcome> {
        self.run_with_callback(cancel, || {}).await
    }

    /// Like [`run`](Self::run), calling `on_tick` right before every tick.
    ///
    /// `on_tick` has no access to the reactor, so it cannot drive it.
    pub async fn run_with_callback<F>(
        &mut self,
        cancel: &CancelSignal,
        mut on_tick: F,
    ) -> Result<RunOutcome>
    where
        F: FnMut(),
    {
        match self.drive(cancel, &mut on_tick).await {
            Ok(()) => Ok(RunOutcome::Idle),
            Err(ReactorError::GuestExit { code, .. }) => Ok(RunOutcome::Exited(code)),
            Err(err) => Err(err),
        }
    }

    async fn drive<F>(&mut self, cancel: &CancelSignal, on_tick: &mut F) -> Result<()>
    where
        F: FnMut(),
    {
        if self.state == ReactorState::Uninitialized {
            self.initialize()?;
        }
        self.start_main()?;

        loop {
            if cancel.is_cancelled() {
                return Err(self.cancel_run());
            }
            on_tick();

            let result = self.tick()?;
            if result == TickResult::Idle {
                return Ok(());
            }
            match result.delay() {
                None => tokio::task::yield_now().await,
                Some(wait) => {
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = cancel.cancelled() => return Err(self.cancel_run()),
                    }
                }
            }
        }
    }

    /// Run to completion on the calling thread.
    ///
    /// Drives the same loop as [`run`](Self::run) on a private
    /// current-thread runtime. Inside a Tokio runtime this fails with
    /// [`ReactorError::InvalidState`]; use [`run`](Self::run) there.
    pub fn run_blocking(&mut self, cancel: &CancelSignal) -> Result<RunOutcome> {
        self.run_blocking_with_callback(cancel, || {})
    }

    pub fn run_blocking_with_callback<F>(
        &mut self,
        cancel: &CancelSignal,
        on_tick: F,
    ) -> Result<RunOutcome>
    where
        F: FnMut(),
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ReactorError::InvalidState {
                operation: "run blocking",
                state: "inside an async runtime".to_string(),
            });
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        runtime.block_on(self.run_with_callback(cancel, on_tick))
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.store.data_mut().session.flush();
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactor")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}
