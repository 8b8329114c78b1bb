//! Error types for the reactor host.

use std::fmt;

use thiserror::Error;

/// The guest entry point a failed call was made through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Compiling, validating, linking or instantiating the module.
    Instantiate,
    /// The `_initialize` export.
    Initialize,
    /// The `go_start_main` export.
    StartMain,
    /// The `go_tick` export, tagged with the 1-based iteration number.
    Tick(u64),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Instantiate => write!(f, "instantiate"),
            Phase::Initialize => write!(f, "_initialize"),
            Phase::StartMain => write!(f, "go_start_main"),
            Phase::Tick(n) => write!(f, "go_tick (iteration {})", n),
        }
    }
}

/// Errors that can occur while hosting a reactor module.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// The module could not be compiled.
    #[error("compile module: {0:#}")]
    Compile(wasmtime::Error),

    /// A required export is absent from the module.
    #[error("module does not export {name} ({hint})")]
    MissingExport {
        name: &'static str,
        hint: &'static str,
    },

    /// A required export exists but has the wrong kind or signature.
    #[error("export {name} has type {found}, expected {expected}")]
    ExportSignature {
        name: &'static str,
        expected: &'static str,
        found: String,
    },

    /// The system interface could not be wired into the linker.
    #[error("link system interface {interface}: {cause:#}")]
    Link {
        interface: String,
        cause: wasmtime::Error,
    },

    /// Instantiation failed after the module passed validation.
    #[error("instantiate module: {0:#}")]
    Instantiate(wasmtime::Error),

    /// Invoking a guest entry point failed (trap or host error).
    #[error("call {phase}: {cause:#}")]
    Call { phase: Phase, cause: wasmtime::Error },

    /// `go_tick` returned a value outside the tick protocol.
    #[error("go_tick (iteration {iteration}) returned invalid result {value}")]
    ProtocolViolation { iteration: u64, value: i32 },

    /// The guest called `proc_exit`.
    #[error("guest exited with code {code} during {phase}")]
    GuestExit { code: i32, phase: Phase },

    /// The run was cancelled by the host.
    #[error("reactor run cancelled")]
    Cancelled,

    /// An operation was attempted in a state that does not allow it.
    #[error("cannot {operation} while reactor is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReactorError {
    /// The phase a failure is attributed to, if it came from the guest or
    /// from instantiation.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ReactorError::Compile(_)
            | ReactorError::MissingExport { .. }
            | ReactorError::ExportSignature { .. }
            | ReactorError::Link { .. }
            | ReactorError::Instantiate(_) => Some(Phase::Instantiate),
            ReactorError::Call { phase, .. } | ReactorError::GuestExit { phase, .. } => {
                Some(*phase)
            }
            ReactorError::ProtocolViolation { iteration, .. } => Some(Phase::Tick(*iteration)),
            _ => None,
        }
    }

    /// True when the module itself does not satisfy the reactor contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ReactorError::MissingExport { .. } | ReactorError::ExportSignature { .. }
        )
    }
}

/// Result type alias for reactor operations.
pub type Result<T> = std::result::Result<T, ReactorError>;
