//! Constants and layouts from `wasi_snapshot_preview1`.

/// The import module name every shim call lives under.
pub const MODULE: &str = "wasi_snapshot_preview1";

/// WASI error numbers returned to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Errno {
    Success = 0,
    Badf = 8,
    Fault = 21,
    Io = 29,
    Nosys = 52,
}

impl Errno {
    pub fn raw(self) -> i32 {
        self as i32
    }
}

/// `filetype` values reported by `fd_fdstat_get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Filetype {
    CharacterDevice = 2,
    RegularFile = 4,
}

pub const STDIN: u32 = 0;
pub const STDOUT: u32 = 1;
pub const STDERR: u32 = 2;

/// `clockid::realtime`; every other id is served by the monotonic clock.
pub const CLOCK_REALTIME: u32 = 0;

/// Every right defined by preview 1 (bits 0 through 28).
pub const RIGHTS_ALL: u64 = (1 << 29) - 1;

/// Size of the `fdstat` struct: filetype u8 @0, flags u16 @2,
/// rights_base u64 @8, rights_inheriting u64 @16.
pub const FDSTAT_SIZE: u32 = 24;
