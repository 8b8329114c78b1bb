//! The default system interface: a dispatch table from call name to the
//! handlers in [`calls`](super::calls).

use wasmtime::{Caller, Linker, Module, Val};

use super::calls::{self, CallResult};
use super::types::{self, Errno};
use super::{GuestExit, HostState, SystemInterface, WasiSession};
use crate::memory::GuestMemory;

/// The smallest call set that lets a guest inspect its arguments and
/// environment, write to stdout and stderr, read clocks and draw random
/// bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalWasi;

impl MinimalWasi {
    /// Every call this interface defines.
    pub const CALLS: &'static [&'static str] = &[
        "args_sizes_get",
        "args_get",
        "environ_sizes_get",
        "environ_get",
        "clock_time_get",
        "fd_write",
        "fd_read",
        "fd_close",
        "fd_fdstat_get",
        "fd_fdstat_set_flags",
        "fd_seek",
        "fd_prestat_get",
        "fd_prestat_dir_name",
        "proc_exit",
        "random_get",
        "poll_oneoff",
        "sched_yield",
    ];

    pub fn new() -> Self {
        Self
    }
}

/// Run `f` against a view of the caller's memory as it is right now.
///
/// Out-of-bounds arguments become `EFAULT` for the guest.
fn with_memory<F>(
    caller: &mut Caller<'_, HostState>,
    call: &'static str,
    f: F,
) -> wasmtime::Result<i32>
where
    F: FnOnce(&mut WasiSession, &mut GuestMemory<'_>) -> CallResult,
{
    let memory = caller
        .data()
        .session
        .memory()
        .ok_or_else(|| wasmtime::Error::msg(format!("{}: guest memory not attached", call)))?;
    let (data, state) = memory.data_and_store_mut(caller);
    let mut view = GuestMemory::new(data);
    match f(&mut state.session, &mut view) {
        Ok(errno) => Ok(errno.raw()),
        Err(err) => {
            tracing::debug!(call, error = %err, "system call faulted");
            Ok(Errno::Fault.raw())
        }
    }
}

impl SystemInterface for MinimalWasi {
    fn name(&self) -> &str {
        "minimal-wasi"
    }

    fn link(&self, linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
        let m = types::MODULE;

        linker.func_wrap(
            m,
            "args_sizes_get",
            |mut caller: Caller<'_, HostState>, count: i32, size: i32| {
                with_memory(&mut caller, "args_sizes_get", |s, mem| {
                    calls::args_sizes_get(s, mem, count as u32, size as u32)
                })
            },
        )?;
        linker.func_wrap(
            m,
            "args_get",
            |mut caller: Caller<'_, HostState>, argv: i32, buf: i32| {
                with_memory(&mut caller, "args_get", |s, mem| {
                    calls::args_get(s, mem, argv as u32, buf as u32)
                })
            },
        )?;
        linker.func_wrap(
            m,
            "environ_sizes_get",
            |mut caller: Caller<'_, HostState>, count: i32, size: i32| {
                with_memory(&mut caller, "environ_sizes_get", |s, mem| {
                    calls::environ_sizes_get(s, mem, count as u32, size as u32)
                })
            },
        )?;
        linker.func_wrap(
            m,
            "environ_get",
            |mut caller: Caller<'_, HostState>, environ: i32, buf: i32| {
                with_memory(&mut caller, "environ_get", |s, mem| {
                    calls::environ_get(s, mem, environ as u32, buf as u32)
                })
            },
        )?;
        linker.func_wrap(
            m,
            "clock_time_get",
            |mut caller: Caller<'_, HostState>, id: i32, _precision: i64, time: i32| {
                with_memory(&mut caller, "clock_time_get", |s, mem| {
                    calls::clock_time_get(s, mem, id as u32, time as u32)
                })
            },
        )?;
        linker.func_wrap(
            m,
            "fd_write",
            |mut caller: Caller<'_, HostState>, fd: i32, iovs: i32, len: i32, nwritten: i32| {
                with_memory(&mut caller, "fd_write", |s, mem| {
                    calls::fd_write(s, mem, fd as u32, iovs as u32, len as u32, nwritten as u32)
                })
            },
        )?;
        linker.func_wrap(
            m,
            "fd_read",
            |mut caller: Caller<'_, HostState>, fd: i32, iovs: i32, len: i32, nread: i32| {
                with_memory(&mut caller, "fd_read", |s, mem| {
                    calls::fd_read(s, mem, fd as u32, iovs as u32, len as u32, nread as u32)
                })
            },
        )?;
        linker.func_wrap(m, "fd_close", |_fd: i32| -> i32 { Errno::Success.raw() })?;
        linker.func_wrap(
            m,
            "fd_fdstat_get",
            |mut caller: Caller<'_, HostState>, fd: i32, stat: i32| {
                with_memory(&mut caller, "fd_fdstat_get", |_, mem| {
                    calls::fd_fdstat_get(mem, fd as u32, stat as u32)
                })
            },
        )?;
        linker.func_wrap(m, "fd_fdstat_set_flags", |_fd: i32, _flags: i32| -> i32 {
            Errno::Success.raw()
        })?;
        linker.func_wrap(
            m,
            "fd_seek",
            |mut caller: Caller<'_, HostState>, _fd: i32, _offset: i64, _whence: i32, out: i32| {
                with_memory(&mut caller, "fd_seek", |_, mem| {
                    calls::fd_seek(mem, out as u32)
                })
            },
        )?;
        linker.func_wrap(m, "fd_prestat_get", |fd: i32, _prestat: i32| -> i32 {
            calls::fd_prestat_get(fd as u32).map_or(Errno::Fault.raw(), Errno::raw)
        })?;
        linker.func_wrap(
            m,
            "fd_prestat_dir_name",
            |fd: i32, _path: i32, _len: i32| -> i32 {
                calls::fd_prestat_dir_name(fd as u32).map_or(Errno::Fault.raw(), Errno::raw)
            },
        )?;
        linker.func_wrap(
            m,
            "proc_exit",
            |mut caller: Caller<'_, HostState>, code: i32| -> wasmtime::Result<()> {
                caller.data_mut().session.flush();
                tracing::debug!(code, "guest called proc_exit");
                Err(wasmtime::Error::new(GuestExit(code)))
            },
        )?;
        linker.func_wrap(
            m,
            "random_get",
            |mut caller: Caller<'_, HostState>, buf: i32, len: i32| {
                with_memory(&mut caller, "random_get", |_, mem| {
                    calls::random_get(mem, buf as u32, len as u32)
                })
            },
        )?;
        linker.func_wrap(
            m,
            "poll_oneoff",
            |mut caller: Caller<'_, HostState>, _in: i32, _out: i32, _nsubs: i32, nevents: i32| {
                with_memory(&mut caller, "poll_oneoff", |_, mem| {
                    calls::poll_oneoff(mem, nevents as u32)
                })
            },
        )?;
        linker.func_wrap(m, "sched_yield", || -> i32 { Errno::Success.raw() })?;

        Ok(())
    }
}

/// Define every `wasi_snapshot_preview1` function `module` imports with a
/// stub that returns `ENOSYS`, matching the imported signature.
///
/// Run this before linking the real interface with shadowing enabled, so
/// that only the calls the interface does not provide stay stubbed.
pub fn stub_unsupported_imports(
    linker: &mut Linker<HostState>,
    module: &Module,
) -> wasmtime::Result<()> {
    for import in module.imports() {
        if import.module() != types::MODULE {
            continue;
        }
        let Some(ty) = import.ty().func().cloned() else {
            continue;
        };
        let name = import.name().to_string();
        linker.func_new(
            types::MODULE,
            import.name(),
            ty,
            move |_caller, _params, results| {
                tracing::warn!(call = %name, "unsupported system call");
                if let Some(slot) = results.first_mut() {
                    *slot = Val::I32(Errno::Nosys.raw());
                }
                Ok(())
            },
        )?;
    }
    Ok(())
}
