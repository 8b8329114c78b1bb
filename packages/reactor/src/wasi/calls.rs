//! Handlers for the minimal `wasi_snapshot_preview1` call set.
//!
//! Each handler is a plain function of the session, a fresh view of guest
//! memory and the call's raw arguments. It returns the errno to hand back to
//! the guest, or a [`MemoryError`] when an argument points outside memory.
//! Handlers check every region they write before writing any of it.

use std::io::{Read, Write};

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;

use super::types::{self, Errno, Filetype};
use super::WasiSession;
use crate::memory::{GuestMemory, MemoryError};

pub type CallResult = Result<Errno, MemoryError>;

/// Total bytes needed to store `strings` NUL-terminated.
fn encoded_size(strings: &[String]) -> usize {
    strings.iter().map(|s| s.len() + 1).sum()
}

fn as_u32(value: usize, offset: u32, size: usize) -> Result<u32, MemoryError> {
    u32::try_from(value).map_err(|_| MemoryError::OutOfBounds {
        offset,
        len: u32::MAX,
        size,
    })
}

/// Shared body of `args_sizes_get` and `environ_sizes_get`.
fn sizes_get(
    strings: &[String],
    mem: &mut GuestMemory<'_>,
    count_ptr: u32,
    size_ptr: u32,
) -> CallResult {
    let count = as_u32(strings.len(), count_ptr, mem.len())?;
    let size = as_u32(encoded_size(strings), size_ptr, mem.len())?;
    mem.check(count_ptr, 4)?;
    mem.check(size_ptr, 4)?;
    mem.write_u32(count_ptr, count)?;
    mem.write_u32(size_ptr, size)?;
    Ok(Errno::Success)
}

/// Shared body of `args_get` and `environ_get`.
///
/// Writes one pointer per string at `ptrs`, and the strings themselves
/// packed back to back at `buf`, each followed by a NUL.
fn strings_get(strings: &[String], mem: &mut GuestMemory<'_>, ptrs: u32, buf: u32) -> CallResult {
    let ptrs_len = as_u32(strings.len() * 4, ptrs, mem.len())?;
    let buf_len = as_u32(encoded_size(strings), buf, mem.len())?;
    mem.check(ptrs, ptrs_len)?;
    mem.check(buf, buf_len)?;

    let mut cursor = buf;
    for (i, s) in strings.iter().enumerate() {
        mem.write_u32(ptrs + (i as u32) * 4, cursor)?;
        mem.write_bytes(cursor, s.as_bytes())?;
        mem.write_bytes(cursor + s.len() as u32, &[0])?;
        cursor += s.len() as u32 + 1;
    }
    Ok(Errno::Success)
}

pub fn args_sizes_get(
    session: &WasiSession,
    mem: &mut GuestMemory<'_>,
    count_ptr: u32,
    size_ptr: u32,
) -> CallResult {
    sizes_get(session.args(), mem, count_ptr, size_ptr)
}

pub fn args_get(
    session: &WasiSession,
    mem: &mut GuestMemory<'_>,
    argv: u32,
    argv_buf: u32,
) -> CallResult {
    strings_get(session.args(), mem, argv, argv_buf)
}

pub fn environ_sizes_get(
    session: &WasiSession,
    mem: &mut GuestMemory<'_>,
    count_ptr: u32,
    size_ptr: u32,
) -> CallResult {
    sizes_get(session.env(), mem, count_ptr, size_ptr)
}

pub fn environ_get(
    session: &WasiSession,
    mem: &mut GuestMemory<'_>,
    environ: u32,
    environ_buf: u32,
) -> CallResult {
    strings_get(session.env(), mem, environ, environ_buf)
}

/// Current time in nanoseconds. Clock 0 is wall-clock time; every other id
/// reads the session's monotonic clock.
pub fn clock_time_get(
    session: &WasiSession,
    mem: &mut GuestMemory<'_>,
    clock_id: u32,
    time_ptr: u32,
) -> CallResult {
    let nanos = if clock_id == types::CLOCK_REALTIME {
        Utc::now()
            .timestamp_nanos_opt()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0)
    } else {
        session.monotonic_nanos()
    };
    mem.write_u64(time_ptr, nanos)?;
    Ok(Errno::Success)
}

/// Route the bytes named by the iovecs to the descriptor's sink, span by
/// span.
///
/// Every span is bounds-checked and the total must fit in a u32 before any
/// byte reaches the sink. Descriptors other than stdout and stderr swallow
/// the bytes but still report them as written.
pub fn fd_write(
    session: &mut WasiSession,
    mem: &mut GuestMemory<'_>,
    fd: u32,
    iovs: u32,
    iovs_len: u32,
    nwritten_ptr: u32,
) -> CallResult {
    let iovecs = mem.read_iovecs(iovs, iovs_len)?;
    let mut total: u32 = 0;
    for &(ptr, len) in &iovecs {
        mem.check(ptr, len)?;
        total = total.checked_add(len).ok_or(MemoryError::OutOfBounds {
            offset: ptr,
            len,
            size: mem.len(),
        })?;
    }
    mem.check(nwritten_ptr, 4)?;

    if let Some(sink) = session.output(fd) {
        for &(ptr, len) in &iovecs {
            if let Err(err) = sink.write_all(mem.read_bytes(ptr, len)?) {
                tracing::debug!(fd, error = %err, "fd_write sink failed");
                return Ok(Errno::Io);
            }
        }
        if let Err(err) = sink.flush() {
            tracing::debug!(fd, error = %err, "fd_write flush failed");
            return Ok(Errno::Io);
        }
    }
    mem.write_u32(nwritten_ptr, total)?;
    Ok(Errno::Success)
}

/// Reads only reach the guest on stdin when a source is configured;
/// everything else reports end of file.
pub fn fd_read(
    session: &mut WasiSession,
    mem: &mut GuestMemory<'_>,
    fd: u32,
    iovs: u32,
    iovs_len: u32,
    nread_ptr: u32,
) -> CallResult {
    let iovecs = mem.read_iovecs(iovs, iovs_len)?;
    for &(ptr, len) in &iovecs {
        mem.check(ptr, len)?;
    }
    mem.check(nread_ptr, 4)?;

    let mut nread: u32 = 0;
    if fd == types::STDIN {
        if let Some(stdin) = session.stdin() {
            for (ptr, len) in iovecs {
                let mut chunk = vec![0u8; len as usize];
                let n = match stdin.read(&mut chunk) {
                    Ok(n) => n,
                    Err(err) => {
                        tracing::debug!(error = %err, "fd_read stdin failed");
                        return Ok(Errno::Io);
                    }
                };
                mem.write_bytes(ptr, &chunk[..n])?;
                nread += n as u32;
                if n < len as usize {
                    break;
                }
            }
        }
    }
    mem.write_u32(nread_ptr, nread)?;
    Ok(Errno::Success)
}

/// Seeking is not modeled; the new offset is always 0.
pub fn fd_seek(mem: &mut GuestMemory<'_>, newoffset_ptr: u32) -> CallResult {
    mem.write_u64(newoffset_ptr, 0)?;
    Ok(Errno::Success)
}

/// Character devices for the standard streams, regular files otherwise,
/// every right granted.
pub fn fd_fdstat_get(mem: &mut GuestMemory<'_>, fd: u32, stat_ptr: u32) -> CallResult {
    let filetype = if fd <= types::STDERR {
        Filetype::CharacterDevice
    } else {
        Filetype::RegularFile
    };
    let mut stat = [0u8; types::FDSTAT_SIZE as usize];
    stat[0] = filetype as u8;
    stat[8..16].copy_from_slice(&types::RIGHTS_ALL.to_le_bytes());
    stat[16..24].copy_from_slice(&types::RIGHTS_ALL.to_le_bytes());
    mem.write_bytes(stat_ptr, &stat)?;
    Ok(Errno::Success)
}

/// No directories are preopened.
pub fn fd_prestat_get(_fd: u32) -> CallResult {
    Ok(Errno::Badf)
}

pub fn fd_prestat_dir_name(_fd: u32) -> CallResult {
    Ok(Errno::Badf)
}

pub fn random_get(mem: &mut GuestMemory<'_>, buf: u32, buf_len: u32) -> CallResult {
    mem.fill_with(buf, buf_len, |span| OsRng.fill_bytes(span))?;
    Ok(Errno::Success)
}

/// No blocking I/O is modeled, so no subscription ever fires.
pub fn poll_oneoff(mem: &mut GuestMemory<'_>, nevents_ptr: u32) -> CallResult {
    mem.write_u32(nevents_ptr, 0)?;
    Ok(Errno::Success)
}
