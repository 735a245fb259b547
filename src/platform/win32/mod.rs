// ── Win32 backend ─────────────────────────────────────────────────────────────
//
// The only module in the crate where `unsafe` code is permitted.  Every
// `unsafe` block MUST carry a `// SAFETY:` comment that states which
// invariant makes the call sound.
//
// Raw handles cross the module boundary as `isize` so that records holding
// them stay `Send + Sync`; they are turned back into `HANDLE`/`HWND` only at
// the FFI call.

#![allow(unsafe_code)]

use std::{
    ffi::{c_void, OsStr, OsString},
    iter,
    os::windows::ffi::{OsStrExt, OsStringExt},
};

use tracing::warn;
use windows::Win32::Foundation::{CloseHandle, GetLastError, HANDLE};

use crate::{
    buffer::try_grow_and_retry_fill,
    error::{Error, Result},
    handle::{ReleasePolicy, SafeHandle},
    process::RawHandle,
};

// ── Sub-modules ───────────────────────────────────────────────────────────────

pub mod folders;
pub mod process;
pub mod window;

pub use folders::{
    current_directory, known_folder_path, module_directory, module_file_name, temp_file_name,
    temp_path,
};
pub use process::Win32System;
pub use window::{DesktopWindows, WindowHandle};

// ── Kernel handles ────────────────────────────────────────────────────────────

/// `INVALID_HANDLE_VALUE`, which is also the value of `GetCurrentProcess()`.
const INVALID_HANDLE: RawHandle = -1;

/// Release policy for kernel objects closed with `CloseHandle`.
#[derive(Debug)]
pub struct KernelObject;

impl ReleasePolicy for KernelObject {
    type Raw = RawHandle;
    const NULL: RawHandle = 0;

    fn is_sentinel(raw: RawHandle) -> bool {
        raw == INVALID_HANDLE
    }

    fn close(raw: RawHandle) {
        // SAFETY: `SafeHandle` only calls `close` once, for a value it owns
        // that is neither null nor INVALID_HANDLE_VALUE.
        if let Err(e) = unsafe { CloseHandle(handle(raw)) } {
            warn!(handle = raw, error = %e, "CloseHandle failed");
        }
    }
}

/// An owned kernel handle.
pub type OwnedHandle = SafeHandle<KernelObject>;

pub(crate) fn handle(raw: RawHandle) -> HANDLE {
    HANDLE(raw as *mut c_void)
}

pub(crate) fn raw(h: HANDLE) -> RawHandle {
    h.0 as RawHandle
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Build an `Error::Win32` from the calling thread's last-error value.
///
/// Call immediately after a Win32 function that signals failure, before any
/// other API call can overwrite the thread-local error.
pub(crate) fn last_error(function: &'static str) -> Error {
    // SAFETY: GetLastError reads thread-local state and never fails.
    let code = unsafe { GetLastError() };
    Error::Win32 {
        function,
        code: code.0,
    }
}

/// Name a windows-crate error after the call that produced it, unwrapping
/// `HRESULT_FROM_WIN32` back to the plain Win32 code.
pub(crate) fn win32_error(function: &'static str, e: &windows::core::Error) -> Error {
    let hr = e.code().0 as u32;
    let code = if hr & 0xFFFF_0000 == 0x8007_0000 {
        hr & 0xFFFF
    } else {
        hr
    };
    Error::Win32 { function, code }
}

// ── UTF-16 ────────────────────────────────────────────────────────────────────

/// Null-terminated UTF-16 copy of `s`.
pub(crate) fn to_wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(iter::once(0)).collect()
}

/// Text of a NUL-terminated fixed-size buffer.
pub(crate) fn from_wide_nul(units: &[u16]) -> OsString {
    let len = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    OsString::from_wide(&units[..len])
}

/// Read a string whose length is only known by trying: `filler` writes into
/// the slice and returns the number of units written, or a value of at least
/// the slice length when it needs more room.
pub(crate) fn read_wide(
    seed: usize,
    max: usize,
    filler: impl FnMut(&mut [u16]) -> Result<usize>,
) -> Result<OsString> {
    let mut buf = Vec::new();
    let len = try_grow_and_retry_fill(&mut buf, seed, max, filler)?;
    Ok(OsString::from_wide(&buf[..len]))
}
