// ── System folders ────────────────────────────────────────────────────────────
//
// Paths the OS reports through size-unknown queries: the module file, the
// temporary directory, the current directory and the shell's known folders.
// All of these must succeed; a failure is an `Error::Win32`.

use std::{
    ffi::{c_void, OsStr, OsString},
    os::windows::ffi::OsStringExt,
    path::PathBuf,
};

use windows::{
    core::{GUID, PCWSTR},
    Win32::{
        Foundation::{HANDLE, HMODULE, MAX_PATH},
        Storage::FileSystem::{GetTempFileNameW, GetTempPathW},
        System::{
            Com::CoTaskMemFree, Environment::GetCurrentDirectoryW,
            LibraryLoader::GetModuleFileNameW,
        },
        UI::Shell::{SHGetKnownFolderPath, KNOWN_FOLDER_FLAG},
    },
};

use super::{from_wide_nul, last_error, read_wide, to_wide, win32_error};
use crate::{config::Config, error::Result};

/// Completes a read where 0 is failure and a value of at least the buffer
/// length asks for more room.
fn sized(n: u32, function: &'static str) -> Result<usize> {
    match n {
        0 => Err(last_error(function)),
        n => Ok(n as usize),
    }
}

/// Full path of `module`; `None` is the executable of the calling process.
pub fn module_file_name(module: Option<isize>) -> Result<PathBuf> {
    let config = Config::default();
    let module = HMODULE(module.unwrap_or(0) as *mut c_void);
    let path = read_wide(config.path_seed, config.max_buffer_len, |buf| {
        // SAFETY: `buf` is a writable slice.  A truncated path fills the
        // buffer exactly, which asks for a larger one.
        sized(unsafe { GetModuleFileNameW(module, buf) }, "GetModuleFileNameW")
    })?;
    Ok(PathBuf::from(path))
}

/// Directory containing `module`.
pub fn module_directory(module: Option<isize>) -> Result<PathBuf> {
    let mut path = module_file_name(module)?;
    path.pop();
    Ok(path)
}

/// The directory for temporary files, with a trailing separator.
pub fn temp_path() -> Result<PathBuf> {
    let config = Config::default();
    let path = read_wide(config.path_seed, config.max_buffer_len, |buf| {
        // SAFETY: `buf` is a writable slice.  A too-small buffer returns the
        // required size including the NUL.
        sized(unsafe { GetTempPathW(Some(buf)) }, "GetTempPathW")
    })?;
    Ok(PathBuf::from(path))
}

/// Create an empty, uniquely named file in [`temp_path`] and return its
/// path.  Only the first three characters of `prefix` are used.
pub fn temp_file_name(prefix: &str) -> Result<PathBuf> {
    let dir = to_wide(temp_path()?.as_os_str());
    let prefix = to_wide(OsStr::new(prefix));
    let mut name = [0u16; MAX_PATH as usize];
    // SAFETY: `dir` and `prefix` are NUL-terminated and outlive the call;
    // `name` is the MAX_PATH buffer the API writes into.
    let unique = unsafe {
        GetTempFileNameW(PCWSTR(dir.as_ptr()), PCWSTR(prefix.as_ptr()), 0, &mut name)
    };
    if unique == 0 {
        return Err(last_error("GetTempFileNameW"));
    }
    Ok(PathBuf::from(from_wide_nul(&name)))
}

/// The process's current directory.
pub fn current_directory() -> Result<PathBuf> {
    let config = Config::default();
    let path = read_wide(config.path_seed, config.max_buffer_len, |buf| {
        // SAFETY: as for `temp_path`.
        sized(unsafe { GetCurrentDirectoryW(Some(buf)) }, "GetCurrentDirectoryW")
    })?;
    Ok(PathBuf::from(path))
}

/// Path of a shell known folder such as `FOLDERID_LocalAppData`.
pub fn known_folder_path(folder: &GUID) -> Result<PathBuf> {
    // SAFETY: `folder` is a valid GUID reference.  The returned string is
    // allocated by the shell and freed below with CoTaskMemFree.
    let raw = unsafe { SHGetKnownFolderPath(folder, KNOWN_FOLDER_FLAG(0), HANDLE::default()) }
        .map_err(|e| win32_error("SHGetKnownFolderPath", &e))?;

    // SAFETY: on success `raw` is a NUL-terminated UTF-16 string.
    let path = PathBuf::from(OsString::from_wide(unsafe { raw.as_wide() }));

    // SAFETY: `raw` came from SHGetKnownFolderPath and is freed exactly once.
    unsafe { CoTaskMemFree(Some(raw.0 as *const c_void)) };
    Ok(path)
}
