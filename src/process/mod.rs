// ── Process directory ─────────────────────────────────────────────────────────
//
// Everything here is written against `ProcessSystem`, the narrow set of OS
// primitives the directory needs.  The Win32 implementation lives in
// `platform::win32::process`; tests use an in-memory fake.  No `unsafe`.

mod command_line;
mod directory;
mod record;
pub mod rights;

#[cfg(test)]
pub(crate) mod fake;

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use crate::{
    error::Result,
    handle::{ReleasePolicy, SafeHandle},
};

pub use command_line::{ShowMode, SpawnRequest};
pub use directory::{Process, ProcessDirectory};
pub use record::{PrimaryThread, ProcessRecord, STILL_ACTIVE};

/// Raw process and thread handle value as stored by `SafeHandle`.
pub type RawHandle = isize;

// ── Snapshot rows ─────────────────────────────────────────────────────────────

/// One row of a process snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessEntry {
    pub id: u32,
    pub parent_id: u32,
}

/// One row of a thread snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadEntry {
    pub id: u32,
    pub owner_id: u32,
}

// ── Security identity ─────────────────────────────────────────────────────────

/// The owning user's security identifier, as raw bytes.
///
/// Two SIDs denote the same logical owner exactly when their bytes are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sid(Vec<u8>);

impl Sid {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// ── Process creation ──────────────────────────────────────────────────────────

/// Fully resolved arguments for one process creation.
#[derive(Debug)]
pub struct CreateParams<'a> {
    /// Absolute path of the executable.
    pub application: &'a Path,
    /// Complete command line, executable token first.
    pub command_line: &'a str,
    /// Absolute working directory.
    pub working_dir: &'a Path,
    /// Replacement environment, or `None` to inherit the caller's.
    pub environment: Option<&'a [(OsString, OsString)]>,
    pub creation_flags: u32,
    pub inherit_handles: bool,
    /// `SW_*` show command for the first window.
    pub show: i32,
}

/// Handles and ids returned by a successful process creation.
#[derive(Debug)]
pub struct Spawned<R: ReleasePolicy> {
    pub process: SafeHandle<R>,
    pub thread: SafeHandle<R>,
    pub process_id: u32,
    pub thread_id: u32,
}

/// Outcome of waiting on a process handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The process has exited.
    Exited,
    /// The timeout elapsed first.
    TimedOut,
}

// ── OS seam ───────────────────────────────────────────────────────────────────

/// The OS primitives the directory is built on.
///
/// Failures are reported as `Error::Win32 { function, code }`; deciding which
/// failures mean "not found" is the directory's job, not the implementor's.
pub trait ProcessSystem: Send + Sync + Sized + 'static {
    /// Release policy for process, thread and token handles.
    type Release: ReleasePolicy<Raw = RawHandle>;

    /// Storage for this implementation's current-process singleton.
    fn current_cell() -> &'static OnceLock<ProcessRecord<Self>>;

    /// Seed and ceiling for adaptive reads done by the directory.
    fn config(&self) -> &crate::config::Config;

    /// Write as many running process ids as fit into `ids` and return how
    /// many were written.  A return equal to `ids.len()` may be truncated.
    fn fill_process_ids(&self, ids: &mut [u32]) -> Result<usize>;

    fn open_process(&self, id: u32, rights: u32, inherit: bool)
        -> Result<SafeHandle<Self::Release>>;

    fn open_thread(&self, id: u32, rights: u32, inherit: bool)
        -> Result<SafeHandle<Self::Release>>;

    /// Id and pseudo-handle of the calling process.  The pseudo-handle must
    /// be a value the release policy never closes.
    fn current_process(&self) -> (u32, RawHandle);

    fn process_id(&self, process: RawHandle) -> Result<u32>;

    /// Full path of the process's executable image.
    fn image_path(&self, process: RawHandle) -> Result<PathBuf>;

    /// SID of the user the process runs as.
    fn user_sid(&self, process: RawHandle) -> Result<Sid>;

    fn process_snapshot(&self) -> Result<Vec<ProcessEntry>>;

    /// Every thread in the system, in the order the OS enumerates them.
    fn thread_snapshot(&self) -> Result<Vec<ThreadEntry>>;

    /// Look `file_name` up on the OS search path, appending
    /// `default_extension` when the name has none.
    fn search_path(&self, file_name: &str, default_extension: Option<&str>)
        -> Result<Option<PathBuf>>;

    fn create_process(&self, params: &CreateParams<'_>) -> Result<Spawned<Self::Release>>;

    fn exit_code(&self, process: RawHandle) -> Result<u32>;

    fn wait(&self, process: RawHandle, timeout: Option<Duration>) -> Result<WaitStatus>;

    fn terminate(&self, process: RawHandle, exit_code: u32) -> Result<()>;
}
