// ── Process record ────────────────────────────────────────────────────────────
//
// One resolved process: its id, its owned handle, and the facts about it that
// are expensive to read and never change while the process lives (image
// path, owner SID, primary thread).  Those are read on first use and kept.

use std::{
    fmt,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use super::{directory, ProcessSystem, RawHandle, Sid, WaitStatus};
use crate::{
    error::Result,
    handle::{ReleasePolicy, SafeHandle},
};

/// Exit code reported for a process that is still running.
pub const STILL_ACTIVE: u32 = 259;

/// A thread id with the handle opened on it.
#[derive(Debug)]
pub struct PrimaryThread<R: ReleasePolicy> {
    pub id: u32,
    pub handle: SafeHandle<R>,
}

struct Lazy<R: ReleasePolicy> {
    image_path: Option<PathBuf>,
    sid: Option<Sid>,
    /// `Some(None)` once a lookup has established there is no such thread.
    primary_thread: Option<Option<PrimaryThread<R>>>,
}

/// A running (or recently exited) process and its owned handle.
///
/// Shared as [`Process<S>`](super::Process).  The handle, and the primary
/// thread handle once resolved, are closed when the last reference drops.
pub struct ProcessRecord<S: ProcessSystem> {
    system: Arc<S>,
    id: u32,
    handle: SafeHandle<S::Release>,
    lazy: Mutex<Lazy<S::Release>>,
}

impl<S: ProcessSystem> ProcessRecord<S> {
    pub(crate) fn new(system: Arc<S>, id: u32, handle: SafeHandle<S::Release>) -> Self {
        Self {
            system,
            id,
            handle,
            lazy: Mutex::new(Lazy {
                image_path: None,
                sid: None,
                primary_thread: None,
            }),
        }
    }

    /// A record whose primary thread is already known, as after a spawn.
    pub(crate) fn with_primary_thread(
        system: Arc<S>,
        id: u32,
        handle: SafeHandle<S::Release>,
        thread: PrimaryThread<S::Release>,
    ) -> Self {
        let record = Self::new(system, id, handle);
        record.lock().primary_thread = Some(Some(thread));
        record
    }

    fn lock(&self) -> MutexGuard<'_, Lazy<S::Release>> {
        self.lazy.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// The system the record queries through.
    pub fn system(&self) -> &S {
        &self.system
    }

    /// The raw process handle, owned by this record.
    pub fn handle(&self) -> RawHandle {
        self.handle.get()
    }

    /// Full path of the executable image.
    pub fn image_path(&self) -> Result<PathBuf> {
        let mut lazy = self.lock();
        if let Some(path) = &lazy.image_path {
            return Ok(path.clone());
        }
        let path = self.system.image_path(self.handle.get())?;
        lazy.image_path = Some(path.clone());
        Ok(path)
    }

    /// File name part of [`image_path`](Self::image_path), e.g. `cmd.exe`.
    pub fn base_name(&self) -> Result<String> {
        let path = self.image_path()?;
        Ok(path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default())
    }

    /// SID of the user the process runs as.
    pub fn sid(&self) -> Result<Sid> {
        let mut lazy = self.lock();
        if let Some(sid) = &lazy.sid {
            return Ok(sid.clone());
        }
        let sid = self.system.user_sid(self.handle.get())?;
        lazy.sid = Some(sid.clone());
        Ok(sid)
    }

    fn with_primary_thread_cached<T>(
        &self,
        read: impl FnOnce(&PrimaryThread<S::Release>) -> T,
    ) -> Result<Option<T>> {
        let mut lazy = self.lock();
        if lazy.primary_thread.is_none() {
            let thread = directory::open_primary_thread(&*self.system, self.id)?;
            lazy.primary_thread = Some(thread);
        }
        Ok(lazy.primary_thread.as_ref().and_then(Option::as_ref).map(read))
    }

    /// Id of the primary thread.
    ///
    /// For a record that was not spawned by this crate this is the first
    /// thread of the process in the OS thread enumeration, which is the
    /// oldest surviving thread but not necessarily the one that ran `main`.
    pub fn primary_thread_id(&self) -> Result<Option<u32>> {
        self.with_primary_thread_cached(|t| t.id)
    }

    /// Raw handle of the primary thread, owned by this record.
    pub fn primary_thread_handle(&self) -> Result<Option<RawHandle>> {
        self.with_primary_thread_cached(|t| t.handle.get())
    }

    /// Exit code, or [`STILL_ACTIVE`] while the process runs.
    pub fn exit_code(&self) -> Result<u32> {
        self.system.exit_code(self.handle.get())
    }

    /// Wait for the process to exit; `None` waits forever.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<WaitStatus> {
        self.system.wait(self.handle.get(), timeout)
    }

    /// Requires the handle to carry `PROCESS_TERMINATE`.
    pub fn terminate(&self, exit_code: u32) -> Result<()> {
        self.system.terminate(self.handle.get(), exit_code)
    }
}

impl<S: ProcessSystem> fmt::Debug for ProcessRecord<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRecord")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
