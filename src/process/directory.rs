// ── Process directory ─────────────────────────────────────────────────────────
//
// Lookups over the live process table: by id, by executable, by parentage,
// plus the calling process and process creation.  Each lookup takes a fresh
// snapshot; nothing here is cached between calls.

use std::{collections::HashSet, path::Path, sync::Arc};

use tracing::{debug, info, trace};

use super::{
    command_line::{
        complete_path, has_directory, resolve_command_line, weakly_canonical, SpawnRequest,
    },
    record::{PrimaryThread, ProcessRecord},
    rights::RightsTiers,
    CreateParams, ProcessSystem,
};
use crate::{
    buffer::try_grow_and_retry_fill,
    error::{Error, Result},
    handle::SafeHandle,
    text::{eq_ignore_case, path_eq_ignore_case},
};

/// A shared process record.
pub type Process<S> = Arc<ProcessRecord<S>>;

/// Resolves running processes into [`ProcessRecord`]s.
///
/// Holds nothing but the OS seam; cloning is cheap.
pub struct ProcessDirectory<S: ProcessSystem> {
    system: Arc<S>,
}

impl<S: ProcessSystem> Clone for ProcessDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            system: Arc::clone(&self.system),
        }
    }
}

impl<S: ProcessSystem> ProcessDirectory<S> {
    pub fn new(system: S) -> Self {
        Self::from_shared(Arc::new(system))
    }

    pub fn from_shared(system: Arc<S>) -> Self {
        Self { system }
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    // ── Enumeration ───────────────────────────────────────────────────────

    /// Ids of every running process, in OS order, without duplicates.
    pub fn enumerate_process_ids(&self) -> Result<Vec<u32>> {
        let config = self.system.config();
        let mut ids = Vec::new();
        let count = try_grow_and_retry_fill(
            &mut ids,
            config.process_id_seed,
            config.max_buffer_len,
            |slots: &mut [u32]| self.system.fill_process_ids(slots),
        )?;
        ids.truncate(count);

        let mut seen = HashSet::with_capacity(ids.len());
        ids.retain(|id| seen.insert(*id));
        trace!(count = ids.len(), "enumerated process ids");
        Ok(ids)
    }

    fn open_with_tiers(&self, id: u32, rights: u32, inherit: bool) -> Option<Process<S>> {
        RightsTiers::process(rights)
            .open_first(|tier| self.system.open_process(id, tier, inherit))
            .map(|handle| Arc::new(ProcessRecord::new(Arc::clone(&self.system), id, handle)))
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    /// Open the process with this id.
    ///
    /// `None` if the id is not running or no rights tier could be opened.
    pub fn open(&self, id: u32, desired_rights: u32) -> Result<Option<Process<S>>> {
        if !self.enumerate_process_ids()?.contains(&id) {
            debug!(pid = id, "process id not running");
            return Ok(None);
        }
        let process = self.open_with_tiers(id, desired_rights, false);
        if process.is_none() {
            debug!(pid = id, "process could not be opened with any rights tier");
        }
        Ok(process)
    }

    /// Adopt an already-open process handle.
    #[allow(clippy::wrong_self_convention)]
    pub fn from_handle(&self, handle: SafeHandle<S::Release>) -> Result<Process<S>> {
        let id = self.system.process_id(handle.get())?;
        Ok(Arc::new(ProcessRecord::new(
            Arc::clone(&self.system),
            id,
            handle,
        )))
    }

    /// First process whose executable matches `executable`.
    ///
    /// A path with a directory component is completed to an absolute path
    /// and compared with each image path; a bare file name is compared with
    /// each image's file name.  Both comparisons ignore case.  Processes
    /// that cannot be opened or whose image cannot be read are skipped.
    pub fn find_by_executable(
        &self,
        executable: &Path,
        inherit: bool,
        access: u32,
    ) -> Result<Option<Process<S>>> {
        self.find_matching(executable, inherit, access, |_| true)
    }

    /// Like [`find_by_executable`](Self::find_by_executable), restricted to
    /// processes running as the same user as the caller.
    ///
    /// A candidate whose owner cannot be read is treated as not owned.
    pub fn find_by_executable_owned_by_caller(
        &self,
        executable: &Path,
        inherit: bool,
        access: u32,
    ) -> Result<Option<Process<S>>> {
        let caller = self.current().sid()?;
        self.find_matching(executable, inherit, access, |record| match record.sid() {
            Ok(sid) => sid == caller,
            Err(e) => {
                debug!(pid = record.id(), error = %e, "owner unreadable, skipping");
                false
            }
        })
    }

    fn find_matching(
        &self,
        executable: &Path,
        inherit: bool,
        access: u32,
        mut accept: impl FnMut(&ProcessRecord<S>) -> bool,
    ) -> Result<Option<Process<S>>> {
        let by_path = has_directory(executable);
        let target = if by_path {
            complete_path(&*self.system, executable)?
        } else {
            executable.to_path_buf()
        };
        let target_name = target.to_string_lossy();

        for id in self.enumerate_process_ids()? {
            let Some(record) = self.open_with_tiers(id, access, inherit) else {
                continue;
            };
            let matched = if by_path {
                record.image_path().map(|p| path_eq_ignore_case(&p, &target))
            } else {
                record.base_name().map(|n| eq_ignore_case(&n, &target_name))
            };
            match matched {
                Ok(true) if accept(&record) => return Ok(Some(record)),
                Ok(_) => {}
                Err(e) => trace!(pid = id, error = %e, "image path unreadable"),
            }
        }

        debug!(executable = %executable.display(), "no process matches executable");
        Ok(None)
    }

    /// The process that created `record`, if it is still running.
    pub fn resolve_parent(&self, record: &ProcessRecord<S>) -> Result<Option<Process<S>>> {
        let snapshot = self.system.process_snapshot()?;
        trace!(count = snapshot.len(), "process snapshot");
        let Some(entry) = snapshot.iter().find(|e| e.id == record.id()) else {
            debug!(pid = record.id(), "process not in snapshot");
            return Ok(None);
        };
        Ok(self.open_with_tiers(entry.parent_id, 0, false))
    }

    /// The first thread owned by process `id` in the OS thread enumeration.
    pub fn resolve_primary_thread(&self, id: u32) -> Result<Option<PrimaryThread<S::Release>>> {
        open_primary_thread(&*self.system, id)
    }

    /// The calling process.  Created on first use and never dropped.
    ///
    /// There is one record per `ProcessSystem` type, not per directory.  It
    /// keeps the system (and so the `Config`) of whichever directory called
    /// `current` first; directories built later with another configuration
    /// share that record as is.
    pub fn current(&self) -> &'static ProcessRecord<S> {
        S::current_cell().get_or_init(|| {
            let (id, pseudo) = self.system.current_process();
            ProcessRecord::new(Arc::clone(&self.system), id, SafeHandle::new(pseudo))
        })
    }

    // ── Creation ──────────────────────────────────────────────────────────

    /// Start a process.
    ///
    /// The executable token of the command line is completed to an absolute
    /// path (searching the OS path for bare names) before the process is
    /// created.  The working directory defaults to the current directory.
    pub fn start(&self, request: &SpawnRequest) -> Result<Process<S>> {
        let (application, command_line) =
            resolve_command_line(&*self.system, &request.command_line)?;
        let working_dir = match &request.working_dir {
            Some(dir) => weakly_canonical(dir),
            None => std::env::current_dir()?,
        };

        let params = CreateParams {
            application: &application,
            command_line: &command_line,
            working_dir: &working_dir,
            environment: request.environment.as_deref(),
            creation_flags: request.creation_flags,
            inherit_handles: request.inherit_handles,
            show: request.show.as_raw(),
        };
        let spawned = self.system.create_process(&params).map_err(|e| Error::Spawn {
            command_line: command_line.clone(),
            code: e.code().unwrap_or_default(),
        })?;

        info!(pid = spawned.process_id, command_line = %command_line, "process started");
        Ok(Arc::new(ProcessRecord::with_primary_thread(
            Arc::clone(&self.system),
            spawned.process_id,
            spawned.process,
            PrimaryThread {
                id: spawned.thread_id,
                handle: spawned.thread,
            },
        )))
    }
}

/// First thread owned by `id`, opened with the thread rights tiers.
pub(crate) fn open_primary_thread<S: ProcessSystem>(
    system: &S,
    id: u32,
) -> Result<Option<PrimaryThread<S::Release>>> {
    let threads = system.thread_snapshot()?;
    trace!(count = threads.len(), "thread snapshot");
    let Some(entry) = threads.iter().find(|t| t.owner_id == id) else {
        debug!(pid = id, "no thread owned by process");
        return Ok(None);
    };
    Ok(RightsTiers::thread(0)
        .open_first(|tier| system.open_thread(entry.id, tier, false))
        .map(|handle| PrimaryThread {
            id: entry.id,
            handle,
        }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
