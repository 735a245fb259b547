// ── In-memory process table for tests ─────────────────────────────────────────
//
// `FakeSystem` implements `ProcessSystem` over a small table of processes so
// the directory algorithms can be tested on any host.  Handles are encoded
// values: `process_handle(pid)`, `thread_handle(tid)`, and `-1` for the
// calling process.  Closed handles are recorded per test thread.

use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, OnceLock, PoisonError},
    time::Duration,
};

use super::{
    record::STILL_ACTIVE, rights::STANDARD_RIGHTS_REQUIRED, CreateParams, ProcessEntry,
    ProcessRecord, ProcessSystem, RawHandle, Sid, Spawned, ThreadEntry, WaitStatus,
};
use crate::{
    config::Config,
    error::{Error, Result},
    handle::{ReleasePolicy, SafeHandle},
    text::eq_ignore_case,
};

pub(crate) const CURRENT_PID: u32 = 100;
pub(crate) const CURRENT_TID: u32 = 1000;
pub(crate) const CALLER_SID: &[u8] = &[1, 5, 0, 0, 0, 0, 0, 5, 21];

const ERROR_FILE_NOT_FOUND: u32 = 2;
const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_INVALID_HANDLE: u32 = 6;
const ERROR_INVALID_PARAMETER: u32 = 87;

const PROCESS_BASE: isize = 0x0100_0000;
const THREAD_BASE: isize = 0x0200_0000;
const CURRENT_PSEUDO: isize = -1;

pub(crate) fn root() -> PathBuf {
    std::env::temp_dir().join("procdir-fake")
}

pub(crate) fn image_of(name: &str) -> PathBuf {
    root().join("bin").join(name)
}

pub(crate) fn process_handle(pid: u32) -> RawHandle {
    PROCESS_BASE + pid as isize
}

pub(crate) fn thread_handle(tid: u32) -> RawHandle {
    THREAD_BASE + tid as isize
}

fn fail(function: &'static str, code: u32) -> Error {
    Error::Win32 { function, code }
}

// ── Release policy ────────────────────────────────────────────────────────────

thread_local! {
    static CLOSED: RefCell<Vec<RawHandle>> = const { RefCell::new(Vec::new()) };
}

/// Handles closed on this thread since the last call.
pub(crate) fn take_closed() -> Vec<RawHandle> {
    CLOSED.with(|c| std::mem::take(&mut *c.borrow_mut()))
}

#[derive(Debug)]
pub(crate) struct FakeRelease;

impl ReleasePolicy for FakeRelease {
    type Raw = RawHandle;
    const NULL: RawHandle = 0;

    fn is_sentinel(raw: RawHandle) -> bool {
        raw == CURRENT_PSEUDO
    }

    fn close(raw: RawHandle) {
        CLOSED.with(|c| c.borrow_mut().push(raw));
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct FakeProcess {
    id: u32,
    parent_id: u32,
    image: PathBuf,
    sid: Option<Vec<u8>>,
    threads: Vec<u32>,
    protected: bool,
    unopenable: bool,
    exit_code: Option<u32>,
}

impl FakeProcess {
    pub(crate) fn new(id: u32, parent_id: u32, exe_name: &str) -> Self {
        Self {
            id,
            parent_id,
            image: image_of(exe_name),
            sid: None,
            threads: Vec::new(),
            protected: false,
            unopenable: false,
            exit_code: None,
        }
    }

    pub(crate) fn image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image = path.into();
        self
    }

    pub(crate) fn sid(mut self, bytes: &[u8]) -> Self {
        self.sid = Some(bytes.to_vec());
        self
    }

    pub(crate) fn threads(mut self, ids: &[u32]) -> Self {
        self.threads = ids.to_vec();
        self
    }

    /// Refuses the standard rights tier but grants the limited one.
    pub(crate) fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    /// Refuses every open.
    pub(crate) fn unopenable(mut self) -> Self {
        self.unopenable = true;
        self
    }
}

/// A process creation as the fake saw it.
#[derive(Debug, Clone)]
pub(crate) struct CreateCall {
    pub(crate) application: PathBuf,
    pub(crate) command_line: String,
    pub(crate) working_dir: PathBuf,
    pub(crate) environment: Option<Vec<(String, String)>>,
    pub(crate) show: i32,
}

#[derive(Debug, Default)]
struct State {
    processes: Vec<FakeProcess>,
    search: Vec<(String, PathBuf)>,
    launchable: Vec<PathBuf>,
    next_id: u32,
    opens: Vec<(u32, u32)>,
    creates: Vec<CreateCall>,
    image_failures: Vec<u32>,
    image_reads: usize,
    sid_reads: usize,
    id_fills: usize,
}

#[derive(Debug)]
pub(crate) struct FakeSystem {
    config: Config,
    state: Mutex<State>,
}

impl FakeSystem {
    /// A table holding only the calling process.  The process-id seed is
    /// tiny so every enumeration exercises buffer growth.
    pub(crate) fn new() -> Self {
        let host = FakeProcess::new(CURRENT_PID, 4, "host.exe")
            .sid(CALLER_SID)
            .threads(&[CURRENT_TID]);
        Self {
            config: Config {
                process_id_seed: 2,
                ..Config::default()
            },
            state: Mutex::new(State {
                processes: vec![host],
                next_id: 5000,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn with_process(self, process: FakeProcess) -> Self {
        self.state().processes.push(process);
        self
    }

    pub(crate) fn with_search_result(self, name: &str, path: PathBuf) -> Self {
        self.state().search.push((name.to_owned(), path));
        self
    }

    /// Register `name` on the search path at `image_of(name)` and allow it
    /// to be spawned.
    pub(crate) fn with_program(self, name: &str) -> Self {
        let path = image_of(name);
        self.state().launchable.push(path.clone());
        self.with_search_result(name, path)
    }

    pub(crate) fn set_image_failure(&self, pid: u32, failing: bool) {
        let mut state = self.state();
        state.image_failures.retain(|&p| p != pid);
        if failing {
            state.image_failures.push(pid);
        }
    }

    /// `(pid, rights)` for every `open_process` call, in order.
    pub(crate) fn opens(&self) -> Vec<(u32, u32)> {
        self.state().opens.clone()
    }

    pub(crate) fn creates(&self) -> Vec<CreateCall> {
        self.state().creates.clone()
    }

    pub(crate) fn image_reads(&self) -> usize {
        self.state().image_reads
    }

    pub(crate) fn sid_reads(&self) -> usize {
        self.state().sid_reads
    }

    pub(crate) fn id_fills(&self) -> usize {
        self.state().id_fills
    }

    fn pid_of(raw: RawHandle) -> Result<u32> {
        if raw == CURRENT_PSEUDO {
            return Ok(CURRENT_PID);
        }
        if (PROCESS_BASE..THREAD_BASE).contains(&raw) {
            return Ok((raw - PROCESS_BASE) as u32);
        }
        Err(fail("GetProcessId", ERROR_INVALID_HANDLE))
    }

    fn with_process_mut<T>(
        &self,
        raw: RawHandle,
        function: &'static str,
        f: impl FnOnce(&mut FakeProcess) -> T,
    ) -> Result<T> {
        let pid = Self::pid_of(raw)?;
        let mut state = self.state();
        state
            .processes
            .iter_mut()
            .find(|p| p.id == pid)
            .map(f)
            .ok_or(fail(function, ERROR_INVALID_HANDLE))
    }
}

impl ProcessSystem for FakeSystem {
    type Release = FakeRelease;

    fn current_cell() -> &'static OnceLock<ProcessRecord<Self>> {
        static CURRENT: OnceLock<ProcessRecord<FakeSystem>> = OnceLock::new();
        &CURRENT
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn fill_process_ids(&self, ids: &mut [u32]) -> Result<usize> {
        let mut state = self.state();
        state.id_fills += 1;
        let written = state.processes.len().min(ids.len());
        for (slot, process) in ids.iter_mut().zip(&state.processes) {
            *slot = process.id;
        }
        Ok(written)
    }

    fn open_process(&self, id: u32, rights: u32, _inherit: bool) -> Result<SafeHandle<FakeRelease>> {
        let mut state = self.state();
        state.opens.push((id, rights));
        let process = state
            .processes
            .iter()
            .find(|p| p.id == id)
            .ok_or(fail("OpenProcess", ERROR_INVALID_PARAMETER))?;
        if process.unopenable || (process.protected && rights & STANDARD_RIGHTS_REQUIRED != 0) {
            return Err(fail("OpenProcess", ERROR_ACCESS_DENIED));
        }
        Ok(SafeHandle::new(process_handle(id)))
    }

    fn open_thread(&self, id: u32, _rights: u32, _inherit: bool) -> Result<SafeHandle<FakeRelease>> {
        let state = self.state();
        if state.processes.iter().any(|p| p.threads.contains(&id)) {
            Ok(SafeHandle::new(thread_handle(id)))
        } else {
            Err(fail("OpenThread", ERROR_INVALID_PARAMETER))
        }
    }

    fn current_process(&self) -> (u32, RawHandle) {
        (CURRENT_PID, CURRENT_PSEUDO)
    }

    fn process_id(&self, process: RawHandle) -> Result<u32> {
        Self::pid_of(process)
    }

    fn image_path(&self, process: RawHandle) -> Result<PathBuf> {
        if process == CURRENT_PSEUDO {
            return Ok(image_of("host.exe"));
        }
        let pid = Self::pid_of(process)?;
        let mut state = self.state();
        state.image_reads += 1;
        if state.image_failures.contains(&pid) {
            return Err(fail("QueryFullProcessImageNameW", ERROR_ACCESS_DENIED));
        }
        state
            .processes
            .iter()
            .find(|p| p.id == pid)
            .map(|p| p.image.clone())
            .ok_or(fail("QueryFullProcessImageNameW", ERROR_INVALID_HANDLE))
    }

    fn user_sid(&self, process: RawHandle) -> Result<Sid> {
        if process == CURRENT_PSEUDO {
            return Ok(Sid::from_bytes(CALLER_SID.to_vec()));
        }
        let pid = Self::pid_of(process)?;
        let mut state = self.state();
        state.sid_reads += 1;
        state
            .processes
            .iter()
            .find(|p| p.id == pid)
            .and_then(|p| p.sid.clone())
            .map(Sid::from_bytes)
            .ok_or(fail("OpenProcessToken", ERROR_ACCESS_DENIED))
    }

    fn process_snapshot(&self) -> Result<Vec<ProcessEntry>> {
        Ok(self
            .state()
            .processes
            .iter()
            .map(|p| ProcessEntry {
                id: p.id,
                parent_id: p.parent_id,
            })
            .collect())
    }

    fn thread_snapshot(&self) -> Result<Vec<ThreadEntry>> {
        Ok(self
            .state()
            .processes
            .iter()
            .flat_map(|p| {
                p.threads.iter().map(|&id| ThreadEntry {
                    id,
                    owner_id: p.id,
                })
            })
            .collect())
    }

    fn search_path(&self, file_name: &str, default_extension: Option<&str>) -> Result<Option<PathBuf>> {
        let mut name = file_name.to_owned();
        if Path::new(file_name).extension().is_none() {
            name.push_str(default_extension.unwrap_or_default());
        }
        Ok(self
            .state()
            .search
            .iter()
            .find(|(known, _)| eq_ignore_case(known, &name))
            .map(|(_, path)| path.clone()))
    }

    fn create_process(&self, params: &CreateParams<'_>) -> Result<Spawned<FakeRelease>> {
        let mut state = self.state();
        state.creates.push(CreateCall {
            application: params.application.to_path_buf(),
            command_line: params.command_line.to_owned(),
            working_dir: params.working_dir.to_path_buf(),
            environment: params.environment.map(|vars| {
                vars.iter()
                    .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
                    .collect()
            }),
            show: params.show,
        });
        if !state.launchable.iter().any(|p| p == params.application) {
            return Err(fail("CreateProcessW", ERROR_FILE_NOT_FOUND));
        }

        let process_id = state.next_id;
        let thread_id = process_id + 1;
        state.next_id += 2;
        state.processes.push(
            FakeProcess::new(process_id, CURRENT_PID, "")
                .image(params.application)
                .sid(CALLER_SID)
                .threads(&[thread_id]),
        );
        Ok(Spawned {
            process: SafeHandle::new(process_handle(process_id)),
            thread: SafeHandle::new(thread_handle(thread_id)),
            process_id,
            thread_id,
        })
    }

    fn exit_code(&self, process: RawHandle) -> Result<u32> {
        self.with_process_mut(process, "GetExitCodeProcess", |p| {
            p.exit_code.unwrap_or(STILL_ACTIVE)
        })
    }

    fn wait(&self, process: RawHandle, _timeout: Option<Duration>) -> Result<WaitStatus> {
        self.with_process_mut(process, "WaitForSingleObject", |p| {
            if p.exit_code.is_some() {
                WaitStatus::Exited
            } else {
                WaitStatus::TimedOut
            }
        })
    }

    fn terminate(&self, process: RawHandle, exit_code: u32) -> Result<()> {
        self.with_process_mut(process, "TerminateProcess", |p| {
            p.exit_code = Some(exit_code);
        })
    }
}
