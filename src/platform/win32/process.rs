// ── Win32 process primitives ──────────────────────────────────────────────────
//
// `Win32System` implements `ProcessSystem` with psapi, kernel32 threading,
// tool-help snapshots and the process token.  Each function is a thin
// wrapper; lookup policy lives in `process::directory`.

use std::{
    ffi::{c_void, OsStr, OsString},
    mem::size_of,
    path::PathBuf,
    slice,
    sync::OnceLock,
    time::Duration,
};

use windows::{
    core::{PCWSTR, PWSTR},
    Win32::{
        Foundation::{
            BOOL, ERROR_FILE_NOT_FOUND, ERROR_INSUFFICIENT_BUFFER, ERROR_NO_MORE_FILES,
            ERROR_PATH_NOT_FOUND, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT,
        },
        Security::{GetLengthSid, GetTokenInformation, TokenUser, TOKEN_QUERY, TOKEN_USER},
        Storage::FileSystem::SearchPathW,
        System::{
            Diagnostics::ToolHelp::{
                CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, Thread32First,
                Thread32Next, CREATE_TOOLHELP_SNAPSHOT_FLAGS, PROCESSENTRY32W,
                TH32CS_SNAPPROCESS, TH32CS_SNAPTHREAD, THREADENTRY32,
            },
            ProcessStatus::EnumProcesses,
            Threading::{
                CreateProcessW, GetCurrentProcess, GetCurrentProcessId, GetExitCodeProcess,
                GetProcessId, OpenProcess, OpenProcessToken, OpenThread,
                QueryFullProcessImageNameW, TerminateProcess, WaitForSingleObject,
                CREATE_UNICODE_ENVIRONMENT, INFINITE, PROCESS_ACCESS_RIGHTS,
                PROCESS_CREATION_FLAGS, PROCESS_INFORMATION, PROCESS_NAME_WIN32,
                STARTF_USESHOWWINDOW, STARTUPINFOW, THREAD_ACCESS_RIGHTS,
            },
        },
    },
};

use super::{handle, last_error, raw, read_wide, to_wide, win32_error, KernelObject, OwnedHandle};
use crate::{
    config::Config,
    error::{Error, Result},
    handle::SafeHandle,
    process::{
        CreateParams, ProcessEntry, ProcessRecord, ProcessSystem, RawHandle, Sid, Spawned,
        ThreadEntry, WaitStatus,
    },
};

/// The live Win32 process table.
#[derive(Debug, Clone, Default)]
pub struct Win32System {
    config: Config,
}

impl Win32System {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use non-default buffer sizing; the configuration is validated first.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

fn process_row(entry: &PROCESSENTRY32W) -> ProcessEntry {
    ProcessEntry {
        id: entry.th32ProcessID,
        parent_id: entry.th32ParentProcessID,
    }
}

fn snapshot(flags: CREATE_TOOLHELP_SNAPSHOT_FLAGS) -> Result<OwnedHandle> {
    // SAFETY: no pointers are passed; the returned handle is owned by the
    // `OwnedHandle` and closed when it drops.
    let snap = unsafe { CreateToolhelp32Snapshot(flags, 0) }
        .map_err(|e| win32_error("CreateToolhelp32Snapshot", &e))?;
    Ok(OwnedHandle::new(raw(snap)))
}

/// `true` for the error that ends a tool-help walk normally.
fn end_of_walk(e: &windows::core::Error) -> bool {
    e.code() == ERROR_NO_MORE_FILES.to_hresult()
}

/// `KEY=VALUE\0...\0\0` in UTF-16, as `CREATE_UNICODE_ENVIRONMENT` expects.
fn environment_block(vars: &[(OsString, OsString)]) -> Vec<u16> {
    let mut block = Vec::new();
    for (key, value) in vars {
        let mut pair = key.clone();
        pair.push("=");
        pair.push(value);
        block.extend(to_wide(&pair));
    }
    if block.is_empty() {
        block.push(0);
    }
    block.push(0);
    block
}

impl ProcessSystem for Win32System {
    type Release = KernelObject;

    fn current_cell() -> &'static OnceLock<ProcessRecord<Self>> {
        static CURRENT: OnceLock<ProcessRecord<Win32System>> = OnceLock::new();
        &CURRENT
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn fill_process_ids(&self, ids: &mut [u32]) -> Result<usize> {
        let bytes = u32::try_from(ids.len() * size_of::<u32>()).map_err(|_| {
            Error::CapacityExceeded {
                requested: ids.len(),
                limit: u32::MAX as usize / size_of::<u32>(),
            }
        })?;
        let mut needed = 0u32;
        // SAFETY: `ids` is writable for `bytes` bytes and `needed` is a live
        // local for the duration of the call.
        unsafe { EnumProcesses(ids.as_mut_ptr(), bytes, &mut needed) }
            .map_err(|e| win32_error("EnumProcesses", &e))?;
        Ok(needed as usize / size_of::<u32>())
    }

    fn open_process(&self, id: u32, rights: u32, inherit: bool) -> Result<OwnedHandle> {
        // SAFETY: plain value arguments; the handle is owned by the result.
        let h = unsafe { OpenProcess(PROCESS_ACCESS_RIGHTS(rights), BOOL::from(inherit), id) }
            .map_err(|e| win32_error("OpenProcess", &e))?;
        Ok(SafeHandle::new(raw(h)))
    }

    fn open_thread(&self, id: u32, rights: u32, inherit: bool) -> Result<OwnedHandle> {
        // SAFETY: plain value arguments; the handle is owned by the result.
        let h = unsafe { OpenThread(THREAD_ACCESS_RIGHTS(rights), BOOL::from(inherit), id) }
            .map_err(|e| win32_error("OpenThread", &e))?;
        Ok(SafeHandle::new(raw(h)))
    }

    fn current_process(&self) -> (u32, RawHandle) {
        // SAFETY: both calls take no arguments and cannot fail.  The
        // pseudo-handle needs no closing and equals INVALID_HANDLE_VALUE, which
        // `KernelObject` never closes.
        unsafe { (GetCurrentProcessId(), raw(GetCurrentProcess())) }
    }

    fn process_id(&self, process: RawHandle) -> Result<u32> {
        // SAFETY: `process` is a handle owned by the caller's record.
        match unsafe { GetProcessId(handle(process)) } {
            0 => Err(last_error("GetProcessId")),
            id => Ok(id),
        }
    }

    fn image_path(&self, process: RawHandle) -> Result<PathBuf> {
        let path = read_wide(self.config.path_seed, self.config.max_buffer_len, |buf| {
            let mut size = u32::try_from(buf.len()).unwrap_or(u32::MAX);
            // SAFETY: `buf` is writable for `size` UTF-16 units; on success
            // `size` is updated to the length written, excluding the NUL.
            let filled = unsafe {
                QueryFullProcessImageNameW(
                    handle(process),
                    PROCESS_NAME_WIN32,
                    PWSTR(buf.as_mut_ptr()),
                    &mut size,
                )
            };
            match filled {
                Ok(()) => Ok(size as usize),
                Err(e) if e.code() == ERROR_INSUFFICIENT_BUFFER.to_hresult() => Ok(buf.len()),
                Err(e) => Err(win32_error("QueryFullProcessImageNameW", &e)),
            }
        })?;
        Ok(PathBuf::from(path))
    }

    fn user_sid(&self, process: RawHandle) -> Result<Sid> {
        let mut token = HANDLE::default();
        // SAFETY: `token` is a live local that receives an owned handle.
        unsafe { OpenProcessToken(handle(process), TOKEN_QUERY, &mut token) }
            .map_err(|e| win32_error("OpenProcessToken", &e))?;
        let token = OwnedHandle::new(raw(token));

        let mut needed = 0u32;
        // SAFETY: size query; no buffer is passed.
        if let Err(e) =
            unsafe { GetTokenInformation(handle(token.get()), TokenUser, None, 0, &mut needed) }
        {
            if e.code() != ERROR_INSUFFICIENT_BUFFER.to_hresult() {
                return Err(win32_error("GetTokenInformation", &e));
            }
        }

        // u64 storage keeps the TOKEN_USER header suitably aligned.
        let mut buf = vec![0u64; (needed as usize).div_ceil(size_of::<u64>())];
        // SAFETY: `buf` is writable for at least `needed` bytes.
        unsafe {
            GetTokenInformation(
                handle(token.get()),
                TokenUser,
                Some(buf.as_mut_ptr().cast::<c_void>()),
                needed,
                &mut needed,
            )
        }
        .map_err(|e| win32_error("GetTokenInformation", &e))?;

        // SAFETY: on success the buffer starts with a TOKEN_USER whose SID
        // pointer refers into the same buffer, which is still alive.
        let bytes = unsafe {
            let user = &*buf.as_ptr().cast::<TOKEN_USER>();
            let sid = user.User.Sid;
            let len = GetLengthSid(sid) as usize;
            slice::from_raw_parts(sid.0.cast::<u8>(), len).to_vec()
        };
        Ok(Sid::from_bytes(bytes))
    }

    fn process_snapshot(&self) -> Result<Vec<ProcessEntry>> {
        let snap = snapshot(TH32CS_SNAPPROCESS)?;
        let mut entry = PROCESSENTRY32W {
            dwSize: size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };
        let mut rows = Vec::new();

        // SAFETY: `entry` is a live, correctly sized PROCESSENTRY32W.
        let mut step = unsafe { Process32FirstW(handle(snap.get()), &mut entry) };
        loop {
            match step {
                Ok(()) => rows.push(process_row(&entry)),
                Err(e) if end_of_walk(&e) => return Ok(rows),
                Err(e) => return Err(win32_error("Process32NextW", &e)),
            }
            // SAFETY: as above.
            step = unsafe { Process32NextW(handle(snap.get()), &mut entry) };
        }
    }

    fn thread_snapshot(&self) -> Result<Vec<ThreadEntry>> {
        let snap = snapshot(TH32CS_SNAPTHREAD)?;
        let mut entry = THREADENTRY32 {
            dwSize: size_of::<THREADENTRY32>() as u32,
            ..Default::default()
        };
        let mut rows = Vec::new();

        // SAFETY: `entry` is a live, correctly sized THREADENTRY32.
        let mut step = unsafe { Thread32First(handle(snap.get()), &mut entry) };
        loop {
            match step {
                Ok(()) => rows.push(ThreadEntry {
                    id: entry.th32ThreadID,
                    owner_id: entry.th32OwnerProcessID,
                }),
                Err(e) if end_of_walk(&e) => return Ok(rows),
                Err(e) => return Err(win32_error("Thread32Next", &e)),
            }
            // SAFETY: as above.
            step = unsafe { Thread32Next(handle(snap.get()), &mut entry) };
        }
    }

    fn search_path(
        &self,
        file_name: &str,
        default_extension: Option<&str>,
    ) -> Result<Option<PathBuf>> {
        let name = to_wide(OsStr::new(file_name));
        let extension = default_extension.map(|e| to_wide(OsStr::new(e)));
        let extension_ptr = extension
            .as_ref()
            .map_or(PCWSTR::null(), |e| PCWSTR(e.as_ptr()));

        let found = read_wide(self.config.path_seed, self.config.max_buffer_len, |buf| {
            // SAFETY: `name` and `extension` are NUL-terminated and outlive
            // the call; `buf` is a writable slice.  Returns the length written
            // (excluding NUL) or the size required (including NUL).
            let n = unsafe {
                SearchPathW(
                    PCWSTR::null(),
                    PCWSTR(name.as_ptr()),
                    extension_ptr,
                    Some(buf),
                    None,
                )
            };
            if n != 0 {
                return Ok(n as usize);
            }
            let err = last_error("SearchPathW");
            match err.code() {
                Some(code) if code == ERROR_FILE_NOT_FOUND.0 || code == ERROR_PATH_NOT_FOUND.0 => {
                    Ok(0)
                }
                _ => Err(err),
            }
        })?;

        Ok((!found.is_empty()).then(|| PathBuf::from(found)))
    }

    fn create_process(&self, params: &CreateParams<'_>) -> Result<Spawned<KernelObject>> {
        let application = to_wide(params.application.as_os_str());
        let mut command_line = to_wide(OsStr::new(params.command_line));
        let working_dir = to_wide(params.working_dir.as_os_str());
        let environment = params.environment.map(environment_block);

        let mut flags = params.creation_flags;
        if environment.is_some() {
            flags |= CREATE_UNICODE_ENVIRONMENT.0;
        }

        let startup = STARTUPINFOW {
            cb: size_of::<STARTUPINFOW>() as u32,
            dwFlags: STARTF_USESHOWWINDOW,
            wShowWindow: params.show as u16,
            ..Default::default()
        };
        let mut info = PROCESS_INFORMATION::default();

        // SAFETY: every string is NUL-terminated and outlives the call;
        // `command_line` is a mutable buffer as CreateProcessW requires; the
        // environment block is double-NUL-terminated UTF-16.
        unsafe {
            CreateProcessW(
                PCWSTR(application.as_ptr()),
                PWSTR(command_line.as_mut_ptr()),
                None,
                None,
                BOOL::from(params.inherit_handles),
                PROCESS_CREATION_FLAGS(flags),
                environment.as_ref().map(|b| b.as_ptr().cast::<c_void>()),
                PCWSTR(working_dir.as_ptr()),
                &startup,
                &mut info,
            )
        }
        .map_err(|e| win32_error("CreateProcessW", &e))?;

        Ok(Spawned {
            process: SafeHandle::new(raw(info.hProcess)),
            thread: SafeHandle::new(raw(info.hThread)),
            process_id: info.dwProcessId,
            thread_id: info.dwThreadId,
        })
    }

    fn exit_code(&self, process: RawHandle) -> Result<u32> {
        let mut code = 0u32;
        // SAFETY: `code` is a live local.
        unsafe { GetExitCodeProcess(handle(process), &mut code) }
            .map_err(|e| win32_error("GetExitCodeProcess", &e))?;
        Ok(code)
    }

    fn wait(&self, process: RawHandle, timeout: Option<Duration>) -> Result<WaitStatus> {
        let millis = timeout.map_or(INFINITE, |t| {
            u32::try_from(t.as_millis()).unwrap_or(INFINITE - 1)
        });
        // SAFETY: `process` is a handle owned by the caller's record.
        let event = unsafe { WaitForSingleObject(handle(process), millis) };
        if event == WAIT_OBJECT_0 {
            Ok(WaitStatus::Exited)
        } else if event == WAIT_TIMEOUT {
            Ok(WaitStatus::TimedOut)
        } else {
            Err(last_error("WaitForSingleObject"))
        }
    }

    fn terminate(&self, process: RawHandle, exit_code: u32) -> Result<()> {
        // SAFETY: `process` is a handle owned by the caller's record.
        unsafe { TerminateProcess(handle(process), exit_code) }
            .map_err(|e| win32_error("TerminateProcess", &e))
    }
}
