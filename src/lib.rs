// ── Safety policy ────────────────────────────────────────────────────────────
// Unsafe code is forbidden everywhere except `platform::win32`, the Win32 FFI
// layer.  Each unsafe block there MUST carry a `// SAFETY:` comment.
#![deny(unsafe_code)]

//! Directory-style lookup of running processes and on-screen windows.
//!
//! * [`ProcessDirectory`] resolves processes by id, handle, executable path
//!   or name, and parentage, and starts new ones.  Handles are opened with an
//!   ordered list of access-right tiers so that processes in other security
//!   contexts still resolve with limited rights.
//! * [`ProcessRecord`] owns the process handle and caches the image path,
//!   owner SID and primary thread on first use.
//! * [`find_window`] searches the window tree depth-first for a window of a
//!   given process, stopping at the first match.
//! * [`grow_and_retry_fill`] drives OS queries whose result size is unknown.
//!
//! The algorithms are written against the [`ProcessSystem`] and
//! [`WindowTree`] traits.  On Windows, `platform::win32::Win32System` and
//! `platform::win32::DesktopWindows` implement them over the live system.

pub mod buffer;
pub mod config;
pub mod error;
pub mod handle;
pub mod platform;
pub mod process;
pub mod window;

mod text;

pub use buffer::{grow_and_retry_fill, try_grow_and_retry_fill};
pub use config::Config;
pub use error::{Error, Result};
pub use handle::{ReleasePolicy, SafeHandle};
pub use process::{
    rights::RightsTiers, Process, ProcessDirectory, ProcessEntry, ProcessRecord, ProcessSystem,
    ShowMode, Sid, SpawnRequest, ThreadEntry,
};
pub use window::{find_process_window, find_window, WindowTree};

#[cfg(windows)]
pub use platform::win32::{DesktopWindows, KernelObject, Win32System, WindowHandle};
