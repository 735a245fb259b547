// ── Desktop windows ───────────────────────────────────────────────────────────
//
// `WindowHandle` is a non-owning reference to a window; nothing is cached and
// every accessor asks the window manager again.  `DesktopWindows` exposes the
// live window tree to `window::find_window` through `EnumWindows` and
// `EnumChildWindows`.

use std::{ffi::c_void, ops::ControlFlow};

use tracing::trace;
use windows::Win32::{
    Foundation::{BOOL, HWND, LPARAM},
    UI::WindowsAndMessaging::{
        EnumChildWindows, EnumWindows, GetAncestor, GetClassNameW, GetParent,
        GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId, IsWindow, GA_PARENT,
    },
};

use super::{last_error, read_wide, Win32System};
use crate::{
    config::Config,
    error::Result,
    process::{ProcessDirectory, ProcessRecord, ProcessSystem},
    window::{find_process_window, WindowTree},
};

// ── Window handle ─────────────────────────────────────────────────────────────

/// A window, by value.  May refer to a window that has since been destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(isize);

impl WindowHandle {
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> isize {
        self.0
    }

    fn from_hwnd(hwnd: HWND) -> Self {
        Self(hwnd.0 as isize)
    }

    fn hwnd(self) -> HWND {
        HWND(self.0 as *mut c_void)
    }

    /// `true` while the handle names an existing window.
    pub fn is_window(self) -> bool {
        // SAFETY: IsWindow accepts any value, including stale handles.
        unsafe { IsWindow(self.hwnd()) }.as_bool()
    }

    /// Parent window (or owner, for top-level owned windows).
    pub fn parent(self) -> Option<WindowHandle> {
        // SAFETY: GetParent accepts any value and reports failure.
        unsafe { GetParent(self.hwnd()) }
            .ok()
            .filter(|h| !h.is_invalid())
            .map(Self::from_hwnd)
    }

    /// The window's parent in the child-window hierarchy; never its owner.
    fn direct_parent(self) -> Option<WindowHandle> {
        // SAFETY: GetAncestor accepts any value and returns null on failure.
        let parent = unsafe { GetAncestor(self.hwnd(), GA_PARENT) };
        (!parent.is_invalid()).then(|| Self::from_hwnd(parent))
    }

    /// Id of the process that created the window.
    pub fn owner_process_id(self) -> Option<u32> {
        let mut pid = 0u32;
        // SAFETY: `pid` is a live local; a stale handle yields thread id 0.
        let thread = unsafe { GetWindowThreadProcessId(self.hwnd(), Some(&mut pid)) };
        (thread != 0).then_some(pid)
    }

    /// Registered class name.
    pub fn class_name(self) -> Result<String> {
        let config = Config::default();
        self.read_class_name(config.window_text_seed, config.max_buffer_len)
    }

    /// Title bar text; empty for windows without one.
    pub fn text(self) -> Result<String> {
        let config = Config::default();
        self.read_text(config.window_text_seed, config.max_buffer_len)
    }

    fn read_class_name(self, seed: usize, max: usize) -> Result<String> {
        let name = read_wide(seed, max, |buf| {
            // SAFETY: `buf` is a writable slice; the call writes at most
            // `buf.len()` units including the NUL.
            let n = unsafe { GetClassNameW(self.hwnd(), buf) };
            match usize::try_from(n) {
                Ok(0) | Err(_) => Err(last_error("GetClassNameW")),
                // Truncation fills the buffer; ask for more room.
                Ok(n) if n + 1 >= buf.len() => Ok(buf.len()),
                Ok(n) => Ok(n),
            }
        })?;
        Ok(name.to_string_lossy().into_owned())
    }

    fn read_text(self, seed: usize, max: usize) -> Result<String> {
        // SAFETY: GetWindowTextLengthW accepts any value.
        let hint = unsafe { GetWindowTextLengthW(self.hwnd()) };
        let seed = seed.max(usize::try_from(hint).unwrap_or(0) + 1);
        let text = read_wide(seed, max, |buf| {
            // SAFETY: `buf` is a writable slice; the call writes at most
            // `buf.len()` units including the NUL.
            let n = unsafe { GetWindowTextW(self.hwnd(), buf) };
            match usize::try_from(n).unwrap_or(0) {
                n if n + 1 >= buf.len() => Ok(buf.len()),
                n => Ok(n),
            }
        })?;
        Ok(text.to_string_lossy().into_owned())
    }
}

// ── Enumeration ───────────────────────────────────────────────────────────────

type Visitor<'a> = &'a mut dyn FnMut(WindowHandle) -> ControlFlow<()>;

/// `WNDENUMPROC` that forwards each window to the `Visitor` behind `lparam`.
unsafe extern "system" fn visit_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: `lparam` is the address of a `Visitor` on the stack of
    // `enumerate_top_level`/`enumerate_children`, alive until the
    // enumeration call returns.
    let visit = unsafe { &mut *(lparam.0 as *mut Visitor<'_>) };
    BOOL::from(visit(WindowHandle::from_hwnd(hwnd)).is_continue())
}

fn enumerate_top_level(mut visit: Visitor<'_>) {
    // SAFETY: `visit` outlives the call.  EnumWindows reports an error when
    // the callback stops early, so the result is ignored.
    let _ = unsafe {
        EnumWindows(
            Some(visit_window),
            LPARAM(&mut visit as *mut Visitor<'_> as isize),
        )
    };
}

fn enumerate_children(parent: WindowHandle, mut visit: Visitor<'_>) {
    // SAFETY: as above.  EnumChildWindows walks every descendant.
    let _ = unsafe {
        EnumChildWindows(
            parent.hwnd(),
            Some(visit_window),
            LPARAM(&mut visit as *mut Visitor<'_> as isize),
        )
    };
}

/// The interactive desktop's window tree.
#[derive(Debug, Clone, Default)]
pub struct DesktopWindows {
    config: Config,
}

impl DesktopWindows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl WindowTree for DesktopWindows {
    type Window = WindowHandle;

    fn top_level(&self, visit: &mut dyn FnMut(WindowHandle) -> ControlFlow<()>) {
        enumerate_top_level(visit);
    }

    fn children(
        &self,
        parent: WindowHandle,
        visit: &mut dyn FnMut(WindowHandle) -> ControlFlow<()>,
    ) {
        // EnumChildWindows is recursive; keep only direct children so the
        // search controls the depth-first order itself.
        let mut direct = |child: WindowHandle| {
            if child.direct_parent() == Some(parent) {
                visit(child)
            } else {
                ControlFlow::Continue(())
            }
        };
        enumerate_children(parent, &mut direct);
    }

    fn owner_process_id(&self, window: WindowHandle) -> Option<u32> {
        window.owner_process_id()
    }

    fn read_class_name(&self, window: WindowHandle, out: &mut String) -> bool {
        out.clear();
        match window.read_class_name(self.config.window_text_seed, self.config.max_buffer_len) {
            Ok(name) => {
                out.push_str(&name);
                true
            }
            Err(e) => {
                trace!(window = window.raw(), error = %e, "class name unreadable");
                false
            }
        }
    }

    fn read_text(&self, window: WindowHandle, out: &mut String) -> bool {
        out.clear();
        match window.read_text(self.config.window_text_seed, self.config.max_buffer_len) {
            Ok(text) => {
                out.push_str(&text);
                true
            }
            Err(e) => {
                trace!(window = window.raw(), error = %e, "window text unreadable");
                false
            }
        }
    }
}

impl ProcessDirectory<Win32System> {
    /// Search the desktop for a window of `process`.  See
    /// [`find_window`](crate::window::find_window).
    pub fn find_window(
        &self,
        process: &ProcessRecord<Win32System>,
        class_name: &str,
        title: Option<&str>,
    ) -> Option<WindowHandle> {
        let tree = DesktopWindows {
            config: *self.system().config(),
        };
        find_process_window(&tree, process, class_name, title)
    }
}
