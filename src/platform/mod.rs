// ── Platform layer ────────────────────────────────────────────────────────────
//
// OS implementations of `ProcessSystem` and `WindowTree`.  No `unsafe` lives
// here; all Win32 FFI is confined to the `win32` sub-module.

#[cfg(windows)]
pub mod win32;
