// ── Text comparison ───────────────────────────────────────────────────────────
//
// Executable names, image paths, window classes and titles are all compared
// without regard to case, the way the Win32 shell compares them.  No Win32
// imports; usable from any module.

use std::path::Path;

/// Case-insensitive equality using full Unicode lower-casing.
pub(crate) fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.len() == b.len() && a.eq_ignore_ascii_case(b) {
        return true;
    }
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Case-insensitive comparison of two paths by their textual form.
pub(crate) fn path_eq_ignore_case(a: &Path, b: &Path) -> bool {
    eq_ignore_case(&a.to_string_lossy(), &b.to_string_lossy())
}
