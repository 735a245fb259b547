// ── Command lines and executable paths ────────────────────────────────────────
//
// Splitting the executable token off a command line, completing it to an
// absolute path, and rebuilding the command line with the completed path.

use std::{
    ffi::OsString,
    path::{Component, Path, PathBuf},
};

use super::ProcessSystem;
use crate::error::{Error, Result};

// ── Spawn request ─────────────────────────────────────────────────────────────

/// How the first window of a new process is shown (`SW_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowMode {
    /// `SW_SHOWDEFAULT`: let the new process decide.
    #[default]
    Default,
    /// `SW_SHOWNORMAL`.
    Normal,
    /// `SW_HIDE`.
    Hidden,
    /// `SW_SHOWMINNOACTIVE`.
    Minimized,
    /// `SW_SHOWMAXIMIZED`.
    Maximized,
}

impl ShowMode {
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Default => 10,
            Self::Normal => 1,
            Self::Hidden => 0,
            Self::Minimized => 7,
            Self::Maximized => 3,
        }
    }
}

/// Everything needed to start a process.
///
/// Built with [`SpawnRequest::new`] and the chained setters; unset fields
/// mean "current directory", "inherit environment", no flags, no handle
/// inheritance and `ShowMode::Default`.
#[derive(Debug, Clone, Default)]
pub struct SpawnRequest {
    pub command_line: String,
    pub working_dir: Option<PathBuf>,
    pub environment: Option<Vec<(OsString, OsString)>>,
    pub creation_flags: u32,
    pub inherit_handles: bool,
    pub show: ShowMode,
}

impl SpawnRequest {
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            ..Self::default()
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add one variable to a replacement environment.  The first call
    /// switches the child from inheriting to an explicit environment.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.environment
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    pub fn creation_flags(mut self, flags: u32) -> Self {
        self.creation_flags = flags;
        self
    }

    pub fn inherit_handles(mut self, inherit: bool) -> Self {
        self.inherit_handles = inherit;
        self
    }

    pub fn show(mut self, show: ShowMode) -> Self {
        self.show = show;
        self
    }
}

// ── Executable token ──────────────────────────────────────────────────────────

/// A command line split into its executable token and the untouched rest.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SplitCommandLine<'a> {
    /// The executable token with quote characters removed.
    pub(crate) executable: String,
    /// Everything from the first unquoted whitespace on, verbatim.
    pub(crate) remainder: &'a str,
    /// `true` if the token contained a quote character.
    pub(crate) quoted: bool,
}

/// Split off the executable token.  A `"` toggles quote mode and is dropped;
/// outside quotes the first whitespace ends the token.
pub(crate) fn split_command_line(command_line: &str) -> SplitCommandLine<'_> {
    let mut executable = String::new();
    let mut in_quote = false;
    let mut quoted = false;
    let mut end = command_line.len();

    for (i, c) in command_line.char_indices() {
        if c == '"' {
            in_quote = !in_quote;
            quoted = true;
            continue;
        }
        if !in_quote && c.is_whitespace() {
            end = i;
            break;
        }
        executable.push(c);
    }

    SplitCommandLine {
        executable,
        remainder: &command_line[end..],
        quoted,
    }
}

// ── Path completion ───────────────────────────────────────────────────────────

/// `true` if `path` names a directory as well as a file.
pub(crate) fn has_directory(path: &Path) -> bool {
    path.parent().is_some_and(|p| !p.as_os_str().is_empty())
}

/// Make `path` absolute and fold `.` and `..` lexically, without requiring
/// the path to exist.  Falls back to the input if the current directory
/// cannot be read.
pub(crate) fn weakly_canonical(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Resolve an executable name or path the way process lookup and spawning
/// expect it:
///
/// * absolute paths pass through;
/// * relative paths with a directory are made absolute;
/// * bare names are looked up on the OS search path (with `.exe` appended
///   when they have no extension), falling back to making the bare name
///   absolute if the search finds nothing.
pub(crate) fn complete_path<S: ProcessSystem>(system: &S, path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    if has_directory(path) {
        return Ok(weakly_canonical(path));
    }

    let name = path.to_string_lossy();
    match system.search_path(&name, Some(".exe"))? {
        Some(found) => Ok(weakly_canonical(&found)),
        None => Ok(weakly_canonical(path)),
    }
}

/// Rebuild `command_line` with its executable token completed.
///
/// Returns the absolute executable path and the full command line.  The
/// token is quoted if it was quoted originally or now contains whitespace.
pub(crate) fn resolve_command_line<S: ProcessSystem>(
    system: &S,
    command_line: &str,
) -> Result<(PathBuf, String)> {
    let split = split_command_line(command_line);
    if split.executable.trim().is_empty() {
        return Err(Error::Misuse("command line has no executable"));
    }

    let application = complete_path(system, Path::new(&split.executable))?;
    let app_text = application.to_string_lossy();
    let quote = split.quoted || app_text.chars().any(char::is_whitespace);

    let mut rebuilt = String::with_capacity(app_text.len() + split.remainder.len() + 2);
    if quote {
        rebuilt.push('"');
    }
    rebuilt.push_str(&app_text);
    if quote {
        rebuilt.push('"');
    }
    rebuilt.push_str(split.remainder);

    Ok((application, rebuilt))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
