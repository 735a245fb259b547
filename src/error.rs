// ── Central error type ────────────────────────────────────────────────────────
//
// All fallible operations in procdir return `error::Result<T>`.  "Not found"
// is never an error: lookups return `Option` and callers decide what an
// absent process, thread, or window means to them.

/// Every error that procdir can produce.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A Win32 API call that must succeed for the operation to mean anything
    /// returned a failure code.
    #[error("{function} failed (error {code:#010x})")]
    Win32 {
        /// The name of the failing function, for diagnostics.
        function: &'static str,
        /// The raw Win32 error code (`GetLastError()` value) or HRESULT.
        code: u32,
    },

    /// Process creation failed.  Carries the exact command line handed to
    /// the OS so the failure can be reproduced.
    #[error("CreateProcessW failed for command line '{command_line}' (error {code:#010x})")]
    Spawn {
        /// The rebuilt command line that was passed to the OS.
        command_line: String,
        /// The raw Win32 error code.
        code: u32,
    },

    /// An adaptive buffer would have to grow past its configured ceiling.
    #[error("buffer of {requested} elements exceeds the limit of {limit}")]
    CapacityExceeded {
        /// The capacity the next growth step asked for.
        requested: usize,
        /// The configured maximum (`Config::max_buffer_len`).
        limit: usize,
    },

    /// The caller broke an API precondition.
    #[error("misuse: {0}")]
    Misuse(&'static str),

    /// A standard I/O error (config file read, path resolution, …).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// The platform error code carried by this error, if any.
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Win32 { code, .. } | Self::Spawn { code, .. } => Some(*code),
            Self::Io(e) => e.raw_os_error().map(|c| c as u32),
            Self::CapacityExceeded { .. } | Self::Misuse(_) | Self::Config(_) => None,
        }
    }
}

// Convert a windows-crate error (HRESULT) directly into an `Error` so that
// `?` can be used on `windows::core::Result<T>` throughout the platform module.
#[cfg(windows)]
impl From<windows::core::Error> for Error {
    fn from(e: windows::core::Error) -> Self {
        // HRESULT.0 is i32; reinterpret bits as u32 for display purposes.
        // Win32 errors appear as 0x8007xxxx HRESULTs.
        Self::Win32 {
            function: "windows",
            code: e.code().0 as u32,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

// ── Tests ─────────────────────────────────────────────────────────────────────
