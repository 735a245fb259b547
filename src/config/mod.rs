// ── Buffer configuration ──────────────────────────────────────────────────────
//
// Seed capacities and the growth ceiling for every adaptive OS query.
// Optionally read from a JSON file.  No `unsafe`.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Initial process-id slots for `EnumProcesses`.
pub const DEFAULT_PROCESS_ID_SEED: usize = 400;

/// Initial UTF-16 units for path queries (`MAX_PATH`).
pub const DEFAULT_PATH_SEED: usize = 260;

/// Initial UTF-16 units for window class and title reads.
pub const DEFAULT_WINDOW_TEXT_SEED: usize = 256;

/// Hard ceiling on adaptive growth, in elements.
pub const DEFAULT_MAX_BUFFER_LEN: usize = 1 << 20;

// ── On-disk type ──────────────────────────────────────────────────────────────

/// Buffer sizing used by the directory and the Win32 backend.
///
/// Every field has a default, so a partial file such as
/// `{"path_seed": 512}` is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seed element count for process-id enumeration.
    pub process_id_seed: usize,
    /// Seed UTF-16 length for image paths, module paths, search paths.
    pub path_seed: usize,
    /// Seed UTF-16 length for window class names and titles.
    pub window_text_seed: usize,
    /// Growth ceiling shared by every adaptive read.
    pub max_buffer_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            process_id_seed: DEFAULT_PROCESS_ID_SEED,
            path_seed: DEFAULT_PATH_SEED,
            window_text_seed: DEFAULT_WINDOW_TEXT_SEED,
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
        }
    }
}

impl Config {
    /// Parse and validate a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Reject seeds of zero and a ceiling smaller than any seed.
    pub fn validate(&self) -> Result<()> {
        let seeds = [self.process_id_seed, self.path_seed, self.window_text_seed];
        if seeds.contains(&0) {
            return Err(Error::Misuse("buffer seed capacity must be non-zero"));
        }
        if seeds.iter().any(|&s| s > self.max_buffer_len) {
            return Err(Error::Misuse("max_buffer_len is smaller than a seed capacity"));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
