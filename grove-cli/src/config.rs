// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Defaults read from `grove.toml`.
//!
//! ```toml
//! format = "tar.zst"
//! prefix = "release/"
//! owner = "builder:1000"
//! umask = 0o022
//! eol = "lf"
//! compression_level = 9
//! ```

use std::path::{Path, PathBuf};

use grove_archive::LineEnding;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CliError, IoContext, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "GROVE_CONFIG";

/// File looked up in the current directory when the variable is unset.
pub const DEFAULT_CONFIG_FILE: &str = "grove.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub umask: Option<u32>,
    #[serde(default)]
    pub eol: Option<LineEnding>,
    #[serde(default)]
    pub compression_level: Option<u32>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .io_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&contents).map_err(|source| CliError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    /// The file named by `GROVE_CONFIG`, else `grove.toml` if it exists,
    /// else defaults.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => PathBuf::from(DEFAULT_CONFIG_FILE),
            None => return Ok(Config::default()),
        };
        debug!(path = %path.display(), "loading configuration");
        Self::from_file(&path)
    }
}
