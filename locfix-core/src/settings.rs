//! Persisted configuration.
//!
//! Settings are read from `locfix.json` in the working directory. Every
//! field is optional; a missing file means all defaults.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default settings file name.
pub const SETTINGS_FILE: &str = "locfix.json";

/// Error type for loading settings and toggling display options.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown display option '{0}' (expected 'json' or 'show_token')")]
    UnknownDisplayOption(String),
}

/// How the current token is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    /// Show source lines JSON-escaped, making whitespace visible.
    pub json: bool,
    /// Dump the raw token/node after the location summary.
    pub show_token: bool,
}

/// A single toggleable display flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOption {
    Json,
    ShowToken,
}

impl fmt::Display for DisplayOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayOption::Json => f.write_str("json"),
            DisplayOption::ShowToken => f.write_str("show_token"),
        }
    }
}

impl FromStr for DisplayOption {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "json" => Ok(DisplayOption::Json),
            "show_token" | "show-token" | "token" => Ok(DisplayOption::ShowToken),
            other => Err(SettingsError::UnknownDisplayOption(other.to_string())),
        }
    }
}

impl DisplayOptions {
    pub fn is_enabled(&self, option: DisplayOption) -> bool {
        match option {
            DisplayOption::Json => self.json,
            DisplayOption::ShowToken => self.show_token,
        }
    }

    /// Flip `option`, returning its new state.
    pub fn toggle(&mut self, option: DisplayOption) -> bool {
        let flag = match option {
            DisplayOption::Json => &mut self.json,
            DisplayOption::ShowToken => &mut self.show_token,
        };
        *flag = !*flag;
        *flag
    }
}

/// Persisted application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the case files.
    pub cases_dir: PathBuf,
    /// Extension (without dot) of case files.
    pub case_extension: String,
    /// Root directory of the fixture tree.
    pub fixture_root: PathBuf,
    /// Program and leading arguments that dump tokens/ASTs as JSON.
    pub command: Vec<String>,
    pub display: DisplayOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cases_dir: PathBuf::from("packages/pug-lexer/test/cases"),
            case_extension: "pug".to_string(),
            fixture_root: PathBuf::from("save"),
            command: Vec::new(),
            display: DisplayOptions::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("no settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
