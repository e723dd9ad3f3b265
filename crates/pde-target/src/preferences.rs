//! Persisted target-platform preferences.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::TargetError;

pub const SAVED_PLATFORM_SLOTS: usize = 4;

/// Whether the target is the running platform or somewhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    #[default]
    UseThis,
    UseOther,
}

/// Which external plug-ins are enabled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckedPlugins {
    #[default]
    All,
    None,
    Explicit(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetPreferences {
    pub os: Option<String>,
    pub ws: Option<String>,
    pub arch: Option<String>,
    pub nl: Option<String>,
    pub program_args: Option<String>,
    pub vm_args: Option<String>,
    pub vm_install: Option<String>,
    /// Comma-separated implicit plug-in ids.
    pub implicit_dependencies: String,
    pub platform_path: Option<String>,
    pub target_mode: TargetMode,
    pub additional_locations: Vec<String>,
    pub saved_platforms: [Option<String>; SAVED_PLATFORM_SLOTS],
    pub checked_plugins: CheckedPlugins,
}

impl TargetPreferences {
    /// Reads `path`; a missing file gives defaults.
    pub fn load(path: &Path) -> Result<Self, TargetError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(TargetError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| TargetError::Preferences {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes pretty JSON through a sibling temp file and a rename.
    pub fn save(&self, path: &Path) -> Result<(), TargetError> {
        let io_err = |source: io::Error| TargetError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| TargetError::Preferences {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = tmp_path(path);
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)
    }

    pub fn implicit_ids(&self) -> Vec<String> {
        self.implicit_dependencies
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Moves `path` to the front of the saved-platform history, dropping an older copy of it
    /// and the oldest slot.
    pub fn remember_platform(&mut self, path: &str) {
        let mut history: Vec<String> = self
            .saved_platforms
            .iter()
            .flatten()
            .filter(|p| p.as_str() != path)
            .cloned()
            .collect();
        history.insert(0, path.to_string());
        history.truncate(SAVED_PLATFORM_SLOTS);

        let mut slots: [Option<String>; SAVED_PLATFORM_SLOTS] = Default::default();
        for (slot, value) in slots.iter_mut().zip(history) {
            *slot = Some(value);
        }
        self.saved_platforms = slots;
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".tmp.{}", std::process::id()));
    path.with_file_name(name)
}
