//! Workspace configuration (`pde.toml`) and process-wide tracing setup.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once, OnceLock};
use std::time::Duration;

use pde_core::TargetEnvironment;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

mod validation;

/// Configuration for one PDE workspace.
///
/// Every section is optional; a missing file or section means defaults.
///
/// ```toml
/// [logging]
/// level = "pde.classpath=debug,info"
///
/// [classpath]
/// test_plugin_pattern = '.*\.tests?$'
/// use_project_stand_ins = true
///
/// [container]
/// state_dir = ".pde/containers"
/// vm_change_debounce_ms = 200
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub classpath: ClasspathConfig,

    #[serde(default)]
    pub container: ContainerConfig,

    #[serde(default)]
    pub target: TargetConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A simple level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to this file. If it cannot be opened the other sinks stay active.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective filter. `RUST_LOG`, when set, takes precedence over the configured level.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        match env_directives {
            Some(env_directives) => tracing_subscriber::EnvFilter::try_new(env_directives)
                .unwrap_or_else(|_| self.config_env_filter()),
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

/// Classpath computation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClasspathConfig {
    /// Projects whose name matches this regex get their source folders marked as test sources.
    #[serde(default)]
    pub test_plugin_pattern: Option<String>,

    /// Overwrite compiler compliance options the project already pinned.
    #[serde(default)]
    pub override_compliance: bool,

    /// Emit a placeholder project reference for dependencies that do not resolve.
    #[serde(default)]
    pub use_project_stand_ins: bool,

    /// Attach sibling `*src.zip` archives as library sources.
    #[serde(default = "ClasspathConfig::default_add_source_attachments")]
    pub add_source_attachments: bool,

    /// Bundles every plug-in depends on without declaring it.
    #[serde(default = "ClasspathConfig::default_implicit_dependencies")]
    pub implicit_dependencies: Vec<String>,
}

impl ClasspathConfig {
    fn default_add_source_attachments() -> bool {
        true
    }

    fn default_implicit_dependencies() -> Vec<String> {
        vec!["org.eclipse.core.runtime".to_owned()]
    }

    /// The compiled test-plugin pattern. Invalid patterns are rejected by
    /// [`PdeConfig::validate`], so a config that passed validation never yields `None` here for a
    /// configured pattern.
    pub fn test_plugin_regex(&self) -> Option<regex::Regex> {
        let pattern = self.test_plugin_pattern.as_deref()?.trim();
        if pattern.is_empty() {
            return None;
        }
        regex::Regex::new(&format!("^(?:{pattern})$")).ok()
    }
}

impl Default for ClasspathConfig {
    fn default() -> Self {
        Self {
            test_plugin_pattern: None,
            override_compliance: false,
            use_project_stand_ins: false,
            add_source_attachments: Self::default_add_source_attachments(),
            implicit_dependencies: Self::default_implicit_dependencies(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfig {
    /// Snapshot directory. Relative paths are resolved against the workspace root.
    #[serde(default = "ContainerConfig::default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "ContainerConfig::default_vm_change_debounce_ms")]
    pub vm_change_debounce_ms: u64,

    #[serde(default)]
    pub compress_snapshots: bool,
}

impl ContainerConfig {
    fn default_state_dir() -> PathBuf {
        PathBuf::from(".pde/containers")
    }

    fn default_vm_change_debounce_ms() -> u64 {
        200
    }

    pub fn vm_change_debounce(&self) -> Duration {
        Duration::from_millis(self.vm_change_debounce_ms)
    }

    pub fn state_dir_for(&self, workspace_root: &Path) -> PathBuf {
        if self.state_dir.is_absolute() {
            self.state_dir.clone()
        } else {
            workspace_root.join(&self.state_dir)
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            state_dir: Self::default_state_dir(),
            vm_change_debounce_ms: Self::default_vm_change_debounce_ms(),
            compress_snapshots: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Root of the running platform; `ECLIPSE_HOME` in explicit-mode classpaths.
    #[serde(default)]
    pub eclipse_home: Option<PathBuf>,

    #[serde(default)]
    pub os: Option<String>,

    #[serde(default)]
    pub ws: Option<String>,

    #[serde(default)]
    pub arch: Option<String>,

    #[serde(default)]
    pub nl: Option<String>,
}

impl TargetConfig {
    /// The host environment with the configured overrides applied.
    pub fn environment(&self) -> TargetEnvironment {
        let mut env = TargetEnvironment::current();
        if let Some(os) = &self.os {
            env.os = os.clone();
        }
        if let Some(ws) = &self.ws {
            env.ws = ws.clone();
        }
        if let Some(arch) = &self.arch {
            env.arch = arch.clone();
        }
        if let Some(nl) = &self.nl {
            env.nl = nl.clone();
        }
        env
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for `{key}`: {message}")]
    InvalidValue { key: &'static str, message: String },
}

impl PdeConfig {
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config: PdeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }
}

pub const PDE_CONFIG_ENV_VAR: &str = "PDE_CONFIG_PATH";

/// Find the configuration file for a workspace root.
///
/// Search order:
/// 1) `PDE_CONFIG_PATH` (absolute or relative to `workspace_root`)
/// 2) `pde.toml`
/// 3) `.pde.toml`
/// 4) `.pde/config.toml`
pub fn discover_config_path(workspace_root: &Path) -> Option<PathBuf> {
    if let Some(value) = std::env::var_os(PDE_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            workspace_root.join(candidate)
        };
        return Some(path);
    }

    ["pde.toml", ".pde.toml", ".pde/config.toml"]
        .into_iter()
        .map(|name| workspace_root.join(name))
        .find(|path| path.is_file())
}

/// Load the configuration for a workspace root.
///
/// Without a config file this returns [`PdeConfig::default`] and `None`.
pub fn load_for_workspace(workspace_root: &Path) -> Result<(PdeConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(workspace_root) else {
        return Ok((PdeConfig::default(), None));
    };
    let config = PdeConfig::load_from_path(&path)?;
    tracing::debug!(target = "pde.config", path = %path.display(), "loaded workspace config");
    Ok((config, Some(path)))
}

struct MutexFileMakeWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl<'a> MakeWriter<'a> for MutexFileMakeWriter {
    type Writer = MutexFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        MutexFileWriter {
            guard: self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
        }
    }
}

struct MutexFileWriter<'a> {
    guard: std::sync::MutexGuard<'a, std::fs::File>,
}

impl Write for MutexFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guard.flush()
    }
}

static TRACING_INIT: Once = Once::new();
static TRACING_INSTALLED: OnceLock<bool> = OnceLock::new();

/// Installs the global `tracing` subscriber.
///
/// Safe to call more than once; only the first call has an effect. Returns whether a subscriber
/// is installed by this module (another crate may have installed its own first).
pub fn init_tracing(config: &LoggingConfig) -> bool {
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();

        let file = config
            .file
            .as_ref()
            .and_then(|path| {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .ok()
            })
            .map(|file| Arc::new(Mutex::new(file)));
        let file_failed = config.file.is_some() && file.is_none();

        let mut make_writer = BoxMakeWriter::new(io::sink);
        if config.stderr {
            make_writer = BoxMakeWriter::new(make_writer.and(io::stderr));
        }
        if let Some(file) = file {
            make_writer = BoxMakeWriter::new(make_writer.and(MutexFileMakeWriter { file }));
        }

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        };

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .is_ok();
        let _ = TRACING_INSTALLED.set(installed);

        if file_failed {
            if let Some(path) = &config.file {
                tracing::warn!(
                    target = "pde.config",
                    path = %path.display(),
                    "failed to open log file; file logging disabled"
                );
            }
        }
    });
    TRACING_INSTALLED.get().copied().unwrap_or(false)
}
