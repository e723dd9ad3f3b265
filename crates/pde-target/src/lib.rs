//! Target platform handling: target definitions, the persisted target preferences, switching
//! the active target ([`LoadTargetOperation`]) and dev-mode weaving ([`TargetWeaver`]).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub mod definition;
mod load;
pub mod preferences;
pub mod variables;
pub mod weaver;

pub use definition::{
    TargetArguments, TargetDefinition, TargetEnvironmentSpec, TargetFeature, TargetLocation,
    TargetPlugin,
};
pub use load::{LoadTargetOperation, LoadTargetReport};
pub use preferences::{CheckedPlugins, TargetMode, TargetPreferences, SAVED_PLATFORM_SLOTS};
pub use variables::VariableResolver;
pub use weaver::{DevProperties, RunningPlatform, TargetWeaver};

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed target definition {path}: {source}")]
    Definition {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("malformed target preferences {path}: {source}")]
    Preferences {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot resolve `${{{name}}}` in target location `{location}`")]
    UnresolvedVariable { name: String, location: String },
    #[error("the target uses the default location but no eclipse home is configured")]
    NoDefaultLocation,
    #[error(transparent)]
    Manifest(#[from] pde_manifest::ManifestError),
}
