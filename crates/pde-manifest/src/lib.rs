//! Bundle descriptor reading.
//!
//! A bundle location is either an exploded directory or a packaged jar. Its description comes
//! from `META-INF/MANIFEST.MF` when present, otherwise from a legacy `plugin.xml` or
//! `fragment.xml`.

mod archive;
pub mod bundle;
pub mod header;
mod manifest;
mod plugin_xml;

use std::io;
use std::path::{Path, PathBuf};

pub use archive::BundleArchive;
pub use bundle::{
    execution_environment_from_filter, BundleDescription, DescriptorFormat, HostSpec, LibrarySpec,
    RequireSpec, VersionRange,
};
pub use header::{parse_clauses, Clause};
pub use manifest::{Manifest, ManifestParseError};
pub use plugin_xml::{parse_plugin_xml, FRAGMENT_XML, PLUGIN_XML};

use thiserror::Error;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("malformed manifest in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ManifestParseError,
    },
    #[error("malformed descriptor {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
    #[error("{path} does not declare a bundle symbolic name")]
    MissingSymbolicName { path: PathBuf },
}

/// Reads the raw manifest of a bundle location. `Ok(None)` if there is none.
pub fn load_manifest(location: &Path) -> Result<Option<Manifest>, ManifestError> {
    let archive = BundleArchive::new(location);
    let Some(text) = archive.read_string(MANIFEST_PATH)? else {
        return Ok(None);
    };
    Manifest::parse(&text)
        .map(Some)
        .map_err(|source| ManifestError::Parse {
            path: location.join(MANIFEST_PATH),
            source,
        })
}

/// Loads the bundle description at `location`.
///
/// Returns `Ok(None)` when the location carries no descriptor at all. A descriptor that exists
/// but cannot be understood is an error.
pub fn load_bundle(location: &Path) -> Result<Option<BundleDescription>, ManifestError> {
    if let Some(manifest) = load_manifest(location)? {
        return BundleDescription::from_manifest(&manifest)
            .map(Some)
            .ok_or_else(|| ManifestError::MissingSymbolicName {
                path: location.join(MANIFEST_PATH),
            });
    }

    let archive = BundleArchive::new(location);
    for name in [PLUGIN_XML, FRAGMENT_XML] {
        let Some(text) = archive.read_string(name)? else {
            continue;
        };
        let path = location.join(name);
        return match parse_plugin_xml(&text) {
            Ok(Some(bundle)) => Ok(Some(bundle)),
            Ok(None) => Err(ManifestError::MissingSymbolicName { path }),
            Err(source) => Err(ManifestError::Xml { path, source }),
        };
    }

    tracing::trace!(
        target = "pde.manifest",
        location = %location.display(),
        "no bundle descriptor found"
    );
    Ok(None)
}

/// Whether `location` looks like it carries a bundle descriptor, without parsing it.
pub fn has_descriptor(location: &Path) -> bool {
    if location.is_dir() {
        return [MANIFEST_PATH, PLUGIN_XML, FRAGMENT_XML]
            .iter()
            .any(|name| location.join(name).is_file());
    }
    pde_core::fs::is_jar(location)
}
