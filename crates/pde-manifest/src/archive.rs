//! Reads descriptor files from a bundle location: an exploded directory or a packaged jar.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::ManifestError;

#[derive(Clone, Debug)]
pub struct BundleArchive {
    path: PathBuf,
}

impl BundleArchive {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a file from the bundle.
    ///
    /// Returns `Ok(None)` when the file isn't present.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>, ManifestError> {
        if self.path.is_dir() {
            let candidate = self.path.join(name);
            let mut buf = Vec::new();
            return match File::open(&candidate) {
                Ok(mut file) => {
                    file.read_to_end(&mut buf).map_err(|source| ManifestError::Io {
                        path: candidate.clone(),
                        source,
                    })?;
                    Ok(Some(buf))
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(source) => Err(ManifestError::Io {
                    path: candidate,
                    source,
                }),
            };
        }

        let file = File::open(&self.path).map_err(|source| ManifestError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut zip = ZipArchive::new(file).map_err(|source| ManifestError::Zip {
            path: self.path.clone(),
            source,
        })?;
        let result = match zip.by_name(name) {
            Ok(mut entry) => {
                let mut buf = Vec::new();
                entry
                    .read_to_end(&mut buf)
                    .map_err(|source| ManifestError::Io {
                        path: self.path.join(name),
                        source,
                    })?;
                Ok(Some(buf))
            }
            Err(zip::result::ZipError::FileNotFound) => Ok(None),
            Err(source) => Err(ManifestError::Zip {
                path: self.path.clone(),
                source,
            }),
        };
        result
    }

    pub fn read_string(&self, name: &str) -> Result<Option<String>, ManifestError> {
        Ok(self
            .read(name)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}
