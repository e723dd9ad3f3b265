//! The `build.properties` model: named entries mapping to ordered token lists.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pde_core::TextRange;
use thiserror::Error;

use crate::parser::{self, Properties};

pub const FILE_NAME: &str = "build.properties";

/// Name of the implicit library that stands for the bundle root itself.
pub const DEFAULT_LIBRARY: &str = ".";

pub const SOURCE_PREFIX: &str = "source.";
pub const OUTPUT_PREFIX: &str = "output.";
pub const EXTRA_PREFIX: &str = "extra.";
pub const JAR_PREFIX: &str = "jar.";
pub const BIN_INCLUDES: &str = "bin.includes";
pub const CUSTOM: &str = "custom";
pub const JARS_EXTRA_CLASSPATH: &str = "jars.extra.classpath";
pub const ADDITIONAL_BUNDLES: &str = "additional.bundles";

#[derive(Debug, Error)]
pub enum BuildPropertiesError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One `name = token, token, ...` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEntry {
    pub name: String,
    pub tokens: Vec<String>,
    pub range: TextRange,
}

impl BuildEntry {
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildProperties {
    entries: Vec<BuildEntry>,
}

impl BuildProperties {
    pub fn parse(text: &str) -> Self {
        Self::from_properties(&parser::parse(text))
    }

    pub fn from_properties(props: &Properties) -> Self {
        let mut entries: Vec<BuildEntry> = Vec::with_capacity(props.entries.len());
        for property in props.iter() {
            let entry = BuildEntry {
                name: property.key.clone(),
                tokens: tokenize(&property.value),
                range: property.key_range,
            };
            match entries.iter_mut().find(|e| e.name == entry.name) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
        Self { entries }
    }

    /// Reads `<dir>/build.properties`. A missing file is `Ok(None)`.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>, BuildPropertiesError> {
        Self::load(&dir.join(FILE_NAME))
    }

    pub fn load(path: &Path) -> Result<Option<Self>, BuildPropertiesError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(Self::parse(&text))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(BuildPropertiesError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn entries(&self) -> &[BuildEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&BuildEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    fn tokens(&self, name: &str) -> &[String] {
        self.entry(name).map(|e| e.tokens.as_slice()).unwrap_or(&[])
    }

    /// `custom=true` turns off automatic source and library inference.
    pub fn is_custom(&self) -> bool {
        self.entry(CUSTOM)
            .is_some_and(|e| !e.tokens.iter().any(|t| t.eq_ignore_ascii_case("false")))
    }

    /// The `source.<library>` folders, or `None` when the library is binary.
    pub fn source_folders(&self, library: &str) -> Option<&[String]> {
        self.entry(&format!("{SOURCE_PREFIX}{library}"))
            .map(|e| e.tokens.as_slice())
    }

    pub fn output_folders(&self, library: &str) -> &[String] {
        self.tokens(&format!("{OUTPUT_PREFIX}{library}"))
    }

    pub fn has_default_source(&self) -> bool {
        self.source_folders(DEFAULT_LIBRARY).is_some()
    }

    /// Library names that have a `source.<library>` entry, in file order.
    pub fn libraries_with_source(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter_map(|e| e.name.strip_prefix(SOURCE_PREFIX))
    }

    pub fn bin_includes(&self) -> &[String] {
        self.tokens(BIN_INCLUDES)
    }

    pub fn jars_extra_classpath(&self) -> &[String] {
        self.tokens(JARS_EXTRA_CLASSPATH)
    }

    /// `extra.<library>` entries contributing additional compile-time jars.
    pub fn extra_classpath(&self, library: &str) -> &[String] {
        self.tokens(&format!("{EXTRA_PREFIX}{library}"))
    }

    /// Every `extra.*` entry, in file order.
    pub fn all_extra_classpath(&self) -> impl Iterator<Item = &BuildEntry> {
        self.entries
            .iter()
            .filter(|e| e.name.starts_with(EXTRA_PREFIX))
    }

    /// Secondary dependencies that are not declared in the manifest.
    pub fn additional_bundles(&self) -> &[String] {
        self.tokens(ADDITIONAL_BUNDLES)
    }

    /// Whether `library` is packaged (listed in `bin.includes` or built by a `jar.<library>` entry).
    pub fn packages_library(&self, library: &str) -> bool {
        self.bin_includes().iter().any(|t| t == library)
            || self.entry(&format!("{JAR_PREFIX}{library}")).is_some()
    }
}

fn tokenize(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
