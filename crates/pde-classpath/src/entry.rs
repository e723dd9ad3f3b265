//! Classpath entries as the Java tooling consumes them.

use std::fmt;

use pde_core::EntryPath;
use serde::{Deserialize, Serialize};

use crate::ee::JRE_CONTAINER;

/// Container id of the dynamic "required plug-ins" container.
pub const REQUIRED_PLUGINS_CONTAINER: &str = "org.eclipse.pde.core.requiredPlugins";

pub const JRE_LIB_VARIABLE: &str = "JRE_LIB";
pub const JRE_SRC_VARIABLE: &str = "JRE_SRC";
pub const JRE_SRCROOT_VARIABLE: &str = "JRE_SRCROOT";
pub const ECLIPSE_HOME_VARIABLE: &str = "ECLIPSE_HOME";

/// Attribute marking a source folder as test code.
pub const TEST_ATTRIBUTE: &str = "test";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Source,
    Library,
    Project,
    Container,
    Variable,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Source => "src",
            EntryKind::Library => "lib",
            EntryKind::Project => "project",
            EntryKind::Container => "con",
            EntryKind::Variable => "var",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    Accessible,
    Discouraged,
    NonAccessible,
}

/// A package-pattern visibility rule such as `org/acme/internal/*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessRule {
    pub pattern: String,
    pub kind: AccessKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClasspathAttribute {
    pub name: String,
    pub value: String,
}

/// One raw classpath entry.
///
/// Source and project paths are workspace full paths (`/<project>/...`). Library paths are
/// workspace full paths or absolute file-system paths. Variable and container paths start with
/// the variable or container id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClasspathEntry {
    pub kind: EntryKind,
    pub path: EntryPath,
    pub source_attachment: Option<EntryPath>,
    pub source_root: Option<EntryPath>,
    pub exported: bool,
    pub attributes: Vec<ClasspathAttribute>,
    pub access_rules: Vec<AccessRule>,
}

impl ClasspathEntry {
    fn new(kind: EntryKind, path: EntryPath) -> Self {
        Self {
            kind,
            path,
            source_attachment: None,
            source_root: None,
            exported: false,
            attributes: Vec::new(),
            access_rules: Vec::new(),
        }
    }

    pub fn source(path: impl Into<EntryPath>) -> Self {
        Self::new(EntryKind::Source, path.into())
    }

    pub fn library(path: impl Into<EntryPath>, source: Option<EntryPath>, exported: bool) -> Self {
        Self {
            source_attachment: source,
            exported,
            ..Self::new(EntryKind::Library, path.into())
        }
    }

    pub fn project(path: impl Into<EntryPath>, exported: bool) -> Self {
        Self {
            exported,
            ..Self::new(EntryKind::Project, path.into())
        }
    }

    pub fn container(path: impl Into<EntryPath>) -> Self {
        Self::new(EntryKind::Container, path.into())
    }

    pub fn variable(
        path: impl Into<EntryPath>,
        source: Option<EntryPath>,
        source_root: Option<EntryPath>,
        exported: bool,
    ) -> Self {
        Self {
            source_attachment: source,
            source_root,
            exported,
            ..Self::new(EntryKind::Variable, path.into())
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Adds or replaces an attribute; other attributes keep their place.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value.to_string(),
            None => self.attributes.push(ClasspathAttribute {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// The dedup key: kind-independent path, with JRE containers reduced to their id so that
    /// an EE-qualified and an unqualified JRE container collide.
    pub fn identity(&self) -> String {
        identity_of(&self.path, self.kind)
    }
}

pub(crate) fn identity_of(path: &EntryPath, kind: EntryKind) -> String {
    if kind == EntryKind::Container && path.first_segment() == Some(JRE_CONTAINER) {
        return JRE_CONTAINER.to_string();
    }
    path.as_str().to_string()
}

impl fmt::Display for ClasspathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.path)?;
        if let Some(source) = &self.source_attachment {
            write!(f, " [src {source}]")?;
        }
        if self.exported {
            f.write_str(" (exported)")?;
        }
        for attribute in &self.attributes {
            write!(f, " {}={}", attribute.name, attribute.value)?;
        }
        Ok(())
    }
}
