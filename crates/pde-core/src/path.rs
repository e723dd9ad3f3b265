use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A portable, `/`-separated path as stored in classpath entries.
///
/// Workspace-relative paths are "full paths" starting with `/<project>`. External paths are
/// absolute file-system paths. Variable and container paths start with the variable or
/// container id (`JRE_LIB`, `org.eclipse.pde.core.requiredPlugins`).
///
/// The stored string is normalized. Backslashes become `/`. Repeated separators and `.`
/// segments are dropped, `..` is folded where possible, and trailing separators are removed.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryPath(String);

impl EntryPath {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize(raw.as_ref()))
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(path.to_string_lossy())
    }

    /// Builds `/<segment>/<segment>...`.
    pub fn workspace<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        let mut out = String::new();
        for segment in segments {
            out.push('/');
            out.push_str(segment);
        }
        if out.is_empty() {
            out.push('/');
        }
        Self::new(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/') || has_device(&self.0)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        let body = self.0.strip_prefix('/').unwrap_or(&self.0);
        body.split('/').filter(|s| !s.is_empty())
    }

    pub fn segment_count(&self) -> usize {
        self.segments().count()
    }

    pub fn segment(&self, idx: usize) -> Option<&str> {
        self.segments().nth(idx)
    }

    pub fn first_segment(&self) -> Option<&str> {
        self.segments().next()
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments().last()
    }

    pub fn file_extension(&self) -> Option<&str> {
        let last = self.last_segment()?;
        let (stem, ext) = last.rsplit_once('.')?;
        (!stem.is_empty()).then_some(ext)
    }

    pub fn append(&self, relative: impl AsRef<str>) -> Self {
        let relative = relative.as_ref();
        if self.0.is_empty() {
            return Self::new(relative);
        }
        Self::new(format!("{}/{}", self.0, relative))
    }

    pub fn remove_first_segments(&self, count: usize) -> Self {
        let rest: Vec<&str> = self.segments().skip(count).collect();
        Self::new(rest.join("/"))
    }

    pub fn remove_last_segments(&self, count: usize) -> Self {
        let segments: Vec<&str> = self.segments().collect();
        let keep = segments.len().saturating_sub(count);
        let joined = segments[..keep].join("/");
        if self.0.starts_with('/') {
            Self::new(format!("/{joined}"))
        } else {
            Self::new(joined)
        }
    }

    /// Segment-wise prefix test: `/a/b` is a prefix of `/a/b/c` but not of `/a/bc`.
    pub fn is_prefix_of(&self, other: &EntryPath) -> bool {
        if self.0.starts_with('/') != other.0.starts_with('/') {
            return false;
        }
        let mut theirs = other.segments();
        self.segments().all(|mine| theirs.next() == Some(mine))
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl fmt::Debug for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntryPath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&Path> for EntryPath {
    fn from(value: &Path) -> Self {
        Self::from_path(value)
    }
}

impl AsRef<str> for EntryPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn has_device(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn normalize(raw: &str) -> String {
    let raw = raw.trim().replace('\\', "/");
    let absolute = raw.starts_with('/');

    let mut out: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => match out.last() {
                Some(&last) if last != ".." && !(out.len() == 1 && has_device(last)) => {
                    out.pop();
                }
                _ if absolute => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }

    let joined = out.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}
