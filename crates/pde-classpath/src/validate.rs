//! Consistency check run before a raw classpath is written.

use std::collections::HashSet;

use pde_core::EntryPath;

use crate::entry::{ClasspathEntry, EntryKind};

/// Checks `entries` against the project and its output location.
///
/// Returns the first problem found as a human-readable message.
pub fn validate_classpath(
    project: &str,
    entries: &[ClasspathEntry],
    output_location: &EntryPath,
) -> Result<(), String> {
    if output_location.first_segment() != Some(project) || !output_location.is_absolute() {
        return Err(format!(
            "output location {output_location} is not inside project {project}"
        ));
    }

    let mut seen = HashSet::new();
    let mut sources: Vec<&EntryPath> = Vec::new();
    for entry in entries {
        if entry.path.is_empty() {
            return Err(format!("{} entry has an empty path", entry.kind.as_str()));
        }
        if !seen.insert(entry.identity()) {
            return Err(format!("duplicate classpath entry {}", entry.path));
        }
        match entry.kind {
            EntryKind::Source => {
                if !entry.path.is_absolute() || entry.path.first_segment() != Some(project) {
                    return Err(format!(
                        "source folder {} is not inside project {project}",
                        entry.path
                    ));
                }
                sources.push(&entry.path);
            }
            EntryKind::Project => {
                if !entry.path.is_absolute() || entry.path.segment_count() != 1 {
                    return Err(format!("invalid project reference {}", entry.path));
                }
                if entry.path.first_segment() == Some(project) {
                    return Err(format!("project {project} cannot reference itself"));
                }
            }
            EntryKind::Library => {
                if !entry.path.is_absolute() {
                    return Err(format!("library path {} must be absolute", entry.path));
                }
            }
            EntryKind::Container | EntryKind::Variable => {
                if entry.path.is_absolute() {
                    return Err(format!(
                        "{} path {} must start with its id",
                        entry.kind.as_str(),
                        entry.path
                    ));
                }
            }
        }
    }

    for (i, outer) in sources.iter().enumerate() {
        for inner in sources.iter().skip(i + 1) {
            if outer.is_prefix_of(inner) || inner.is_prefix_of(outer) {
                return Err(format!("cannot nest source folders {outer} and {inner}"));
            }
        }
        if *outer != output_location && outer.is_prefix_of(output_location) {
            return Err(format!(
                "cannot nest output folder {output_location} inside source folder {outer}"
            ));
        }
        if output_location.is_prefix_of(outer) && *outer != output_location {
            return Err(format!(
                "cannot nest source folder {outer} inside output folder {output_location}"
            ));
        }
    }

    Ok(())
}
