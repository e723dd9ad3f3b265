//! Ordered, path-deduplicated entry accumulation.

use indexmap::IndexMap;

use crate::entry::{ClasspathEntry, EntryKind};

/// Insertion-ordered classpath under construction.
///
/// The first entry with a given [identity](ClasspathEntry::identity) wins; later ones are
/// dropped. When built over a project's existing classpath, an existing entry with the same
/// identity is taken verbatim instead of the synthesized one, so user-set attributes and access
/// rules survive recomputation.
#[derive(Debug, Default)]
pub struct EntrySet {
    entries: IndexMap<String, ClasspathEntry>,
    existing: IndexMap<String, ClasspathEntry>,
}

impl EntrySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(existing: &[ClasspathEntry]) -> Self {
        let mut set = Self::new();
        for entry in existing {
            set.existing
                .entry(entry.identity())
                .or_insert_with(|| entry.clone());
        }
        set
    }

    /// Returns `false` when an entry with the same identity is already present.
    pub fn add(&mut self, entry: ClasspathEntry) -> bool {
        let key = entry.identity();
        if self.entries.contains_key(&key) {
            return false;
        }
        let entry = match self.existing.get(&key) {
            Some(existing) if existing.kind == entry.kind => existing.clone(),
            _ => entry,
        };
        self.entries.insert(key, entry);
        true
    }

    pub fn contains(&self, entry: &ClasspathEntry) -> bool {
        self.entries.contains_key(&entry.identity())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClasspathEntry> {
        self.entries.values()
    }

    pub fn into_vec(self) -> Vec<ClasspathEntry> {
        self.entries.into_values().collect()
    }
}

/// Merges a recomputed classpath into the previous one.
///
/// Previous entries keep their order and are replaced in place by the recomputed entry with the
/// same identity. Entries that only exist in `fresh` are appended in production order. Previous
/// entries without a counterpart survive only when they are project-local source or library
/// entries of `project`; everything else was computed and is now stale.
pub fn merge_with_previous(
    project: &str,
    previous: &[ClasspathEntry],
    fresh: Vec<ClasspathEntry>,
) -> Vec<ClasspathEntry> {
    let mut fresh: IndexMap<String, ClasspathEntry> = fresh
        .into_iter()
        .map(|entry| (entry.identity(), entry))
        .collect();

    let mut merged = EntrySet::new();
    for old in previous {
        match fresh.shift_remove(&old.identity()) {
            Some(new) => {
                merged.add(new);
            }
            None if is_project_local(project, old) => {
                merged.add(old.clone());
            }
            None => {}
        }
    }
    for (_, entry) in fresh {
        merged.add(entry);
    }
    merged.into_vec()
}

fn is_project_local(project: &str, entry: &ClasspathEntry) -> bool {
    matches!(entry.kind, EntryKind::Source | EntryKind::Library)
        && entry.path.is_absolute()
        && entry.path.first_segment() == Some(project)
}
