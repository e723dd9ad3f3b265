use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Lists the direct children of `dir` in file-name order.
///
/// Missing directories are treated as empty.
pub fn read_dir_sorted(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut out = Vec::new();
    for entry in entries {
        out.push(entry?.path());
    }
    out.sort();
    Ok(out)
}

/// Returns `path` if it exists on disk.
pub fn existing(path: PathBuf) -> Option<PathBuf> {
    path.exists().then_some(path)
}

/// `foo.jar` -> `foo`, `foo` -> `foo`.
pub fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

pub fn is_jar(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("jar"))
}
