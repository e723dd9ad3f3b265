//! `${name}` substitution in target locations.

use std::path::{Path, PathBuf};

use crate::TargetError;

pub const ECLIPSE_HOME: &str = "eclipse_home";
pub const WORKSPACE_LOC: &str = "workspace_loc";
pub const USER_HOME: &str = "user.home";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableResolver {
    pub eclipse_home: Option<PathBuf>,
    pub workspace_loc: Option<PathBuf>,
    pub user_home: Option<PathBuf>,
}

impl VariableResolver {
    /// Resolver for a workspace, with the user's home directory from the OS.
    pub fn new(eclipse_home: Option<PathBuf>, workspace_root: &Path) -> Self {
        Self {
            eclipse_home,
            workspace_loc: Some(workspace_root.to_path_buf()),
            user_home: dirs::home_dir(),
        }
    }

    fn value(&self, name: &str) -> Option<&Path> {
        match name {
            ECLIPSE_HOME => self.eclipse_home.as_deref(),
            WORKSPACE_LOC => self.workspace_loc.as_deref(),
            USER_HOME => self.user_home.as_deref(),
            _ => None,
        }
    }

    /// Replaces every `${name}` in `raw`. Unknown or unset variables are an error; an unclosed
    /// `${` is kept literally.
    pub fn substitute(&self, raw: &str) -> Result<String, TargetError> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };
            let name = &after[..end];
            let value = self
                .value(name)
                .ok_or_else(|| TargetError::UnresolvedVariable {
                    name: name.to_string(),
                    location: raw.to_string(),
                })?;
            out.push_str(&value.to_string_lossy());
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Resolves an additional location. An unresolvable variable keeps the raw string.
    pub fn substitute_lenient(&self, raw: &str) -> String {
        match self.substitute(raw) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!(
                    target = "pde.target",
                    location = raw,
                    error = %err,
                    "keeping unresolved additional location"
                );
                raw.to_string()
            }
        }
    }
}
