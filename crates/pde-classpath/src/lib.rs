//! Java classpath computation for plug-in projects.
//!
//! [`ClasspathResolver`] turns a plug-in descriptor and its dependencies into ordered classpath
//! entries and writes them through a [`JavaModel`]. Nothing here is global: every lookup goes
//! through an explicit [`ClasspathContext`].

mod context;
pub mod ee;
mod entry;
mod java_model;
mod library;
mod resolver;
mod set;
mod validate;

use thiserror::Error;

pub use context::{ClasspathContext, ClasspathSettings, ResolveMode};
pub use ee::{CompilerOptions, ExecutionEnvironment};
pub use entry::{
    AccessKind, AccessRule, ClasspathAttribute, ClasspathEntry, EntryKind, ECLIPSE_HOME_VARIABLE,
    JRE_LIB_VARIABLE, JRE_SRCROOT_VARIABLE, JRE_SRC_VARIABLE, REQUIRED_PLUGINS_CONTAINER,
    TEST_ATTRIBUTE,
};
pub use java_model::{ContainerUpdate, InMemoryJavaModel, JavaModel, JavaModelError};
pub use resolver::{is_implicit_exception, mark_test_sources, ClasspathResolver};
pub use set::{merge_with_previous, EntrySet};
pub use validate::validate_classpath;

#[derive(Debug, Error)]
pub enum ClasspathError {
    #[error("project `{project}` has no loaded plug-in descriptor")]
    NoPlugin { project: String },
    #[error("`{id}` is not a workspace plug-in")]
    NotWorkspace { id: String },
    #[error("project `{project}` is closed or missing")]
    ProjectUnavailable { project: String },
    #[error("invalid classpath for `{project}`: {message}")]
    Invalid { project: String, message: String },
    #[error(transparent)]
    JavaModel(#[from] JavaModelError),
}
