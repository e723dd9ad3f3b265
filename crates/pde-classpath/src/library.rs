//! Finding libraries and their source archives on disk.
//!
//! Every lookup here is an explicit existence check that yields `None` when nothing resolves.

use std::sync::Arc;

use pde_core::EntryPath;
use pde_model::{Library, PluginDescriptor};

use crate::context::ClasspathContext;
use crate::entry::{ClasspathEntry, ECLIPSE_HOME_VARIABLE};

pub(crate) struct LibraryLocator<'a> {
    ctx: &'a ClasspathContext,
}

impl<'a> LibraryLocator<'a> {
    pub(crate) fn new(ctx: &'a ClasspathContext) -> Self {
        Self { ctx }
    }

    /// The classpath path of `name` inside `plugin`, if it exists.
    ///
    /// Workspace bundles give workspace full paths, external ones absolute paths. The `.`
    /// library of a jar-packaged bundle is the jar itself; a workspace project's `.` library has
    /// no path of its own.
    pub(crate) fn library_path(&self, plugin: &PluginDescriptor, name: &str) -> Option<EntryPath> {
        match plugin.project() {
            Some(project) => {
                if name == pde_properties::build::DEFAULT_LIBRARY {
                    return None;
                }
                let full = EntryPath::workspace([project]).append(name);
                self.ctx.workspace.file_exists(&full).then_some(full)
            }
            None if plugin.is_jar() => (name == pde_properties::build::DEFAULT_LIBRARY)
                .then(|| EntryPath::from_path(&plugin.install_location)),
            None => pde_core::fs::existing(plugin.install_location.join(name))
                .map(|path| EntryPath::from_path(&path)),
        }
    }

    /// The sibling source archive of `name`: `lib/x.jar` has `lib/xsrc.zip`, the `.` library of
    /// a jar-packaged bundle has `<bundle-stem>src.zip` next to the jar.
    pub(crate) fn source_attachment(
        &self,
        plugin: &PluginDescriptor,
        name: &str,
    ) -> Option<EntryPath> {
        if !self.ctx.settings.add_source_attachments {
            return None;
        }
        if name == pde_properties::build::DEFAULT_LIBRARY && plugin.is_jar() {
            let stem = pde_core::fs::file_stem(&plugin.install_location)?;
            let zip = plugin
                .install_location
                .with_file_name(format!("{stem}src.zip"));
            return pde_core::fs::existing(zip).map(|path| EntryPath::from_path(&path));
        }
        let annotated = plugin
            .libraries
            .iter()
            .find(|library| library.name == name)
            .and_then(|library| library.source_annotation.as_deref());
        if let Some(path) = annotated.and_then(|zip| self.library_path(plugin, zip)) {
            return Some(path);
        }
        let zip = pde_model::loader::source_zip_name(name)?;
        self.library_path(plugin, &zip)
    }

    /// First fragment of `host` that contains `name`.
    pub(crate) fn resolve_in_fragments(
        &self,
        host: &PluginDescriptor,
        name: &str,
    ) -> Option<Arc<PluginDescriptor>> {
        self.ctx
            .universe
            .find_fragments_for(&host.id, host.version.as_deref())
            .into_iter()
            .find(|fragment| self.library_path(fragment, name).is_some())
    }

    /// Builds the entry for one declared library of `plugin`.
    ///
    /// A library missing from a host is looked up in its fragments. With `relative`, libraries
    /// of external bundles under `ECLIPSE_HOME` become variable entries.
    pub(crate) fn library_entry(
        &self,
        plugin: &PluginDescriptor,
        library: &Library,
        force_export: bool,
        relative: bool,
    ) -> Option<ClasspathEntry> {
        let name = self
            .ctx
            .settings
            .environment
            .expand_library_name(&library.name);
        let exported = force_export || library.exported;

        let fragment;
        let (owner, path): (&PluginDescriptor, EntryPath) = match self.library_path(plugin, &name) {
            Some(path) => (plugin, path),
            None => {
                if plugin.is_fragment() {
                    return None;
                }
                fragment = self.resolve_in_fragments(plugin, &name)?;
                let path = self.library_path(&fragment, &name)?;
                (&*fragment, path)
            }
        };
        let source = self.source_attachment(owner, &name);

        if relative && !owner.is_workspace() {
            if let Some(variable) = self.eclipse_relative(&path) {
                let source = source.map(|s| self.eclipse_relative(&s).unwrap_or(s));
                return Some(ClasspathEntry::variable(variable, source, None, exported));
            }
        }
        Some(ClasspathEntry::library(path, source, exported))
    }

    /// `ECLIPSE_HOME/<rest>` for a path under the configured platform home.
    pub(crate) fn eclipse_relative(&self, path: &EntryPath) -> Option<EntryPath> {
        let home = EntryPath::from_path(self.ctx.settings.eclipse_home.as_deref()?);
        if !home.is_prefix_of(path) {
            return None;
        }
        let rest = path.remove_first_segments(home.segment_count());
        Some(EntryPath::new(ECLIPSE_HOME_VARIABLE).append(rest.as_str()))
    }
}
