//! Dependency-to-classpath resolution.
//!
//! The order of a computed classpath is:
//!
//! 1. the JRE container, EE-qualified when the bundle declares a known EE
//! 2. the required-plug-ins container (dynamic mode only)
//! 3. the project's own source folders and libraries
//! 4. dependencies (explicit mode only): host or fragments, imports, `additional.bundles`,
//!    `jars.extra.classpath`, implicit dependencies
//! 5. the `JRE_LIB` variable (explicit mode only)
//!
//! In dynamic mode step 4 is what the required-plug-ins container resolves to, see
//! [`ClasspathResolver::required_plugin_entries`].

use std::collections::HashSet;

use pde_core::{EntryPath, MatchRule, SYSTEM_BUNDLE_ID};
use pde_model::{DescriptorHandle, Library, PluginDescriptor};
use pde_properties::build::{BuildProperties, DEFAULT_LIBRARY};

use crate::context::{ClasspathContext, ResolveMode};
use crate::ee;
use crate::entry::{
    ClasspathEntry, EntryKind, JRE_LIB_VARIABLE, JRE_SRCROOT_VARIABLE, JRE_SRC_VARIABLE,
    REQUIRED_PLUGINS_CONTAINER, TEST_ATTRIBUTE,
};
use crate::java_model::JavaModel;
use crate::library::LibraryLocator;
use crate::set::{merge_with_previous, EntrySet};
use crate::validate::validate_classpath;
use crate::ClasspathError;

/// Bundles that never receive implicit dependencies.
pub fn is_implicit_exception(id: &str) -> bool {
    id.starts_with(SYSTEM_BUNDLE_ID)
        || matches!(
            id,
            "org.eclipse.core.runtime.adaptor"
                | "org.eclipse.core.runtime.compatibility"
                | "org.eclipse.core.runtime.osgi"
                | "org.eclipse.update.configurator"
        )
}

/// Adds the `test` attribute to every source entry that lacks it.
pub fn mark_test_sources(entries: &mut [ClasspathEntry]) {
    for entry in entries.iter_mut().filter(|e| e.kind == EntryKind::Source) {
        if entry.attribute(TEST_ATTRIBUTE).is_none() {
            entry.set_attribute(TEST_ATTRIBUTE, "true");
        }
    }
}

type Visited = HashSet<DescriptorHandle>;

pub struct ClasspathResolver<'a> {
    ctx: &'a ClasspathContext,
}

impl<'a> ClasspathResolver<'a> {
    pub fn new(ctx: &'a ClasspathContext) -> Self {
        Self { ctx }
    }

    fn locator(&self) -> LibraryLocator<'a> {
        LibraryLocator::new(self.ctx)
    }

    fn project_of<'p>(&self, plugin: &'p PluginDescriptor) -> Result<&'p str, ClasspathError> {
        let project = plugin.project().ok_or_else(|| ClasspathError::NotWorkspace {
            id: plugin.id.clone(),
        })?;
        if !self.ctx.workspace.is_open(project) {
            return Err(ClasspathError::ProjectUnavailable {
                project: project.to_string(),
            });
        }
        Ok(project)
    }

    /// The classpath for a fresh setup of `plugin`'s project.
    ///
    /// Entries the project's current raw classpath already has are kept verbatim.
    pub fn compute_classpath(
        &self,
        plugin: &PluginDescriptor,
        mode: ResolveMode,
    ) -> Result<Vec<ClasspathEntry>, ClasspathError> {
        let project = self.project_of(plugin)?;
        let existing = self.ctx.java.raw_classpath(project).unwrap_or_default();
        let mut set = EntrySet::with_existing(&existing);
        self.assemble(plugin, project, mode, &mut set);
        let mut entries = set.into_vec();
        if self.ctx.settings.is_test_plugin(project) {
            mark_test_sources(&mut entries);
        }
        tracing::debug!(
            target = "pde.classpath",
            project,
            mode = ?mode,
            entries = entries.len(),
            "computed classpath"
        );
        Ok(entries)
    }

    /// The classpath for a live update: the previous order is kept, matching entries are
    /// replaced by their recomputed form, new ones are appended.
    pub fn recompute_classpath(
        &self,
        plugin: &PluginDescriptor,
        mode: ResolveMode,
        previous: &[ClasspathEntry],
    ) -> Result<Vec<ClasspathEntry>, ClasspathError> {
        let project = self.project_of(plugin)?;
        let mut set = EntrySet::new();
        self.assemble(plugin, project, mode, &mut set);
        let mut entries = merge_with_previous(project, previous, set.into_vec());
        if self.ctx.settings.is_test_plugin(project) {
            mark_test_sources(&mut entries);
        }
        Ok(entries)
    }

    /// What the required-plug-ins container of `plugin` resolves to.
    pub fn required_plugin_entries(&self, plugin: &PluginDescriptor) -> Vec<ClasspathEntry> {
        let mut set = EntrySet::new();
        self.add_dependencies(plugin, false, &mut set);
        let entries = set.into_vec();
        tracing::trace!(
            target = "pde.classpath",
            plugin = %plugin.id,
            entries = entries.len(),
            "resolved required plug-ins"
        );
        entries
    }

    /// Computes, validates and writes the raw classpath of `project`.
    ///
    /// On a validation failure nothing is written and the project keeps its classpath.
    pub fn update_classpath(
        &self,
        project: &str,
        mode: ResolveMode,
    ) -> Result<Vec<ClasspathEntry>, ClasspathError> {
        let plugin = self.plugin_for(project)?;
        let entries = self.compute_classpath(&plugin, mode)?;
        self.write(project, &plugin, entries)
    }

    /// Like [`update_classpath`](Self::update_classpath) but merges into the current classpath.
    pub fn refresh_classpath(
        &self,
        project: &str,
        mode: ResolveMode,
    ) -> Result<Vec<ClasspathEntry>, ClasspathError> {
        let plugin = self.plugin_for(project)?;
        let entries = match self.ctx.java.raw_classpath(project) {
            Some(previous) if !previous.is_empty() => {
                self.recompute_classpath(&plugin, mode, &previous)?
            }
            _ => self.compute_classpath(&plugin, mode)?,
        };
        self.write(project, &plugin, entries)
    }

    fn plugin_for(
        &self,
        project: &str,
    ) -> Result<std::sync::Arc<PluginDescriptor>, ClasspathError> {
        self.ctx
            .universe
            .find_by_project(project)
            .filter(|plugin| plugin.loaded)
            .ok_or_else(|| ClasspathError::NoPlugin {
                project: project.to_string(),
            })
    }

    fn write(
        &self,
        project: &str,
        plugin: &PluginDescriptor,
        entries: Vec<ClasspathEntry>,
    ) -> Result<Vec<ClasspathEntry>, ClasspathError> {
        let java: &dyn JavaModel = self.ctx.java.as_ref();
        let output = java.output_location(project);
        if let Err(message) = validate_classpath(project, &entries, &output) {
            tracing::error!(
                target = "pde.classpath",
                project,
                error = %message,
                "computed classpath is invalid"
            );
            return Err(ClasspathError::Invalid {
                project: project.to_string(),
                message,
            });
        }

        let environment = plugin
            .execution_environments
            .first()
            .and_then(|id| ee::lookup(id));
        let mut options = java.compiler_options(project);
        if ee::apply_compliance(
            &mut options,
            environment,
            self.ctx.settings.override_compliance,
        ) {
            java.set_compiler_options(project, options)?;
        }

        java.set_raw_classpath(project, entries.clone())?;
        tracing::info!(
            target = "pde.classpath",
            project,
            entries = entries.len(),
            "classpath updated"
        );
        Ok(entries)
    }

    fn assemble(
        &self,
        plugin: &PluginDescriptor,
        project: &str,
        mode: ResolveMode,
        set: &mut EntrySet,
    ) {
        let environment = plugin.execution_environments.first().map(String::as_str);
        if environment.is_some_and(|id| ee::lookup(id).is_none()) {
            tracing::debug!(
                target = "pde.classpath",
                project,
                ee = environment.unwrap_or_default(),
                "unknown execution environment; using the default JRE"
            );
        }
        set.add(ClasspathEntry::container(ee::jre_container_path(environment)));

        let explicit = mode == ResolveMode::Explicit;
        if !explicit {
            set.add(ClasspathEntry::container(REQUIRED_PLUGINS_CONTAINER));
        }

        self.add_sources_and_libraries(plugin, project, explicit, set);

        if explicit {
            self.add_dependencies(plugin, true, set);
            set.add(ClasspathEntry::variable(
                JRE_LIB_VARIABLE,
                Some(EntryPath::new(JRE_SRC_VARIABLE)),
                Some(EntryPath::new(JRE_SRCROOT_VARIABLE)),
                false,
            ));
        }
    }

    fn build_properties(&self, plugin: &PluginDescriptor) -> Option<BuildProperties> {
        if plugin.is_jar() {
            return None;
        }
        match BuildProperties::load_from_dir(&plugin.install_location) {
            Ok(build) => build,
            Err(err) => {
                tracing::warn!(
                    target = "pde.classpath",
                    location = %plugin.install_location.display(),
                    error = %err,
                    "failed to read build.properties"
                );
                None
            }
        }
    }

    fn add_sources_and_libraries(
        &self,
        plugin: &PluginDescriptor,
        project: &str,
        relative: bool,
        set: &mut EntrySet,
    ) {
        let build = self.build_properties(plugin);
        if build.as_ref().is_some_and(BuildProperties::is_custom) {
            tracing::debug!(
                target = "pde.classpath",
                project,
                "custom build; skipping source and library inference"
            );
            return;
        }

        let mut libraries = plugin.libraries.clone();
        if libraries.is_empty() && build.as_ref().is_some_and(BuildProperties::has_default_source) {
            libraries.push(Library {
                name: DEFAULT_LIBRARY.to_string(),
                exported: true,
                source_annotation: None,
            });
        }

        for library in &libraries {
            if let Some(folders) = build.as_ref().and_then(|b| b.source_folders(&library.name)) {
                for folder in folders {
                    self.add_source_folder(project, folder, set);
                }
                continue;
            }
            if library.is_default() {
                if let Some(entry) = self.packaged_bundle_entry(plugin, project, library.exported) {
                    set.add(entry);
                }
                continue;
            }
            if let Some(entry) = self.locator().library_entry(plugin, library, false, relative) {
                set.add(entry);
            }
        }
    }

    fn add_source_folder(&self, project: &str, folder: &str, set: &mut EntrySet) {
        let path = EntryPath::workspace([project]).append(folder);
        if !self.ctx.workspace.file_exists(&path) {
            if let Err(err) = self.ctx.workspace.create_folder(&path) {
                tracing::warn!(
                    target = "pde.classpath",
                    path = %path,
                    error = %err,
                    "failed to create source folder"
                );
            }
        }
        set.add(ClasspathEntry::source(path));
    }

    /// The bundle's own packaged jar (`<id>_<version>.jar` or `<id>.jar` in the project root)
    /// standing in for the `.` library when it has no source folders.
    fn packaged_bundle_entry(
        &self,
        plugin: &PluginDescriptor,
        project: &str,
        exported: bool,
    ) -> Option<ClasspathEntry> {
        let mut names = Vec::with_capacity(2);
        if let Some(version) = &plugin.version {
            names.push(format!("{}_{version}", plugin.id));
        }
        names.push(plugin.id.clone());

        let root = EntryPath::workspace([project]);
        names.into_iter().find_map(|stem| {
            let jar = root.append(format!("{stem}.jar"));
            if !self.ctx.workspace.file_exists(&jar) {
                return None;
            }
            let zip = root.append(format!("{stem}src.zip"));
            let source = (self.ctx.settings.add_source_attachments
                && self.ctx.workspace.file_exists(&zip))
            .then_some(zip);
            Some(ClasspathEntry::library(jar, source, exported))
        })
    }

    /// Steps shared by explicit mode and the required-plug-ins container.
    fn add_dependencies(&self, plugin: &PluginDescriptor, relative: bool, set: &mut EntrySet) {
        let mut visited = Visited::new();
        visited.insert(plugin.handle);

        match plugin.host() {
            Some(host_ref) => {
                let host = self.ctx.universe.find_plugin(
                    &host_ref.id,
                    host_ref.version.as_deref(),
                    host_ref.rule,
                );
                match host {
                    Some(host) => self.add_host(&host, relative, set, &mut visited),
                    None => tracing::debug!(
                        target = "pde.classpath",
                        fragment = %plugin.id,
                        host = %host_ref.id,
                        "fragment host not found"
                    ),
                }
            }
            None => self.add_fragment_libraries(plugin, relative, set),
        }

        for import in &plugin.imports {
            let resolved =
                self.ctx
                    .universe
                    .find_plugin(&import.id, import.version.as_deref(), import.rule);
            match resolved {
                Some(dependency) => {
                    self.add_dependency(&dependency, import.reexported, relative, true, set, &mut visited)
                }
                None if self.ctx.settings.use_project_stand_ins => {
                    set.add(ClasspathEntry::project(
                        EntryPath::workspace([import.id.as_str()]),
                        import.reexported,
                    ));
                }
                None => tracing::debug!(
                    target = "pde.classpath",
                    plugin = %plugin.id,
                    dependency = %import.id,
                    optional = import.optional,
                    "dependency not found"
                ),
            }
        }

        let build = self.build_properties(plugin);
        if let Some(build) = &build {
            for id in build.additional_bundles() {
                if let Some(dependency) = self.ctx.universe.find_plugin(id, None, MatchRule::None) {
                    self.add_dependency(&dependency, false, relative, true, set, &mut visited);
                }
            }
            if let Some(project) = plugin.project() {
                for token in build.jars_extra_classpath() {
                    match self.extra_classpath_entry(project, token) {
                        Some(entry) => {
                            set.add(entry);
                        }
                        None => tracing::debug!(
                            target = "pde.classpath",
                            project,
                            token = %token,
                            "extra classpath entry does not resolve"
                        ),
                    }
                }
            }
        }

        self.add_implicit_dependencies(plugin, relative, set, &mut visited);
    }

    /// A fragment compiles against its host, which brings the host's re-exports, and against the
    /// host's remaining imports.
    fn add_host(
        &self,
        host: &PluginDescriptor,
        relative: bool,
        set: &mut EntrySet,
        visited: &mut Visited,
    ) {
        self.add_dependency(host, false, relative, false, set, visited);
        for import in host.imports.iter().filter(|i| !i.reexported) {
            if let Some(dependency) =
                self.ctx
                    .universe
                    .find_plugin(&import.id, import.version.as_deref(), import.rule)
            {
                self.add_dependency(&dependency, false, relative, true, set, visited);
            }
        }
    }

    /// A host sees its fragments' libraries, always exported. Patch fragments go first.
    fn add_fragment_libraries(&self, plugin: &PluginDescriptor, relative: bool, set: &mut EntrySet) {
        let mut fragments = self
            .ctx
            .universe
            .find_fragments_for(&plugin.id, plugin.version.as_deref());
        fragments.sort_by_key(|fragment| !fragment.patch_fragment);

        for fragment in fragments {
            if let Some(project) = fragment.project() {
                if self.has_source(&fragment) {
                    set.add(ClasspathEntry::project(EntryPath::workspace([project]), true));
                    continue;
                }
            }
            for library in &fragment.libraries {
                if let Some(entry) = self.locator().library_entry(&fragment, library, true, relative) {
                    set.add(entry);
                }
            }
        }
    }

    fn has_source(&self, plugin: &PluginDescriptor) -> bool {
        self.build_properties(plugin)
            .is_some_and(|build| build.libraries_with_source().next().is_some())
    }

    /// Adds `dependency` once per resolution, then the fragments of an extensible-API bundle
    /// and its re-exported imports. Patch fragments precede the bundle itself.
    fn add_dependency(
        &self,
        dependency: &PluginDescriptor,
        exported: bool,
        relative: bool,
        with_workspace_fragments: bool,
        set: &mut EntrySet,
        visited: &mut Visited,
    ) {
        if !visited.insert(dependency.handle) {
            return;
        }

        let fragments = if dependency.extensible_api {
            self.ctx
                .universe
                .find_fragments_for(&dependency.id, dependency.version.as_deref())
        } else {
            Vec::new()
        };

        for patch in fragments.iter().filter(|f| f.patch_fragment) {
            self.add_dependency(patch, exported, relative, with_workspace_fragments, set, visited);
        }

        self.add_plugin(dependency, exported, relative, with_workspace_fragments, set);

        for fragment in fragments.iter().filter(|f| !f.patch_fragment) {
            self.add_dependency(fragment, exported, relative, with_workspace_fragments, set, visited);
        }

        for import in dependency.imports.iter().filter(|i| i.reexported) {
            if let Some(next) =
                self.ctx
                    .universe
                    .find_plugin(&import.id, import.version.as_deref(), import.rule)
            {
                self.add_dependency(&next, exported, relative, true, set, visited);
            }
        }
    }

    /// The bundle's own contribution: a project reference for workspace bundles (plus their
    /// source-bearing workspace fragments), the libraries otherwise.
    fn add_plugin(
        &self,
        plugin: &PluginDescriptor,
        exported: bool,
        relative: bool,
        with_workspace_fragments: bool,
        set: &mut EntrySet,
    ) {
        let Some(project) = plugin.project() else {
            for library in &plugin.libraries {
                if let Some(entry) = self.locator().library_entry(plugin, library, exported, relative) {
                    set.add(entry);
                }
            }
            return;
        };

        set.add(ClasspathEntry::project(EntryPath::workspace([project]), exported));
        if !with_workspace_fragments {
            return;
        }
        for fragment in self
            .ctx
            .universe
            .find_fragments_for(&plugin.id, plugin.version.as_deref())
        {
            let Some(fragment_project) = fragment.project() else { continue };
            if self.has_source(&fragment) {
                set.add(ClasspathEntry::project(
                    EntryPath::workspace([fragment_project]),
                    exported,
                ));
            }
        }
    }

    fn add_implicit_dependencies(
        &self,
        plugin: &PluginDescriptor,
        relative: bool,
        set: &mut EntrySet,
        visited: &mut Visited,
    ) {
        if plugin.system_bundle || is_implicit_exception(&plugin.id) {
            return;
        }
        for id in &self.ctx.settings.implicit_dependencies {
            if *id == plugin.id {
                continue;
            }
            if let Some(dependency) = self.ctx.universe.find_plugin(id, None, MatchRule::None) {
                self.add_dependency(&dependency, false, relative, true, set, visited);
            }
        }
    }

    /// Resolves one `jars.extra.classpath` token.
    ///
    /// `platform:/plugin/<id>/<path>` names a file inside another bundle. `../<project>/<path>`
    /// names a workspace file and falls back to the bundle of that name. Anything else is
    /// relative to the project.
    fn extra_classpath_entry(&self, project: &str, token: &str) -> Option<ClasspathEntry> {
        let token = token.trim();
        if let Some(rest) = token.strip_prefix("platform:/plugin/") {
            return self.platform_plugin_entry(rest);
        }
        if let Some(rest) = token.strip_prefix("../") {
            let full = EntryPath::new(format!("/{rest}"));
            if full.segment_count() > 1 && self.ctx.workspace.file_exists(&full) {
                return Some(self.workspace_library(full));
            }
            return self.platform_plugin_entry(rest);
        }
        let full = EntryPath::workspace([project]).append(token);
        self.ctx
            .workspace
            .file_exists(&full)
            .then(|| self.workspace_library(full))
    }

    fn platform_plugin_entry(&self, rest: &str) -> Option<ClasspathEntry> {
        let (id, path) = rest.split_once('/')?;
        let plugin = self.ctx.universe.find_plugin(id, None, MatchRule::None)?;
        let locator = self.locator();
        let location = locator.library_path(&plugin, path)?;
        let source = locator.source_attachment(&plugin, path);
        Some(ClasspathEntry::library(location, source, false))
    }

    fn workspace_library(&self, full: EntryPath) -> ClasspathEntry {
        let source = self
            .ctx
            .settings
            .add_source_attachments
            .then(|| pde_model::loader::source_zip_name(full.as_str()))
            .flatten()
            .map(EntryPath::new)
            .filter(|zip| self.ctx.workspace.file_exists(zip));
        ClasspathEntry::library(full, source, false)
    }
}
