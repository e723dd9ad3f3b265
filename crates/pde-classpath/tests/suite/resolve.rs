use pde_classpath::ee::{self, JRE_CONTAINER};
use pde_classpath::{
    ClasspathEntry, ClasspathError, ClasspathResolver, EntryKind, JavaModel, ResolveMode,
    JRE_LIB_VARIABLE, JRE_SRCROOT_VARIABLE, JRE_SRC_VARIABLE, REQUIRED_PLUGINS_CONTAINER,
    TEST_ATTRIBUTE,
};
use pde_core::{EntryPath, MatchRule};
use pde_model::{HostRef, Import, Library};
use pretty_assertions::assert_eq;
use regex::Regex;

use super::fixture::Fixture;

fn jre_lib() -> ClasspathEntry {
    ClasspathEntry::variable(
        JRE_LIB_VARIABLE,
        Some(EntryPath::new(JRE_SRC_VARIABLE)),
        Some(EntryPath::new(JRE_SRCROOT_VARIABLE)),
        false,
    )
}

fn acme(fx: &Fixture) {
    let mut import = Import::new("com.acme.util");
    import.version = Some("1.0.0".to_string());
    import.rule = MatchRule::Compatible;
    let core = fx
        .project("com.acme.core", Some("1.0.0"))
        .with_library(".")
        .with_import(import);
    fx.write_build_properties("com.acme.core", "source.. = src/\nbin.includes = .\n");
    fx.universe.put_workspace(core);
    fx.universe
        .put_workspace(fx.project("com.acme.util", Some("1.0.5")));
}

#[test]
fn acme_dynamic_mode() {
    let fx = Fixture::new();
    acme(&fx);
    let ctx = fx.ctx();
    let resolver = ClasspathResolver::new(&ctx);
    let core = fx.universe.find_by_project("com.acme.core").unwrap();

    let entries = resolver.compute_classpath(&core, ResolveMode::Dynamic).unwrap();
    assert_eq!(
        entries,
        vec![
            ClasspathEntry::container(JRE_CONTAINER),
            ClasspathEntry::container(REQUIRED_PLUGINS_CONTAINER),
            ClasspathEntry::source("/com.acme.core/src"),
        ]
    );
    assert!(fx.ws_root().join("com.acme.core/src").is_dir());

    assert_eq!(
        resolver.required_plugin_entries(&core),
        vec![ClasspathEntry::project("/com.acme.util", false)]
    );
}

#[test]
fn acme_explicit_mode() {
    let fx = Fixture::new();
    acme(&fx);
    let ctx = fx.ctx();
    let core = fx.universe.find_by_project("com.acme.core").unwrap();

    let entries = ClasspathResolver::new(&ctx)
        .compute_classpath(&core, ResolveMode::Explicit)
        .unwrap();
    assert_eq!(
        entries,
        vec![
            ClasspathEntry::container(JRE_CONTAINER),
            ClasspathEntry::source("/com.acme.core/src"),
            ClasspathEntry::project("/com.acme.util", false),
            jre_lib(),
        ]
    );
}

#[test]
fn fragment_libraries_are_spliced_and_exported() {
    let fx = Fixture::new();
    let host = fx.project("h", Some("1.0.0")).with_library("h.jar");
    fx.touch(&fx.ws_root().join("h/h.jar"));
    fx.universe.put_workspace(host);

    let mut fragment = fx.external("f", "1.0.0").with_host(HostRef {
        id: "h".to_string(),
        version: Some("1.0.0".to_string()),
        rule: MatchRule::Compatible,
    });
    fragment.libraries.push(Library {
        name: "f.jar".to_string(),
        exported: false,
        source_annotation: None,
    });
    let fragment_jar = fragment.install_location.join("f.jar");
    fx.touch(&fragment_jar);
    fx.universe.replace_external(vec![fragment]);

    let ctx = fx.ctx();
    let host = fx.universe.find_by_project("h").unwrap();
    let entries = ClasspathResolver::new(&ctx)
        .compute_classpath(&host, ResolveMode::Explicit)
        .unwrap();

    let own = ClasspathEntry::library("/h/h.jar", None, true);
    let spliced = ClasspathEntry::library(EntryPath::from_path(&fragment_jar), None, true);
    assert!(entries.contains(&own), "{entries:#?}");
    assert!(entries.contains(&spliced), "{entries:#?}");

    let dynamic = ClasspathResolver::new(&ctx).required_plugin_entries(&host);
    assert_eq!(dynamic, vec![spliced]);
}

#[test]
fn fragment_compiles_against_host_and_host_imports() {
    let fx = Fixture::new();
    let mut private = Import::new("dep.private");
    private.reexported = false;
    let mut public = Import::new("dep.public");
    public.reexported = true;
    let host = fx
        .external("host", "2.0.0")
        .with_library("host.jar")
        .with_import(private)
        .with_import(public);
    fx.touch(&host.install_location.join("host.jar"));
    let dep_private = fx.external("dep.private", "1.0.0").with_library("p.jar");
    fx.touch(&dep_private.install_location.join("p.jar"));
    let dep_public = fx.external("dep.public", "1.0.0").with_library("q.jar");
    fx.touch(&dep_public.install_location.join("q.jar"));
    let host_jar = host.install_location.join("host.jar");
    let private_jar = dep_private.install_location.join("p.jar");
    let public_jar = dep_public.install_location.join("q.jar");
    fx.universe.replace_external(vec![host, dep_private, dep_public]);

    let fragment = fx.project("host.nl", Some("1.0.0")).with_host(HostRef {
        id: "host".to_string(),
        version: None,
        rule: MatchRule::None,
    });
    fx.universe.put_workspace(fragment);

    let ctx = fx.ctx();
    let fragment = fx.universe.find_by_project("host.nl").unwrap();
    let paths: Vec<EntryPath> = ClasspathResolver::new(&ctx)
        .required_plugin_entries(&fragment)
        .into_iter()
        .map(|e| e.path)
        .collect();

    // The re-exported import arrives through the host's own re-export recursion.
    assert_eq!(
        paths,
        vec![
            EntryPath::from_path(&host_jar),
            EntryPath::from_path(&public_jar),
            EntryPath::from_path(&private_jar),
        ]
    );
}

#[test]
fn missing_dependency_becomes_stand_in_when_enabled() {
    let mut fx = Fixture::new();
    let plugin = fx
        .project("p", None)
        .with_import(Import::new("not.there"));
    fx.universe.put_workspace(plugin);
    let p = fx.universe.find_by_project("p").unwrap();

    let ctx = fx.ctx();
    assert!(ClasspathResolver::new(&ctx).required_plugin_entries(&p).is_empty());

    fx.settings.use_project_stand_ins = true;
    let ctx = fx.ctx();
    assert_eq!(
        ClasspathResolver::new(&ctx).required_plugin_entries(&p),
        vec![ClasspathEntry::project("/not.there", false)]
    );
}

#[test]
fn custom_build_skips_source_inference() {
    let fx = Fixture::new();
    fx.universe
        .put_workspace(fx.project("p", None).with_library("."));
    fx.write_build_properties("p", "custom = true\nsource.. = src/\n");
    let ctx = fx.ctx();
    let p = fx.universe.find_by_project("p").unwrap();

    let entries = ClasspathResolver::new(&ctx)
        .compute_classpath(&p, ResolveMode::Dynamic)
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert!(!fx.ws_root().join("p/src").exists());
}

#[test]
fn default_library_falls_back_to_packaged_jar() {
    let fx = Fixture::new();
    fx.universe
        .put_workspace(fx.project("p", Some("1.0.0")).with_library("."));
    fx.touch(&fx.ws_root().join("p/p_1.0.0.jar"));
    fx.touch(&fx.ws_root().join("p/p_1.0.0src.zip"));
    let ctx = fx.ctx();
    let p = fx.universe.find_by_project("p").unwrap();

    let entries = ClasspathResolver::new(&ctx)
        .compute_classpath(&p, ResolveMode::Dynamic)
        .unwrap();
    assert_eq!(
        entries[2],
        ClasspathEntry::library(
            "/p/p_1.0.0.jar",
            Some(EntryPath::new("/p/p_1.0.0src.zip")),
            true
        )
    );
}

#[test]
fn implicit_dependency_is_added_except_for_system_bundles() {
    let fx = Fixture::new();
    let runtime = fx.external("org.eclipse.core.runtime", "3.4.0").with_library("runtime.jar");
    fx.touch(&runtime.install_location.join("runtime.jar"));
    let runtime_jar = EntryPath::from_path(&runtime.install_location.join("runtime.jar"));
    fx.universe.replace_external(vec![runtime]);
    fx.universe.put_workspace(fx.project("p", None));
    fx.universe.put_workspace(fx.project("org.eclipse.osgi.util", None));

    let ctx = fx.ctx();
    let resolver = ClasspathResolver::new(&ctx);
    let p = fx.universe.find_by_project("p").unwrap();
    let entries = resolver.required_plugin_entries(&p);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, runtime_jar);
    assert_eq!(entries[0].kind, EntryKind::Library);

    let exempt = fx.universe.find_by_project("org.eclipse.osgi.util").unwrap();
    assert!(resolver.required_plugin_entries(&exempt).is_empty());
}

#[test]
fn execution_environment_selects_container_and_compliance() {
    let fx = Fixture::new();
    let mut plugin = fx.project("p", None);
    plugin.execution_environments.push("J2SE-1.4".to_string());
    fx.universe.put_workspace(plugin);
    let ctx = fx.ctx();

    let written = ClasspathResolver::new(&ctx)
        .update_classpath("p", ResolveMode::Dynamic)
        .unwrap();
    assert_eq!(written[0].path, ee::jre_container_path(Some("J2SE-1.4")));
    assert_eq!(fx.java.raw_classpath("p"), Some(written));
    assert_eq!(fx.java.raw_writes(), 1);

    let options = fx.java.compiler_options("p");
    assert_eq!(options.get(ee::COMPILER_COMPLIANCE).map(String::as_str), Some("1.4"));
    assert_eq!(options.get(ee::ASSERT_IDENTIFIER).map(String::as_str), Some(ee::WARNING));
}

#[test]
fn invalid_classpath_is_not_written() {
    let fx = Fixture::new();
    fx.universe
        .put_workspace(fx.project("p", None).with_library("."));
    fx.write_build_properties("p", "source.. = src/\n");
    fx.java
        .set_output_location("p", EntryPath::new("/p/src/classes"));
    let previous = vec![ClasspathEntry::container(JRE_CONTAINER)];
    fx.java.seed_raw_classpath("p", previous.clone());
    let ctx = fx.ctx();

    let err = ClasspathResolver::new(&ctx)
        .update_classpath("p", ResolveMode::Dynamic)
        .unwrap_err();
    assert!(matches!(err, ClasspathError::Invalid { ref project, .. } if project == "p"));
    assert_eq!(fx.java.raw_classpath("p"), Some(previous));
    assert_eq!(fx.java.raw_writes(), 0);
}

#[test]
fn unknown_project_has_no_plugin() {
    let fx = Fixture::new();
    let ctx = fx.ctx();
    let err = ClasspathResolver::new(&ctx)
        .update_classpath("ghost", ResolveMode::Dynamic)
        .unwrap_err();
    assert!(matches!(err, ClasspathError::NoPlugin { .. }));
}

#[test]
fn test_plugins_get_test_sources() {
    let mut fx = Fixture::new();
    fx.settings.test_plugin_pattern = Some(Regex::new(r"^(?:.*\.tests)$").unwrap());
    fx.universe
        .put_workspace(fx.project("p.tests", None).with_library("."));
    fx.write_build_properties("p.tests", "source.. = src/\n");
    let ctx = fx.ctx();
    let p = fx.universe.find_by_project("p.tests").unwrap();

    let entries = ClasspathResolver::new(&ctx)
        .compute_classpath(&p, ResolveMode::Dynamic)
        .unwrap();
    let source = entries.iter().find(|e| e.kind == EntryKind::Source).unwrap();
    assert_eq!(source.attribute(TEST_ATTRIBUTE), Some("true"));
}

#[test]
fn extra_classpath_tokens_resolve() {
    let fx = Fixture::new();
    let other = fx.external("other", "1.0.0");
    fx.touch(&other.install_location.join("lib/o.jar"));
    let other_jar = EntryPath::from_path(&other.install_location.join("lib/o.jar"));
    fx.universe.replace_external(vec![other]);

    fx.universe.put_workspace(fx.project("p", None));
    fx.universe.put_workspace(fx.project("q", None));
    fx.touch(&fx.ws_root().join("p/lib/local.jar"));
    fx.touch(&fx.ws_root().join("q/shared.jar"));
    fx.write_build_properties(
        "p",
        "jars.extra.classpath = lib/local.jar, ../q/shared.jar, platform:/plugin/other/lib/o.jar, missing.jar\n",
    );
    let ctx = fx.ctx();
    let p = fx.universe.find_by_project("p").unwrap();

    let paths: Vec<EntryPath> = ClasspathResolver::new(&ctx)
        .required_plugin_entries(&p)
        .into_iter()
        .map(|e| e.path)
        .collect();
    assert_eq!(
        paths,
        vec![
            EntryPath::new("/p/lib/local.jar"),
            EntryPath::new("/q/shared.jar"),
            other_jar,
        ]
    );
}

fn paths(entries: Vec<ClasspathEntry>) -> Vec<EntryPath> {
    entries.into_iter().map(|e| e.path).collect()
}

fn reexport(id: &str) -> Import {
    let mut import = Import::new(id);
    import.reexported = true;
    import
}

fn any_host(id: &str) -> HostRef {
    HostRef {
        id: id.to_string(),
        version: None,
        rule: MatchRule::None,
    }
}

#[test]
fn workspace_dependency_passes_on_its_reexports() {
    let fx = Fixture::new();
    let x = fx.external("x", "1.0.0").with_library("x.jar");
    let x_jar = x.install_location.join("x.jar");
    fx.touch(&x_jar);
    fx.universe.replace_external(vec![x]);
    fx.universe
        .put_workspace(fx.project("w", Some("1.0.0")).with_import(reexport("x")));
    fx.universe
        .put_workspace(fx.project("c", None).with_import(Import::new("w")));

    let ctx = fx.ctx();
    let c = fx.universe.find_by_project("c").unwrap();
    assert_eq!(
        paths(ClasspathResolver::new(&ctx).required_plugin_entries(&c)),
        vec![EntryPath::new("/w"), EntryPath::from_path(&x_jar)]
    );
}

#[test]
fn fragment_of_workspace_host_sees_host_reexports() {
    let fx = Fixture::new();
    let x = fx.external("x", "1.0.0").with_library("x.jar");
    let x_jar = x.install_location.join("x.jar");
    fx.touch(&x_jar);
    fx.universe.replace_external(vec![x]);
    fx.universe
        .put_workspace(fx.project("h", Some("1.0.0")).with_import(reexport("x")));
    fx.universe
        .put_workspace(fx.project("h.nl", Some("1.0.0")).with_host(any_host("h")));

    let ctx = fx.ctx();
    let fragment = fx.universe.find_by_project("h.nl").unwrap();
    assert_eq!(
        paths(ClasspathResolver::new(&ctx).required_plugin_entries(&fragment)),
        vec![EntryPath::new("/h"), EntryPath::from_path(&x_jar)]
    );
}

#[test]
fn extensible_workspace_dependency_brings_its_fragments() {
    let fx = Fixture::new();
    let fragment = fx
        .external("w.ext", "1.0.0")
        .with_library("ext.jar")
        .with_host(any_host("w"));
    let ext_jar = fragment.install_location.join("ext.jar");
    fx.touch(&ext_jar);
    fx.universe.replace_external(vec![fragment]);
    let mut w = fx.project("w", Some("1.0.0"));
    w.extensible_api = true;
    fx.universe.put_workspace(w);
    fx.universe
        .put_workspace(fx.project("c", None).with_import(Import::new("w")));

    let ctx = fx.ctx();
    let c = fx.universe.find_by_project("c").unwrap();
    assert_eq!(
        paths(ClasspathResolver::new(&ctx).required_plugin_entries(&c)),
        vec![EntryPath::new("/w"), EntryPath::from_path(&ext_jar)]
    );
}

#[test]
fn patch_fragments_precede_the_host_libraries() {
    let fx = Fixture::new();
    let mut host = fx.external("h", "1.0.0").with_library("h.jar");
    host.extensible_api = true;
    let plain = fx
        .external("h.plain", "1.0.0")
        .with_library("plain.jar")
        .with_host(any_host("h"));
    let mut patch = fx
        .external("h.patch", "1.0.0")
        .with_library("patch.jar")
        .with_host(any_host("h"));
    patch.patch_fragment = true;
    let host_jar = host.install_location.join("h.jar");
    let plain_jar = plain.install_location.join("plain.jar");
    let patch_jar = patch.install_location.join("patch.jar");
    for jar in [&host_jar, &plain_jar, &patch_jar] {
        fx.touch(jar);
    }
    fx.universe.replace_external(vec![host, plain, patch]);
    fx.universe
        .put_workspace(fx.project("c", None).with_import(Import::new("h")));

    let ctx = fx.ctx();
    let c = fx.universe.find_by_project("c").unwrap();
    assert_eq!(
        paths(ClasspathResolver::new(&ctx).required_plugin_entries(&c)),
        vec![
            EntryPath::from_path(&patch_jar),
            EntryPath::from_path(&host_jar),
            EntryPath::from_path(&plain_jar),
        ]
    );
}

#[test]
fn missing_host_library_comes_from_first_fragment_that_has_it() {
    let fx = Fixture::new();
    let host = fx.external("h", "1.0.0").with_library("swt.jar");
    let first = fx.external("h.gtk", "1.0.0").with_host(any_host("h"));
    let second = fx.external("h.gtk2", "1.0.0").with_host(any_host("h"));
    let first_jar = first.install_location.join("swt.jar");
    fx.touch(&first_jar);
    fx.touch(&second.install_location.join("swt.jar"));
    fx.universe.replace_external(vec![host, first, second]);
    fx.universe
        .put_workspace(fx.project("c", None).with_import(Import::new("h")));

    let ctx = fx.ctx();
    let c = fx.universe.find_by_project("c").unwrap();
    assert_eq!(
        paths(ClasspathResolver::new(&ctx).required_plugin_entries(&c)),
        vec![EntryPath::from_path(&first_jar)]
    );
}

#[test]
fn additional_bundles_follow_declared_imports() {
    let fx = Fixture::new();
    let a = fx.external("a", "1.0.0").with_library("a.jar");
    let b = fx.external("b", "1.0.0").with_library("b.jar");
    let a_jar = a.install_location.join("a.jar");
    let b_jar = b.install_location.join("b.jar");
    fx.touch(&a_jar);
    fx.touch(&b_jar);
    fx.universe.replace_external(vec![b, a]);
    fx.universe
        .put_workspace(fx.project("p", None).with_import(Import::new("a")));
    fx.write_build_properties("p", "additional.bundles = b, a\n");

    let ctx = fx.ctx();
    let p = fx.universe.find_by_project("p").unwrap();
    let entries = ClasspathResolver::new(&ctx).required_plugin_entries(&p);
    assert_eq!(
        paths(entries),
        vec![EntryPath::from_path(&a_jar), EntryPath::from_path(&b_jar)]
    );
}
