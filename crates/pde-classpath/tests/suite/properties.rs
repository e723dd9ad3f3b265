use std::collections::HashSet;

use pde_classpath::{
    mark_test_sources, ClasspathEntry, ClasspathResolver, EntryKind, ResolveMode, TEST_ATTRIBUTE,
};
use pde_core::EntryPath;
use pde_model::{Import, PluginDescriptor};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::fixture::Fixture;

fn reexported(id: &str) -> Import {
    let mut import = Import::new(id);
    import.reexported = true;
    import
}

/// Workspace `a` with `a.jar`; external `b` with `b.jar`. `a` and `b` re-export each other.
#[test]
fn reexport_cycle_terminates() {
    let fx = Fixture::new();
    let a = fx.project("a", None).with_library("a.jar").with_import(reexported("b"));
    fx.touch(&fx.ws_root().join("a/a.jar"));
    let b = fx.external("b", "1.0.0").with_library("b.jar").with_import(reexported("a"));
    let b_jar = b.install_location.join("b.jar");
    fx.touch(&b_jar);
    fx.universe.put_workspace(a);
    fx.universe.replace_external(vec![b]);

    let ctx = fx.ctx();
    let a = fx.universe.find_by_project("a").unwrap();
    let entries = ClasspathResolver::new(&ctx)
        .compute_classpath(&a, ResolveMode::Explicit)
        .unwrap();
    let count = |path: &EntryPath| entries.iter().filter(|e| &e.path == path).count();
    assert_eq!(count(&EntryPath::new("/a/a.jar")), 1);
    assert_eq!(count(&EntryPath::from_path(&b_jar)), 1);
}

/// External `x` and `y` re-export each other; a workspace root pulls both in.
#[test]
fn external_reexport_cycle_expands_each_bundle_once() {
    let fx = Fixture::new();
    let x = fx.external("x", "1.0.0").with_library("x.jar").with_import(reexported("y"));
    let y = fx.external("y", "1.0.0").with_library("y.jar").with_import(reexported("x"));
    let x_jar = x.install_location.join("x.jar");
    let y_jar = y.install_location.join("y.jar");
    fx.touch(&x_jar);
    fx.touch(&y_jar);
    fx.universe.replace_external(vec![x, y]);
    fx.universe.put_workspace(
        fx.project("root", None)
            .with_import(Import::new("x"))
            .with_import(Import::new("y")),
    );

    let ctx = fx.ctx();
    let root = fx.universe.find_by_project("root").unwrap();
    let paths: Vec<EntryPath> = ClasspathResolver::new(&ctx)
        .required_plugin_entries(&root)
        .into_iter()
        .map(|e| e.path)
        .collect();
    assert_eq!(
        paths,
        vec![EntryPath::from_path(&x_jar), EntryPath::from_path(&y_jar)]
    );
}

#[test]
fn existing_entry_is_kept_verbatim() {
    let fx = Fixture::new();
    fx.universe
        .put_workspace(fx.project("proj", None).with_library("."));
    fx.write_build_properties("proj", "source.. = src/\n");
    let existing = ClasspathEntry::source("/proj/src").with_attribute("ignore_optional_problems", "true");
    fx.java.seed_raw_classpath("proj", vec![existing.clone()]);

    let ctx = fx.ctx();
    let proj = fx.universe.find_by_project("proj").unwrap();
    let entries = ClasspathResolver::new(&ctx)
        .compute_classpath(&proj, ResolveMode::Dynamic)
        .unwrap();
    let source: Vec<_> = entries.iter().filter(|e| e.kind == EntryKind::Source).collect();
    assert_eq!(source, vec![&existing]);
}

#[test]
fn test_attribute_pass_is_idempotent() {
    let mut entries = vec![
        ClasspathEntry::source("/p/src"),
        ClasspathEntry::source("/p/tests").with_attribute(TEST_ATTRIBUTE, "true"),
        ClasspathEntry::library("/p/x.jar", None, false),
    ];
    mark_test_sources(&mut entries);
    let once = entries.clone();
    mark_test_sources(&mut entries);
    assert_eq!(entries, once);
    assert!(entries
        .iter()
        .filter(|e| e.kind == EntryKind::Source)
        .all(|e| e.attributes.len() == 1));
}

/// A small random universe: workspace roots and external bundles with random imports.
#[derive(Debug, Clone)]
struct Shape {
    externals: Vec<(bool, Vec<(usize, bool)>)>,
    root_imports: Vec<usize>,
    explicit: bool,
}

fn shape() -> impl Strategy<Value = Shape> {
    (2usize..6).prop_flat_map(|n| {
        (
            prop::collection::vec(
                (any::<bool>(), prop::collection::vec((0..n, any::<bool>()), 0..4)),
                n,
            ),
            prop::collection::vec(0..n, 0..6),
            any::<bool>(),
        )
            .prop_map(|(externals, root_imports, explicit)| Shape {
                externals,
                root_imports,
                explicit,
            })
    })
}

fn build(fx: &Fixture, shape: &Shape) {
    let mut externals: Vec<PluginDescriptor> = Vec::new();
    for (idx, (has_jar, imports)) in shape.externals.iter().enumerate() {
        let mut plugin = fx.external(&format!("ext{idx}"), "1.0.0");
        if *has_jar {
            fx.touch(&plugin.install_location.join("lib.jar"));
            plugin = plugin.with_library("lib.jar");
        }
        for (target, reexport) in imports {
            let mut import = Import::new(format!("ext{target}"));
            import.reexported = *reexport;
            plugin = plugin.with_import(import);
        }
        externals.push(plugin);
    }
    fx.universe.replace_external(externals);

    let mut root = fx.project("root", None).with_library(".");
    for target in &shape.root_imports {
        root = root.with_import(Import::new(format!("ext{target}")));
    }
    fx.write_build_properties("root", "source.. = src/, src/\n");
    fx.universe.put_workspace(root);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn resolution_is_deterministic_and_deduplicated(shape in shape()) {
        let fx = Fixture::new();
        build(&fx, &shape);
        let ctx = fx.ctx();
        let root = fx.universe.find_by_project("root").unwrap();
        let mode = if shape.explicit { ResolveMode::Explicit } else { ResolveMode::Dynamic };
        let resolver = ClasspathResolver::new(&ctx);

        let first = resolver.compute_classpath(&root, mode).unwrap();
        let second = resolver.compute_classpath(&root, mode).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(
            resolver.required_plugin_entries(&root),
            resolver.required_plugin_entries(&root)
        );

        let identities: HashSet<String> = first.iter().map(ClasspathEntry::identity).collect();
        prop_assert_eq!(identities.len(), first.len());
        let dynamic = resolver.required_plugin_entries(&root);
        let identities: HashSet<String> = dynamic.iter().map(ClasspathEntry::identity).collect();
        prop_assert_eq!(identities.len(), dynamic.len());
    }
}
