use pde_classpath::ee::JRE_CONTAINER;
use pde_classpath::{ClasspathEntry, ClasspathResolver, JavaModel, ResolveMode, REQUIRED_PLUGINS_CONTAINER};
use pretty_assertions::assert_eq;

use super::fixture::Fixture;

#[test]
fn refresh_keeps_previous_order_and_appends_new_entries() {
    let fx = Fixture::new();
    fx.universe
        .put_workspace(fx.project("p", None).with_library("."));
    fx.write_build_properties("p", "source.. = src/, gen/\n");
    fx.touch(&fx.ws_root().join("p/lib/kept.jar"));
    fx.java.seed_raw_classpath(
        "p",
        vec![
            ClasspathEntry::source("/p/src"),
            ClasspathEntry::library("/p/lib/kept.jar", None, false),
            ClasspathEntry::project("/stale", false),
            ClasspathEntry::container(JRE_CONTAINER),
        ],
    );
    let ctx = fx.ctx();

    let written = ClasspathResolver::new(&ctx)
        .refresh_classpath("p", ResolveMode::Dynamic)
        .unwrap();
    assert_eq!(
        written,
        vec![
            ClasspathEntry::source("/p/src"),
            ClasspathEntry::library("/p/lib/kept.jar", None, false),
            ClasspathEntry::container(JRE_CONTAINER),
            ClasspathEntry::container(REQUIRED_PLUGINS_CONTAINER),
            ClasspathEntry::source("/p/gen"),
        ]
    );
    assert_eq!(fx.java.raw_classpath("p"), Some(written));
}

#[test]
fn refresh_without_previous_classpath_computes_fresh() {
    let fx = Fixture::new();
    fx.universe.put_workspace(fx.project("p", None));
    let ctx = fx.ctx();

    let written = ClasspathResolver::new(&ctx)
        .refresh_classpath("p", ResolveMode::Dynamic)
        .unwrap();
    assert_eq!(
        written,
        vec![
            ClasspathEntry::container(JRE_CONTAINER),
            ClasspathEntry::container(REQUIRED_PLUGINS_CONTAINER),
        ]
    );
}
