use std::fs;
use std::sync::Arc;
use std::time::Duration;

use pde_classpath::{ClasspathContext, ClasspathSettings, InMemoryJavaModel};
use pde_container::{ContainerManager, SnapshotStore};
use pde_model::{BundleOrigin, FsWorkspace, PluginDescriptor};
use pde_scheduler::{Scheduler, SchedulerConfig, WorkspaceLock};
use pde_target::{
    CheckedPlugins, TargetDefinition, TargetError, TargetFeature, TargetMode, TargetPlugin,
    TargetPreferences,
};
use pretty_assertions::assert_eq;

use super::fixture::{write_feature, Fixture};

fn default_location(use_all: bool) -> TargetDefinition {
    let mut target = TargetDefinition::default();
    target.location.use_default = true;
    target.use_all_plugins = use_all;
    target
}

fn plugin(id: &str, optional: bool) -> TargetPlugin {
    TargetPlugin {
        id: id.to_string(),
        version: None,
        optional,
    }
}

#[test]
fn first_load_reloads_then_only_recomputes_enabled() {
    let fx = Fixture::new();
    fx.bundle("a", "1.0.0");
    fx.bundle("b", "1.0.0");
    fx.bundle("c", "2.0.0");
    let op = fx.operation();
    let mut prefs = TargetPreferences::default();

    let mut target = default_location(true);
    target.implicit = vec!["org.eclipse.core.runtime".into()];
    let report = op.run(&target, &mut prefs).unwrap();

    assert!(report.reloaded);
    assert_eq!(report.changed.len(), 3);
    assert_eq!(fx.enabled_ids(), vec!["a", "b", "c"]);
    let home = fx.home().to_string_lossy().into_owned();
    assert_eq!(prefs.platform_path.as_deref(), Some(home.as_str()));
    assert_eq!(prefs.target_mode, TargetMode::UseThis);
    assert_eq!(prefs.saved_platforms[0].as_deref(), Some(home.as_str()));
    assert_eq!(prefs.checked_plugins, CheckedPlugins::All);
    assert_eq!(prefs.implicit_ids(), vec!["org.eclipse.core.runtime"]);

    let mut narrowed = default_location(false);
    narrowed.plugins = vec![plugin("a", false), plugin("c", true), plugin("zzz", false)];
    let report = op.run(&narrowed, &mut prefs).unwrap();

    assert!(!report.reloaded);
    assert_eq!(report.changed, vec!["b"]);
    assert_eq!(report.missing_plugins, vec!["zzz"]);
    assert!(!report.is_complete());
    assert_eq!(fx.enabled_ids(), vec!["a", "c"]);
    assert_eq!(
        prefs.checked_plugins,
        CheckedPlugins::Explicit(vec!["a".into(), "c".into()])
    );
}

#[test]
fn features_select_plugins_and_missing_feature_is_reported() {
    let fx = Fixture::new();
    fx.bundle("core", "1.0.0");
    fx.bundle("ui", "1.0.0");
    fx.bundle("extra", "1.0.0");
    write_feature(
        &fx.home(),
        "platform",
        r#"<plugin id="core" version="0.0.0"/><includes id="ui.feature" version="1.0.0"/>"#,
    );
    write_feature(&fx.home(), "ui.feature", r#"<plugin id="ui" version="0.0.0"/>"#);

    let mut target = default_location(false);
    target.features = vec![
        TargetFeature {
            id: "platform".into(),
            version: None,
            optional: false,
        },
        TargetFeature {
            id: "absent".into(),
            version: None,
            optional: false,
        },
    ];
    let mut prefs = TargetPreferences::default();
    let report = fx.operation().run(&target, &mut prefs).unwrap();

    assert_eq!(fx.enabled_ids(), vec!["core", "ui"]);
    assert_eq!(report.missing_features, vec!["absent"]);
    assert!(report.missing_plugins.is_empty());
    assert_eq!(report.enabled, 2);
}

#[test]
fn nothing_enabled_records_none() {
    let fx = Fixture::new();
    fx.bundle("a", "1.0.0");
    let mut prefs = TargetPreferences::default();
    fx.operation().run(&default_location(false), &mut prefs).unwrap();
    assert_eq!(prefs.checked_plugins, CheckedPlugins::None);
    assert!(fx.enabled_ids().is_empty());
}

#[test]
fn location_variables() {
    let fx = Fixture::new();
    fx.bundle("a", "1.0.0");
    let op = fx.operation();
    let mut prefs = TargetPreferences::default();

    let mut target = TargetDefinition::default();
    target.location.path = Some("${user.home}/eclipse".into());
    let err = op.run(&target, &mut prefs).unwrap_err();
    assert!(matches!(err, TargetError::UnresolvedVariable { .. }));
    assert_eq!(prefs.platform_path, None);

    target.location.path = Some("${eclipse_home}".into());
    target.location.additional = vec!["${nope}/more".into()];
    target.use_all_plugins = true;
    let report = op.run(&target, &mut prefs).unwrap();
    assert_eq!(report.additional_locations, vec!["${nope}/more"]);
    assert_eq!(prefs.target_mode, TargetMode::UseOther);
    assert_eq!(fx.enabled_ids(), vec!["a"]);
}

#[test]
fn workspace_plugins_shadow_and_satisfy_requirements() {
    let fx = Fixture::new();
    fx.bundle("a", "1.0.0");
    fx.universe.put_workspace(
        PluginDescriptor::plugin(
            "a",
            Some("1.0.0"),
            BundleOrigin::Workspace {
                project: "a".into(),
            },
        )
        .with_location(fx.ws_root().join("a")),
    );
    fx.universe.put_workspace(PluginDescriptor::plugin(
        "w",
        Some("1.0.0"),
        BundleOrigin::Workspace {
            project: "w".into(),
        },
    ));

    let mut target = default_location(false);
    target.plugins = vec![plugin("w", false)];
    let report = fx.operation().run(&target, &mut TargetPreferences::default()).unwrap();

    assert_eq!(report.shadowed, vec!["a"]);
    assert!(report.missing_plugins.is_empty());
    let found = fx.universe.find_plugin("a", None, pde_core::MatchRule::None).unwrap();
    assert!(found.is_workspace());
    assert!(fx.universe.external_models().iter().all(|p| p.id != "a"));
}

#[test]
fn stale_target_copy_never_satisfies_a_workspace_id() {
    let fx = Fixture::new();
    fx.bundle("a", "2.0.0");
    fx.bundle("b", "1.0.0");
    fx.universe.put_workspace(
        PluginDescriptor::plugin(
            "a",
            Some("1.0.0"),
            BundleOrigin::Workspace {
                project: "a".into(),
            },
        )
        .with_location(fx.ws_root().join("a")),
    );

    let mut prefs = TargetPreferences::default();
    let report = fx.operation().run(&default_location(true), &mut prefs).unwrap();
    assert_eq!(report.shadowed, vec!["a"]);
    assert_eq!(report.enabled, 1);
    assert!(fx
        .universe
        .find_plugin("a", Some("2.0.0"), pde_core::MatchRule::GreaterOrEqual)
        .is_none());

    assert_eq!(fx.operation().restore(&prefs), 1);
    assert_eq!(fx.enabled_ids(), vec!["b"]);
}

#[test]
fn jre_change_is_reported() {
    let fx = Fixture::new();
    let op = fx.operation();
    let mut prefs = TargetPreferences::default();
    let mut target = default_location(true);

    assert!(!op.run(&target, &mut prefs).unwrap().vm_changed);
    target.jre = Some("JavaSE-17".into());
    assert!(op.run(&target, &mut prefs).unwrap().vm_changed);
    assert!(!op.run(&target, &mut prefs).unwrap().vm_changed);
    assert_eq!(prefs.vm_install.as_deref(), Some("JavaSE-17"));
}

#[test]
fn reload_requests_containers() {
    let fx = Fixture::new();
    fx.bundle("a", "1.0.0");
    fs::create_dir_all(fx.ws_root().join("p")).unwrap();
    fx.universe.put_workspace(
        PluginDescriptor::plugin(
            "p",
            Some("1.0.0"),
            BundleOrigin::Workspace {
                project: "p".into(),
            },
        )
        .with_location(fx.ws_root().join("p")),
    );

    let ctx = ClasspathContext::new(
        Arc::clone(&fx.universe),
        Arc::clone(&fx.features),
        Arc::new(FsWorkspace::new(fx.ws_root())),
        Arc::new(InMemoryJavaModel::new()),
        ClasspathSettings::default(),
    );
    let manager = ContainerManager::new(
        ctx,
        SnapshotStore::new(fx.dir.path().join("state"), false),
        Scheduler::new(SchedulerConfig::default()).unwrap(),
        WorkspaceLock::new(),
        Duration::from_millis(20),
    );

    let op = fx.operation().with_containers(Arc::clone(&manager));
    op.run(&default_location(true), &mut TargetPreferences::default())
        .unwrap();
    assert!(manager.state("p").is_some());
}

#[test]
fn restore_rebuilds_from_saved_preferences() {
    let fx = Fixture::new();
    fx.bundle("a", "1.0.0");
    fx.bundle("b", "1.0.0");
    let mut target = default_location(false);
    target.plugins = vec![plugin("b", false)];
    let mut prefs = TargetPreferences::default();
    fx.operation().run(&target, &mut prefs).unwrap();

    let fresh = Fixture {
        dir: fx.dir,
        universe: Arc::new(pde_model::BundleUniverse::new()),
        features: Arc::new(pde_model::FeatureIndex::new()),
    };
    assert_eq!(fresh.operation().restore(&prefs), 2);
    assert_eq!(fresh.enabled_ids(), vec!["b"]);
    assert_eq!(fresh.operation().restore(&TargetPreferences::default()), 0);
}
