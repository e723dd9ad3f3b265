use std::fs;
use std::sync::Arc;

use pde_model::{BundleOrigin, PluginDescriptor};
use pde_target::{DevProperties, RunningPlatform, TargetWeaver};
use pretty_assertions::assert_eq;

use super::fixture::write_bundle;

#[test]
fn weaves_bundles_the_running_platform_loaded_from_projects() {
    let dir = tempfile::tempdir().unwrap();
    let ws = dir.path().join("ws");
    let target = dir.path().join("target/plugins");
    write_bundle(&ws, "com.acme.core", "1.0.0");
    write_bundle(&target, "com.acme.core", "1.0.0");
    write_bundle(&target, "com.acme.util", "1.0.0");

    let config = dir.path().join("config");
    fs::create_dir_all(&config).unwrap();
    fs::write(
        config.join("dev.properties"),
        "@ignoredot@=true\ncom.acme.core=bin\ncom.acme.util=bin\n",
    )
    .unwrap();
    fs::write(
        config.join("bundles.info"),
        "#version=1\n\
         com.acme.core,1.0.0,file:../ws/com.acme.core_1.0.0,4,false\n\
         com.acme.util,1.0.0,plugins/com.acme.util_1.0.0.jar,4,false\n\
         org.eclipse.osgi,3.20.0,plugins/org.eclipse.osgi.jar,-1,true\n\
         broken line\n",
    )
    .unwrap();

    let running =
        RunningPlatform::load(&config.join("dev.properties"), &config.join("bundles.info")).unwrap();
    let weaver = TargetWeaver::new(Some(running));

    let woven = weaver.weave_bundle(&ws.join("com.acme.core_1.0.0")).unwrap().unwrap();
    assert_eq!(woven.get("Bundle-ClassPath"), Some("bin"));
    assert!(weaver
        .weave_bundle(&target.join("com.acme.core_1.0.0"))
        .unwrap()
        .is_none());

    let bundles: Vec<Arc<PluginDescriptor>> = [
        ws.join("com.acme.core_1.0.0"),
        target.join("com.acme.util_1.0.0"),
    ]
    .into_iter()
    .map(|location| {
        let id = if location.starts_with(&ws) { "com.acme.core" } else { "com.acme.util" };
        Arc::new(
            PluginDescriptor::plugin(
                id,
                Some("1.0.0"),
                BundleOrigin::External {
                    location: location.clone(),
                },
            )
            .with_location(location),
        )
    })
    .collect();

    let mut nested = DevProperties::default();
    assert_eq!(weaver.weave_dev_properties(&mut nested, &bundles), 1);
    assert_eq!(nested.entries("com.acme.core"), Some(vec!["bin".to_string()]));
    assert_eq!(nested.entries("com.acme.util"), None);
    assert!(nested.ignore_dot());

    let path = dir.path().join("nested.properties");
    nested.save(&path).unwrap();
    let reloaded = DevProperties::load(&path).unwrap().unwrap();
    assert_eq!(reloaded.entries("com.acme.core"), Some(vec!["bin".to_string()]));
    assert!(reloaded.ignore_dot());
}
