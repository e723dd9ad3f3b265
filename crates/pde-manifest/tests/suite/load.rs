use std::fs;
use std::io::Write;
use std::path::Path;

use pde_core::MatchRule;
use pde_manifest::{load_bundle, DescriptorFormat, ManifestError};
use pretty_assertions::assert_eq;

fn write_jar(path: &Path, entries: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, contents) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn loads_manifest_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("META-INF")).unwrap();
    fs::write(
        dir.path().join("META-INF/MANIFEST.MF"),
        "Manifest-Version: 1.0\nBundle-SymbolicName: com.acme.core\nBundle-Version: 1.0.0\n",
    )
    .unwrap();

    let bundle = load_bundle(dir.path()).unwrap().unwrap();
    assert_eq!(bundle.symbolic_name, "com.acme.core");
    assert_eq!(bundle.format, DescriptorFormat::Manifest);
}

#[test]
fn loads_manifest_from_jar() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("com.acme.util_1.0.5.jar");
    write_jar(
        &jar,
        &[(
            "META-INF/MANIFEST.MF",
            "Bundle-SymbolicName: com.acme.util\nBundle-Version: 1.0.5\nFragment-Host: com.acme.core;bundle-version=\"[1.0.0,2.0.0)\"\n",
        )],
    );

    let bundle = load_bundle(&jar).unwrap().unwrap();
    assert_eq!(bundle.symbolic_name, "com.acme.util");
    assert_eq!(bundle.host.unwrap().rule, MatchRule::Compatible);
}

#[test]
fn falls_back_to_plugin_xml() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("plugin.xml"),
        "<plugin id=\"org.acme.legacy\" version=\"1.0.0\"/>",
    )
    .unwrap();

    let bundle = load_bundle(dir.path()).unwrap().unwrap();
    assert_eq!(bundle.format, DescriptorFormat::PluginXml);
}

#[test]
fn malformed_manifest_surfaces_structured_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("META-INF")).unwrap();
    fs::write(dir.path().join("META-INF/MANIFEST.MF"), "this is not a manifest\n").unwrap();

    let err = load_bundle(dir.path()).unwrap_err();
    assert!(matches!(err, ManifestError::Parse { .. }), "{err}");
}

#[test]
fn empty_location_has_no_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_bundle(dir.path()).unwrap().is_none());
    assert!(!pde_manifest::has_descriptor(dir.path()));
}
