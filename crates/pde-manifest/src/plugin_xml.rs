//! Legacy `plugin.xml` / `fragment.xml` descriptors for bundles without an OSGi manifest.

use pde_core::MatchRule;

use crate::bundle::{BundleDescription, DescriptorFormat, HostSpec, LibrarySpec, RequireSpec};

pub const PLUGIN_XML: &str = "plugin.xml";
pub const FRAGMENT_XML: &str = "fragment.xml";

/// Parses a legacy descriptor. `Ok(None)` means the document has no usable id.
pub fn parse_plugin_xml(text: &str) -> Result<Option<BundleDescription>, roxmltree::Error> {
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();

    let format = match root.tag_name().name() {
        "plugin" => DescriptorFormat::PluginXml,
        "fragment" => DescriptorFormat::FragmentXml,
        _ => return Ok(None),
    };

    let Some(id) = root.attribute("id").map(str::trim).filter(|id| !id.is_empty()) else {
        return Ok(None);
    };

    let host = match format {
        DescriptorFormat::FragmentXml => root.attribute("plugin-id").map(|host_id| HostSpec {
            id: host_id.trim().to_string(),
            version: non_empty(root.attribute("plugin-version")),
            rule: root
                .attribute("match")
                .map(MatchRule::from_attribute)
                .unwrap_or_default(),
        }),
        _ => None,
    };

    let mut libraries = Vec::new();
    let mut requires = Vec::new();
    for section in root.children().filter(|n| n.is_element()) {
        match section.tag_name().name() {
            "runtime" => {
                for library in section.children().filter(|n| n.has_tag_name("library")) {
                    let Some(name) = non_empty(library.attribute("name")) else {
                        continue;
                    };
                    let exported = library.children().any(|n| n.has_tag_name("export"));
                    libraries.push(LibrarySpec { name, exported });
                }
            }
            "requires" => {
                for import in section.children().filter(|n| n.has_tag_name("import")) {
                    let Some(plugin) = non_empty(import.attribute("plugin")) else {
                        continue;
                    };
                    requires.push(RequireSpec {
                        id: plugin,
                        version: non_empty(import.attribute("version")),
                        rule: import
                            .attribute("match")
                            .map(MatchRule::from_attribute)
                            .unwrap_or_default(),
                        reexport: import.attribute("export") == Some("true"),
                        optional: import.attribute("optional") == Some("true"),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(Some(BundleDescription {
        format,
        symbolic_name: id.to_string(),
        version: non_empty(root.attribute("version")),
        singleton: false,
        host,
        libraries,
        requires,
        execution_environments: Vec::new(),
        system_bundle: false,
        source_bundle: None,
        patch_fragment: false,
        extensible_api: false,
    }))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
