//! Execution environments and the compiler compliance options they imply.

use std::collections::BTreeMap;

use pde_core::EntryPath;

pub const JRE_CONTAINER: &str = "org.eclipse.jdt.launching.JRE_CONTAINER";
pub const STANDARD_VM_TYPE: &str = "org.eclipse.jdt.internal.debug.ui.launcher.StandardVMType";

pub const COMPILER_COMPLIANCE: &str = "org.eclipse.jdt.core.compiler.compliance";
pub const COMPILER_SOURCE: &str = "org.eclipse.jdt.core.compiler.source";
pub const COMPILER_TARGET: &str = "org.eclipse.jdt.core.compiler.codegen.targetPlatform";
pub const ASSERT_IDENTIFIER: &str = "org.eclipse.jdt.core.compiler.problem.assertIdentifier";
pub const ENUM_IDENTIFIER: &str = "org.eclipse.jdt.core.compiler.problem.enumIdentifier";

pub const IGNORE: &str = "ignore";
pub const WARNING: &str = "warning";
pub const ERROR: &str = "error";

/// Project-level compiler options, keyed by option id.
pub type CompilerOptions = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionEnvironment {
    pub id: &'static str,
    pub compliance: &'static str,
    pub source: &'static str,
    pub target: &'static str,
}

const fn ee(
    id: &'static str,
    compliance: &'static str,
    source: &'static str,
    target: &'static str,
) -> ExecutionEnvironment {
    ExecutionEnvironment {
        id,
        compliance,
        source,
        target,
    }
}

static KNOWN: &[ExecutionEnvironment] = &[
    ee("OSGi/Minimum-1.0", "1.3", "1.3", "1.1"),
    ee("OSGi/Minimum-1.1", "1.3", "1.3", "1.1"),
    ee("OSGi/Minimum-1.2", "1.4", "1.3", "1.2"),
    ee("JRE-1.1", "1.1", "1.3", "1.1"),
    ee("CDC-1.0/Foundation-1.0", "1.3", "1.3", "1.1"),
    ee("CDC-1.1/Foundation-1.1", "1.4", "1.3", "1.2"),
    ee("J2SE-1.2", "1.2", "1.3", "1.1"),
    ee("J2SE-1.3", "1.3", "1.3", "1.1"),
    ee("J2SE-1.4", "1.4", "1.3", "1.2"),
    ee("J2SE-1.5", "1.5", "1.5", "1.5"),
    ee("JavaSE-1.6", "1.6", "1.6", "1.6"),
    ee("JavaSE-1.7", "1.7", "1.7", "1.7"),
    ee("JavaSE-1.8", "1.8", "1.8", "1.8"),
    ee("JavaSE-9", "9", "9", "9"),
    ee("JavaSE-10", "10", "10", "10"),
    ee("JavaSE-11", "11", "11", "11"),
    ee("JavaSE-12", "12", "12", "12"),
    ee("JavaSE-13", "13", "13", "13"),
    ee("JavaSE-14", "14", "14", "14"),
    ee("JavaSE-15", "15", "15", "15"),
    ee("JavaSE-16", "16", "16", "16"),
    ee("JavaSE-17", "17", "17", "17"),
    ee("JavaSE-18", "18", "18", "18"),
    ee("JavaSE-19", "19", "19", "19"),
    ee("JavaSE-20", "20", "20", "20"),
    ee("JavaSE-21", "21", "21", "21"),
];

pub fn lookup(id: &str) -> Option<&'static ExecutionEnvironment> {
    KNOWN.iter().find(|ee| ee.id == id)
}

pub fn known() -> &'static [ExecutionEnvironment] {
    KNOWN
}

/// The JRE container for `ee`, or the default JRE container when the EE is absent or unknown.
pub fn jre_container_path(ee: Option<&str>) -> EntryPath {
    match ee.and_then(lookup) {
        Some(ee) => EntryPath::new(format!("{JRE_CONTAINER}/{STANDARD_VM_TYPE}/{}", ee.id)),
        None => EntryPath::new(JRE_CONTAINER),
    }
}

impl ExecutionEnvironment {
    /// Compliance at or below 1.4, where `assert`/`enum` are still legal identifiers.
    pub fn is_legacy(&self) -> bool {
        matches!(self.compliance, "1.1" | "1.2" | "1.3" | "1.4")
    }

    fn options(&self) -> [(&'static str, &'static str); 5] {
        let keyword_severity = if self.is_legacy() { IGNORE } else { ERROR };
        [
            (COMPILER_COMPLIANCE, self.compliance),
            (COMPILER_SOURCE, self.source),
            (COMPILER_TARGET, self.target),
            (ASSERT_IDENTIFIER, keyword_severity),
            (ENUM_IDENTIFIER, keyword_severity),
        ]
    }
}

fn severity_rank(value: &str) -> u8 {
    match value {
        WARNING => 1,
        ERROR => 2,
        _ => 0,
    }
}

fn set_option(options: &mut CompilerOptions, key: &str, value: &str, override_existing: bool) -> bool {
    if !override_existing && options.contains_key(key) {
        return false;
    }
    options.insert(key.to_string(), value.to_string()) != Some(value.to_string())
}

/// Raises `key` to at least `minimum`. A stricter existing severity is never lowered.
fn set_minimum_severity(
    options: &mut CompilerOptions,
    key: &str,
    minimum: &str,
    override_existing: bool,
) -> bool {
    let current = options.get(key).map(String::as_str);
    if !override_existing && current.is_some() {
        return false;
    }
    if current.map_or(0, severity_rank) < severity_rank(minimum) {
        options.insert(key.to_string(), minimum.to_string());
        return true;
    }
    false
}

/// Applies the compliance defaults of `ee` to `options`; returns whether anything changed.
///
/// Without `override_existing`, options the project already pins are left alone. With an
/// unknown or absent EE and `override_existing`, the compliance options are cleared so the
/// workspace defaults apply.
pub fn apply_compliance(
    options: &mut CompilerOptions,
    ee: Option<&ExecutionEnvironment>,
    override_existing: bool,
) -> bool {
    let Some(ee) = ee else {
        if !override_existing {
            return false;
        }
        let mut changed = false;
        for key in [
            COMPILER_COMPLIANCE,
            COMPILER_SOURCE,
            COMPILER_TARGET,
            ASSERT_IDENTIFIER,
            ENUM_IDENTIFIER,
        ] {
            changed |= options.remove(key).is_some();
        }
        return changed;
    };

    let mut changed = false;
    for (key, value) in ee.options() {
        if ee.is_legacy() && (key == ASSERT_IDENTIFIER || key == ENUM_IDENTIFIER) {
            changed |= set_minimum_severity(options, key, WARNING, override_existing);
        } else {
            changed |= set_option(options, key, value, override_existing);
        }
    }
    changed
}
