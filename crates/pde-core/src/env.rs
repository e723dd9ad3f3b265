use serde::{Deserialize, Serialize};

/// The OS/windowing-system/architecture/locale tuple a target platform is built for.
///
/// Values use the platform's display strings (`linux`, `gtk`, `x86_64`, `en_US`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetEnvironment {
    pub os: String,
    pub ws: String,
    pub arch: String,
    pub nl: String,
}

impl TargetEnvironment {
    /// The environment of the running host.
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "macosx",
            "windows" => "win32",
            other => other,
        };
        let ws = match os {
            "macosx" => "cocoa",
            "win32" => "win32",
            _ => "gtk",
        };
        let arch = match std::env::consts::ARCH {
            "x86" => "x86",
            "powerpc64" => "ppc64",
            other => other,
        };
        Self {
            os: os.to_string(),
            ws: ws.to_string(),
            arch: arch.to_string(),
            nl: locale_from_env().unwrap_or_else(|| "en_US".to_string()),
        }
    }

    /// Expands the `$ws$`, `$os$` and `$nl$` segments used in library names.
    ///
    /// `$ws$/swt.jar` becomes `ws/gtk/swt.jar`, `$os$/lib.so` becomes `os/linux/x86_64/lib.so`.
    pub fn expand_library_name(&self, name: &str) -> String {
        if !name.contains('$') {
            return name.to_string();
        }
        name.replace("$ws$", &format!("ws/{}", self.ws))
            .replace("$os$", &format!("os/{}/{}", self.os, self.arch))
            .replace("$nl$", &format!("nl/{}", self.nl))
    }
}

impl Default for TargetEnvironment {
    fn default() -> Self {
        Self::current()
    }
}

fn locale_from_env() -> Option<String> {
    let raw = std::env::var("LC_ALL")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var("LANG").ok())?;
    let locale = raw.split(['.', '@']).next()?.trim();
    if locale.is_empty() || locale == "C" || locale == "POSIX" {
        return None;
    }
    Some(locale.to_string())
}
