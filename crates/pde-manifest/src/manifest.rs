//! JAR manifest main-section reader/writer.

use std::fmt::Write as _;

use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ManifestParseError {
    pub line: usize,
    pub message: String,
}

/// The main attributes of a `META-INF/MANIFEST.MF`, in declaration order.
///
/// Header names are matched case-insensitively but keep their original spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    headers: IndexMap<String, String>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self, ManifestParseError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut headers: IndexMap<String, String> = IndexMap::new();
        let mut current: Option<(String, String)> = None;

        for (idx, raw) in text.split('\n').enumerate() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);

            if let Some(continuation) = line.strip_prefix(' ') {
                match current.as_mut() {
                    Some((_, value)) => value.push_str(continuation),
                    None => {
                        return Err(ManifestParseError {
                            line: idx + 1,
                            message: "continuation line without a header".to_string(),
                        })
                    }
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                insert(&mut headers, name, value);
            }

            // Only the main section is relevant; per-entry sections follow the first blank line.
            if line.is_empty() {
                if headers.is_empty() {
                    continue;
                }
                break;
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(ManifestParseError {
                    line: idx + 1,
                    message: format!("expected `Name: value`, found `{line}`"),
                });
            };
            let name = name.trim();
            if name.is_empty() || name.contains(' ') {
                return Err(ManifestParseError {
                    line: idx + 1,
                    message: format!("invalid header name `{name}`"),
                });
            }
            let value = value.strip_prefix(' ').unwrap_or(value);
            current = Some((name.to_string(), value.to_string()));
        }

        if let Some((name, value)) = current.take() {
            insert(&mut headers, name, value);
        }

        Ok(Self { headers })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = value,
            None => {
                self.headers.insert(name.to_string(), value);
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let key = self
            .headers
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))?
            .clone();
        self.headers.shift_remove(&key)
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Renders the main section, wrapping lines at 72 bytes with single-space continuations.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.headers {
            let line = format!("{name}: {value}");
            let mut chunk = String::new();
            let mut first = true;
            for ch in line.chars() {
                let limit = if first { 72 } else { 71 };
                if chunk.len() + ch.len_utf8() > limit {
                    if !first {
                        out.push(' ');
                    }
                    let _ = writeln!(out, "{chunk}");
                    chunk.clear();
                    first = false;
                }
                chunk.push(ch);
            }
            if !first {
                out.push(' ');
            }
            let _ = writeln!(out, "{chunk}");
        }
        out.push('\n');
        out
    }
}

fn insert(headers: &mut IndexMap<String, String>, name: String, value: String) {
    // Last declaration of a header wins, keeping its first position.
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
        Some((_, existing)) => *existing = value,
        None => {
            headers.insert(name, value);
        }
    }
}
