//! OSGi header clause syntax: `value;value;attr=x;directive:=y, next-clause`.

/// One comma-separated clause of an OSGi header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clause {
    pub values: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub directives: Vec<(String, String)>,
}

impl Clause {
    /// The first value (typically the bundle id or library path).
    pub fn value(&self) -> &str {
        self.values.first().map(String::as_str).unwrap_or("")
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Splits an OSGi header value into clauses. Quoted strings may contain `,` `;` and `=`.
pub fn parse_clauses(value: &str) -> Vec<Clause> {
    split_unquoted(value, ',')
        .into_iter()
        .filter_map(|raw| parse_clause(&raw))
        .collect()
}

fn parse_clause(raw: &str) -> Option<Clause> {
    let mut clause = Clause::default();
    for part in split_unquoted(raw, ';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((name, value)) = split_parameter(part, ":=") {
            clause.directives.push((name, value));
        } else if let Some((name, value)) = split_parameter(part, "=") {
            clause.attributes.push((name, value));
        } else {
            clause.values.push(unquote(part));
        }
    }
    (!clause.values.is_empty()).then_some(clause)
}

fn split_parameter(part: &str, separator: &str) -> Option<(String, String)> {
    let idx = find_unquoted(part, separator)?;
    let name = part[..idx].trim();
    // `a:=b` also contains `=`; make sure a plain `=` split doesn't eat the colon.
    if separator == "=" && name.ends_with(':') {
        return None;
    }
    if name.is_empty() {
        return None;
    }
    let value = part[idx + separator.len()..].trim();
    Some((name.to_string(), unquote(value)))
}

fn find_unquoted(text: &str, needle: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (idx, ch) in text.char_indices() {
        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }
        if !in_quotes && text[idx..].starts_with(needle) {
            return Some(idx);
        }
    }
    None
}

fn split_unquoted(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in text.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            c if c == separator && !in_quotes => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}
