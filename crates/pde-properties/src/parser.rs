//! Range-preserving reader for Java `.properties` text.

use pde_core::text::text_range;
use pde_core::TextRange;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    pub key: String,
    pub value: String,
    /// Span of the (escaped) key in the original text.
    pub key_range: TextRange,
}

/// Properties in file order. Duplicate keys are kept; lookups return the last one, like
/// `java.util.Properties`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Properties {
    pub entries: Vec<Property>,
}

impl Properties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|p| p.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.entries.iter()
    }

    /// Sets `key`, replacing the value of every existing occurrence or appending a new entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let mut found = false;
        for entry in self.entries.iter_mut().filter(|p| p.key == key) {
            entry.value = value.clone();
            found = true;
        }
        if !found {
            self.entries.push(Property {
                key,
                value,
                key_range: TextRange::default(),
            });
        }
    }

    /// Serializes back to `.properties` text (one `key=value` per line, escaped).
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            escape_into(&mut out, &entry.key, true);
            out.push('=');
            escape_into(&mut out, &entry.value, false);
            out.push('\n');
        }
        out
    }
}

/// One logical line: physical lines joined at unescaped trailing backslashes.
struct LogicalLine {
    chars: Vec<(usize, char)>,
}

pub fn parse(text: &str) -> Properties {
    let mut entries = Vec::new();
    let mut rest = text.char_indices().peekable();

    loop {
        let line = read_logical_line(&mut rest);
        if let Some(line) = line {
            if let Some(property) = parse_line(&line, text) {
                entries.push(property);
            }
        } else {
            break;
        }
    }

    Properties { entries }
}

fn read_logical_line(
    input: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Option<LogicalLine> {
    input.peek()?;

    let mut chars = Vec::new();
    loop {
        let mut physical = Vec::new();
        for (offset, ch) in input.by_ref() {
            if ch == '\n' {
                break;
            }
            physical.push((offset, ch));
        }
        if physical.last().is_some_and(|(_, c)| *c == '\r') {
            physical.pop();
        }

        let trailing = physical.iter().rev().take_while(|(_, c)| *c == '\\').count();
        let continues = trailing % 2 == 1;
        if continues {
            physical.pop();
        }
        chars.extend(physical);

        if !continues || input.peek().is_none() {
            break;
        }
        while input.peek().is_some_and(|(_, c)| matches!(c, ' ' | '\t' | '\x0C')) {
            input.next();
        }
    }

    Some(LogicalLine { chars })
}

fn parse_line(line: &LogicalLine, text: &str) -> Option<Property> {
    let chars = &line.chars;
    let mut i = chars.iter().position(|(_, c)| !is_blank(*c))?;
    if matches!(chars[i].1, '#' | '!') {
        return None;
    }

    let key_start = i;
    while i < chars.len() {
        match chars[i].1 {
            '\\' => i += 2,
            '=' | ':' => break,
            c if is_blank(c) => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(chars.len());

    while i < chars.len() && is_blank(chars[i].1) {
        i += 1;
    }
    if i < chars.len() && matches!(chars[i].1, '=' | ':') {
        i += 1;
    }
    while i < chars.len() && is_blank(chars[i].1) {
        i += 1;
    }

    let key = unescape(&chars[key_start..key_end]);
    let value = unescape(&chars[i.min(chars.len())..]);

    let start = chars[key_start].0;
    let end = chars[..key_end]
        .last()
        .map(|(offset, c)| offset + c.len_utf8())
        .unwrap_or(start)
        .min(text.len());

    Some(Property {
        key,
        value,
        key_range: text_range(start, end),
    })
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0C')
}

fn unescape(chars: &[(usize, char)]) -> String {
    let mut out = String::new();
    let mut iter = chars.iter().map(|(_, c)| *c).peekable();

    while let Some(c) = iter.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match iter.next() {
            None => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0C'),
            Some('u') => {
                let digits: String = iter.clone().take(4).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == 4 => {
                        out.push(decoded);
                        for _ in 0..4 {
                            iter.next();
                        }
                    }
                    _ => out.push('u'),
                }
            }
            Some(other) => out.push(other),
        }
    }

    out
}

fn escape_into(out: &mut String, raw: &str, is_key: bool) {
    for (idx, c) in raw.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0C' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || idx == 0 => out.push_str("\\ "),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
}
