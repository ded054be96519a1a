//! Tag section parsing
//!
//! A line may start with `@key=value;key2=value2 ` before its payload.
//! Keys without `=` map to the empty string.

use std::collections::HashMap;

/// A protocol line split into its tag section and payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedLine {
    /// Tag key to (unescaped) value
    pub tags: HashMap<String, String>,
    /// Everything after the tag section, or the whole line when untagged
    pub message: String,
}

impl TaggedLine {
    /// Look up a tag value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Look up a tag value, treating an empty value as absent
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Badge names from the `badges` tag, in order
    pub fn badges(&self) -> Vec<String> {
        self.get("badges").map(parse_badges).unwrap_or_default()
    }
}

/// Split a line into tags and payload
///
/// ```
/// use chatview_protocol::parse_tags;
///
/// let parsed = parse_tags("@a=1;b=2 rest of payload");
/// assert_eq!(parsed.get("a"), Some("1"));
/// assert_eq!(parsed.message, "rest of payload");
/// ```
pub fn parse_tags(line: &str) -> TaggedLine {
    let Some(rest) = line.strip_prefix('@') else {
        return TaggedLine {
            tags: HashMap::new(),
            message: line.to_string(),
        };
    };

    let (section, message) = match rest.split_once(' ') {
        Some((section, message)) => (section, message),
        None => (rest, ""),
    };

    let tags = section
        .split(';')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), unescape_value(value)),
            None => (pair.to_string(), String::new()),
        })
        .collect();

    TaggedLine {
        tags,
        message: message.to_string(),
    }
}

/// Extract badge names from a `name/version,name/version` list
///
/// Entries without a `/` are dropped; order is preserved.
pub fn parse_badges(badges: &str) -> Vec<String> {
    badges
        .split(',')
        .filter_map(|entry| entry.split_once('/'))
        .map(|(name, _version)| name.to_string())
        .collect()
}

/// Undo tag value escaping (`\s` space, `\:` semicolon, `\\`, `\r`, `\n`)
fn unescape_value(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some(':') => out.push(';'),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            // A trailing lone backslash is dropped
            None => {}
        }
    }
    out
}
