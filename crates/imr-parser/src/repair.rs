//! Line-level fault classification and the fixes applied for each fault.

use serde::Serialize;

/// Top-level sections whose keys the model sometimes indents by mistake.
const SECTION_KEYS: &[&str] = &["area", "entities", "relations"];
/// Keys the model tends to glue onto the end of the previous value.
const GLUED_KEYS: &[&str] = &["id", "name", "type"];
/// Scalar keys whose values are quoted when they break composition.
const QUOTABLE_KEYS: &[&str] = &["value", "name"];

/// A known corruption of a single line of model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    /// A section key such as `entities:` carrying stray surrounding whitespace.
    MisindentedSectionKey,
    /// Two `key: value` pairs on one line; the second key starts at `split_at`.
    CollapsedKeys { split_at: usize },
    /// A scalar that must be quoted to compose; the value starts at `value_start`.
    UnquotedValue { value_start: usize },
}

impl Fault {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MisindentedSectionKey => "misindented-section-key",
            Self::CollapsedKeys { .. } => "collapsed-keys",
            Self::UnquotedValue { .. } => "unquoted-value",
        }
    }

    /// Rewrite the offending line. The result may span two lines.
    #[must_use]
    pub fn repair_line(self, line: &str) -> String {
        match self {
            Self::MisindentedSectionKey => line.trim().to_string(),
            Self::CollapsedKeys { split_at } => {
                let (head, tail) = line.split_at(split_at);
                let indent = key_column(line);
                format!("{}\n{}{}", head.trim_end(), " ".repeat(indent), tail.trim_end())
            }
            Self::UnquotedValue { value_start } => {
                let (head, value) = line.split_at(value_start);
                let value = value.trim_end();
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                format!("{head}\"{escaped}\"")
            }
        }
    }
}

/// Match a line against the known corruption classes.
///
/// Classes are tried in a fixed order: section indentation, glued keys,
/// unquoted values. `None` means the line is not repairable.
#[must_use]
pub fn classify_line(line: &str) -> Option<Fault> {
    let line = line.trim_end_matches('\r');
    if is_misindented_section_key(line) {
        return Some(Fault::MisindentedSectionKey);
    }
    if let Some(split_at) = find_glued_key(line) {
        return Some(Fault::CollapsedKeys { split_at });
    }
    find_unquoted_value(line).map(|value_start| Fault::UnquotedValue { value_start })
}

fn is_misindented_section_key(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed == line {
        return false;
    }
    trimmed
        .strip_suffix(':')
        .is_some_and(|key| SECTION_KEYS.contains(&key))
}

/// Byte offset of the first key, skipping indentation and sequence markers.
fn key_start(line: &str) -> usize {
    let mut offset = 0;
    let mut rest = line;
    loop {
        let trimmed = rest.trim_start_matches([' ', '\t']);
        offset += rest.len() - trimmed.len();
        match trimmed.strip_prefix("- ") {
            Some(after_marker) => {
                offset += 2;
                rest = after_marker;
            }
            None => return offset,
        }
    }
}

fn key_column(line: &str) -> usize {
    line[..key_start(line)].chars().count()
}

/// Splits `line` into its first key and the text after `key:`.
fn split_first_pair(line: &str) -> Option<(&str, usize)> {
    let start = key_start(line);
    let colon = line[start..].find(':')? + start;
    let key = line[start..colon].trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, colon + 1))
}

fn find_glued_key(line: &str) -> Option<usize> {
    let (_, after_colon) = split_first_pair(line)?;
    let rest = &line[after_colon..];
    if rest.trim().is_empty() {
        return None;
    }

    GLUED_KEYS
        .iter()
        .filter_map(|key| {
            let needle = format!("{key}:");
            rest.match_indices(needle.as_str())
                .map(|(index, _)| after_colon + index)
                .find(|&index| is_glued_key_at(line, index, needle.len()))
        })
        .min()
}

fn is_glued_key_at(line: &str, index: usize, needle_len: usize) -> bool {
    let preceded_by_value = line[..index]
        .chars()
        .next_back()
        .is_some_and(|ch| !(ch.is_alphabetic() || ch == '_' || ch == '-'))
        && !line[..index].trim_end().ends_with(':');
    let followed_by_space = line[index + needle_len..]
        .chars()
        .next()
        .is_none_or(char::is_whitespace);
    preceded_by_value && followed_by_space
}

fn find_unquoted_value(line: &str) -> Option<usize> {
    let (key, after_colon) = split_first_pair(line)?;
    if !QUOTABLE_KEYS.contains(&key) {
        return None;
    }
    let rest = &line[after_colon..];
    let value = rest.trim();
    if value.is_empty() || value.starts_with(['"', '\'']) {
        return None;
    }
    Some(after_colon + (rest.len() - rest.trim_start().len()))
}
