use super::{block_between, column_at};
use crate::sbom_generation::domain::{FilePosition, Position};
use std::collections::HashMap;

/// Positions of one mapping entry in a block-style YAML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlEntry {
    /// From the key to the last visible character of its subtree.
    pub block: FilePosition,
    /// Key text, quotes excluded.
    pub key: FilePosition,
    /// Inline scalar value, quotes excluded.
    pub value: Option<FilePosition>,
}

/// Mapping-entry positions of a YAML document, addressed by key path.
#[derive(Debug, Default)]
pub struct YamlPositions {
    entries: HashMap<Vec<String>, YamlEntry>,
    children: HashMap<Vec<String>, Vec<String>>,
}

impl YamlPositions {
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&YamlEntry> {
        let path: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        self.entries.get(&path)
    }

    /// Keys of the mapping at `path`, in document order.
    pub fn keys<S: AsRef<str>>(&self, path: &[S]) -> Vec<&str> {
        let path: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        self.children
            .get(&path)
            .map(|keys| keys.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

struct OpenEntry {
    indent: usize,
    key: String,
    start: usize,
    key_span: FilePosition,
    value: Option<FilePosition>,
}

struct ParsedKey {
    key: String,
    key_start: usize,
    key_end: usize,
    rest_start: usize,
}

fn parse_key(line: &str, indent: usize) -> Option<ParsedKey> {
    let body = &line[indent..];
    let quote = body.chars().next().filter(|c| *c == '"' || *c == '\'');

    let (key, key_start, key_end, after_key) = match quote {
        Some(q) => {
            let close = body[1..].find(q)? + 1;
            (body[1..close].to_string(), indent + 1, indent + close, indent + close + 1)
        }
        None => {
            if body.starts_with(['{', '[', '-', '?', '|', '>']) {
                return None;
            }
            let colon = body
                .find(": ")
                .or_else(|| body.strip_suffix(':').map(|stripped| stripped.len()))?;
            let key = body[..colon].trim_end();
            (key.to_string(), indent, indent + key.len(), indent + colon)
        }
    };

    let rest = &line[after_key..];
    let rest = rest.strip_prefix(':')?;
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }

    Some(ParsedKey {
        key,
        key_start,
        key_end,
        rest_start: after_key + 1,
    })
}

fn scalar_span(line: &str, rest_start: usize, line_number: usize) -> Option<FilePosition> {
    let rest = &line[rest_start..];
    let leading = rest.len() - rest.trim_start().len();
    let value = rest.trim();
    if value.is_empty() || value.starts_with('#') {
        return None;
    }

    let start = rest_start + leading;
    let (start, end) = match value.chars().next() {
        Some(q @ ('"' | '\'')) if value.len() > 1 && value.ends_with(q) => {
            (start + 1, start + value.len() - 1)
        }
        _ => {
            let without_comment = value.split(" #").next().unwrap_or(value).trim_end();
            (start, start + without_comment.len())
        }
    };

    Some(FilePosition::new(
        String::new(),
        Position::at(line_number),
        Position::new(column_at(line, start), column_at(line, end)),
    ))
}

/// Records the positions of every mapping entry of a block-style YAML text.
///
/// Sequence items and block scalars are kept inside the entry that owns
/// them but are not addressable themselves.
pub fn in_yaml<S: AsRef<str>>(lines: &[S]) -> YamlPositions {
    let mut positions = YamlPositions::default();
    let mut stack: Vec<OpenEntry> = Vec::new();
    let mut skip_deeper: Option<usize> = None;
    let mut last_content = 0usize;

    let close = |entry: OpenEntry, end: usize, stack: &[OpenEntry], positions: &mut YamlPositions| {
        let Some(block) = block_between(lines, entry.start, end.max(entry.start)) else {
            return;
        };
        let parent: Vec<String> = stack.iter().map(|open| open.key.clone()).collect();
        let mut path = parent.clone();
        path.push(entry.key.clone());

        crate::trace_position!("[YAML] '{}' at {}", path.join("."), block);
        if !positions.entries.contains_key(&path) {
            positions.entries.insert(
                path,
                YamlEntry {
                    block,
                    key: entry.key_span,
                    value: entry.value,
                },
            );
            positions.children.entry(parent).or_default().push(entry.key);
        }
    };

    for (index, raw) in lines.iter().enumerate() {
        let line = raw.as_ref();
        let trimmed = line.trim_start();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || line.starts_with("---")
            || line.starts_with("...")
        {
            continue;
        }
        let indent = line.len() - trimmed.len();

        if let Some(limit) = skip_deeper {
            if indent > limit {
                last_content = index;
                continue;
            }
            skip_deeper = None;
        }

        let is_sequence_item = trimmed == "-" || trimmed.starts_with("- ");
        while let Some(top) = stack.last() {
            let closes = if is_sequence_item {
                top.indent > indent
            } else {
                top.indent >= indent
            };
            if !closes {
                break;
            }
            if let Some(entry) = stack.pop() {
                close(entry, last_content, &stack, &mut positions);
            }
        }
        last_content = index;

        if is_sequence_item {
            skip_deeper = Some(indent);
            continue;
        }

        let Some(parsed) = parse_key(line, indent) else {
            continue;
        };
        let rest = line[parsed.rest_start..].trim();
        if rest.starts_with('|') || rest.starts_with('>') {
            skip_deeper = Some(indent);
        }

        let line_number = index + 1;
        stack.push(OpenEntry {
            indent,
            key_span: FilePosition::new(
                String::new(),
                Position::at(line_number),
                Position::new(
                    column_at(line, parsed.key_start),
                    column_at(line, parsed.key_end),
                ),
            ),
            value: scalar_span(line, parsed.rest_start, line_number),
            key: parsed.key,
            start: index,
        });
    }

    while let Some(entry) = stack.pop() {
        close(entry, last_content, &stack, &mut positions);
    }

    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNPM: &str = "lockfileVersion: '9.0'

importers:

  .:
    devDependencies:
      eslint:
        specifier: ^8.0.0
        version: 8.57.0

packages:

  '@babel/core@7.0.0':
    resolution: {integrity: sha512-abc}
    cpu:
      - x64

  eslint@8.57.0:
    resolution: {integrity: sha512-def}
    hasBin: true
";

    fn positions() -> YamlPositions {
        let lines: Vec<&str> = PNPM.lines().collect();
        in_yaml(&lines)
    }

    #[test]
    fn test_quoted_key_block() {
        let positions = positions();
        let entry = positions.get(&["packages", "@babel/core@7.0.0"]).unwrap();

        assert_eq!(entry.block.line, Position::new(13, 16));
        assert_eq!(entry.block.column, Position::new(3, 12));
        assert_eq!(entry.key.column, Position::new(4, 21));
    }

    #[test]
    fn test_plain_key_block_and_value() {
        let positions = positions();
        let entry = positions.get(&["packages", "eslint@8.57.0"]).unwrap();
        assert_eq!(entry.block.line, Position::new(18, 20));

        let version = positions
            .get(&["importers", ".", "devDependencies", "eslint", "version"])
            .unwrap();
        assert_eq!(version.value.as_ref().unwrap().line, Position::at(9));
        assert_eq!(version.value.as_ref().unwrap().column, Position::new(18, 24));
    }

    #[test]
    fn test_quoted_scalar_value_excludes_quotes() {
        let positions = positions();
        let entry = positions.get(&["lockfileVersion"]).unwrap();
        assert_eq!(entry.value.as_ref().unwrap().column, Position::new(19, 22));
    }

    #[test]
    fn test_keys_in_document_order() {
        let positions = positions();
        assert_eq!(
            positions.keys(&["packages"]),
            vec!["@babel/core@7.0.0", "eslint@8.57.0"]
        );
    }

    #[test]
    fn test_block_scalar_lines_are_not_keys() {
        let lines = vec!["a:", "  text: |", "    not: a key", "  b: 1"];
        let positions = in_yaml(&lines);
        assert!(positions.get(&["a", "text", "not"]).is_none());
        assert_eq!(positions.get(&["a", "b"]).unwrap().block.line, Position::at(4));
        assert_eq!(positions.get(&["a", "text"]).unwrap().block.line, Position::new(2, 3));
    }
}
