use crate::sbom_generation::domain::{FileLocations, FilePosition, Position};
use std::collections::HashMap;

/// Positions of one member of a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonEntry {
    /// From the opening quote of the key (or the first character of an array
    /// element) to just past the end of the value.
    pub block: FilePosition,
    /// Key text, quotes excluded. `None` for array elements.
    pub key: Option<FilePosition>,
    /// Scalar value, quotes excluded. `None` for objects and arrays.
    pub value: Option<FilePosition>,
}

/// Member positions of a JSON document, addressed by key path.
///
/// Array elements are addressed by their index. When an object repeats a key
/// the first occurrence wins.
#[derive(Debug, Default)]
pub struct JsonPositions {
    entries: HashMap<String, JsonEntry>,
    children: HashMap<String, Vec<String>>,
}

const PATH_SEPARATOR: char = '\u{0}';

fn path_key<S: AsRef<str>>(path: &[S]) -> String {
    let mut key = String::new();
    for (i, segment) in path.iter().enumerate() {
        if i > 0 {
            key.push(PATH_SEPARATOR);
        }
        key.push_str(segment.as_ref());
    }
    key
}

impl JsonPositions {
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&JsonEntry> {
        self.entries.get(&path_key(path))
    }

    /// Member names of the container at `path`, in document order.
    pub fn keys<S: AsRef<str>>(&self, path: &[S]) -> Vec<&str> {
        self.children
            .get(&path_key(path))
            .map(|keys| keys.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Locations of the member at `path` in `filename`: its block, its key as
    /// the name, and the scalar value of its `version_key` member.
    pub fn member_locations<S: AsRef<str>>(
        &self,
        path: &[S],
        version_key: &str,
        filename: &str,
    ) -> Option<FileLocations> {
        let entry = self.get(path)?;
        let mut version_path: Vec<&str> = path.iter().map(AsRef::as_ref).collect();
        version_path.push(version_key);
        let version = self
            .get(&version_path)
            .and_then(|member| member.value.clone());

        Some(
            FileLocations::new(entry.block.clone().in_file(filename))
                .with_name(entry.key.clone().map(|key| key.in_file(filename)))
                .with_version(version.map(|value| value.in_file(filename))),
        )
    }

    fn insert(&mut self, parent: &[String], name: String, entry: JsonEntry) {
        let mut path = parent.to_vec();
        path.push(name.clone());
        let key = path_key(&path);
        if self.entries.contains_key(&key) {
            return;
        }
        crate::trace_position!("[JSON] '{}' at {}", path.join("."), entry.block);
        self.entries.insert(key, entry);
        self.children.entry(path_key(parent)).or_default().push(name);
    }
}

#[derive(Clone, Copy)]
struct Cursor {
    line: usize,
    column: usize,
}

struct PendingKey {
    name: String,
    start: Cursor,
    span: FilePosition,
}

struct Frame {
    path: Vec<String>,
    is_object: bool,
    next_index: usize,
    pending_key: Option<PendingKey>,
    /// Member this container is the value of, with its start.
    member: Option<(String, Cursor, Option<FilePosition>)>,
}

fn span(start: Cursor, end: Cursor) -> FilePosition {
    FilePosition::new(
        String::new(),
        Position::new(start.line, end.line),
        Position::new(start.column, end.column),
    )
}

/// Records the line and column range of every member of a JSON document.
///
/// This is a tolerant tokenizer run next to a real decoder: it never fails,
/// and positions after a syntax error are unspecified.
/// Decodes the body of a JSON string literal. Malformed escapes keep the raw text.
fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    serde_json::from_str(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}

pub fn in_json(text: &str) -> JsonPositions {
    let mut positions = JsonPositions::default();
    let mut frames: Vec<Frame> = Vec::new();
    let mut cursor = Cursor { line: 1, column: 1 };
    let mut chars = text.chars().peekable();

    // Claims the member name for a value starting at `start`.
    fn claim(frames: &mut [Frame], start: Cursor) -> Option<(String, Cursor, Option<FilePosition>)> {
        let frame = frames.last_mut()?;
        if frame.is_object {
            let key = frame.pending_key.take()?;
            Some((key.name, key.start, Some(key.span)))
        } else {
            let index = frame.next_index;
            frame.next_index += 1;
            Some((index.to_string(), start, None))
        }
    }

    while let Some(c) = chars.next() {
        let here = cursor;
        cursor.column += 1;

        match c {
            '\n' => {
                cursor.line += 1;
                cursor.column = 1;
            }
            '"' => {
                let mut raw = String::new();
                let content_start = cursor;
                let mut escaped = false;
                let mut content_end = cursor;
                for c in chars.by_ref() {
                    if c == '\n' {
                        cursor.line += 1;
                        cursor.column = 1;
                        raw.push(c);
                        continue;
                    }
                    content_end = cursor;
                    cursor.column += 1;
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        break;
                    }
                    raw.push(c);
                }
                let value = unescape(&raw);
                let inner = span(content_start, content_end);
                let after = cursor;

                let expects_key = frames
                    .last()
                    .is_some_and(|frame| frame.is_object && frame.pending_key.is_none());
                if expects_key {
                    if let Some(frame) = frames.last_mut() {
                        frame.pending_key = Some(PendingKey {
                            name: value,
                            start: here,
                            span: inner,
                        });
                    }
                } else if let Some((name, start, key)) = claim(&mut frames, here) {
                    let entry = JsonEntry {
                        block: span(start, after),
                        key,
                        value: Some(inner),
                    };
                    let parent = frames.last().map(|f| f.path.clone()).unwrap_or_default();
                    positions.insert(&parent, name, entry);
                }
            }
            '{' | '[' => {
                let member = claim(&mut frames, here);
                let mut path = frames.last().map(|f| f.path.clone()).unwrap_or_default();
                if let Some((name, _, _)) = &member {
                    path.push(name.clone());
                }
                frames.push(Frame {
                    path,
                    is_object: c == '{',
                    next_index: 0,
                    pending_key: None,
                    member,
                });
            }
            '}' | ']' => {
                if let Some(frame) = frames.pop() {
                    if let Some((name, start, key)) = frame.member {
                        let entry = JsonEntry {
                            block: span(start, cursor),
                            key,
                            value: None,
                        };
                        let parent = frames.last().map(|f| f.path.clone()).unwrap_or_default();
                        positions.insert(&parent, name, entry);
                    }
                }
            }
            c if c.is_whitespace() || c == ',' || c == ':' => {}
            _ => {
                // Bare scalar: number, true, false or null.
                let mut end = cursor;
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || matches!(next, ',' | '}' | ']') {
                        break;
                    }
                    chars.next();
                    cursor.column += 1;
                    end = cursor;
                }
                if let Some((name, start, key)) = claim(&mut frames, here) {
                    let entry = JsonEntry {
                        block: span(start, end),
                        key,
                        value: Some(span(here, end)),
                    };
                    let parent = frames.last().map(|f| f.path.clone()).unwrap_or_default();
                    positions.insert(&parent, name, entry);
                }
            }
        }
    }

    positions
}
