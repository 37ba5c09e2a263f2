//! Line and column helpers shared by every extractor and matcher.
//!
//! Lines and columns are 1-based. A column range covers the characters
//! `[start, end)`, so a three-letter token at the start of a line spans `1-4`.

mod json;
mod toml;
mod yaml;

pub use self::json::{in_json, JsonEntry, JsonPositions};
pub use self::toml::in_toml;
pub use self::yaml::{in_yaml, YamlEntry, YamlPositions};

use crate::sbom_generation::domain::{FilePosition, Position};
use crate::shared::regex_cache::cached_regex;
use std::sync::OnceLock;

/// Whether position tracing was requested with `debug=true`.
pub fn trace_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var("debug").is_ok_and(|value| value == "true"))
}

/// Emits a `debug` event when position tracing is enabled.
#[macro_export]
macro_rules! trace_position {
    ($($arg:tt)*) => {
        if $crate::shared::position::trace_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Splits text on `\r\n`, `\r` or `\n`, which may be mixed in one file.
pub fn bytes_to_lines(bytes: &[u8]) -> Vec<String> {
    text_to_lines(&String::from_utf8_lossy(bytes))
}

/// [`bytes_to_lines`] for text that is already decoded.
pub fn text_to_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            '\n' => lines.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    lines.push(current);

    lines
}

/// 1-based column of the character starting at `byte_index` in `line`.
pub(crate) fn column_at(line: &str, byte_index: usize) -> usize {
    line.get(..byte_index)
        .map(|prefix| prefix.chars().count())
        .unwrap_or(0)
        + 1
}

/// Locates the first occurrence of `needle` inside a multi-line `block`
/// whose first line is `block_start_line`.
pub fn find_substring_in_multiline(
    block: &str,
    needle: &str,
    block_start_line: usize,
) -> Option<FilePosition> {
    if needle.is_empty() {
        return None;
    }
    let index = block.find(needle)?;

    let before = &block[..index];
    let line_offset = before.matches('\n').count();
    let line_begin = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column_start = column_at(&block[line_begin..], index - line_begin);

    let needle_lines = needle.matches('\n').count();
    let column_end = match needle.rfind('\n') {
        Some(last_newline) => needle[last_newline + 1..].chars().count() + 1,
        None => column_start + needle.chars().count(),
    };

    let line_start = block_start_line + line_offset;
    Some(FilePosition::new(
        String::new(),
        Position::new(line_start, line_start + needle_lines),
        Position::new(column_start, column_end),
    ))
}

/// Finds the first line containing `prefix + needle + suffix` and returns
/// the span of `needle` on that line.
pub fn find_in_block_by_delimiters<S: AsRef<str>>(
    lines: &[S],
    needle: &str,
    block_start_line: usize,
    prefix: &str,
    suffix: &str,
) -> Option<FilePosition> {
    let pattern = format!("{}{}{}", prefix, needle, suffix);

    lines.iter().enumerate().find_map(|(offset, line)| {
        let line = line.as_ref();
        let index = line.find(&pattern)? + prefix.len();
        let column_start = column_at(line, index);
        let line_number = block_start_line + offset;

        Some(FilePosition::new(
            String::new(),
            Position::at(line_number),
            Position::new(column_start, column_start + needle.chars().count()),
        ))
    })
}

/// Like [`find_in_block_by_delimiters`], with regex fragments for the body
/// and its delimiters. The span reported is the text matched by `body`.
pub fn find_in_block_by_regex<S: AsRef<str>>(
    lines: &[S],
    body: &str,
    block_start_line: usize,
    prefix: &str,
    suffix: &str,
) -> Option<FilePosition> {
    let pattern = format!("{}(?P<body>{}){}", prefix, body, suffix);
    let regex = match cached_regex(&pattern) {
        Ok(regex) => regex,
        Err(err) => {
            tracing::warn!("invalid position pattern {}: {}", pattern, err);
            return None;
        }
    };

    lines.iter().enumerate().find_map(|(offset, line)| {
        let line = line.as_ref();
        let found = regex.captures(line)?.name("body")?;
        let line_number = block_start_line + offset;

        Some(FilePosition::new(
            String::new(),
            Position::at(line_number),
            Position::new(column_at(line, found.start()), column_at(line, found.end())),
        ))
    })
}

/// Column of the first non-whitespace character, `None` for blank lines.
pub fn first_non_empty_column(line: &str) -> Option<usize> {
    line.char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(index, _)| column_at(line, index))
}

/// Column of the last non-whitespace character, `None` for blank lines.
pub fn last_non_empty_column(line: &str) -> Option<usize> {
    line.char_indices()
        .rev()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(index, _)| column_at(line, index))
}

/// Block covering `lines[first..=last]` (0-based indices) from the first
/// to the last visible character.
pub fn block_between<S: AsRef<str>>(lines: &[S], first: usize, last: usize) -> Option<FilePosition> {
    let start_column = first_non_empty_column(lines.get(first)?.as_ref())?;
    let end_column = last_non_empty_column(lines.get(last)?.as_ref())?;

    Some(FilePosition::new(
        String::new(),
        Position::new(first + 1, last + 1),
        Position::new(start_column, end_column + 1),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_lines_handles_mixed_endings() {
        let lines = bytes_to_lines(b"a\r\nb\rc\nd");
        assert_eq!(lines, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_bytes_to_lines_keeps_trailing_empty_line() {
        assert_eq!(bytes_to_lines(b"a\n"), vec!["a", ""]);
        assert_eq!(bytes_to_lines(b""), vec![""]);
    }

    #[test]
    fn test_find_substring_in_multiline() {
        let block = "gem \"rails\",\n  \"~> 7.0\"";
        let position = find_substring_in_multiline(block, "~> 7.0", 10).unwrap();

        assert_eq!(position.line, Position::at(11));
        assert_eq!(position.column, Position::new(4, 10));
    }

    #[test]
    fn test_find_substring_in_multiline_missing() {
        assert!(find_substring_in_multiline("abc", "zzz", 1).is_none());
        assert!(find_substring_in_multiline("abc", "", 1).is_none());
    }

    #[test]
    fn test_find_substring_spanning_lines() {
        let position = find_substring_in_multiline("x\nfoo\nbar", "foo\nba", 1).unwrap();
        assert_eq!(position.line, Position::new(2, 3));
        assert_eq!(position.column, Position::new(1, 3));
    }

    #[test]
    fn test_find_in_block_by_delimiters() {
        let lines = vec!["{", "    \"lodash\": \"^4.0.0\","];
        let position = find_in_block_by_delimiters(&lines, "lodash", 5, "\"", "\"").unwrap();

        assert_eq!(position.line, Position::at(6));
        assert_eq!(position.column, Position::new(6, 12));
    }

    #[test]
    fn test_find_in_block_by_delimiters_requires_suffix() {
        let lines = vec!["\"aws-sdk-client-mock-jest\": \"1\"", "\"aws-sdk-client-mock\": \"2\""];
        let position =
            find_in_block_by_delimiters(&lines, "aws-sdk-client-mock", 1, "\"", "\"").unwrap();
        assert_eq!(position.line, Position::at(2));
    }

    #[test]
    fn test_find_in_block_by_regex() {
        let lines = vec!["<version>1.2.3</version>"];
        let position =
            find_in_block_by_regex(&lines, r"[\d.]+", 4, r"<version>\s*", r"\s*</version>").unwrap();

        assert_eq!(position.line, Position::at(4));
        assert_eq!(position.column, Position::new(10, 15));
    }

    #[test]
    fn test_find_in_block_by_regex_invalid_pattern() {
        let lines = vec!["anything"];
        assert!(find_in_block_by_regex(&lines, "(", 1, "", "").is_none());
    }

    #[test]
    fn test_non_empty_columns() {
        assert_eq!(first_non_empty_column("   abc  "), Some(4));
        assert_eq!(last_non_empty_column("   abc  "), Some(6));
        assert_eq!(first_non_empty_column("    "), None);
        assert_eq!(last_non_empty_column(""), None);
    }

    #[test]
    fn test_block_between() {
        let lines = vec!["  foo:", "    bar: 1  "];
        let block = block_between(&lines, 0, 1).unwrap();
        assert_eq!(block.line, Position::new(1, 2));
        assert_eq!(block.column, Position::new(3, 11));
    }
}
