use super::is_blank;
use super::python::parse_requirement;
use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{FilePosition, PackageManager, PackageRecord, Position};
use crate::shared::error::ExtractError;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

const INSTALL_REQUIRES: &str = "install_requires";

/// Character cursor tracking 1-based line and column.
struct Cursor<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn next(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.next() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Consumes `rest` if it follows; leaves the cursor after the mismatch otherwise.
    fn eat(&mut self, rest: &str) -> bool {
        for expected in rest.chars() {
            if self.chars.peek() != Some(&expected) {
                return false;
            }
            self.next();
        }
        true
    }
}

/// Reads the `install_requires = [ '...', "..." ]` list, refusing anything
/// more dynamic than string literals.
fn read_install_requires(text: &str, path: &str) -> Result<Vec<(String, FilePosition)>, ExtractError> {
    let unsupported = |cursor: &Cursor<'_>, what: &str| {
        ExtractError::unsupported(
            Path::new(path),
            format!("{} at line {}, column {}", what, cursor.line, cursor.column),
        )
    };

    let mut cursor = Cursor::new(text);
    let mut found = false;
    while let Some(c) = cursor.next() {
        if c == '#' {
            cursor.skip_comment();
        } else if let Some(rest) = INSTALL_REQUIRES.strip_prefix(c) {
            if cursor.eat(rest) {
                found = true;
                break;
            }
        }
    }
    if !found {
        return Err(ExtractError::parse(Path::new(path), "could not find install_requires"));
    }

    let mut requirements = Vec::new();
    let (mut in_equal, mut in_array) = (false, false);
    loop {
        let (line, column) = (cursor.line, cursor.column);
        let Some(c) = cursor.next() else {
            return Err(unsupported(&cursor, "unexpected end of file"));
        };
        match c {
            '#' => cursor.skip_comment(),
            ' ' | '\t' | '\r' | '\n' | '\x0c' | ',' => {}
            '=' if !in_equal => in_equal = true,
            '[' if in_equal && !in_array => in_array = true,
            ']' if in_equal && in_array => return Ok(requirements),
            '\'' | '"' if in_array => {
                let mut literal = String::new();
                loop {
                    match cursor.next() {
                        Some(end) if end == c => break,
                        Some('\n') | None => return Err(unsupported(&cursor, "unterminated string")),
                        Some(other) => literal.push(other),
                    }
                }
                let position = FilePosition::new(
                    path,
                    Position::at(line),
                    Position::new(column + 1, column + 1 + literal.chars().count()),
                );
                requirements.push((literal, position));
            }
            other => return Err(unsupported(&cursor, &format!("unexpected '{}'", other))),
        }
    }
}

/// Extractor for `setup.py`, limited to a literal `install_requires` list.
#[derive(Debug, Default)]
pub struct SetupPyExtractor;

impl SetupPyExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for SetupPyExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "setup.py")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }
        let path = file.path();

        let mut records = BTreeMap::new();
        for (literal, position) in read_install_requires(file.text(), path)? {
            let requirement = parse_requirement(&literal).ok_or_else(|| {
                ExtractError::unsupported(
                    Path::new(path),
                    format!("invalid requirement \"{}\" at {}", literal, position),
                )
            })?;

            // Positions inside the literal are relative to its first character.
            let mut record = requirement.into_record(path, PackageManager::SetupTools, &literal, 1);
            let offset = position.column.start - 1;
            let rebase = |p: &mut FilePosition| {
                p.line = position.line;
                p.column = Position::new(p.column.start + offset, p.column.end + offset);
            };
            record.locations.block = position.clone();
            record.locations.name.iter_mut().for_each(rebase);
            record.locations.version.iter_mut().for_each(rebase);

            records.insert(record.name.clone(), record);
        }

        Ok(records.into_values().collect())
    }
}
