use super::is_blank;
use crate::ports::outbound::{DepFile, Extractor};
use crate::sbom_generation::domain::{
    Ecosystem, FileLocations, FilePosition, PackageManager, PackageRecord, Position,
};
use crate::shared::error::ExtractError;
use crate::shared::position::text_to_lines;
use crate::shared::regex_cache::static_regex;
use std::collections::BTreeMap;
use std::path::Path;

/// Placeholder for versions that are neither canonical nor implied by the path.
const UNKNOWN_VERSION: &str = "v0.0.0-unknown-version";

const DIRECTIVES: [&str; 10] = [
    "module", "go", "toolchain", "godebug", "require", "exclude", "replace", "retract", "tool",
    "ignore",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    /// 1-based column of the first character.
    start: usize,
    /// Column just past the last character.
    end: usize,
}

/// One `verb args...` line, either standalone or inside a `verb ( ... )` block.
#[derive(Debug)]
struct Directive {
    verb: String,
    args: Vec<Token>,
    line: usize,
    start: usize,
    end: usize,
}

impl Directive {
    fn span(&self, path: &str) -> FilePosition {
        FilePosition::new(path, Position::at(self.line), Position::new(self.start, self.end))
    }

    fn token_span(&self, token: &Token, path: &str) -> FilePosition {
        FilePosition::new(path, Position::at(self.line), Position::new(token.start, token.end))
    }
}

fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            break;
        }

        let start = i;
        let text = match c {
            '"' | '`' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(format!("unterminated quoted string at column {}", start + 1)),
                        Some(&quote) if quote == c => break,
                        Some('\\') if c == '"' => {
                            if let Some(&escaped) = chars.get(i + 1) {
                                text.push(escaped);
                            }
                            i += 2;
                            continue;
                        }
                        Some(&other) => text.push(other),
                    }
                    i += 1;
                }
                i += 1;
                text
            }
            '(' | ')' => {
                i += 1;
                c.to_string()
            }
            _ => {
                while i < chars.len()
                    && !chars[i].is_whitespace()
                    && !matches!(chars[i], '(' | ')' | '"' | '`')
                    && !(chars[i] == '/' && chars.get(i + 1) == Some(&'/'))
                {
                    i += 1;
                }
                chars[start..i].iter().collect()
            }
        };

        tokens.push(Token {
            text,
            start: start + 1,
            end: i + 1,
        });
    }

    Ok(tokens)
}

fn parse_directives(text: &str) -> Result<Vec<Directive>, String> {
    let mut directives = Vec::new();
    let mut block: Option<(String, usize)> = None;

    for (index, line) in text_to_lines(text).iter().enumerate() {
        let line_number = index + 1;
        let tokens = tokenize(line).map_err(|e| format!("{}:{}", line_number, e))?;
        let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
            continue;
        };
        let (start, end) = (first.start, last.end);

        if let Some((verb, _)) = block.clone() {
            if first.text == ")" {
                block = None;
                continue;
            }
            directives.push(Directive {
                verb,
                args: tokens,
                line: line_number,
                start,
                end,
            });
            continue;
        }

        let verb = first.text.clone();
        if !DIRECTIVES.contains(&verb.as_str()) {
            return Err(format!("{}: unknown directive: {}", line_number, verb));
        }

        let args: Vec<Token> = tokens.into_iter().skip(1).collect();
        match args.as_slice() {
            [open] if open.text == "(" => block = Some((verb, line_number)),
            [open, close] if open.text == "(" && close.text == ")" => {}
            _ => directives.push(Directive {
                verb,
                args,
                line: line_number,
                start,
                end,
            }),
        }
    }

    if let Some((verb, line)) = block {
        return Err(format!("{}: {} block is never closed", line, verb));
    }

    Ok(directives)
}

/// Canonical `vMAJOR.MINOR.PATCH[-pre]` form of a Go module version, keeping
/// a `+incompatible` suffix. `None` for anything that is not semver.
pub fn canonical_version(version: &str) -> Option<String> {
    let captures = static_regex(
        r"^v(0|[1-9]\d*)(?:\.(0|[1-9]\d*))?(?:\.(0|[1-9]\d*))?(-[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?(\+[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?$",
    )
    .captures(version)?;

    let part = |index: usize| captures.get(index).map(|m| m.as_str());
    let shorthand = part(2).is_none() || part(3).is_none();
    if shorthand && (part(4).is_some() || part(5).is_some()) {
        return None;
    }

    let mut canonical = format!(
        "v{}.{}.{}{}",
        part(1).unwrap_or("0"),
        part(2).unwrap_or("0"),
        part(3).unwrap_or("0"),
        part(4).unwrap_or("")
    );
    if part(5) == Some("+incompatible") {
        canonical.push_str("+incompatible");
    }
    Some(canonical)
}

/// Major version implied by a `/vN` or gopkg.in `.vN` path suffix.
fn path_major(module_path: &str) -> Option<String> {
    let gopkg = module_path.starts_with("gopkg.in/");
    let pattern = if gopkg {
        static_regex(r"\.(v(?:0|[1-9]\d*))(?:-unstable)?$")
    } else {
        static_regex(r"/(v(?:[2-9]|[1-9]\d+))$")
    };
    pattern
        .captures(module_path)
        .and_then(|captures| captures.get(1))
        .map(|major| major.as_str().to_string())
}

fn resolve_version(module_path: &str, version: &str) -> String {
    canonical_version(version)
        .or_else(|| path_major(module_path))
        .unwrap_or_else(|| {
            tracing::warn!(
                "{}@{} is not a canonical version, defaulting to an empty version",
                module_path,
                version
            );
            UNKNOWN_VERSION.to_string()
        })
}

fn record_version(resolved: &str) -> String {
    if resolved == UNKNOWN_VERSION {
        String::new()
    } else {
        resolved.trim_start_matches('v').to_string()
    }
}

/// Pads a `go` directive such as `1.21` or `1.22rc1` to `MAJOR.MINOR.PATCH`.
pub fn padded_go_version(version: &str) -> String {
    let mut components = version
        .split('.')
        .map(|component| {
            let digits: String = component.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u64>().unwrap_or(0)
        })
        .chain(std::iter::repeat(0));

    let mut next = || components.next().unwrap_or(0);
    format!("{}.{}.{}", next(), next(), next())
}

/// Extractor for `go.mod` module files.
#[derive(Debug, Default)]
pub struct GoModExtractor;

impl GoModExtractor {
    pub fn new() -> Self {
        Self
    }
}

struct Required {
    record: PackageRecord,
    /// Canonical version as written on the left side of `replace` directives.
    resolved: String,
}

impl Extractor for GoModExtractor {
    fn should_extract(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .is_some_and(|name| name == "go.mod")
    }

    fn extract(&self, file: &dyn DepFile) -> Result<Vec<PackageRecord>, ExtractError> {
        if is_blank(file) {
            return Ok(Vec::new());
        }
        let path = file.path();
        let parse_error = |details: String| ExtractError::parse(Path::new(path), details);

        let directives = parse_directives(file.text()).map_err(parse_error)?;
        let mut required: BTreeMap<(String, String), Required> = BTreeMap::new();

        for directive in directives.iter().filter(|d| d.verb == "require") {
            let [module, version, ..] = directive.args.as_slice() else {
                return Err(parse_error(format!(
                    "{}: usage: require module/path v1.2.3",
                    directive.line
                )));
            };
            let resolved = resolve_version(&module.text, &version.text);
            let record = PackageRecord::new(
                module.text.clone(),
                record_version(&resolved),
                Ecosystem::Go,
                PackageManager::Golang,
            )
            .with_locations(
                FileLocations::new(directive.span(path))
                    .with_name(Some(directive.token_span(module, path)))
                    .with_version(Some(directive.token_span(version, path))),
            );
            required.insert((module.text.clone(), resolved.clone()), Required { record, resolved });
        }

        for directive in directives.iter().filter(|d| d.verb == "replace") {
            let arrow = directive
                .args
                .iter()
                .position(|token| token.text == "=>")
                .filter(|&arrow| arrow == 1 || arrow == 2)
                .ok_or_else(|| {
                    parse_error(format!(
                        "{}: usage: replace module/path [v1.2.3] => other/module v1.4",
                        directive.line
                    ))
                })?;
            let old_path = &directive.args[0].text;
            let old_version = (arrow == 2).then(|| resolve_version(old_path, &directive.args[1].text));
            let Some(new_module) = directive.args.get(arrow + 1) else {
                return Err(parse_error(format!("{}: replacement is missing", directive.line)));
            };
            let new_version = directive.args.get(arrow + 2);

            let targets: Vec<(String, String)> = required
                .iter()
                .filter(|((name, _), entry)| {
                    name == old_path
                        && old_version.as_ref().is_none_or(|wanted| *wanted == entry.resolved)
                })
                .map(|(key, _)| key.clone())
                .collect();

            for key in targets {
                let version = new_version
                    .map(|token| record_version(&resolve_version(&new_module.text, &token.text)))
                    .unwrap_or_default();
                if version.is_empty() {
                    // A local directory replacement; the directory is scanned on its own.
                    required.remove(&key);
                    continue;
                }

                let locations = FileLocations::new(directive.span(path))
                    .with_name(Some(directive.token_span(new_module, path)))
                    .with_version(new_version.map(|token| directive.token_span(token, path)));
                if let Some(entry) = required.get_mut(&key) {
                    entry.record = PackageRecord::new(
                        new_module.text.clone(),
                        version,
                        Ecosystem::Go,
                        PackageManager::Golang,
                    )
                    .with_locations(locations);
                }
            }
        }

        let mut records: BTreeMap<(String, String), PackageRecord> = required
            .into_values()
            .map(|entry| ((entry.record.name.clone(), entry.record.version.clone()), entry.record))
            .collect();

        if let Some(go) = directives.iter().find(|d| d.verb == "go") {
            if let Some(version) = go.args.first() {
                let stdlib = PackageRecord::new(
                    "stdlib",
                    padded_go_version(&version.text),
                    Ecosystem::Go,
                    PackageManager::Golang,
                )
                .with_locations(
                    FileLocations::new(go.span(path))
                        .with_version(Some(go.token_span(version, path))),
                );
                records.insert(("stdlib".to_string(), stdlib.version.clone()), stdlib);
            }
        }

        Ok(records.into_values().collect())
    }
}
