use dashmap::DashMap;
use regex::Regex;
use std::sync::OnceLock;

/// Process-wide cache of compiled patterns, keyed by pattern text.
///
/// Entries are only ever added. `Regex` clones share the compiled program,
/// so handing out clones is cheap.
fn cache() -> &'static DashMap<String, Regex> {
    static CACHE: OnceLock<DashMap<String, Regex>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Returns the compiled form of `pattern`, compiling it on first use.
///
/// Use this for patterns assembled at runtime (e.g. around a package name).
pub fn cached_regex(pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(cached) = cache().get(pattern) {
        return Ok(cached.clone());
    }

    let compiled = Regex::new(pattern)?;
    cache().insert(pattern.to_string(), compiled.clone());

    Ok(compiled)
}

/// Compiles a pattern written as a literal in this crate.
pub fn static_regex(pattern: &'static str) -> Regex {
    cached_regex(pattern).expect("built-in regex pattern must compile")
}
