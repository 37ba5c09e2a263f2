//! Commit recovery from the resolution URLs written by JavaScript package managers.

use crate::shared::regex_cache::static_regex;
use url::Url;

const COMMIT_PATTERNS: [&str; 5] = [
    // ssh://, git://, git+ssh://, git+https://
    r"(?:^|.+@)(?:git(?:\+(?:ssh|https))?|ssh)://.+#(\w+)$",
    r"(?:^|.+@)https://.+\.git#(\w+)$",
    r"https://codeload\.github\.com(?:/[\w.-]+){2}/tar\.gz/(\w+)$",
    r".+#commit[:=](\w+)$",
    // github:, gitlab:, bitbucket:
    r"^(?:github|gitlab|bitbucket):.+#(\w+)$",
];

const GIT_HOSTS: [&str; 3] = ["bitbucket.org", "github.com", "gitlab.com"];

/// Returns the commit a resolution string points at, or an empty string.
///
/// Besides the URL shapes above, a plain URL on a well-known Git host gives
/// its `ref` query parameter or, failing that, its fragment.
pub fn try_extract_commit(resolution: &str) -> String {
    for pattern in COMMIT_PATTERNS {
        if let Some(commit) = static_regex(pattern)
            .captures(resolution)
            .and_then(|captures| captures.get(1))
        {
            return commit.as_str().to_string();
        }
    }

    let Ok(url) = Url::parse(resolution) else {
        return String::new();
    };
    if !url.host_str().is_some_and(|host| GIT_HOSTS.contains(&host)) {
        return String::new();
    }

    if let Some((_, reference)) = url.query_pairs().find(|(key, _)| key == "ref") {
        return reference.into_owned();
    }
    url.fragment().unwrap_or_default().to_string()
}
