//! Path globs compiled to anchored regexes.
//!
//! Supported syntax: `*` (within one segment), `**` (any number of segments),
//! `?`, `[abc]` classes, and `{a,b}` alternation. A pattern without a `/`
//! matches the file name at any depth; a trailing `/` matches everything under
//! that directory.

use crate::error::{Result, ReviewError};
use regex::Regex;

#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    patterns: Vec<(String, Regex)>,
}

impl PathFilter {
    pub fn new<S: AsRef<str>>(globs: &[S]) -> Result<Self> {
        let patterns = globs
            .iter()
            .map(|g| {
                let g = g.as_ref();
                compile(g).map(|re| (g.to_string(), re))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// True when no globs were supplied; such a filter accepts every path.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether `path` (forward-slash separated, relative to the root) matches
    /// any glob. An empty filter matches everything.
    pub fn matches(&self, path: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let path = path.trim_start_matches("./");
        self.patterns.iter().any(|(_, re)| re.is_match(path))
    }

    /// Whether any glob matches `path`; an empty filter matches nothing.
    pub fn excludes(&self, path: &str) -> bool {
        !self.patterns.is_empty() && self.matches(path)
    }

    pub fn globs(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(g, _)| g.as_str())
    }
}

fn compile(glob: &str) -> Result<Regex> {
    let invalid = |reason: &str| ReviewError::InvalidGlob {
        glob: glob.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = glob.trim().trim_start_matches("./");
    if trimmed.is_empty() {
        return Err(invalid("empty pattern"));
    }
    let (body, dir_only) = match trimmed.strip_suffix('/') {
        Some(b) => (b, true),
        None => (trimmed, false),
    };
    let anchored = body.starts_with('/');
    let body = body.trim_start_matches('/');
    let basename_only = !anchored && !body.contains('/');

    let mut re = String::from("^");
    if basename_only {
        re.push_str("(?:.*/)?");
    }

    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;
    let mut in_braces = false;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    let at_seg_start = i == 0 || chars[i - 1] == '/';
                    let next = chars.get(i + 2);
                    if at_seg_start && next == Some(&'/') {
                        re.push_str("(?:.*/)?");
                        i += 3;
                        continue;
                    }
                    re.push_str(".*");
                    i += 2;
                    continue;
                }
                re.push_str("[^/]*");
            }
            '?' => re.push_str("[^/]"),
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .ok_or_else(|| invalid("unclosed '['"))?;
                let class: String = chars[i + 1..i + 1 + close].iter().collect();
                let class = class.strip_prefix('!').map(|rest| format!("^{rest}")).unwrap_or(class);
                re.push('[');
                re.push_str(&class.replace('\\', "\\\\"));
                re.push(']');
                i += close + 2;
                continue;
            }
            '{' => {
                if in_braces {
                    return Err(invalid("nested '{' is not supported"));
                }
                in_braces = true;
                re.push_str("(?:");
            }
            '}' if in_braces => {
                in_braces = false;
                re.push(')');
            }
            ',' if in_braces => re.push('|'),
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    if in_braces {
        return Err(invalid("unclosed '{'"));
    }

    if dir_only {
        re.push_str("/.*");
    } else {
        // A pattern naming a directory also matches what is inside it.
        re.push_str("(?:/.*)?");
    }
    re.push('$');

    Regex::new(&re).map_err(|e| invalid(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(globs: &[&str]) -> PathFilter {
        PathFilter::new(globs).unwrap()
    }

    #[test]
    fn empty_filter_matches_all() {
        let f = filter(&[]);
        assert!(f.is_empty());
        assert!(f.matches("anything/at/all.rs"));
        assert!(!f.excludes("anything/at/all.rs"));
    }

    #[test]
    fn double_star_spans_directories() {
        let f = filter(&["src/**/*.rs"]);
        assert!(f.matches("src/lib.rs"));
        assert!(f.matches("src/a/b/c.rs"));
        assert!(!f.matches("tests/a.rs"));
        assert!(!f.matches("src/a/b/c.ts"));
    }

    #[test]
    fn trailing_double_star_matches_subtree() {
        let f = filter(&["migrations/**"]);
        assert!(f.matches("migrations/001_init.sql"));
        assert!(f.matches("migrations/sub/002.sql"));
        assert!(!f.matches("src/migrations.rs"));
    }

    #[test]
    fn basename_pattern_matches_at_any_depth() {
        let f = filter(&["*.sql"]);
        assert!(f.matches("schema.sql"));
        assert!(f.matches("db/migrations/001.sql"));
        assert!(!f.matches("db/sql.rs"));
    }

    #[test]
    fn single_star_stays_in_segment() {
        let f = filter(&["src/*.rs"]);
        assert!(f.matches("src/main.rs"));
        assert!(!f.matches("src/cmd/run.rs"));
    }

    #[test]
    fn braces_and_classes() {
        let f = filter(&["web/**/*.{ts,tsx}", "v[0-9]/*.yaml"]);
        assert!(f.matches("web/app/page.tsx"));
        assert!(f.matches("web/util.ts"));
        assert!(!f.matches("web/util.js"));
        assert!(f.matches("v2/openapi.yaml"));
        assert!(!f.matches("vx/openapi.yaml"));
    }

    #[test]
    fn directory_pattern_matches_contents() {
        let f = filter(&["docs/"]);
        assert!(f.matches("docs/guide.md"));
        assert!(!f.matches("docs"));
        let f = filter(&["docs"]);
        assert!(f.matches("docs/guide.md"));
    }

    #[test]
    fn nonexistent_matches_nothing() {
        let f = filter(&["nonexistent/**"]);
        assert!(!f.matches("src/lib.rs"));
        assert!(!f.matches("README.md"));
    }

    #[test]
    fn invalid_globs_rejected() {
        assert!(matches!(
            PathFilter::new(&["src/[abc"]),
            Err(ReviewError::InvalidGlob { .. })
        ));
        assert!(PathFilter::new(&["{a,b"]).is_err());
        assert!(PathFilter::new(&[""]).is_err());
    }
}
