//! Path glob matching.
//!
//! Thin wrapper over `glob::Pattern` with the separator semantics the rest of
//! the core relies on: `**` spans path separators, `*` stays within one
//! segment, `?` matches one character. Paths are normalized to forward
//! slashes before matching.

use std::cmp::Reverse;

use glob::{MatchOptions, Pattern};

use warden_contracts::error::{WardenError, WardenResult};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Normalize a path for matching: backslashes become `/`, leading `./`
/// segments and duplicate separators are removed.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut trimmed = unified.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }

    let mut out = String::with_capacity(trimmed.len());
    let mut prev_slash = false;
    for ch in trimmed.chars() {
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(ch);
    }
    out
}

/// Compile `pattern`, mapping syntax errors to `WardenError::InvalidPattern`.
pub fn compile(pattern: &str) -> WardenResult<Pattern> {
    if pattern.is_empty() {
        return Err(WardenError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "pattern cannot be empty".to_string(),
        });
    }
    Pattern::new(pattern).map_err(|e| WardenError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.msg.to_string(),
    })
}

/// Match a compiled pattern against a path.
pub fn matches_compiled(pattern: &Pattern, path: &str) -> bool {
    pattern.matches_with(&normalize_path(path), MATCH_OPTIONS)
}

/// Match `path` against the glob `pattern`. Invalid patterns never match.
pub fn matches(pattern: &str, path: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(compiled) => matches_compiled(&compiled, path),
        Err(_) => false,
    }
}

/// Return true if `path` matches any compiled pattern.
pub fn matches_any(patterns: &[Pattern], path: &str) -> bool {
    let normalized = normalize_path(path);
    patterns
        .iter()
        .any(|p| p.matches_with(&normalized, MATCH_OPTIONS))
}

/// How narrowly a glob selects paths. Larger is more specific.
///
/// Ordered by fewer `**` segments, then literal character count, then fewer
/// single-segment wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    recursive_segments: Reverse<usize>,
    literal_chars: usize,
    wildcards: Reverse<usize>,
}

impl Specificity {
    pub fn of(pattern: &str) -> Self {
        let recursive = pattern.matches("**").count();
        let stars = pattern.matches('*').count() - recursive * 2;
        let questions = pattern.matches('?').count();
        let literal_chars = pattern
            .chars()
            .filter(|c| !matches!(c, '*' | '?' | '[' | ']' | '!'))
            .count();
        Self {
            recursive_segments: Reverse(recursive),
            literal_chars,
            wildcards: Reverse(stars + questions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursive_wildcard_spans_directories() {
        assert!(matches("src/**/*.ts", "src/a/b/c.ts"));
        assert!(!matches("src/**/*.ts", "other/c.ts"));
        assert!(matches("src/**", "src/x.ts"));
        assert!(matches("src/**", "src/deep/nested/x.ts"));
    }

    #[test]
    fn single_star_stays_in_segment() {
        assert!(matches("*.ts", "b.ts"));
        assert!(!matches("*.ts", "a/b.ts"));
    }

    #[test]
    fn question_mark_matches_one_character() {
        assert!(matches("file?.rs", "file1.rs"));
        assert!(!matches("file?.rs", "file10.rs"));
    }

    #[test]
    fn paths_are_normalized_before_matching() {
        assert_eq!(normalize_path(".\\src\\\\lib.rs"), "src/lib.rs");
        assert_eq!(normalize_path("././a//b"), "a/b");
        assert!(matches("src/*.rs", "./src/lib.rs"));
        assert!(matches("src/*.rs", "src\\lib.rs"));
    }

    #[test]
    fn invalid_patterns_never_match() {
        assert!(!matches("src/[", "src/["));
        assert!(compile("src/[").is_err());
        assert!(compile("").is_err());
    }

    #[test]
    fn specificity_prefers_literal_patterns() {
        assert!(Specificity::of("src/components/**") > Specificity::of("src/**"));
        assert!(Specificity::of("src/*.ts") > Specificity::of("src/**/*.ts"));
        assert!(Specificity::of("src/main.rs") > Specificity::of("src/*.rs"));
    }
}
