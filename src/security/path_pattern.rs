//! Glob-style path patterns for identity permissions.
//!
//! `*` matches one or more characters, crossing path segments; patterns are
//! anchored at both ends. `/configs/*` therefore matches `/configs/a` and
//! `/configs/a/b`, but not `/configs/` or `/other/a`.

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone)]
enum Part {
    Literal(String),
    Wildcard,
}

impl PathPattern {
    /// Compile a pattern.
    pub fn new(pattern: &str) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();
        for ch in pattern.chars() {
            if ch == '*' {
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                // Consecutive stars collapse into one.
                if !matches!(parts.last(), Some(Part::Wildcard)) {
                    parts.push(Part::Wildcard);
                }
            } else {
                literal.push(ch);
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }
        Self {
            raw: pattern.to_string(),
            parts,
        }
    }

    /// The original pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the whole path matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        matches_parts(&self.parts, path)
    }
}

fn matches_parts(parts: &[Part], path: &str) -> bool {
    match parts.first() {
        None => path.is_empty(),
        Some(Part::Literal(literal)) => path
            .strip_prefix(literal.as_str())
            .is_some_and(|rest| matches_parts(&parts[1..], rest)),
        Some(Part::Wildcard) => {
            // Must consume at least one character; backtrack over every
            // possible split point.
            (1..=path.len())
                .filter(|i| path.is_char_boundary(*i))
                .any(|i| matches_parts(&parts[1..], &path[i..]))
        }
    }
}
