//! Path patterns: literal segments, `*` (one segment), terminal `**` (any tail).
//!
//! Specificity (literal count, fewer wildcards) breaks ties between overlapping
//! patterns in the section router and the scenario matcher.

use crate::error::MockError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*` — exactly one non-empty segment.
    Any,
    /// `**` — zero or more segments, terminal only.
    Rest,
}

/// A parsed path pattern, e.g. `/api/users/**`.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self, MockError> {
        if raw.is_empty() {
            return Err(MockError::InvalidPattern {
                pattern: raw.to_string(),
                reason: "pattern is empty",
            });
        }
        if !raw.starts_with('/') {
            return Err(MockError::InvalidPattern {
                pattern: raw.to_string(),
                reason: "pattern must start with '/'",
            });
        }
        let parts = split_path(raw);
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let seg = match *part {
                "**" => {
                    if i + 1 != parts.len() {
                        return Err(MockError::InvalidPattern {
                            pattern: raw.to_string(),
                            reason: "'**' is only allowed as the last segment",
                        });
                    }
                    Segment::Rest
                }
                "*" => Segment::Any,
                lit => Segment::Literal(lit.to_string()),
            };
            segments.push(seg);
        }
        Ok(Pattern {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the pattern contains `*` or `**` anywhere.
    pub fn is_wildcard(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Any | Segment::Rest))
    }

    /// Number of literal segments. Requests deeper than this are resource-level
    /// for the section that owns the pattern.
    pub fn literal_len(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Tie-break score: more literals win, then fewer wildcards.
    pub fn specificity(&self) -> (usize, isize) {
        let literals = self.literal_len();
        let wildcards = self.segments.len() - literals;
        (literals, -(wildcards as isize))
    }

    pub fn matches(&self, path: &str) -> bool {
        let parts = split_path(path);
        let mut i = 0;
        let last = self.segments.len().saturating_sub(1);
        for (idx, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Literal(lit) => {
                    if parts.get(i).copied() != Some(lit.as_str()) {
                        return false;
                    }
                    i += 1;
                }
                Segment::Any => {
                    if i >= parts.len() {
                        return false;
                    }
                    // A trailing `*` swallows the rest of the path, so
                    // `/users/*` covers `/users/alice/profile`.
                    if idx == last {
                        return true;
                    }
                    i += 1;
                }
                Segment::Rest => return true,
            }
        }
        i == parts.len()
    }
}

/// Split on `/`, dropping empty segments (leading slash, trailing slash, `//`).
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
