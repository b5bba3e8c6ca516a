//! Sections: per-path-prefix rules for ID extraction and response shape.
//!
//! Immutable after config load. The router keeps sections sorted most
//! specific first and returns the first pattern match.

use crate::pattern::Pattern;

/// One configured section: where it applies and how IDs are derived there.
#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub pattern: Pattern,
    /// JSON-pointer (or XML path) expressions run against request bodies.
    pub body_id_paths: Vec<String>,
    /// Header names whose values become IDs when present.
    pub header_id_names: Vec<String>,
    /// When true, POST echoes the stored body in the 201 response.
    pub return_body: bool,
}

/// Routes request paths to the governing section.
#[derive(Debug)]
pub struct SectionRouter {
    sections: Vec<Section>,
}

impl SectionRouter {
    /// Build a router; sections are ordered by pattern specificity descending
    /// so overlapping patterns resolve to the most specific one.
    pub fn new(mut sections: Vec<Section>) -> Self {
        sections.sort_by(|a, b| b.pattern.specificity().cmp(&a.pattern.specificity()));
        Self { sections }
    }

    pub fn match_path(&self, path: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.pattern.matches(path))
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }
}
