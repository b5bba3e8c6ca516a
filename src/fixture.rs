//! Fixture references in scenario bodies: `@REL`, `< REL`, `<@ REL`.
//!
//! References are expanded once, at config load or scenario registration;
//! request handling never touches the filesystem. Files resolve against the
//! config file's directory and are memoized for the process lifetime.
//! Escapes from the config directory yield empty bytes; missing files leave
//! the directive text in place.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

enum Resolved {
    Bytes(Vec<u8>),
    /// Empty, absolute, or escaping path. Substituted with empty bytes.
    Sandbox,
    /// File does not exist. Directive text is kept literally.
    Missing,
}

/// Expands fixture directives, caching file contents per canonical path.
pub struct FixtureLoader {
    base_dir: PathBuf,
    cache: HashMap<PathBuf, Vec<u8>>,
}

impl FixtureLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache: HashMap::new(),
        }
    }

    /// Expand a scenario `data` value into response body bytes.
    ///
    /// `@REL` replaces the whole value; `<REL` / `< REL` / `<@REL` / `<@ REL`
    /// are substituted where they appear, including inline inside a larger
    /// body. A `<` inside a double-quoted JSON string is body text, not a
    /// directive.
    pub fn expand(&mut self, data: &str) -> Vec<u8> {
        if let Some(rel) = data.strip_prefix('@') {
            return match self.resolve(rel.trim()) {
                Resolved::Bytes(b) => b,
                Resolved::Sandbox => Vec::new(),
                Resolved::Missing => data.as_bytes().to_vec(),
            };
        }

        let bytes = data.as_bytes();
        let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
        let mut in_string = false;
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if in_string {
                out.push(c);
                if c == b'\\' && i + 1 < bytes.len() {
                    out.push(bytes[i + 1]);
                    i += 2;
                    continue;
                }
                if c == b'"' {
                    in_string = false;
                }
                i += 1;
                continue;
            }
            match c {
                b'"' => {
                    in_string = true;
                    out.push(c);
                    i += 1;
                }
                b'<' => {
                    let start = i;
                    let mut j = i + 1;
                    if j < bytes.len() && bytes[j] == b'@' {
                        j += 1;
                    }
                    while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
                        j += 1;
                    }
                    let tok_start = j;
                    while j < bytes.len() && !bytes[j].is_ascii_whitespace() && bytes[j] != b'"' {
                        j += 1;
                    }
                    match self.resolve(&data[tok_start..j]) {
                        Resolved::Bytes(b) => out.extend_from_slice(&b),
                        Resolved::Sandbox => {}
                        Resolved::Missing => out.extend_from_slice(&bytes[start..j]),
                    }
                    i = j;
                }
                _ => {
                    out.push(c);
                    i += 1;
                }
            }
        }
        out
    }

    fn resolve(&mut self, rel: &str) -> Resolved {
        let Some(clean) = sandboxed(rel) else {
            return Resolved::Sandbox;
        };
        if let Some(b) = self.cache.get(&clean) {
            return Resolved::Bytes(b.clone());
        }
        match std::fs::read(self.base_dir.join(&clean)) {
            Ok(b) => {
                self.cache.insert(clean, b.clone());
                Resolved::Bytes(b)
            }
            Err(_) => Resolved::Missing,
        }
    }
}

/// Lexically normalize a relative path, rejecting empty, absolute, and
/// directory-escaping references. Never touches the filesystem.
fn sandboxed(rel: &str) -> Option<PathBuf> {
    if rel.is_empty() || rel.starts_with('/') {
        return None;
    }
    let mut clean = PathBuf::new();
    let mut depth: i32 = 0;
    for comp in Path::new(rel).components() {
        match comp {
            Component::Normal(c) => {
                depth += 1;
                clean.push(c);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
                clean.pop();
            }
            _ => return None,
        }
    }
    Some(clean)
}
