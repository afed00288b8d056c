//! Path globbing over object-store keys.
//!
//! Patterns are `/`-separated. `*` matches any run of characters and `?` a
//! single character, both within one path segment; a key matches only if it
//! has exactly as many segments as the pattern.

use tracing::debug;

use crate::backend::StorageBackend;
use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPattern {
    segments: Vec<String>,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, StorageError> {
        let segments: Vec<String> = pattern
            .trim_matches('/')
            .split('/')
            .map(str::to_string)
            .collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(StorageError::InvalidLocation(format!(
                "bad glob pattern '{pattern}'"
            )));
        }
        Ok(Self { segments })
    }

    pub fn has_wildcards(&self) -> bool {
        self.segments.iter().any(|s| is_wild(s))
    }

    /// Leading segments without wildcards, joined with `/`. Listing only
    /// needs to start here.
    pub fn literal_prefix(&self) -> String {
        self.segments
            .iter()
            .take_while(|s| !is_wild(s))
            .cloned()
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn matches(&self, key: &str) -> bool {
        let parts: Vec<&str> = key.trim_matches('/').split('/').collect();
        parts.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(parts)
                .all(|(pat, part)| wildcard_match(pat.as_bytes(), part.as_bytes()))
    }

    /// Resolve the pattern against a backend, returning sorted matching keys.
    ///
    /// A pattern without wildcards resolves to itself if the object exists.
    pub async fn expand(&self, backend: &StorageBackend) -> Result<Vec<String>, StorageError> {
        if !self.has_wildcards() {
            let key = self.segments.join("/");
            return Ok(if backend.exists(&key).await? {
                vec![key]
            } else {
                Vec::new()
            });
        }

        let prefix = self.literal_prefix();
        let keys: Vec<String> = backend
            .list(&prefix)
            .await?
            .into_iter()
            .filter(|k| self.matches(k))
            .collect();
        debug!(pattern = %self, prefix = %prefix, matched = keys.len(), "Expanded glob");
        Ok(keys)
    }
}

impl std::fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

fn is_wild(segment: &str) -> bool {
    segment.contains(['*', '?'])
}

/// Iterative `*`/`?` matcher with single-star backtracking.
fn wildcard_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == b'*')
}
