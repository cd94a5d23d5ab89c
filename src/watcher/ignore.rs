//! Ignore-pattern matching for watched paths.

use std::path::Path;

use crate::error::LiveServeError;
use crate::Result;

/// Compiled set of ignore globs, matched against root-relative paths.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    patterns: Vec<glob::Pattern>,
}

impl IgnoreSet {
    /// Compile the given glob patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                glob::Pattern::new(p).map_err(|e| LiveServeError::InvalidPattern {
                    pattern: p.to_string(),
                    message: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Check whether `path` (absolute, under `root`) is ignored.
    ///
    /// A path is ignored when a pattern matches the path itself or any of
    /// its parent directories, so `node_modules` also hides everything
    /// below it. Paths outside `root` are always ignored.
    pub fn is_ignored(&self, path: &Path, root: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return true;
        };
        if self.patterns.is_empty() {
            return false;
        }

        let mut prefix = String::new();
        for component in relative.components() {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(&component.as_os_str().to_string_lossy());

            if self.patterns.iter().any(|p| p.matches(&prefix)) {
                return true;
            }
        }

        false
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
