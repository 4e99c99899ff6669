use crate::error::ScanError;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Entry names that are never worth descending into or sniffing.
pub const RESERVED_NAMES: [&str; 4] = [
    "System Volume Information",
    "pagefile.sys",
    "swapfile.sys",
    "$RECYCLE.BIN",
];

/// Decides which file-system entries are skipped entirely.
///
/// The same policy value is shared by the crawler and the directory tree,
/// so both agree on what exists. Matching is by entry name only.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    patterns: Option<GlobSet>,
}

impl ExclusionPolicy {
    /// Reserved names plus the given glob patterns.
    pub fn with_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ScanError> {
        if patterns.is_empty() {
            return Ok(Self::default());
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|source| ScanError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| ScanError::InvalidPattern {
            pattern: patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(","),
            source,
        })?;
        Ok(Self {
            patterns: Some(set),
        })
    }

    pub fn should_exclude(&self, name: &str) -> bool {
        if RESERVED_NAMES.contains(&name) {
            return true;
        }
        self.patterns
            .as_ref()
            .is_some_and(|set| set.is_match(name))
    }
}
