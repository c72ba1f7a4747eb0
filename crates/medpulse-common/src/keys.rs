//! Canonical paper keys used for cross-source and cross-run deduplication.
//!
//! Priority: `doi:<doi>` → `pmid:<pmid>` → `title:<normalized title>`.
//! Title normalization is lossy; titles differing only in characters the
//! normalization keeps will not merge.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Key for a paper, picking the highest-priority identifier present.
    pub fn for_refs(doi: Option<&str>, pmid: Option<&str>, title: &str) -> Self {
        if let Some(doi) = present(doi) {
            Self::doi(doi)
        } else if let Some(pmid) = present(pmid) {
            Self::pmid(pmid)
        } else {
            Self::title(title)
        }
    }

    /// DOIs are case-insensitive, so the key is lowercased.
    pub fn doi(doi: &str) -> Self {
        Self(format!("doi:{}", doi.trim().to_lowercase()))
    }

    pub fn pmid(pmid: &str) -> Self {
        Self(format!("pmid:{}", pmid.trim()))
    }

    pub fn title(title: &str) -> Self {
        Self(format!("title:{}", normalize_title(title)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CanonicalKey> for String {
    fn from(key: CanonicalKey) -> Self {
        key.0
    }
}

/// Lowercase and keep only alphanumeric characters.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
