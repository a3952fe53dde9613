use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schemes::arxiv::ARXIV_DOI_PREFIX;
use crate::schemes::doi;

pub const FIGSHARE_DOI_PREFIX: &str = "10.6084";
pub const ZENODO_DOI_PREFIX: &str = "10.5281";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityEntry {
    pub prefix: String,
    pub publisher: String,
    pub priority: u32,
}

impl PriorityEntry {
    pub fn new(prefix: &str, publisher: &str, priority: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            publisher: publisher.to_string(),
            priority,
        }
    }
}

/// DOI prefixes of repositories that mint several DOIs for one work, ranked
/// by preference. Rank 1 is preferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityTable {
    entries: BTreeMap<String, PriorityEntry>,
}

impl PriorityTable {
    pub fn new(entries: impl IntoIterator<Item = PriorityEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|mut entry| {
                entry.prefix = bare_prefix(&entry.prefix);
                (entry.prefix.clone(), entry)
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, prefix: &str) -> Option<&PriorityEntry> {
        self.entries.get(&bare_prefix(prefix))
    }

    /// Entry for the prefix of `doi`, prefixed or bare.
    pub fn entry_for_doi(&self, doi: &str) -> Option<&PriorityEntry> {
        doi::prefix_of(doi).and_then(|prefix| self.get(prefix))
    }

    pub fn rank_of(&self, doi: &str) -> Option<u32> {
        self.entry_for_doi(doi).map(|entry| entry.priority)
    }

    pub fn max_rank(&self) -> u32 {
        self.entries
            .values()
            .map(|entry| entry.priority)
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self::new([
            PriorityEntry::new(ARXIV_DOI_PREFIX, "arxiv", 1),
            PriorityEntry::new(FIGSHARE_DOI_PREFIX, "figshare", 1),
            PriorityEntry::new("10.1184", "Carnegie Mellon University", 2),
            PriorityEntry::new("10.25384", "sage", 2),
            PriorityEntry::new(ZENODO_DOI_PREFIX, "zenodo", 3),
            PriorityEntry::new("10.31234", "psyarxiv", 4),
        ])
    }
}

fn bare_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim();
    match trimmed.get(..4) {
        Some(head) if head.eq_ignore_ascii_case("doi:") => trimmed[4..].to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_accepts_both_forms() {
        let table = PriorityTable::new([PriorityEntry::new("doi:10.5281", "zenodo", 3)]);
        assert_eq!(table.get("10.5281").map(|entry| entry.priority), Some(3));
        assert_eq!(table.get("doi:10.5281").map(|entry| entry.priority), Some(3));
        assert_eq!(table.rank_of("doi:10.5281/zenodo.7"), Some(3));
        assert_eq!(table.rank_of("10.1000/abc"), None);
    }

    #[test]
    fn default_table_ranks() {
        let table = PriorityTable::default();
        assert_eq!(table.rank_of("10.48550/arxiv.2109.05583"), Some(1));
        assert_eq!(table.rank_of("10.6084/m9.figshare.1"), Some(1));
        assert_eq!(table.max_rank(), 4);
    }
}
