//! Cross-source and cross-run deduplication of candidates.
//!
//! Stage 1: drop anything whose key is already in the store.
//! Stage 2: collapse same-run duplicates sharing a canonical key, keeping
//! the better-ranked record in the slot of the first occurrence.

use std::collections::{HashMap, HashSet};

use medpulse_common::{Candidate, SourceKind};
use tracing::debug;

/// Merge per-source candidate lists into one deduplicated list.
///
/// `existing_keys` holds the `doi:`/`pmid:` keys of published items. A
/// candidate is dropped when its canonical key is among them; a DOI-keyed
/// candidate is never matched by its PMID.
pub fn merge(existing_keys: &HashSet<String>, lists: Vec<Vec<Candidate>>) -> Vec<Candidate> {
    let mut merged: Vec<Candidate> = Vec::new();
    let mut slot_by_key: HashMap<String, usize> = HashMap::new();

    for candidate in lists.into_iter().flatten() {
        let key = String::from(candidate.canonical_key());
        if existing_keys.contains(&key) {
            debug!(%key, "Already published, dropping");
            continue;
        }

        match slot_by_key.get(&key) {
            Some(&slot) => {
                if outranks(&candidate, &merged[slot]) {
                    debug!(%key, source = candidate.source.as_str(), "Replacing same-run duplicate");
                    merged[slot] = candidate;
                }
            }
            None => {
                slot_by_key.insert(key, merged.len());
                merged.push(candidate);
            }
        }
    }

    merged
}

/// Whether `new` should replace `kept`: a known citation count wins, then
/// the citation index wins over the literature index. Otherwise first seen.
fn outranks(new: &Candidate, kept: &Candidate) -> bool {
    match (new.citation_count.is_known(), kept.citation_count.is_known()) {
        (true, false) => true,
        (false, true) => false,
        _ => new.source == SourceKind::CitationIndex && kept.source == SourceKind::LiteratureIndex,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medpulse_common::CitationCount;
    use medpulse_test_utils::{candidate, CandidateExt};
    use pretty_assertions::assert_eq;

    fn pubmed(title: &str) -> Candidate {
        candidate(SourceKind::LiteratureIndex, title)
    }

    fn s2(title: &str, citations: u64) -> Candidate {
        candidate(SourceKind::CitationIndex, title).with_citations(CitationCount::Known(citations))
    }

    #[test]
    fn test_same_doi_keeps_citation_bearing_version() {
        let a = pubmed("Fasting and lifespan").with_doi("10.1/a").with_pmid("1");
        let b = s2("Fasting and lifespan", 40).with_doi("10.1/A");

        let forward = merge(&HashSet::new(), vec![vec![a.clone()], vec![b.clone()]]);
        let reverse = merge(&HashSet::new(), vec![vec![b], vec![a]]);

        for result in [forward, reverse] {
            assert_eq!(result.len(), 1);
            assert_eq!(result[0].source, SourceKind::CitationIndex);
            assert_eq!(result[0].citation_count, CitationCount::Known(40));
        }
    }

    #[test]
    fn test_doi_key_takes_priority_over_pmid() {
        // Same PMID, different DOIs: distinct papers under the DOI key.
        let a = pubmed("One").with_doi("10.1/one").with_pmid("5");
        let b = pubmed("Two").with_doi("10.1/two").with_pmid("5");
        assert_eq!(a.canonical_key().as_str(), "doi:10.1/one");
        assert_eq!(merge(&HashSet::new(), vec![vec![a, b]]).len(), 2);
    }

    #[test]
    fn test_existing_keys_drop_candidates_by_canonical_key() {
        let existing: HashSet<String> = ["doi:10.1/a".to_string(), "pmid:77".to_string()].into();
        let by_doi = s2("Known", 3).with_doi("10.1/A");
        let by_pmid = pubmed("Known by PMID").with_pmid("77");
        let doi_keyed = pubmed("New DOI").with_doi("10.9/new").with_pmid("77");
        let fresh = pubmed("Fresh").with_pmid("78");

        let result = merge(&existing, vec![vec![by_doi, by_pmid, doi_keyed, fresh]]);
        let titles: Vec<_> = result.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["New DOI", "Fresh"]);
    }

    #[test]
    fn test_stored_pmid_does_not_shadow_doi_keyed_candidate() {
        let existing: HashSet<String> = ["pmid:77".to_string()].into();
        let c = pubmed("Reissued").with_doi("10.9/new").with_pmid("77");
        assert_eq!(c.canonical_key().as_str(), "doi:10.9/new");

        let result = merge(&existing, vec![vec![c]]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].doi.as_deref(), Some("10.9/new"));
    }

    #[test]
    fn test_title_key_merges_identifierless_duplicates() {
        let a = pubmed("Coffee, Sleep & You!");
        let b = s2("coffee sleep you", 2);
        let result = merge(&HashSet::new(), vec![vec![a], vec![b]]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].source, SourceKind::CitationIndex);
    }

    #[test]
    fn test_first_seen_wins_on_equal_footing_and_order_is_kept() {
        let a = s2("A", 1).with_doi("10.1/x");
        let b = s2("B", 9).with_doi("10.1/x");
        let c = pubmed("C").with_pmid("3");
        let result = merge(&HashSet::new(), vec![vec![a, c], vec![b]]);
        let titles: Vec<_> = result.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
    }
}
