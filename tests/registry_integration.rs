use std::sync::Arc;

use citeid::cache::MemoryCache;
use citeid::domain::{CandidateSet, RawIdentifier, Scheme};
use citeid::manager::{ManagerRegistry, ManagerSettings};
use citeid::oracle::{DEFAULT_TIMEOUT, HttpTransport, ThreadPause};
use citeid::priority::PriorityTable;
use citeid::resolver::IdentifierResolver;

fn live_registry() -> ManagerRegistry {
    ManagerRegistry::new(
        Arc::new(MemoryCache::new()),
        Arc::new(HttpTransport::new(DEFAULT_TIMEOUT).unwrap()),
        Arc::new(ThreadPause),
        ManagerSettings::default(),
    )
}

#[test]
#[ignore]
fn live_identifiers_exist() {
    let registry = live_registry();
    assert!(registry.get(Scheme::Pmid).is_valid("31415").unwrap());
    assert!(registry.get(Scheme::Arxiv).is_valid("2109.05583").unwrap());
    assert!(registry.get(Scheme::Orcid).is_valid("0000-0002-1825-0097").unwrap());
    assert!(registry.get(Scheme::Wikidata).is_valid("Q42").unwrap());
}

#[test]
#[ignore]
fn live_arxiv_doi_resolution() {
    let resolver = IdentifierResolver::new(live_registry(), PriorityTable::default());
    let set = CandidateSet::unresolved(vec![RawIdentifier::new(
        "doi",
        "10.48550/arXiv.2109.05583",
    )]);
    assert_eq!(
        resolver.resolve(&set).unwrap(),
        vec!["arxiv:2109.05583v1".to_string()]
    );
}
