use std::collections::BTreeSet;

/// Read side of the upstream bibliographic-record cache. A DOI present here
/// is accepted without asking its registry.
pub trait KnownRecords: Send + Sync {
    fn contains(&self, doi: &str) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoKnownRecords;

impl KnownRecords for NoKnownRecords {
    fn contains(&self, _doi: &str) -> bool {
        false
    }
}

impl KnownRecords for BTreeSet<String> {
    fn contains(&self, doi: &str) -> bool {
        BTreeSet::contains(self, doi)
    }
}
