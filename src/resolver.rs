//! Picks the canonical identifiers of one bibliographic entity.
//!
//! An entity often arrives with several identifiers that point at the same
//! work: a PMID next to a DOI, an arXiv preprint next to the DataCite DOI
//! arXiv minted for it, or a handful of Zenodo version DOIs. [`IdentifierResolver`]
//! partitions them by what the validation cache already knows and then keeps
//! the ones worth emitting.

use std::collections::HashSet;
use std::io::{self, BufRead};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::CacheFactory;
use crate::config::ResolvedConfig;
use crate::domain::{CandidateSet, EntityRecord, RawIdentifier, Scheme};
use crate::error::CiteIdError;
use crate::known::{KnownRecords, NoKnownRecords};
use crate::manager::{ManagerRegistry, ManagerSettings};
use crate::oracle::{HttpTransport, ThreadPause};
use crate::priority::{FIGSHARE_DOI_PREFIX, PriorityTable, ZENODO_DOI_PREFIX};
use crate::schemes::arxiv::{self, ARXIV_DOI_PREFIX};
use crate::schemes::doi;

// A candidate that made it through disambiguation, normalised and prefixed.
struct Survivor {
    scheme: Scheme,
    id: String,
    prechecked: bool,
}

impl Survivor {
    fn new(scheme: Scheme, id: String) -> Self {
        Self {
            scheme,
            id,
            prechecked: false,
        }
    }
}

// A normalised candidate; `body` carries no prefix.
struct Candidate {
    scheme: Scheme,
    body: String,
}

impl Candidate {
    fn prefixed(&self) -> String {
        self.scheme.with_prefix(&self.body)
    }

    fn doi_prefix(&self) -> Option<&str> {
        (self.scheme == Scheme::Doi)
            .then(|| doi::prefix_of(&self.body))
            .flatten()
    }
}

/// Counts of a JSON-lines run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub resolved: usize,
    pub skipped: usize,
}

pub struct IdentifierResolver {
    managers: ManagerRegistry,
    priorities: PriorityTable,
    known: Arc<dyn KnownRecords>,
}

impl IdentifierResolver {
    pub fn new(managers: ManagerRegistry, priorities: PriorityTable) -> Self {
        Self {
            managers,
            priorities,
            known: Arc::new(NoKnownRecords),
        }
    }

    pub fn with_known_records(mut self, known: Arc<dyn KnownRecords>) -> Self {
        self.known = known;
        self
    }

    pub fn from_config(config: &ResolvedConfig) -> Result<Self, CiteIdError> {
        let cache = CacheFactory::create(&config.cache)?;
        let transport = HttpTransport::new(config.timeout)?;
        let settings = ManagerSettings {
            use_api_service: config.use_api_service,
            retry: config.retry,
        };
        let managers =
            ManagerRegistry::new(cache, Arc::new(transport), Arc::new(ThreadPause), settings);
        Ok(Self::new(managers, config.priorities.clone()))
    }

    pub fn managers(&self) -> &ManagerRegistry {
        &self.managers
    }

    pub fn priorities(&self) -> &PriorityTable {
        &self.priorities
    }

    /// Splits raw identifiers by their cached decision. Identifiers with an
    /// unknown scheme or that do not normalise are never valid.
    pub fn partition(&self, raw: &[RawIdentifier]) -> Result<CandidateSet, CiteIdError> {
        let mut set = CandidateSet::default();
        for item in raw {
            let Some(scheme) = item.scheme() else {
                set.not_valid.push(item.clone());
                continue;
            };
            let manager = self.managers.get(scheme);
            if manager.normalise(&item.identifier, false).is_none() {
                set.not_valid.push(item.clone());
                continue;
            }
            match manager.validated_as_id(&item.identifier)? {
                Some(true) => set.valid.push(item.clone()),
                Some(false) => set.not_valid.push(item.clone()),
                None => set.to_be_val.push(item.clone()),
            }
        }
        Ok(set)
    }

    pub fn resolve_entity(&self, entity: &EntityRecord) -> Result<Vec<String>, CiteIdError> {
        let set = self.partition(&entity.identifier)?;
        self.resolve(&set)
    }

    /// Resolves one entity record per JSON line and hands each result to
    /// `emit`. A line that does not parse or whose resolution fails is logged
    /// and skipped. Reading the input and `emit` failures stop the run.
    pub fn resolve_lines<R, F>(&self, reader: R, mut emit: F) -> Result<BatchSummary, CiteIdError>
    where
        R: BufRead,
        F: FnMut(Vec<String>) -> Result<(), CiteIdError>,
    {
        let mut summary = BatchSummary::default();
        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = match line {
                Ok(line) => line,
                Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                    warn!(line = line_number, error = %err, "skipping unreadable line");
                    summary.skipped += 1;
                    continue;
                }
                Err(err) => {
                    return Err(CiteIdError::Filesystem(format!(
                        "read line {line_number}: {err}"
                    )));
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let resolved = serde_json::from_str::<EntityRecord>(&line)
                .map_err(|err| CiteIdError::InvalidRecord(err.to_string()))
                .and_then(|entity| self.resolve_entity(&entity));
            match resolved {
                Ok(identifiers) => {
                    emit(identifiers)?;
                    summary.resolved += 1;
                }
                Err(err) => {
                    warn!(line = line_number, error = %err, "skipping entity");
                    summary.skipped += 1;
                }
            }
        }
        Ok(summary)
    }

    pub fn resolve(&self, set: &CandidateSet) -> Result<Vec<String>, CiteIdError> {
        if !set.valid.is_empty() {
            if !set.to_be_val.is_empty() {
                debug!(
                    valid = set.valid.len(),
                    pending = set.to_be_val.len(),
                    "entity has cached and pending identifiers, dropping it"
                );
                return Ok(Vec::new());
            }
            let valid = set
                .valid
                .iter()
                .filter_map(|item| self.normalised(item))
                .map(|candidate| candidate.prefixed())
                .collect();
            return Ok(dedup(valid));
        }

        let survivors = match set.to_be_val.as_slice() {
            [] => Vec::new(),
            [single] => self
                .normalised(single)
                .and_then(|candidate| self.single_candidate(&candidate))
                .into_iter()
                .collect(),
            many => {
                let candidates: Vec<Candidate> =
                    many.iter().filter_map(|item| self.normalised(item)).collect();
                self.cascade(&candidates)?
            }
        };
        self.validate_survivors(survivors)
    }

    /// Rank-ordered selection over DOIs from the priority table: every rank
    /// from the lowest present one up to the highest defined one is tried in
    /// turn, candidates of a rank in input order. The first valid DOI wins.
    pub fn first_valid_by_rank(
        &self,
        candidates: &[RawIdentifier],
    ) -> Result<Option<String>, CiteIdError> {
        let normalised: Vec<Candidate> = candidates
            .iter()
            .filter_map(|item| self.normalised(item))
            .filter(|candidate| candidate.scheme == Scheme::Doi)
            .collect();
        let refs: Vec<&Candidate> = normalised.iter().collect();
        self.select_by_rank(&refs)
    }

    fn normalised(&self, item: &RawIdentifier) -> Option<Candidate> {
        let scheme = item.scheme()?;
        let body = self.managers.get(scheme).normalise(&item.identifier, false)?;
        Some(Candidate { scheme, body })
    }

    fn is_arxiv_doi(candidate: &Candidate) -> bool {
        candidate.doi_prefix() == Some(ARXIV_DOI_PREFIX)
    }

    // Single-candidate arXiv resolution: arXiv ids and arXiv DOIs become a
    // versioned arXiv id, anything else is kept as it is. An arXiv DOI that
    // does not read as an arXiv id yields nothing.
    fn single_candidate(&self, candidate: &Candidate) -> Option<Survivor> {
        if candidate.scheme != Scheme::Arxiv && !Self::is_arxiv_doi(candidate) {
            return Some(Survivor::new(candidate.scheme, candidate.prefixed()));
        }
        let manager = self.managers.get(Scheme::Arxiv);
        let Some(body) = manager.normalise(&candidate.body, false) else {
            debug!(id = %candidate.prefixed(), "not an arXiv id, dropping entity");
            return None;
        };
        Some(Survivor::new(
            Scheme::Arxiv,
            Scheme::Arxiv.with_prefix(&arxiv::versioned(&body)),
        ))
    }

    fn cascade(&self, candidates: &[Candidate]) -> Result<Vec<Survivor>, CiteIdError> {
        let ordinary: Vec<Survivor> = candidates
            .iter()
            .filter(|candidate| match candidate.scheme {
                Scheme::Pmid => true,
                Scheme::Doi => candidate
                    .doi_prefix()
                    .is_none_or(|prefix| self.priorities.get(prefix).is_none()),
                _ => false,
            })
            .map(|candidate| Survivor::new(candidate.scheme, candidate.prefixed()))
            .collect();
        if !ordinary.is_empty() {
            debug!(count = ordinary.len(), "keeping PMIDs and ordinary DOIs");
            return Ok(ordinary);
        }

        for scheme in [Scheme::Pmcid, Scheme::Arxiv] {
            let matching: Vec<Survivor> = candidates
                .iter()
                .filter(|candidate| candidate.scheme == scheme)
                .map(|candidate| Survivor::new(scheme, candidate.prefixed()))
                .collect();
            if !matching.is_empty() {
                debug!(%scheme, count = matching.len(), "keeping candidates of one scheme");
                return Ok(matching);
            }
        }

        let special: Vec<&Candidate> = candidates
            .iter()
            .filter(|candidate| candidate.scheme == Scheme::Doi)
            .collect();
        if !special.is_empty() {
            return Ok(self.by_priority(&special)?.into_iter().collect());
        }

        Ok(candidates
            .iter()
            .map(|candidate| Survivor::new(candidate.scheme, candidate.prefixed()))
            .collect())
    }

    fn by_priority(&self, dois: &[&Candidate]) -> Result<Option<Survivor>, CiteIdError> {
        let rank_one: Vec<&Candidate> = dois
            .iter()
            .copied()
            .filter(|candidate| self.priorities.rank_of(&candidate.body) == Some(1))
            .collect();

        match rank_one.as_slice() {
            [] => {}
            [only] => return Ok(self.rank_one_single(only)),
            several => return Ok(self.rank_one_several(several)),
        }

        let zenodo: Vec<&Candidate> = dois
            .iter()
            .copied()
            .filter(|candidate| candidate.doi_prefix() == Some(ZENODO_DOI_PREFIX))
            .collect();
        if zenodo.len() >= 2
            && let Some(latest) = latest_zenodo(&zenodo)
        {
            debug!(doi = %latest.body, "picked latest Zenodo version");
            return Ok(Some(Survivor::new(Scheme::Doi, latest.prefixed())));
        }

        Ok(self.select_by_rank(dois)?.map(|id| Survivor {
            scheme: Scheme::Doi,
            id,
            prechecked: true,
        }))
    }

    fn rank_one_single(&self, candidate: &Candidate) -> Option<Survivor> {
        if arxiv::has_version(&candidate.body) {
            Some(Survivor::new(Scheme::Doi, candidate.prefixed()))
        } else if candidate.doi_prefix() == Some(FIGSHARE_DOI_PREFIX) {
            Some(Survivor::new(
                Scheme::Doi,
                format!("{}v1", candidate.prefixed()),
            ))
        } else if Self::is_arxiv_doi(candidate) {
            self.single_candidate(candidate)
        } else {
            Some(Survivor::new(Scheme::Doi, candidate.prefixed()))
        }
    }

    fn rank_one_several(&self, candidates: &[&Candidate]) -> Option<Survivor> {
        if let Some(versioned) = candidates
            .iter()
            .find(|candidate| arxiv::has_version(&candidate.body))
        {
            return Some(Survivor::new(Scheme::Doi, versioned.prefixed()));
        }
        if let Some(arxiv_doi) = candidates
            .iter()
            .find(|candidate| Self::is_arxiv_doi(candidate))
        {
            return self.single_candidate(arxiv_doi);
        }
        if let Some(figshare) = candidates
            .iter()
            .find(|candidate| candidate.doi_prefix() == Some(FIGSHARE_DOI_PREFIX))
        {
            return Some(Survivor::new(
                Scheme::Doi,
                format!("{}v1", figshare.prefixed()),
            ));
        }
        candidates
            .first()
            .map(|candidate| Survivor::new(Scheme::Doi, candidate.prefixed()))
    }

    fn select_by_rank(&self, dois: &[&Candidate]) -> Result<Option<String>, CiteIdError> {
        let ranked: Vec<(u32, &Candidate)> = dois
            .iter()
            .filter_map(|candidate| {
                self.priorities
                    .rank_of(&candidate.body)
                    .map(|rank| (rank, *candidate))
            })
            .collect();
        let Some(lowest) = ranked.iter().map(|(rank, _)| *rank).min() else {
            return Ok(None);
        };
        let manager = self.managers.get(Scheme::Doi);
        for rank in lowest..=self.priorities.max_rank() {
            for (_, candidate) in ranked.iter().filter(|(r, _)| *r == rank) {
                let id = candidate.prefixed();
                if manager.is_valid(&id)? {
                    debug!(doi = %id, rank, "first valid DOI by priority");
                    return Ok(Some(id));
                }
            }
        }
        Ok(None)
    }

    fn validate_survivors(&self, survivors: Vec<Survivor>) -> Result<Vec<String>, CiteIdError> {
        let mut accepted = Vec::new();
        for survivor in survivors {
            let known = survivor.scheme == Scheme::Doi
                && survivor
                    .id
                    .strip_prefix("doi:")
                    .is_some_and(|bare| self.known.contains(bare));
            if known || survivor.prechecked {
                accepted.push(survivor.id);
                continue;
            }
            if self.managers.get(survivor.scheme).is_valid(&survivor.id)? {
                accepted.push(survivor.id);
            } else {
                debug!(id = %survivor.id, "candidate failed validation");
            }
        }
        Ok(dedup(accepted))
    }
}

// Zenodo DOI with the largest numeric record id; the first one wins ties.
fn latest_zenodo<'a>(candidates: &[&'a Candidate]) -> Option<&'a Candidate> {
    let mut best: Option<(u64, &'a Candidate)> = None;
    for &candidate in candidates {
        let Some(number) = zenodo_record(&candidate.body) else {
            continue;
        };
        if best.is_none_or(|(current, _)| number > current) {
            best = Some((number, candidate));
        }
    }
    best.map(|(_, candidate)| candidate)
}

fn zenodo_record(doi: &str) -> Option<u64> {
    let (_, suffix) = doi.split_once("zenodo.")?;
    suffix.parse().ok()
}

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
