use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CiteIdError;
use crate::schemes;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Doi,
    Pmid,
    Pmcid,
    Arxiv,
    Ror,
    Viaf,
    Openalex,
    Crossref,
    Wikipedia,
    Orcid,
    Issn,
    Url,
    Wikidata,
}

impl Scheme {
    /// Every scheme, in discriminant order.
    pub const ALL: [Scheme; 13] = [
        Scheme::Doi,
        Scheme::Pmid,
        Scheme::Pmcid,
        Scheme::Arxiv,
        Scheme::Ror,
        Scheme::Viaf,
        Scheme::Openalex,
        Scheme::Crossref,
        Scheme::Wikipedia,
        Scheme::Orcid,
        Scheme::Issn,
        Scheme::Url,
        Scheme::Wikidata,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Scheme::Doi => "doi",
            Scheme::Pmid => "pmid",
            Scheme::Pmcid => "pmcid",
            Scheme::Arxiv => "arxiv",
            Scheme::Ror => "ror",
            Scheme::Viaf => "viaf",
            Scheme::Openalex => "openalex",
            Scheme::Crossref => "crossref",
            Scheme::Wikipedia => "wikipedia",
            Scheme::Orcid => "orcid",
            Scheme::Issn => "issn",
            Scheme::Url => "url",
            Scheme::Wikidata => "wikidata",
        }
    }

    /// `scheme:id`, leaving an already prefixed id untouched.
    pub fn with_prefix(self, id: &str) -> String {
        let head = format!("{}:", self.prefix());
        match id.get(..head.len()) {
            Some(start) if start.eq_ignore_ascii_case(&head) => {
                format!("{head}{}", &id[head.len()..])
            }
            _ => format!("{head}{id}"),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

impl FromStr for Scheme {
    type Err = CiteIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        Scheme::ALL
            .into_iter()
            .find(|scheme| scheme.prefix() == lowered)
            .ok_or_else(|| CiteIdError::UnknownScheme(value.to_string()))
    }
}

/// A candidate identifier as it arrives in a citation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawIdentifier {
    pub schema: String,
    pub identifier: String,
}

impl RawIdentifier {
    pub fn new(schema: &str, identifier: &str) -> Self {
        Self {
            schema: schema.to_string(),
            identifier: identifier.to_string(),
        }
    }

    pub fn scheme(&self) -> Option<Scheme> {
        self.schema.parse().ok()
    }
}

/// One citing or cited entity of a citation record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    #[serde(default)]
    pub identifier: Vec<RawIdentifier>,
}

/// Raw identifiers of one entity split by what the cache already knows about them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSet {
    #[serde(default)]
    pub valid: Vec<RawIdentifier>,
    #[serde(default)]
    pub not_valid: Vec<RawIdentifier>,
    #[serde(default)]
    pub to_be_val: Vec<RawIdentifier>,
}

impl CandidateSet {
    pub fn unresolved(to_be_val: Vec<RawIdentifier>) -> Self {
        Self {
            to_be_val,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifier {
    pub scheme: Scheme,
    pub raw: String,
    pub normalized: Option<String>,
    pub prefixed: Option<String>,
}

impl Identifier {
    pub fn parse(scheme: Scheme, raw: &str) -> Self {
        let normalized = schemes::rules_for(scheme).normalise(raw);
        let prefixed = normalized.as_deref().map(|id| scheme.with_prefix(id));
        Self {
            scheme,
            raw: raw.to_string(),
            normalized,
            prefixed,
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.normalized.is_some()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_scheme_case_insensitive() {
        let scheme: Scheme = " DOI ".parse().unwrap();
        assert_eq!(scheme, Scheme::Doi);
        assert_eq!("openalex".parse::<Scheme>().unwrap(), Scheme::Openalex);
    }

    #[test]
    fn parse_scheme_unknown() {
        let err = "isbn".parse::<Scheme>().unwrap_err();
        assert_matches!(err, CiteIdError::UnknownScheme(_));
    }

    #[test]
    fn with_prefix_is_stable() {
        assert_eq!(Scheme::Pmid.with_prefix("123"), "pmid:123");
        assert_eq!(Scheme::Pmid.with_prefix("pmid:123"), "pmid:123");
        assert_eq!(Scheme::Pmid.with_prefix("PMID:123"), "pmid:123");
    }

    #[test]
    fn identifier_parse_keeps_raw() {
        let id = Identifier::parse(Scheme::Doi, "https://doi.org/10.1000/ABC");
        assert_eq!(id.normalized.as_deref(), Some("10.1000/abc"));
        assert_eq!(id.prefixed.as_deref(), Some("doi:10.1000/abc"));
        assert_eq!(id.raw, "https://doi.org/10.1000/ABC");

        let broken = Identifier::parse(Scheme::Arxiv, "not-an-id");
        assert!(!broken.is_parsed());
        assert_eq!(broken.prefixed, None);
    }

    #[test]
    fn candidate_set_field_names() {
        let set = CandidateSet::unresolved(vec![RawIdentifier::new("pmid", "1")]);
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.get("not_valid").is_some());
        assert_eq!(json["to_be_val"][0]["schema"], "pmid");
    }
}
