use std::sync::LazyLock;

use regex::Regex;

use super::{
    ApiRequest, ApiResponse, Lookup, Metadata, SchemeRules, clean, query_url, strip_prefixes,
};
use crate::domain::Scheme;

const ESEARCH: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("digits pattern"));
static PMID_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^pmid:[1-9]\d*$").expect("PMID syntax pattern"));

const PREFIXES: &[&str] = &[
    "https://pubmed.ncbi.nlm.nih.gov/",
    "http://pubmed.ncbi.nlm.nih.gov/",
    "pubmed.ncbi.nlm.nih.gov/",
    "pmid:",
    "pubmed:",
];

pub struct PmidRules;

impl SchemeRules for PmidRules {
    fn scheme(&self) -> Scheme {
        Scheme::Pmid
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let cleaned = clean(raw);
        let body = strip_prefixes(&cleaned, PREFIXES);
        let digits = DIGITS.find(body)?.as_str().trim_start_matches('0');
        (!digits.is_empty()).then(|| digits.to_string())
    }

    fn syntax_ok(&self, id: &str) -> bool {
        PMID_SYNTAX.is_match(&Scheme::Pmid.with_prefix(id))
    }

    fn request(&self, id: &str) -> Option<ApiRequest> {
        let term = format!("{id}[uid]");
        Some(ApiRequest::json(query_url(
            ESEARCH,
            &[("db", "pubmed"), ("term", term.as_str()), ("retmode", "json")],
        )))
    }

    fn interpret(&self, id: &str, response: &ApiResponse) -> Lookup {
        let Some(payload) = response.json() else {
            return Lookup::Missing;
        };
        let listed = payload["esearchresult"]["idlist"]
            .as_array()
            .is_some_and(|ids| ids.iter().any(|value| value.as_str() == Some(id)));
        if listed {
            Lookup::Found(Metadata::new())
        } else {
            Lookup::Missing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_strips_prefix_and_zeros() {
        assert_eq!(PmidRules.normalise("PMID: 000123").as_deref(), Some("123"));
        assert_eq!(
            PmidRules
                .normalise("https://pubmed.ncbi.nlm.nih.gov/31234567/")
                .as_deref(),
            Some("31234567")
        );
        assert_eq!(PmidRules.normalise("pmid:0000"), None);
        assert_eq!(PmidRules.normalise("none"), None);
    }

    #[test]
    fn esearch_idlist() {
        let response = ApiResponse {
            status: 200,
            body: r#"{"esearchresult":{"count":"1","idlist":["31234567"]}}"#.to_string(),
        };
        assert_eq!(
            PmidRules.interpret("31234567", &response),
            Lookup::Found(Metadata::new())
        );
        let empty = ApiResponse {
            status: 200,
            body: r#"{"esearchresult":{"count":"0","idlist":[]}}"#.to_string(),
        };
        assert_eq!(PmidRules.interpret("31234567", &empty), Lookup::Missing);
    }
}
