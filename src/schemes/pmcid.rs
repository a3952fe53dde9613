use std::sync::LazyLock;

use regex::Regex;

use super::{
    ApiRequest, ApiResponse, Lookup, SchemeRules, clean, found_with, query_url, strip_prefixes,
};
use crate::domain::Scheme;

const IDCONV: &str = "https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/";

static PMCID_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)pmc0*([1-9]\d*)").expect("PMCID body pattern"));
static PMCID_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^pmcid:PMC[1-9]\d*$").expect("PMCID syntax pattern"));

const PREFIXES: &[&str] = &[
    "https://www.ncbi.nlm.nih.gov/pmc/articles/",
    "http://www.ncbi.nlm.nih.gov/pmc/articles/",
    "https://pmc.ncbi.nlm.nih.gov/articles/",
    "pmcid:",
];

pub struct PmcidRules;

impl SchemeRules for PmcidRules {
    fn scheme(&self) -> Scheme {
        Scheme::Pmcid
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let cleaned = clean(raw);
        let body = strip_prefixes(&cleaned, PREFIXES);
        let digits = PMCID_BODY.captures(body)?.get(1)?.as_str();
        Some(format!("PMC{digits}"))
    }

    fn syntax_ok(&self, id: &str) -> bool {
        PMCID_SYNTAX.is_match(&Scheme::Pmcid.with_prefix(id))
    }

    fn request(&self, id: &str) -> Option<ApiRequest> {
        Some(ApiRequest::json(query_url(
            IDCONV,
            &[("ids", id), ("format", "json")],
        )))
    }

    fn interpret(&self, id: &str, response: &ApiResponse) -> Lookup {
        let Some(payload) = response.json() else {
            return Lookup::Missing;
        };
        let Some(record) = payload["records"].as_array().and_then(|records| records.first())
        else {
            return Lookup::Missing;
        };
        if record["status"].as_str() == Some("error") {
            return Lookup::Missing;
        }
        let echoed = record["pmcid"]
            .as_str()
            .is_some_and(|pmcid| pmcid.eq_ignore_ascii_case(id));
        if !echoed {
            return Lookup::Missing;
        }
        found_with([
            ("pmid", record["pmid"].as_str().map(str::to_string)),
            ("doi", record["doi"].as_str().map(str::to_string)),
        ])
    }
}
