//! Per-scheme identifier rules.
//!
//! Each scheme module knows how to clean a raw string into its canonical
//! body, how to check the strict grammar of the prefixed form, and how to ask
//! its registry whether the identifier exists. Caching and retrying live in
//! [`crate::manager`] and are shared by every scheme.

use serde_json::Value;

use crate::domain::Scheme;

pub mod arxiv;
pub mod crossref;
pub mod doi;
pub mod issn;
pub mod openalex;
pub mod orcid;
pub mod pmcid;
pub mod pmid;
pub mod ror;
pub mod url;
pub mod viaf;
pub mod wikidata;
pub mod wikipedia;

/// Extra facts about an identifier, as reported by its registry.
pub type Metadata = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub url: String,
    pub accept: Option<&'static str>,
}

impl ApiRequest {
    pub fn get(url: String) -> Self {
        Self { url, accept: None }
    }

    pub fn json(url: String) -> Self {
        Self {
            url,
            accept: Some("application/json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Answer extracted from a successful registry response.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Metadata),
    Missing,
}

pub trait SchemeRules: Send + Sync {
    fn scheme(&self) -> Scheme;

    /// Canonical body of `raw` without the `scheme:` prefix, or `None` when
    /// nothing recognisable is left.
    fn normalise(&self, raw: &str) -> Option<String>;

    /// Strict grammar check. Accepts the body with or without its prefix.
    fn syntax_ok(&self, id: &str) -> bool;

    /// Registry lookup for a normalised body. `None` means the scheme has no
    /// registry and syntax alone decides.
    fn request(&self, id: &str) -> Option<ApiRequest>;

    /// Reads the existence signal out of a 2xx response.
    fn interpret(&self, id: &str, response: &ApiResponse) -> Lookup;

    /// Secondary lookup that only enriches metadata of an existing identifier.
    fn extra_request(&self, _id: &str) -> Option<ApiRequest> {
        None
    }

    fn interpret_extra(&self, _response: &ApiResponse) -> Metadata {
        Metadata::new()
    }
}

pub fn rules_for(scheme: Scheme) -> &'static dyn SchemeRules {
    match scheme {
        Scheme::Doi => &doi::DoiRules,
        Scheme::Pmid => &pmid::PmidRules,
        Scheme::Pmcid => &pmcid::PmcidRules,
        Scheme::Arxiv => &arxiv::ArxivRules,
        Scheme::Ror => &ror::RorRules,
        Scheme::Viaf => &viaf::ViafRules,
        Scheme::Openalex => &openalex::OpenalexRules,
        Scheme::Crossref => &crossref::CrossrefRules,
        Scheme::Wikipedia => &wikipedia::WikipediaRules,
        Scheme::Orcid => &orcid::OrcidRules,
        Scheme::Issn => &issn::IssnRules,
        Scheme::Url => &url::UrlRules,
        Scheme::Wikidata => &wikidata::WikidataRules,
    }
}

/// Percent-decodes until nothing is left to decode and drops whitespace and
/// NUL characters. Every pass that changes the value shortens it.
pub(crate) fn clean(raw: &str) -> String {
    let mut current = strip_blanks(raw);
    loop {
        let Ok(decoded) = urlencoding::decode(&current) else {
            return current;
        };
        let next = strip_blanks(&decoded);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_blanks(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '\0')
        .collect()
}

/// Repeatedly strips any of `prefixes`, ignoring ASCII case.
pub(crate) fn strip_prefixes<'a>(mut value: &'a str, prefixes: &[&str]) -> &'a str {
    loop {
        let stripped = prefixes.iter().find_map(|prefix| {
            value
                .get(..prefix.len())
                .filter(|head| !prefix.is_empty() && head.eq_ignore_ascii_case(prefix))
                .map(|_| &value[prefix.len()..])
        });
        match stripped {
            Some(rest) => value = rest,
            None => return value,
        }
    }
}

/// Percent-encodes a path component while keeping `/` separators.
pub(crate) fn encode_path(value: &str) -> String {
    urlencoding::encode(value).replace("%2F", "/")
}

pub(crate) fn query_url(base: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return base.to_string();
    }
    let query = params
        .iter()
        .map(|(key, value)| {
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}

pub(crate) fn string_field(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(|field| field.as_str())
        .map(|field| field.to_string())
}

fn found_with(pairs: impl IntoIterator<Item = (&'static str, Option<String>)>) -> Lookup {
    let mut metadata = Metadata::new();
    for (key, value) in pairs {
        if let Some(value) = value {
            metadata.insert(key.to_string(), Value::String(value));
        }
    }
    Lookup::Found(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_decodes_and_strips_blanks() {
        assert_eq!(clean(" 10.1000%2Fabc\u{0}\n"), "10.1000/abc");
        assert_eq!(clean("%E0%A4%A"), "%E0%A4%A");
    }

    #[test]
    fn clean_reaches_a_fixed_point() {
        assert_eq!(clean("10.1000/a%2541"), "10.1000/aA");
        assert_eq!(clean("a%25%2034"), "a4");
        let once = clean("x%252F%2520y");
        assert_eq!(once, "x/y");
        assert_eq!(clean(&once), once);
    }

    #[test]
    fn strip_prefixes_repeats() {
        let value = strip_prefixes("DOI:https://doi.org/10.1/x", &["doi:", "https://doi.org/"]);
        assert_eq!(value, "10.1/x");
        assert_eq!(strip_prefixes("ab", &["abc"]), "ab");
    }

    #[test]
    fn query_url_encodes_values() {
        let url = query_url("https://example.org/q", &[("term", "12[uid]"), ("db", "pubmed")]);
        assert_eq!(url, "https://example.org/q?term=12%5Buid%5D&db=pubmed");
    }

    #[test]
    fn every_scheme_has_rules() {
        for scheme in Scheme::ALL {
            assert_eq!(rules_for(scheme).scheme(), scheme);
        }
    }
}
