use std::sync::LazyLock;

use regex::Regex;

use serde_json::Value;

use super::{
    ApiRequest, ApiResponse, Lookup, Metadata, SchemeRules, clean, encode_path, found_with,
    string_field, strip_prefixes,
};
use crate::domain::Scheme;

const HANDLE_API: &str = "https://doi.org/api/handles";
const CROSSREF_WORKS_API: &str = "https://api.crossref.org/works";

static DOI_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"10\.(\d{4,9}|[^\s/]+(\.[^\s/]+)*)/\S+").expect("DOI body pattern")
});
static DOI_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^doi:10\.(\d{4,9}|[^\s/]+(\.[^\s/]+)*)/\S+$").expect("DOI syntax pattern")
});

const PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi.org/",
    "dx.doi.org/",
    "doi:",
];

pub struct DoiRules;

impl SchemeRules for DoiRules {
    fn scheme(&self) -> Scheme {
        Scheme::Doi
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let cleaned = clean(raw).to_lowercase();
        let body = strip_prefixes(&cleaned, PREFIXES);
        let found = DOI_BODY.find(body)?;
        let trimmed = trim_trailing(found.as_str());
        DOI_BODY
            .is_match(trimmed)
            .then(|| trimmed.to_string())
    }

    fn syntax_ok(&self, id: &str) -> bool {
        DOI_SYNTAX.is_match(&Scheme::Doi.with_prefix(id))
    }

    fn request(&self, id: &str) -> Option<ApiRequest> {
        Some(ApiRequest::json(format!("{HANDLE_API}/{}", encode_path(id))))
    }

    fn interpret(&self, _id: &str, response: &ApiResponse) -> Lookup {
        let Some(payload) = response.json() else {
            return Lookup::Missing;
        };
        if payload["responseCode"].as_i64() != Some(1) {
            return Lookup::Missing;
        }
        let url = payload["values"].as_array().and_then(|values| {
            values
                .iter()
                .find(|value| value["type"].as_str() == Some("URL"))
                .and_then(|value| value["data"]["value"].as_str())
                .map(|value| value.to_string())
        });
        found_with([("url", url)])
    }

    fn extra_request(&self, id: &str) -> Option<ApiRequest> {
        Some(ApiRequest::json(format!(
            "{CROSSREF_WORKS_API}/{}",
            encode_path(id)
        )))
    }

    fn interpret_extra(&self, response: &ApiResponse) -> Metadata {
        let mut metadata = Metadata::new();
        let Some(payload) = response.json() else {
            return metadata;
        };
        let fields = [
            ("title", string_field(&payload, "/message/title/0")),
            ("type", string_field(&payload, "/message/type")),
            ("publisher", string_field(&payload, "/message/publisher")),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                metadata.insert(key.to_string(), Value::String(value));
            }
        }
        metadata
    }
}

/// Prefix of a DOI body, the part before the first `/`.
pub fn prefix_of(doi: &str) -> Option<&str> {
    let body = doi.strip_prefix("doi:").unwrap_or(doi);
    body.split_once('/').map(|(prefix, _)| prefix)
}

// Drops sentence punctuation glued to the end of a DOI and closing brackets
// that have no opening partner inside it.
fn trim_trailing(value: &str) -> &str {
    let mut end = value.len();
    loop {
        let current = &value[..end];
        let Some(last) = current.chars().last() else {
            return current;
        };
        let unbalanced = match last {
            ')' => current.matches('(').count() < current.matches(')').count(),
            ']' => current.matches('[').count() < current.matches(']').count(),
            '.' | ',' | ';' | ':' | '"' | '\'' => true,
            _ => false,
        };
        if !unbalanced {
            return current;
        }
        end -= last.len_utf8();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_strips_resolver_and_case() {
        let rules = DoiRules;
        assert_eq!(
            rules.normalise("https://doi.org/10.1038/S41586-020-2649-2").as_deref(),
            Some("10.1038/s41586-020-2649-2")
        );
        assert_eq!(
            rules.normalise("doi: 10.1000/xyz%28a%29.").as_deref(),
            Some("10.1000/xyz(a)")
        );
        assert_eq!(
            rules.normalise("(see 10.1000/xyz)").as_deref(),
            Some("10.1000/xyz")
        );
    }

    #[test]
    fn normalise_rejects_garbage() {
        assert_eq!(DoiRules.normalise("not-a-doi"), None);
        assert_eq!(DoiRules.normalise("10.1/"), None);
    }

    #[test]
    fn syntax_requires_prefix_and_suffix() {
        assert!(DoiRules.syntax_ok("10.1000/abc"));
        assert!(DoiRules.syntax_ok("doi:10.1000/abc"));
        assert!(!DoiRules.syntax_ok("doi:10.1000"));
        assert!(!DoiRules.syntax_ok("doi:11.1000/abc"));
    }

    #[test]
    fn handle_response_parsing() {
        let response = ApiResponse {
            status: 200,
            body: r#"{"responseCode":1,"handle":"10.1000/abc","values":[{"type":"URL","data":{"value":"https://example.org/abc"}}]}"#.to_string(),
        };
        let Lookup::Found(metadata) = DoiRules.interpret("10.1000/abc", &response) else {
            panic!("expected DOI to be found");
        };
        assert_eq!(metadata["url"], "https://example.org/abc");

        let missing = ApiResponse {
            status: 200,
            body: r#"{"responseCode":100}"#.to_string(),
        };
        assert_eq!(DoiRules.interpret("10.1000/abc", &missing), Lookup::Missing);
    }

    #[test]
    fn crossref_works_metadata() {
        let response = ApiResponse {
            status: 200,
            body: r#"{"message":{"title":["A paper"],"type":"journal-article","publisher":"ACME"}}"#
                .to_string(),
        };
        let metadata = DoiRules.interpret_extra(&response);
        assert_eq!(metadata["title"], "A paper");
        assert_eq!(metadata["publisher"], "ACME");
        assert_eq!(metadata.len(), 3);
    }

    #[test]
    fn prefix_of_handles_both_forms() {
        assert_eq!(prefix_of("doi:10.5281/zenodo.1"), Some("10.5281"));
        assert_eq!(prefix_of("10.5281/zenodo.1"), Some("10.5281"));
        assert_eq!(prefix_of("10.5281"), None);
    }
}
