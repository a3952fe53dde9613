//! Crossref member ids (the publisher accounts behind DOI prefixes).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{ApiRequest, ApiResponse, Lookup, SchemeRules, clean, found_with, strip_prefixes};
use crate::domain::Scheme;

const MEMBERS_API: &str = "https://api.crossref.org/members";

static MEMBER_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("member body pattern"));
static MEMBER_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^crossref:\d+$").expect("member syntax pattern"));

const PREFIXES: &[&str] = &[
    "https://api.crossref.org/members/",
    "https://id.crossref.org/member/",
    "http://id.crossref.org/member/",
    "crossref:",
];

pub struct CrossrefRules;

impl SchemeRules for CrossrefRules {
    fn scheme(&self) -> Scheme {
        Scheme::Crossref
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let cleaned = clean(raw);
        let body = strip_prefixes(&cleaned, PREFIXES).trim_end_matches('/');
        MEMBER_BODY.is_match(body).then(|| body.to_string())
    }

    fn syntax_ok(&self, id: &str) -> bool {
        MEMBER_SYNTAX.is_match(&Scheme::Crossref.with_prefix(id))
    }

    fn request(&self, id: &str) -> Option<ApiRequest> {
        Some(ApiRequest::json(format!("{MEMBERS_API}/{id}")))
    }

    fn interpret(&self, id: &str, response: &ApiResponse) -> Lookup {
        let Some(payload) = response.json() else {
            return Lookup::Missing;
        };
        let echoed = match &payload["message"]["id"] {
            Value::Number(value) => value.to_string() == id,
            Value::String(value) => value == id,
            _ => false,
        };
        if !echoed {
            return Lookup::Missing;
        }
        found_with([(
            "primary-name",
            payload["message"]["primary-name"].as_str().map(str::to_string),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_member_ids() {
        assert_eq!(CrossrefRules.normalise("crossref:297").as_deref(), Some("297"));
        assert_eq!(
            CrossrefRules
                .normalise("https://id.crossref.org/member/78/")
                .as_deref(),
            Some("78")
        );
        assert_eq!(CrossrefRules.normalise("member 297"), None);
    }

    #[test]
    fn member_echo() {
        let response = ApiResponse {
            status: 200,
            body: r#"{"status":"ok","message":{"id":297,"primary-name":"Springer Science and Business Media LLC"}}"#.to_string(),
        };
        let Lookup::Found(metadata) = CrossrefRules.interpret("297", &response) else {
            panic!("expected member to be found");
        };
        assert_eq!(metadata["primary-name"], "Springer Science and Business Media LLC");
        assert_eq!(CrossrefRules.interpret("298", &response), Lookup::Missing);
    }
}
