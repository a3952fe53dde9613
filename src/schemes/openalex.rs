use std::sync::LazyLock;

use regex::Regex;

use super::{ApiRequest, ApiResponse, Lookup, SchemeRules, clean, found_with, strip_prefixes};
use crate::domain::Scheme;

const OPENALEX_API: &str = "https://api.openalex.org";

static OPENALEX_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([WwSs])([1-9]\d*)$").expect("OpenAlex body pattern"));
static OPENALEX_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^openalex:[WS][1-9]\d*$").expect("OpenAlex syntax pattern"));

const PREFIXES: &[&str] = &[
    "https://openalex.org/",
    "http://openalex.org/",
    "openalex.org/",
    "https://api.openalex.org/",
    "works/",
    "sources/",
    "openalex:",
];

pub struct OpenalexRules;

impl SchemeRules for OpenalexRules {
    fn scheme(&self) -> Scheme {
        Scheme::Openalex
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let cleaned = clean(raw);
        let body = strip_prefixes(&cleaned, PREFIXES);
        let caps = OPENALEX_BODY.captures(body)?;
        Some(format!("{}{}", caps[1].to_uppercase(), &caps[2]))
    }

    fn syntax_ok(&self, id: &str) -> bool {
        OPENALEX_SYNTAX.is_match(&Scheme::Openalex.with_prefix(id))
    }

    fn request(&self, id: &str) -> Option<ApiRequest> {
        let entity = if id.starts_with('S') { "sources" } else { "works" };
        Some(ApiRequest::json(format!("{OPENALEX_API}/{entity}/{id}")))
    }

    fn interpret(&self, id: &str, response: &ApiResponse) -> Lookup {
        let Some(payload) = response.json() else {
            return Lookup::Missing;
        };
        let echoed = payload["id"]
            .as_str()
            .is_some_and(|value| value.ends_with(&format!("/{id}")));
        if !echoed {
            return Lookup::Missing;
        }
        found_with([(
            "display_name",
            payload["display_name"].as_str().map(str::to_string),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_works_and_sources() {
        assert_eq!(
            OpenalexRules
                .normalise("https://openalex.org/w2741809807")
                .as_deref(),
            Some("W2741809807")
        );
        assert_eq!(OpenalexRules.normalise("openalex:S137773608").as_deref(), Some("S137773608"));
        assert_eq!(OpenalexRules.normalise("A5023888391"), None);
        assert_eq!(OpenalexRules.normalise("W0123"), None);
    }

    #[test]
    fn request_targets_entity_kind() {
        let request = OpenalexRules.request("S137773608").unwrap();
        assert_eq!(request.url, "https://api.openalex.org/sources/S137773608");
    }

    #[test]
    fn work_echo() {
        let response = ApiResponse {
            status: 200,
            body: r#"{"id":"https://openalex.org/W2741809807","display_name":"The state of OA"}"#
                .to_string(),
        };
        let Lookup::Found(metadata) = OpenalexRules.interpret("W2741809807", &response) else {
            panic!("expected work to be found");
        };
        assert_eq!(metadata["display_name"], "The state of OA");
        assert_eq!(OpenalexRules.interpret("W1", &response), Lookup::Missing);
    }
}
