use std::sync::LazyLock;

use regex::Regex;

use super::{
    ApiRequest, ApiResponse, Lookup, SchemeRules, clean, found_with, query_url, strip_prefixes,
};
use crate::domain::Scheme;

const WIKIDATA_API: &str = "https://www.wikidata.org/w/api.php";

static QID_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[Qq]([1-9]\d*)$").expect("QID body pattern"));
static QID_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^wikidata:Q[1-9]\d*$").expect("QID syntax pattern"));

const PREFIXES: &[&str] = &[
    "https://www.wikidata.org/wiki/",
    "http://www.wikidata.org/wiki/",
    "https://www.wikidata.org/entity/",
    "http://www.wikidata.org/entity/",
    "www.wikidata.org/wiki/",
    "wikidata:",
];

pub struct WikidataRules;

impl SchemeRules for WikidataRules {
    fn scheme(&self) -> Scheme {
        Scheme::Wikidata
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let cleaned = clean(raw);
        let body = strip_prefixes(&cleaned, PREFIXES);
        let caps = QID_BODY.captures(body)?;
        Some(format!("Q{}", &caps[1]))
    }

    fn syntax_ok(&self, id: &str) -> bool {
        QID_SYNTAX.is_match(&Scheme::Wikidata.with_prefix(id))
    }

    fn request(&self, id: &str) -> Option<ApiRequest> {
        Some(ApiRequest::json(query_url(
            WIKIDATA_API,
            &[
                ("action", "wbgetentities"),
                ("ids", id),
                ("props", "labels"),
                ("languages", "en"),
                ("format", "json"),
            ],
        )))
    }

    fn interpret(&self, id: &str, response: &ApiResponse) -> Lookup {
        let Some(payload) = response.json() else {
            return Lookup::Missing;
        };
        let entity = &payload["entities"][id];
        if !entity.is_object() || entity.get("missing").is_some() {
            return Lookup::Missing;
        }
        found_with([(
            "label",
            entity["labels"]["en"]["value"].as_str().map(str::to_string),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_entity_urls() {
        assert_eq!(
            WikidataRules
                .normalise("https://www.wikidata.org/wiki/q42")
                .as_deref(),
            Some("Q42")
        );
        assert_eq!(WikidataRules.normalise("wikidata:Q0"), None);
    }

    #[test]
    fn entity_lookup() {
        let found = ApiResponse {
            status: 200,
            body: r#"{"entities":{"Q42":{"id":"Q42","labels":{"en":{"language":"en","value":"Douglas Adams"}}}}}"#.to_string(),
        };
        let Lookup::Found(metadata) = WikidataRules.interpret("Q42", &found) else {
            panic!("expected entity to be found");
        };
        assert_eq!(metadata["label"], "Douglas Adams");

        let missing = ApiResponse {
            status: 200,
            body: r#"{"entities":{"Q999999999":{"id":"Q999999999","missing":""}}}"#.to_string(),
        };
        assert_eq!(WikidataRules.interpret("Q999999999", &missing), Lookup::Missing);
    }
}
