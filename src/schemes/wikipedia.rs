use std::sync::LazyLock;

use regex::Regex;

use super::{
    ApiRequest, ApiResponse, Lookup, SchemeRules, clean, found_with, query_url, strip_prefixes,
};
use crate::domain::Scheme;

const MEDIAWIKI_API: &str = "https://en.wikipedia.org/w/api.php";

static PAGE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9]\d*$").expect("page id pattern"));
static PAGE_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^wikipedia:[1-9]\d*$").expect("page syntax pattern"));

const PREFIXES: &[&str] = &[
    "https://en.wikipedia.org/?curid=",
    "http://en.wikipedia.org/?curid=",
    "https://en.wikipedia.org/w/index.php?curid=",
    "wikipedia:",
];

/// English Wikipedia articles, identified by page id.
pub struct WikipediaRules;

impl SchemeRules for WikipediaRules {
    fn scheme(&self) -> Scheme {
        Scheme::Wikipedia
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let cleaned = clean(raw);
        let body = strip_prefixes(&cleaned, PREFIXES);
        PAGE_ID.is_match(body).then(|| body.to_string())
    }

    fn syntax_ok(&self, id: &str) -> bool {
        PAGE_SYNTAX.is_match(&Scheme::Wikipedia.with_prefix(id))
    }

    fn request(&self, id: &str) -> Option<ApiRequest> {
        Some(ApiRequest::json(query_url(
            MEDIAWIKI_API,
            &[("action", "query"), ("pageids", id), ("format", "json")],
        )))
    }

    fn interpret(&self, id: &str, response: &ApiResponse) -> Lookup {
        let Some(payload) = response.json() else {
            return Lookup::Missing;
        };
        let page = &payload["query"]["pages"][id];
        if !page.is_object() || page.get("missing").is_some() || page.get("invalid").is_some() {
            return Lookup::Missing;
        }
        found_with([("title", page["title"].as_str().map(str::to_string))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_page_ids() {
        assert_eq!(WikipediaRules.normalise("wikipedia:21721040").as_deref(), Some("21721040"));
        assert_eq!(
            WikipediaRules
                .normalise("https://en.wikipedia.org/?curid=21721040")
                .as_deref(),
            Some("21721040")
        );
        assert_eq!(WikipediaRules.normalise("Stack_Overflow"), None);
    }

    #[test]
    fn missing_pages() {
        let found = ApiResponse {
            status: 200,
            body: r#"{"query":{"pages":{"21721040":{"pageid":21721040,"title":"Stack Overflow"}}}}"#
                .to_string(),
        };
        let Lookup::Found(metadata) = WikipediaRules.interpret("21721040", &found) else {
            panic!("expected page to be found");
        };
        assert_eq!(metadata["title"], "Stack Overflow");

        let missing = ApiResponse {
            status: 200,
            body: r#"{"query":{"pages":{"1":{"pageid":1,"missing":""}}}}"#.to_string(),
        };
        assert_eq!(WikipediaRules.interpret("1", &missing), Lookup::Missing);
    }
}
