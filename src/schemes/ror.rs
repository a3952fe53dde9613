use std::sync::LazyLock;

use regex::Regex;

use super::{ApiRequest, ApiResponse, Lookup, SchemeRules, clean, found_with, strip_prefixes};
use crate::domain::Scheme;

const ROR_API: &str = "https://api.ror.org/v2/organizations";

// Crockford base32 without i, l, o and u, then a two digit checksum.
static ROR_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"0[a-hj-km-np-tv-z0-9]{6}[0-9]{2}").expect("ROR body pattern")
});
static ROR_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ror:0[a-hj-km-np-tv-z0-9]{6}[0-9]{2}$").expect("ROR syntax pattern")
});

const PREFIXES: &[&str] = &["https://ror.org/", "http://ror.org/", "ror.org/", "ror:"];

pub struct RorRules;

impl SchemeRules for RorRules {
    fn scheme(&self) -> Scheme {
        Scheme::Ror
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let cleaned = clean(raw).to_lowercase();
        let body = strip_prefixes(&cleaned, PREFIXES);
        ROR_BODY.find(body).map(|found| found.as_str().to_string())
    }

    fn syntax_ok(&self, id: &str) -> bool {
        ROR_SYNTAX.is_match(&Scheme::Ror.with_prefix(id))
    }

    fn request(&self, id: &str) -> Option<ApiRequest> {
        Some(ApiRequest::json(format!("{ROR_API}/{id}")))
    }

    fn interpret(&self, id: &str, response: &ApiResponse) -> Lookup {
        let Some(payload) = response.json() else {
            return Lookup::Missing;
        };
        let echoed = payload["id"]
            .as_str()
            .is_some_and(|value| value.ends_with(id));
        if !echoed {
            return Lookup::Missing;
        }
        let name = payload["names"].as_array().and_then(|names| {
            names
                .iter()
                .find(|name| {
                    name["types"]
                        .as_array()
                        .is_some_and(|types| types.iter().any(|t| t == "ror_display"))
                })
                .and_then(|name| name["value"].as_str())
                .map(str::to_string)
        });
        found_with([("name", name)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_from_url() {
        assert_eq!(
            RorRules.normalise("https://ror.org/03YRM5C26").as_deref(),
            Some("03yrm5c26")
        );
        assert_eq!(RorRules.normalise("ror:03yrm5c26").as_deref(), Some("03yrm5c26"));
        assert_eq!(RorRules.normalise("ror:13yrm5c26"), None);
    }

    #[test]
    fn syntax_excludes_ambiguous_letters() {
        assert!(RorRules.syntax_ok("03yrm5c26"));
        assert!(!RorRules.syntax_ok("ror:03yrl5c26"));
        assert!(!RorRules.syntax_ok("ror:03yrm5c2"));
    }

    #[test]
    fn organization_echo() {
        let response = ApiResponse {
            status: 200,
            body: r#"{"id":"https://ror.org/03yrm5c26","names":[{"value":"CDL","types":["acronym"]},{"value":"California Digital Library","types":["ror_display","label"]}]}"#.to_string(),
        };
        let Lookup::Found(metadata) = RorRules.interpret("03yrm5c26", &response) else {
            panic!("expected ROR to be found");
        };
        assert_eq!(metadata["name"], "California Digital Library");
    }
}
