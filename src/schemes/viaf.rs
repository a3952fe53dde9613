use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{ApiRequest, ApiResponse, Lookup, Metadata, SchemeRules, clean, strip_prefixes};
use crate::domain::Scheme;

const VIAF_BASE: &str = "https://viaf.org/viaf";

static VIAF_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[1-9]\d{1,21}").expect("VIAF body pattern"));
static VIAF_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^viaf:[1-9]\d{1,21}$").expect("VIAF syntax pattern"));

const PREFIXES: &[&str] = &[
    "https://viaf.org/viaf/",
    "http://viaf.org/viaf/",
    "viaf.org/viaf/",
    "viaf:",
];

pub struct ViafRules;

impl SchemeRules for ViafRules {
    fn scheme(&self) -> Scheme {
        Scheme::Viaf
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let cleaned = clean(raw);
        let body = strip_prefixes(&cleaned, PREFIXES);
        VIAF_BODY.find(body).map(|found| found.as_str().to_string())
    }

    fn syntax_ok(&self, id: &str) -> bool {
        VIAF_SYNTAX.is_match(&Scheme::Viaf.with_prefix(id))
    }

    fn request(&self, id: &str) -> Option<ApiRequest> {
        Some(ApiRequest::json(format!("{VIAF_BASE}/{id}/viaf.json")))
    }

    fn interpret(&self, id: &str, response: &ApiResponse) -> Lookup {
        let Some(payload) = response.json() else {
            return Lookup::Missing;
        };
        let echoed = match &payload["viafID"] {
            Value::String(value) => value == id,
            Value::Number(value) => value.to_string() == id,
            _ => false,
        };
        if echoed {
            Lookup::Found(Metadata::new())
        } else {
            Lookup::Missing
        }
    }
}
