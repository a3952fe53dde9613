use std::sync::LazyLock;

use regex::Regex;

use super::{ApiRequest, ApiResponse, Lookup, Metadata, SchemeRules, clean, strip_prefixes};
use crate::domain::Scheme;

const ORCID_API: &str = "https://pub.orcid.org/v3.0";

static ORCID_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})-?(\d{4})-?(\d{4})-?(\d{3}[\dX])").expect("ORCID body pattern")
});
static ORCID_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^orcid:\d{4}-\d{4}-\d{4}-\d{3}[\dX]$").expect("ORCID syntax pattern")
});

const PREFIXES: &[&str] = &[
    "https://orcid.org/",
    "http://orcid.org/",
    "orcid.org/",
    "orcid:",
];

pub struct OrcidRules;

impl SchemeRules for OrcidRules {
    fn scheme(&self) -> Scheme {
        Scheme::Orcid
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let cleaned = clean(raw).to_uppercase();
        let body = strip_prefixes(&cleaned, PREFIXES);
        let caps = ORCID_BODY.captures(body)?;
        Some(format!("{}-{}-{}-{}", &caps[1], &caps[2], &caps[3], &caps[4]))
    }

    fn syntax_ok(&self, id: &str) -> bool {
        let prefixed = Scheme::Orcid.with_prefix(id);
        ORCID_SYNTAX.is_match(&prefixed) && checksum_ok(&prefixed["orcid:".len()..])
    }

    fn request(&self, id: &str) -> Option<ApiRequest> {
        Some(ApiRequest::json(format!("{ORCID_API}/{id}")))
    }

    fn interpret(&self, id: &str, response: &ApiResponse) -> Lookup {
        let Some(payload) = response.json() else {
            return Lookup::Missing;
        };
        if payload["orcid-identifier"]["path"].as_str() == Some(id) {
            Lookup::Found(Metadata::new())
        } else {
            Lookup::Missing
        }
    }
}

// ISO 7064 MOD 11-2 over the first fifteen digits.
fn checksum_ok(id: &str) -> bool {
    let chars: Vec<char> = id.chars().filter(|ch| *ch != '-').collect();
    let Some((check, digits)) = chars.split_last() else {
        return false;
    };
    let mut total = 0u32;
    for ch in digits {
        let Some(digit) = ch.to_digit(10) else {
            return false;
        };
        total = (total + digit) * 2;
    }
    let result = (12 - total % 11) % 11;
    let expected = if result == 10 {
        'X'
    } else {
        char::from_digit(result, 10).unwrap_or('?')
    };
    *check == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_adds_hyphens() {
        assert_eq!(
            OrcidRules.normalise("https://orcid.org/0000000218250097").as_deref(),
            Some("0000-0002-1825-0097")
        );
        assert_eq!(
            OrcidRules.normalise("orcid:0000-0002-9079-593x").as_deref(),
            Some("0000-0002-9079-593X")
        );
    }

    #[test]
    fn syntax_checks_digit() {
        assert!(OrcidRules.syntax_ok("0000-0002-1825-0097"));
        assert!(OrcidRules.syntax_ok("orcid:0000-0002-9079-593X"));
        assert!(!OrcidRules.syntax_ok("orcid:0000-0002-1825-0098"));
    }
}
