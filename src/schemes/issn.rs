use std::sync::LazyLock;

use regex::Regex;

use super::{ApiRequest, ApiResponse, Lookup, SchemeRules, clean, strip_prefixes};
use crate::domain::Scheme;

static ISSN_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-?(\d{3}[\dX])").expect("ISSN body pattern"));
static ISSN_SYNTAX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^issn:\d{4}-\d{3}[\dX]$").expect("ISSN syntax pattern"));

/// ISSNs have no open registry lookup; the check digit is the whole test.
pub struct IssnRules;

impl SchemeRules for IssnRules {
    fn scheme(&self) -> Scheme {
        Scheme::Issn
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let cleaned = clean(raw).to_uppercase();
        let body = strip_prefixes(&cleaned, &["issn:"]);
        let caps = ISSN_BODY.captures(body)?;
        Some(format!("{}-{}", &caps[1], &caps[2]))
    }

    fn syntax_ok(&self, id: &str) -> bool {
        let prefixed = Scheme::Issn.with_prefix(id);
        ISSN_SYNTAX.is_match(&prefixed) && checksum_ok(&prefixed["issn:".len()..])
    }

    fn request(&self, _id: &str) -> Option<ApiRequest> {
        None
    }

    fn interpret(&self, _id: &str, _response: &ApiResponse) -> Lookup {
        Lookup::Missing
    }
}

fn checksum_ok(id: &str) -> bool {
    let chars: Vec<char> = id.chars().filter(|ch| *ch != '-').collect();
    let Some((check, digits)) = chars.split_last() else {
        return false;
    };
    let mut sum = 0u32;
    for (position, ch) in digits.iter().enumerate() {
        let Some(digit) = ch.to_digit(10) else {
            return false;
        };
        sum += digit * (8 - position as u32);
    }
    let result = (11 - sum % 11) % 11;
    match result {
        10 => *check == 'X',
        value => check.to_digit(10) == Some(value),
    }
}
