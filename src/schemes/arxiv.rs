use std::sync::LazyLock;

use regex::Regex;

use super::{
    ApiRequest, ApiResponse, Lookup, Metadata, SchemeRules, clean, query_url, strip_prefixes,
};
use crate::domain::Scheme;

const EXPORT_API: &str = "https://export.arxiv.org/api/query";

/// DOI prefix under which arXiv registers its preprints.
pub const ARXIV_DOI_PREFIX: &str = "10.48550";

static ARXIV_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{4}\.\d{4,5}|([a-z-]+)(\.([a-z]{2}))?/(\d{7}))(v\d+)?")
        .expect("arXiv body pattern")
});
static ARXIV_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arxiv:(\d{4}\.\d{4,5}|[a-z-]+(\.[A-Z]{2})?/\d{7})(v\d+)?$")
        .expect("arXiv syntax pattern")
});
static VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d.]v\d+$").expect("version suffix pattern"));
static TOTAL_RESULTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<opensearch:totalResults[^>]*>\s*(\d+)\s*<").expect("totalResults pattern")
});

const PREFIXES: &[&str] = &[
    "https://arxiv.org/abs/",
    "http://arxiv.org/abs/",
    "https://arxiv.org/pdf/",
    "http://arxiv.org/pdf/",
    "arxiv.org/abs/",
    "https://doi.org/",
    "http://doi.org/",
    "doi:",
    "10.48550/arxiv.",
    "arxiv:",
];

pub struct ArxivRules;

impl SchemeRules for ArxivRules {
    fn scheme(&self) -> Scheme {
        Scheme::Arxiv
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let cleaned = clean(raw);
        let body = strip_prefixes(&cleaned, PREFIXES);
        let caps = ARXIV_BODY.captures(body)?;
        let version = caps
            .get(6)
            .map(|value| value.as_str().to_lowercase())
            .unwrap_or_default();
        let id = match (caps.get(2), caps.get(5)) {
            (Some(archive), Some(number)) => {
                let subject = caps
                    .get(4)
                    .map(|value| format!(".{}", value.as_str().to_uppercase()))
                    .unwrap_or_default();
                format!(
                    "{}{subject}/{}",
                    archive.as_str().to_lowercase(),
                    number.as_str()
                )
            }
            _ => caps.get(1)?.as_str().to_string(),
        };
        Some(format!("{id}{version}"))
    }

    fn syntax_ok(&self, id: &str) -> bool {
        ARXIV_SYNTAX.is_match(&Scheme::Arxiv.with_prefix(id))
    }

    fn request(&self, id: &str) -> Option<ApiRequest> {
        Some(ApiRequest::get(query_url(EXPORT_API, &[("id_list", id)])))
    }

    fn interpret(&self, _id: &str, response: &ApiResponse) -> Lookup {
        if response.body.contains("<title>Error</title>") {
            return Lookup::Missing;
        }
        let total = TOTAL_RESULTS
            .captures(&response.body)
            .and_then(|caps| caps.get(1))
            .and_then(|value| value.as_str().parse::<u64>().ok())
            .unwrap_or(0);
        if total > 0 {
            Lookup::Found(Metadata::new())
        } else {
            Lookup::Missing
        }
    }
}

pub fn has_version(id: &str) -> bool {
    VERSION_SUFFIX.is_match(id)
}

/// Pins an arXiv body to a version, defaulting to the first one.
pub fn versioned(id: &str) -> String {
    if has_version(id) {
        id.to_string()
    } else {
        format!("{id}v1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_new_style() {
        let rules = ArxivRules;
        assert_eq!(rules.normalise("arXiv:2109.05583").as_deref(), Some("2109.05583"));
        assert_eq!(
            rules.normalise("https://arxiv.org/abs/2109.05583V2").as_deref(),
            Some("2109.05583v2")
        );
        assert_eq!(
            rules.normalise("10.48550/arXiv.2109.05583").as_deref(),
            Some("2109.05583")
        );
        assert_eq!(
            rules.normalise("doi:10.48550/ARXIV.2109.05583").as_deref(),
            Some("2109.05583")
        );
    }

    #[test]
    fn normalise_old_style_keeps_subject_case() {
        assert_eq!(
            ArxivRules.normalise("Math.gt/0309136v1").as_deref(),
            Some("math.GT/0309136v1")
        );
        assert_eq!(
            ArxivRules.normalise("hep-th/9901001").as_deref(),
            Some("hep-th/9901001")
        );
    }

    #[test]
    fn normalise_rejects_garbage() {
        assert_eq!(ArxivRules.normalise("not-an-id"), None);
    }

    #[test]
    fn syntax_grammar() {
        assert!(ArxivRules.syntax_ok("arxiv:2109.05583v1"));
        assert!(ArxivRules.syntax_ok("math.GT/0309136"));
        assert!(!ArxivRules.syntax_ok("arxiv:21.05583"));
    }

    #[test]
    fn version_suffix_needs_a_number_or_dot_before_it() {
        assert!(has_version("2109.05583v2"));
        assert!(has_version("math.GT/0309136v1"));
        assert!(has_version("10.6084/m9.figshare.123.v4"));
        assert!(!has_version("10.6084/m9.figshare.dev12"));
        assert!(!has_version("2109.05583"));
    }

    #[test]
    fn versioned_defaults_to_v1() {
        assert_eq!(versioned("2109.05583"), "2109.05583v1");
        assert_eq!(versioned("2109.05583v3"), "2109.05583v3");
    }

    #[test]
    fn feed_result_count() {
        let found = ApiResponse {
            status: 200,
            body: "<feed><opensearch:totalResults xmlns:opensearch=\"x\">1</opensearch:totalResults></feed>".to_string(),
        };
        assert_eq!(
            ArxivRules.interpret("2109.05583", &found),
            Lookup::Found(Metadata::new())
        );
        let empty = ApiResponse {
            status: 200,
            body: "<feed><opensearch:totalResults>0</opensearch:totalResults></feed>".to_string(),
        };
        assert_eq!(ArxivRules.interpret("2109.05583", &empty), Lookup::Missing);
    }
}
