use reqwest::Url;

use super::{ApiRequest, ApiResponse, Lookup, Metadata, SchemeRules, strip_prefixes};
use crate::domain::Scheme;

const PREFIXES: &[&str] = &["url:", "https://", "http://", "www."];

/// Web addresses, kept as lowercase host and path without protocol.
pub struct UrlRules;

impl SchemeRules for UrlRules {
    fn scheme(&self) -> Scheme {
        Scheme::Url
    }

    fn normalise(&self, raw: &str) -> Option<String> {
        let compact: String = raw.chars().filter(|ch| !ch.is_whitespace()).collect();
        let lowered = compact.to_lowercase();
        let body = strip_prefixes(&lowered, PREFIXES).trim_end_matches('/');
        parse_body(body).map(|_| body.to_string())
    }

    fn syntax_ok(&self, id: &str) -> bool {
        let prefixed = Scheme::Url.with_prefix(id);
        let body = &prefixed["url:".len()..];
        !body.contains("://") && parse_body(body).is_some()
    }

    fn request(&self, id: &str) -> Option<ApiRequest> {
        Some(ApiRequest::get(format!("https://{id}")))
    }

    fn interpret(&self, _id: &str, _response: &ApiResponse) -> Lookup {
        Lookup::Found(Metadata::new())
    }
}

fn parse_body(body: &str) -> Option<Url> {
    if body.is_empty() {
        return None;
    }
    let url = Url::parse(&format!("https://{body}")).ok()?;
    let host = url.host_str()?;
    (host.contains('.') && !host.starts_with('.') && !host.ends_with('.')).then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_drops_protocol() {
        assert_eq!(
            UrlRules.normalise("HTTPS://www.Example.org/Path/").as_deref(),
            Some("example.org/path")
        );
        assert_eq!(UrlRules.normalise("url:example.org").as_deref(), Some("example.org"));
        assert_eq!(UrlRules.normalise("localhost"), None);
        assert_eq!(UrlRules.normalise(""), None);
    }

    #[test]
    fn syntax_requires_dotted_host() {
        assert!(UrlRules.syntax_ok("url:example.org/a"));
        assert!(!UrlRules.syntax_ok("url:nohost"));
        assert!(!UrlRules.syntax_ok("url:https://example.org"));
    }
}
