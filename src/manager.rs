use std::sync::Arc;

use tracing::debug;

use crate::cache::{ValidationCache, ValidationRecord};
use crate::domain::Scheme;
use crate::error::CiteIdError;
use crate::oracle::{self, ExistenceOutcome, Pause, RetryPolicy, Transport};
use crate::schemes::{self, Metadata, SchemeRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerSettings {
    /// When off, registries are never contacted and existence is assumed.
    pub use_api_service: bool,
    pub retry: RetryPolicy,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            use_api_service: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// Validation of one scheme: normalisation, grammar, registry check and the
/// shared cache in front of them.
pub struct IdentifierManager {
    rules: &'static dyn SchemeRules,
    cache: Arc<dyn ValidationCache>,
    transport: Arc<dyn Transport>,
    pause: Arc<dyn Pause>,
    settings: ManagerSettings,
}

impl IdentifierManager {
    pub fn new(
        scheme: Scheme,
        cache: Arc<dyn ValidationCache>,
        transport: Arc<dyn Transport>,
        pause: Arc<dyn Pause>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            rules: schemes::rules_for(scheme),
            cache,
            transport,
            pause,
            settings,
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.rules.scheme()
    }

    /// Canonical form of `raw`, with or without the `scheme:` prefix.
    pub fn normalise(&self, raw: &str, include_prefix: bool) -> Option<String> {
        let body = self.rules.normalise(raw)?;
        if include_prefix {
            Some(self.scheme().with_prefix(&body))
        } else {
            Some(body)
        }
    }

    pub fn syntax_ok(&self, id: &str) -> bool {
        self.rules.syntax_ok(id)
    }

    pub fn exists(&self, id: &str, allow_extra: bool) -> ExistenceOutcome {
        if !self.settings.use_api_service {
            return ExistenceOutcome::Valid(Metadata::new());
        }
        oracle::check_existence(
            self.rules,
            self.transport.as_ref(),
            self.pause.as_ref(),
            &self.settings.retry,
            self.body_of(id),
            allow_extra,
        )
    }

    pub fn is_valid(&self, raw: &str) -> Result<bool, CiteIdError> {
        self.validate(raw, false).map(|(valid, _)| valid)
    }

    pub fn is_valid_with_info(&self, raw: &str) -> Result<(bool, Metadata), CiteIdError> {
        self.validate(raw, true)
    }

    /// Cached decision only; never contacts a registry.
    pub fn validated_as_id(&self, raw: &str) -> Result<Option<bool>, CiteIdError> {
        match self.normalise(raw, true) {
            Some(key) => self.cache.get(&key),
            None => Ok(None),
        }
    }

    fn validate(&self, raw: &str, with_info: bool) -> Result<(bool, Metadata), CiteIdError> {
        let Some(key) = self.normalise(raw, true) else {
            return Ok((false, Metadata::new()));
        };
        if let Some(valid) = self.cache.get(&key)? {
            debug!(id = %key, valid, "validation cache hit");
            let metadata = if with_info {
                self.cache.metadata(&key)?
            } else {
                Metadata::new()
            };
            return Ok((valid, metadata));
        }
        debug!(id = %key, "validation cache miss");

        let (valid, metadata) = if self.syntax_ok(&key) {
            match self.exists(&key, with_info) {
                ExistenceOutcome::Valid(metadata) => (true, metadata),
                ExistenceOutcome::Invalid | ExistenceOutcome::TransientFailure => {
                    (false, Metadata::new())
                }
            }
        } else {
            (false, Metadata::new())
        };

        self.cache.set(&key, valid)?;
        if !metadata.is_empty() {
            self.cache
                .set_full(&key, &ValidationRecord::new(valid, metadata.clone()))?;
        }
        Ok((valid, metadata))
    }

    fn body_of<'a>(&self, id: &'a str) -> &'a str {
        let head = self.scheme().prefix();
        match id.get(..head.len() + 1) {
            Some(start) if start.eq_ignore_ascii_case(&format!("{head}:")) => {
                &id[head.len() + 1..]
            }
            _ => id,
        }
    }
}

/// One manager per scheme over a shared cache and transport.
pub struct ManagerRegistry {
    managers: Vec<IdentifierManager>,
    cache: Arc<dyn ValidationCache>,
}

impl ManagerRegistry {
    pub fn new(
        cache: Arc<dyn ValidationCache>,
        transport: Arc<dyn Transport>,
        pause: Arc<dyn Pause>,
        settings: ManagerSettings,
    ) -> Self {
        let managers = Scheme::ALL
            .into_iter()
            .map(|scheme| {
                IdentifierManager::new(
                    scheme,
                    Arc::clone(&cache),
                    Arc::clone(&transport),
                    Arc::clone(&pause),
                    settings,
                )
            })
            .collect();
        Self { managers, cache }
    }

    pub fn get(&self, scheme: Scheme) -> &IdentifierManager {
        &self.managers[scheme as usize]
    }

    pub fn cache(&self) -> &Arc<dyn ValidationCache> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::oracle::{ThreadPause, TransportError};
    use crate::schemes::{ApiRequest, ApiResponse};

    struct Offline;

    impl Transport for Offline {
        fn get(&self, _request: &ApiRequest) -> Result<ApiResponse, TransportError> {
            Err(TransportError::Other("offline".to_string()))
        }
    }

    fn registry(use_api_service: bool) -> ManagerRegistry {
        ManagerRegistry::new(
            Arc::new(MemoryCache::new()),
            Arc::new(Offline),
            Arc::new(ThreadPause),
            ManagerSettings {
                use_api_service,
                ..ManagerSettings::default()
            },
        )
    }

    #[test]
    fn registry_indexes_by_scheme() {
        let registry = registry(true);
        for scheme in Scheme::ALL {
            assert_eq!(registry.get(scheme).scheme(), scheme);
        }
    }

    #[test]
    fn fail_open_without_api_service() {
        let registry = registry(false);
        let pmid = registry.get(Scheme::Pmid);
        assert!(pmid.is_valid("pmid:12345").unwrap());
        assert_eq!(pmid.validated_as_id("12345").unwrap(), Some(true));
    }

    #[test]
    fn body_of_strips_own_prefix_only() {
        let registry = registry(true);
        let doi = registry.get(Scheme::Doi);
        assert_eq!(doi.body_of("doi:10.1/x"), "10.1/x");
        assert_eq!(doi.body_of("10.1/x"), "10.1/x");
    }
}
