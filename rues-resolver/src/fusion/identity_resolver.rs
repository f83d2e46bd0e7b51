//! Identity Resolver
//!
//! Sequences the three registry sources for one tax identifier and merges
//! their partial answers into a [`ResolvedIdentity`].
//!
//! # Fallback policy
//! 1. Normalize the identifier; empty → `InvalidIdentifier`
//! 2. Dataset lookup; no row (or dataset down) → `NotFound`
//! 3. Registry API, only when the dataset row yields a detail key
//! 4. Registry page, only while industry code or legal representation is missing
//! 5. Nothing populated after all sources → `NotFound`
//!
//! Enrichment failures (steps 3 and 4) are logged and treated as "no data".
//! Every step is recorded in a [`ResolutionTrace`].

use crate::extractors::{http::build_client, DatasetClient, RegistryApiClient, RegistryPageScraper};
use crate::identifier::{normalize, BaseIdentifier};
use crate::identity::{IdentitySource, ResolvedIdentity};
use crate::types::{
    DatasetSource, RegistryDetailKey, RegistryDetailSource, RegistryPageSource, ResolutionError,
    SourceError,
};
use rues_common::config::SourcesConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one source did during a resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    /// Returned data; `fields_filled` counts fields it was first to set
    Answered { fields_filled: usize },
    /// Consulted, nothing found
    Empty,
    /// Could not be consulted
    Failed { error: String },
    /// Not consulted
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStep {
    pub source: IdentitySource,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

/// Which sources were consulted and what each answered
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionTrace {
    pub base_identifier: BaseIdentifier,
    pub detail_key: Option<RegistryDetailKey>,
    pub web_id: Option<String>,
    pub steps: Vec<SourceStep>,
}

impl ResolutionTrace {
    fn new(base_identifier: BaseIdentifier) -> Self {
        Self {
            base_identifier,
            detail_key: None,
            web_id: None,
            steps: Vec::with_capacity(3),
        }
    }

    fn record(&mut self, source: IdentitySource, outcome: SourceOutcome) {
        debug!(source = %source, outcome = ?outcome, "Source step recorded");
        self.steps.push(SourceStep { source, outcome });
    }

    pub fn outcome_of(&self, source: IdentitySource) -> Option<&SourceOutcome> {
        self.steps
            .iter()
            .find(|s| s.source == source)
            .map(|s| &s.outcome)
    }

    /// True when the source was actually called (answered, empty or failed)
    pub fn consulted(&self, source: IdentitySource) -> bool {
        matches!(
            self.outcome_of(source),
            Some(SourceOutcome::Answered { .. } | SourceOutcome::Empty | SourceOutcome::Failed { .. })
        )
    }
}

/// Resolved identity plus its trace
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub identity: ResolvedIdentity,
    pub trace: ResolutionTrace,
}

pub struct IdentityResolver {
    dataset: Arc<dyn DatasetSource>,
    registry_api: Arc<dyn RegistryDetailSource>,
    registry_page: Arc<dyn RegistryPageSource>,
}

impl IdentityResolver {
    pub fn new(
        dataset: Arc<dyn DatasetSource>,
        registry_api: Arc<dyn RegistryDetailSource>,
        registry_page: Arc<dyn RegistryPageSource>,
    ) -> Self {
        Self {
            dataset,
            registry_api,
            registry_page,
        }
    }

    /// Build the HTTP-backed sources, sharing one connection pool
    pub fn from_config(config: &SourcesConfig) -> Result<Self, SourceError> {
        let client = build_client(config)?;
        Ok(Self::new(
            Arc::new(DatasetClient::with_client(client.clone(), config)),
            Arc::new(RegistryApiClient::with_client(client.clone(), config)),
            Arc::new(RegistryPageScraper::with_client(client, config)),
        ))
    }

    pub async fn resolve(&self, raw: &str) -> Result<ResolvedIdentity, ResolutionError> {
        self.resolve_traced(raw).await.map(|r| r.identity)
    }

    pub async fn resolve_traced(&self, raw: &str) -> Result<Resolution, ResolutionError> {
        let base_id = normalize(raw);
        if base_id.is_empty() {
            return Err(ResolutionError::InvalidIdentifier);
        }

        let mut trace = ResolutionTrace::new(base_id.clone());
        let mut identity = ResolvedIdentity::new();

        // Tier 1: dataset, authoritative for existence
        let candidate = match self.dataset.lookup_dataset(&base_id).await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                info!(nit = %base_id, "No dataset row for identifier");
                return Err(ResolutionError::NotFound(base_id.to_string()));
            }
            Err(e) => {
                warn!(nit = %base_id, source = self.dataset.source_id(), error = %e, "Dataset unavailable");
                return Err(ResolutionError::NotFound(base_id.to_string()));
            }
        };
        let filled = identity.merge(&candidate.fields(), IdentitySource::Dataset);
        trace.record(
            IdentitySource::Dataset,
            SourceOutcome::Answered {
                fields_filled: filled,
            },
        );

        // Tier 2: registry API, only with a detail key
        let mut web_id = None;
        match candidate.detail_key() {
            Some(key) => {
                info!(nit = %base_id, key = %key, "Registry detail key built");
                trace.detail_key = Some(key.clone());
                let outcome = match self.registry_api.lookup_detail(&key).await {
                    Ok(Some(detail)) => {
                        web_id = detail.web_id.clone();
                        SourceOutcome::Answered {
                            fields_filled: identity.merge(&detail.fields(), IdentitySource::RegistryApi),
                        }
                    }
                    Ok(None) => SourceOutcome::Empty,
                    Err(e) => {
                        warn!(key = %key, source = self.registry_api.source_id(), error = %e, "Registry API unavailable");
                        SourceOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                trace.record(IdentitySource::RegistryApi, outcome);
            }
            None => trace.record(
                IdentitySource::RegistryApi,
                SourceOutcome::Skipped {
                    reason: "dataset row lacks chamber code or registration number".to_string(),
                },
            ),
        }
        trace.web_id = web_id.clone();

        // Tier 3: page scraper, only to fill enrichment gaps
        let missing = identity.missing_enrichment();
        if missing.is_empty() {
            trace.record(
                IdentitySource::RegistryPage,
                SourceOutcome::Skipped {
                    reason: "industry code and legal representation already resolved".to_string(),
                },
            );
        } else {
            info!(nit = %base_id, web_id = ?web_id, missing = ?missing, "Enriching from registry page");
            let outcome = match self
                .registry_page
                .scrape_detail(web_id.as_deref(), &base_id)
                .await
            {
                Ok(Some(scraped)) => SourceOutcome::Answered {
                    fields_filled: identity.merge(&scraped.fields(), IdentitySource::RegistryPage),
                },
                Ok(None) => SourceOutcome::Empty,
                Err(e) => {
                    warn!(nit = %base_id, source = self.registry_page.source_id(), error = %e, "Registry page unavailable");
                    SourceOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            trace.record(IdentitySource::RegistryPage, outcome);
        }

        if identity.is_empty() {
            info!(nit = %base_id, "No source produced any identity field");
            return Err(ResolutionError::NotFound(base_id.to_string()));
        }

        info!(
            nit = %base_id,
            fields = identity.populated_count(),
            "Identity resolved"
        );
        Ok(Resolution { identity, trace })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_distinguishes_skipped_from_consulted() {
        let mut trace = ResolutionTrace::new(normalize("900123456-7"));
        trace.record(
            IdentitySource::Dataset,
            SourceOutcome::Answered { fields_filled: 2 },
        );
        trace.record(
            IdentitySource::RegistryApi,
            SourceOutcome::Skipped {
                reason: "no key".to_string(),
            },
        );
        trace.record(
            IdentitySource::RegistryPage,
            SourceOutcome::Failed {
                error: "timeout".to_string(),
            },
        );

        assert!(trace.consulted(IdentitySource::Dataset));
        assert!(!trace.consulted(IdentitySource::RegistryApi));
        assert!(trace.consulted(IdentitySource::RegistryPage));
    }

    #[test]
    fn trace_serializes_flat_steps() {
        let mut trace = ResolutionTrace::new(normalize("12345"));
        trace.record(IdentitySource::RegistryPage, SourceOutcome::Empty);

        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["base_identifier"], "12345");
        assert_eq!(json["steps"][0]["source"], "registry_page");
        assert_eq!(json["steps"][0]["status"], "empty");
    }

    #[test]
    fn from_config_builds_http_sources() {
        assert!(IdentityResolver::from_config(&SourcesConfig::default()).is_ok());
    }
}
