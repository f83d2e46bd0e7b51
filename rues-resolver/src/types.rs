//! Core types and source traits for the identity resolution pipeline
//!
//! Three tiers of registry sources feed one merged identity:
//! - **Dataset:** open-data registry dump, authoritative for existence
//! - **Registry API:** structured detail record, keyed by chamber + registration
//! - **Registry page:** public HTML detail page, scraped to fill gaps
//!
//! Every source returns `Ok(None)` for "nothing found" and `Err(SourceError)`
//! when it could not be consulted. The orchestrator treats both as absent.

use crate::identifier::BaseIdentifier;
use crate::identity::IdentityFields;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Tier 1: Dataset
// ============================================================================

/// Row of the open business-registry dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetCandidate {
    pub identifier: String,
    pub legal_name: Option<String>,
    pub trade_name: Option<String>,
    pub chamber_code: Option<String>,
    pub chamber_name: Option<String>,
    pub registration_number: Option<String>,
}

impl DatasetCandidate {
    /// Registry detail key, when both chamber code and registration are usable
    pub fn detail_key(&self) -> Option<RegistryDetailKey> {
        RegistryDetailKey::from_parts(
            self.chamber_code.as_deref()?,
            self.registration_number.as_deref()?,
        )
    }

    /// Registration number as an integer; unparsable numbers rank lowest
    pub fn registration_rank(&self) -> u64 {
        self.registration_number
            .as_deref()
            .and_then(|m| m.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn fields(&self) -> IdentityFields {
        IdentityFields {
            legal_name: self.legal_name.clone(),
            trade_name: self.trade_name.clone(),
            chamber_code: self.chamber_code.clone(),
            chamber_name: self.chamber_name.clone(),
            ..IdentityFields::default()
        }
    }
}

/// Key of a registry detail record: chamber (2 digits) + registration (10 digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RegistryDetailKey(String);

impl RegistryDetailKey {
    /// Build the key from the dataset's textual chamber code and registration number
    ///
    /// Both must parse as unsigned integers.
    pub fn from_parts(chamber_code: &str, registration_number: &str) -> Option<Self> {
        let chamber: u64 = chamber_code.trim().parse().ok()?;
        let registration: u64 = registration_number.trim().parse().ok()?;
        Some(Self(format!("{:02}{:010}", chamber, registration)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistryDetailKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tier 2: Registry API detail
// ============================================================================

/// Fields recovered from the structured registry detail record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryDetail {
    pub legal_name: Option<String>,
    pub trade_name: Option<String>,
    /// ISO `YYYY-MM-DD`
    pub registration_date: Option<String>,
    pub industry_code: Option<String>,
    pub legal_representation: Option<String>,
    /// Identifier of the public detail page (`/detalle/{id}/`)
    pub web_id: Option<String>,
}

impl RegistryDetail {
    pub fn fields(&self) -> IdentityFields {
        IdentityFields {
            legal_name: self.legal_name.clone(),
            trade_name: self.trade_name.clone(),
            registration_date: self.registration_date.clone(),
            industry_code: self.industry_code.clone(),
            legal_representation: self.legal_representation.clone(),
            ..IdentityFields::default()
        }
    }
}

// ============================================================================
// Tier 3: Registry page scrape
// ============================================================================

/// Fields recovered from the public registry HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapedDetail {
    pub legal_name: Option<String>,
    pub trade_name: Option<String>,
    pub registration_date: Option<String>,
    pub industry_code: Option<String>,
    /// Outer HTML of the legal representation section, verbatim
    pub legal_representation: Option<String>,
}

impl ScrapedDetail {
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    pub fn fields(&self) -> IdentityFields {
        IdentityFields {
            legal_name: self.legal_name.clone(),
            trade_name: self.trade_name.clone(),
            registration_date: self.registration_date.clone(),
            industry_code: self.industry_code.clone(),
            legal_representation: self.legal_representation.clone(),
            ..IdentityFields::default()
        }
    }
}

// ============================================================================
// Source traits
// ============================================================================

/// Open-data dataset lookup by base identifier
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Source identifier used in logs and traces
    fn source_id(&self) -> &'static str;

    /// Most recent registration matching the identifier, if any
    async fn lookup_dataset(
        &self,
        base_id: &BaseIdentifier,
    ) -> Result<Option<DatasetCandidate>, SourceError>;
}

/// Structured registry detail lookup
#[async_trait]
pub trait RegistryDetailSource: Send + Sync {
    fn source_id(&self) -> &'static str;

    async fn lookup_detail(
        &self,
        key: &RegistryDetailKey,
    ) -> Result<Option<RegistryDetail>, SourceError>;
}

/// Registry HTML page scraper
///
/// With a web id the detail page is fetched directly; otherwise the
/// implementation may locate it from the base identifier.
#[async_trait]
pub trait RegistryPageSource: Send + Sync {
    fn source_id(&self) -> &'static str;

    async fn scrape_detail(
        &self,
        web_id: Option<&str>,
        base_id: &BaseIdentifier,
    ) -> Result<Option<ScrapedDetail>, SourceError>;
}

// ============================================================================
// Errors
// ============================================================================

/// A source could not be consulted
#[derive(Debug, Error)]
pub enum SourceError {
    /// Request exceeded the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Source misconfiguration (bad URL template, client build failure)
    #[error("Source configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

/// Failure of a whole resolution
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// Normalization produced an empty key
    #[error("Tax identifier is empty or has no digits")]
    InvalidIdentifier,

    /// The dataset has no registration for the identifier
    #[error("No registry data found for {0}")]
    NotFound(String),

    /// Anything not anticipated above
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}
