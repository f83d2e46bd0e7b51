//! # rues-resolver
//!
//! Resolves a company's public registration identity from its tax identifier
//! (NIT) and writes it back to an Odoo partner record.
//!
//! **Pipeline:** normalize → dataset (Socrata) → registry API (RUES, two
//! endpoints) → registry page (RUES HTML) → field mapping.
//!
//! **Surfaces:** `POST /webhook`, `POST /webhook/odoo`, `GET /health`, and the
//! `diagnose-fields` CLI for checking target field names.

pub mod api;
pub mod dates;
pub mod diagnostics;
pub mod error;
pub mod extractors;
pub mod fusion;
pub mod identifier;
pub mod identity;
pub mod logging;
pub mod mapper;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use fusion::IdentityResolver;
pub use identity::{IdentityField, IdentitySource, ResolvedIdentity};
pub use types::ResolutionError;

use axum::Router;
use chrono::{DateTime, Utc};
use rues_common::config::{FieldNames, TomlConfig};
use rues_common::{OdooClient, RecordStore};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Source pipeline
    pub resolver: Arc<IdentityResolver>,
    /// Write-back target; `None` disables `/webhook/odoo`
    pub store: Option<Arc<dyn RecordStore>>,
    /// Target field names for mapping
    pub fields: FieldNames,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last server-side error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        resolver: Arc<IdentityResolver>,
        store: Option<Arc<dyn RecordStore>>,
        fields: FieldNames,
    ) -> Self {
        Self {
            resolver,
            store,
            fields,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Build HTTP sources and the Odoo client from configuration
    pub fn from_config(config: &TomlConfig) -> anyhow::Result<Self> {
        let resolver = IdentityResolver::from_config(&config.sources)?;

        let store: Option<Arc<dyn RecordStore>> = match &config.odoo.url {
            Some(_) => Some(Arc::new(OdooClient::new(&config.odoo)?)),
            None => {
                warn!("No Odoo JSON-RPC URL configured; /webhook/odoo is disabled");
                None
            }
        };

        info!(fields = ?config.fields.configured(), "Target fields configured");
        Ok(Self::new(Arc::new(resolver), store, config.fields.clone()))
    }

    /// Remember server-side failures for `/health`; client errors are not kept
    pub async fn note_error(&self, err: ApiError) -> ApiError {
        if !matches!(err, ApiError::BadRequest(_) | ApiError::NotFound(_)) {
            *self.last_error.write().await = Some(err.to_string());
        }
        err
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::webhook_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
