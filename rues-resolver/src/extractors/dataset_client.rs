//! Open-data registry dataset client (Tier 1)
//!
//! Queries the Socrata resource that mirrors the national business registry.
//! The dataset is the only source treated as authoritative for existence: no
//! row means no company.
//!
//! # API Reference
//! - Endpoint: `https://www.datos.gov.co/resource/c82u-588k.json`
//! - SoQL: `$select`, `$order`, `$limit` plus a column equality filter

use crate::extractors::http::{build_client, send_checked};
use crate::identifier::BaseIdentifier;
use crate::types::{DatasetCandidate, DatasetSource, SourceError};
use async_trait::async_trait;
use reqwest::Client;
use rues_common::config::SourcesConfig;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Columns requested from the dataset
const SELECT_COLUMNS: &str = "nit,razon_social,sigla,codigo_camara,camara_comercio,matricula";

/// Socrata application token header
const APP_TOKEN_HEADER: &str = "X-App-Token";

pub struct DatasetClient {
    http_client: Client,
    url: String,
    app_token: Option<String>,
    row_limit: u32,
}

impl DatasetClient {
    pub fn new(config: &SourcesConfig) -> Result<Self, SourceError> {
        Ok(Self::with_client(build_client(config)?, config))
    }

    /// Reuse an existing HTTP client (connection pool shared across sources)
    pub fn with_client(http_client: Client, config: &SourcesConfig) -> Self {
        Self {
            http_client,
            url: config.dataset_url.clone(),
            app_token: config
                .dataset_app_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            row_limit: config.dataset_row_limit.max(1),
        }
    }

    async fn fetch_rows(&self, base_id: &BaseIdentifier) -> Result<Vec<Value>, SourceError> {
        let limit = self.row_limit.to_string();
        let mut request = self.http_client.get(&self.url).query(&[
            ("$select", SELECT_COLUMNS),
            ("nit", base_id.as_str()),
            ("$order", "matricula DESC"),
            ("$limit", limit.as_str()),
        ]);
        if let Some(token) = &self.app_token {
            request = request.header(APP_TOKEN_HEADER, token);
        }

        let response = send_checked(request).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Dataset response is not JSON: {}", e)))?;

        match body {
            Value::Array(rows) => Ok(rows),
            other => Err(SourceError::Parse(format!(
                "Dataset response is not an array: {}",
                truncate(&other.to_string(), 120)
            ))),
        }
    }
}

#[async_trait]
impl DatasetSource for DatasetClient {
    fn source_id(&self) -> &'static str {
        "Dataset"
    }

    async fn lookup_dataset(
        &self,
        base_id: &BaseIdentifier,
    ) -> Result<Option<DatasetCandidate>, SourceError> {
        let rows = self.fetch_rows(base_id).await?;
        info!(nit = %base_id, count = rows.len(), "Dataset query answered");

        let candidate = select_most_recent(base_id, &rows);
        if let Some(c) = &candidate {
            debug!(
                nit = %base_id,
                chamber = c.chamber_code.as_deref().unwrap_or("-"),
                registration = c.registration_number.as_deref().unwrap_or("-"),
                "Dataset candidate selected"
            );
        }
        Ok(candidate)
    }
}

/// Pick the row with the numerically greatest registration number
///
/// Server-side ordering is textual, so the final choice is made here. Ties
/// keep the first row in response order.
pub fn select_most_recent(base_id: &BaseIdentifier, rows: &[Value]) -> Option<DatasetCandidate> {
    rows.iter()
        .filter_map(Value::as_object)
        .map(|row| candidate_from_row(base_id, row))
        .fold(None, |best: Option<DatasetCandidate>, c| match best {
            Some(b) if b.registration_rank() >= c.registration_rank() => Some(b),
            _ => Some(c),
        })
}

fn candidate_from_row(base_id: &BaseIdentifier, row: &Map<String, Value>) -> DatasetCandidate {
    DatasetCandidate {
        identifier: text(row, "nit").unwrap_or_else(|| base_id.to_string()),
        legal_name: text(row, "razon_social"),
        trade_name: text(row, "sigla"),
        chamber_code: text(row, "codigo_camara"),
        chamber_name: text(row, "camara_comercio"),
        registration_number: text(row, "matricula"),
    }
}

/// Non-blank string (or number rendered as text) under `key`
fn text(row: &Map<String, Value>, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
