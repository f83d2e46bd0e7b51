//! Odoo JSON-RPC record store client
//!
//! The resolver writes its results into partner records through the generic
//! `object.execute_kw` JSON-RPC service. Only three calls are needed: `read`,
//! `write` and `fields_get`.

use crate::config::OdooConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// A single record as returned by `read`: field name → value
pub type Record = Map<String, Value>;

/// External record store contract consumed by the webhook layer
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the given fields of a record; `Ok(None)` when the record does not exist
    async fn read(&self, record_id: i64, fields: &[&str]) -> Result<Option<Record>>;

    /// Write values into a record; returns the store's success flag
    async fn write(&self, record_id: i64, values: &Record) -> Result<bool>;

    /// Field metadata of the model (name → attributes)
    async fn fields_get(&self, attributes: &[&str]) -> Result<Record>;
}

/// JSON-RPC client for an Odoo instance
pub struct OdooClient {
    http: Client,
    url: String,
    db: String,
    uid: i64,
    password: String,
    model: String,
    next_id: AtomicU64,
}

impl OdooClient {
    /// Build a client from configuration
    ///
    /// Fails when no JSON-RPC URL is configured.
    pub fn new(config: &OdooConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| Error::Config("odoo.url (ODOO_JSONRPC) is not configured".to_string()))?;

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url,
            db: config.db.clone(),
            uid: config.uid,
            password: config.password.clone(),
            model: config.model.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Call `execute_kw(db, uid, password, model, method, args, kwargs)`
    async fn execute_kw(&self, method: &str, args: Value, kwargs: Value) -> Result<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": "call",
            "params": {
                "service": "object",
                "method": "execute_kw",
                "args": [self.db, self.uid, self.password, self.model, method, args, kwargs],
            },
        });

        debug!(model = %self.model, method, "Odoo execute_kw");

        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        unwrap_rpc_response(body)
    }
}

/// Split a JSON-RPC envelope into its `result` or an `Error::Rpc`
pub fn unwrap_rpc_response(mut body: Value) -> Result<Value> {
    if let Some(error) = body.get("error") {
        let message = error
            .pointer("/data/message")
            .or_else(|| error.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(Error::Rpc(message));
    }

    Ok(body
        .get_mut("result")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

#[async_trait]
impl RecordStore for OdooClient {
    async fn read(&self, record_id: i64, fields: &[&str]) -> Result<Option<Record>> {
        let result = self
            .execute_kw("read", json!([[record_id], fields]), json!({}))
            .await?;

        match result {
            Value::Array(records) => Ok(records.into_iter().find_map(|r| match r {
                Value::Object(map) => Some(map),
                _ => None,
            })),
            Value::Object(map) => Ok(Some(map)),
            _ => Ok(None),
        }
    }

    async fn write(&self, record_id: i64, values: &Record) -> Result<bool> {
        info!(record_id, fields = ?values.keys().collect::<Vec<_>>(), "Odoo write");

        let result = self
            .execute_kw("write", json!([[record_id], values]), json!({}))
            .await?;

        Ok(result.as_bool().unwrap_or(false))
    }

    async fn fields_get(&self, attributes: &[&str]) -> Result<Record> {
        let result = self
            .execute_kw("fields_get", json!([]), json!({ "attributes": attributes }))
            .await?;

        match result {
            Value::Object(map) => Ok(map),
            other => Err(Error::Rpc(format!(
                "fields_get returned a non-object result: {}",
                other
            ))),
        }
    }
}
