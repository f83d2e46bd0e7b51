//! Webhook endpoints
//!
//! - `POST /webhook` resolves a tax id and returns the identity
//! - `POST /webhook/odoo` additionally writes the changed fields back to the
//!   partner record named in the payload

use crate::api::payload::WebhookPayload;
use crate::error::{ApiError, ApiResult};
use crate::fusion::ResolutionTrace;
use crate::identifier::normalize;
use crate::identity::ResolvedIdentity;
use crate::mapper::{diff_against_current, map_to_external_fields, MappedFields};
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// `POST /webhook` response
#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub identity: ResolvedIdentity,
    /// Values as they would be written to the record store
    pub vals: MappedFields,
    pub trace: ResolutionTrace,
}

/// `POST /webhook/odoo` response
#[derive(Debug, Serialize)]
pub struct WriteBackResponse {
    pub ok: bool,
    pub updated: bool,
    pub partner_id: i64,
    /// Values sent to the record store (only those that changed)
    pub vals: MappedFields,
    pub identity: ResolvedIdentity,
}

/// POST /webhook
pub async fn resolve_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> ApiResult<Json<ResolveResponse>> {
    let span = info_span!("webhook", request_id = %Uuid::new_v4());
    match resolve_payload(&state, payload).instrument(span).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err(state.note_error(e).await),
    }
}

async fn resolve_payload(state: &AppState, payload: WebhookPayload) -> ApiResult<ResolveResponse> {
    let raw = payload.raw_identifier().unwrap_or_default();
    info!(raw_nit = %raw, "Resolution requested");

    let resolution = state.resolver.resolve_traced(&raw).await?;
    let vals = map_to_external_fields(&resolution.identity, &state.fields);

    Ok(ResolveResponse {
        identity: resolution.identity,
        vals,
        trace: resolution.trace,
    })
}

/// POST /webhook/odoo
pub async fn odoo_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> ApiResult<Json<WriteBackResponse>> {
    let span = info_span!("webhook_odoo", request_id = %Uuid::new_v4());
    match write_back(&state, payload).instrument(span).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => Err(state.note_error(e).await),
    }
}

/// Read current record, resolve, write only the fields that changed
async fn write_back(state: &AppState, payload: WebhookPayload) -> ApiResult<WriteBackResponse> {
    let partner_id = payload.partner_id().ok_or_else(|| {
        ApiError::BadRequest(
            "Payload carries no partner id (id, _id, record_id, res_id, partner_id)".to_string(),
        )
    })?;

    let raw = payload.raw_identifier().unwrap_or_default();
    if normalize(&raw).is_empty() {
        return Err(ApiError::BadRequest(
            "Tax identifier is empty or has no digits (check 'nit' or 'vat')".to_string(),
        ));
    }

    let store = state
        .store
        .clone()
        .ok_or_else(|| ApiError::Internal("Record store is not configured".to_string()))?;

    let mut read_fields = vec!["id"];
    read_fields.extend(state.fields.configured());
    let current = match store.read(partner_id, &read_fields).await {
        Ok(Some(record)) => Some(record),
        Ok(None) => {
            return Err(ApiError::NotFound(format!("Partner {} not found", partner_id)));
        }
        Err(e) => {
            warn!(partner_id, error = %e, "Could not read current partner record, continuing");
            None
        }
    };

    let identity = state.resolver.resolve(&raw).await?;
    let mapped = map_to_external_fields(&identity, &state.fields);
    let vals = diff_against_current(mapped, current.as_ref());

    let (ok, updated) = if vals.is_empty() {
        info!(partner_id, "Partner already up to date");
        (true, false)
    } else {
        let written = store.write(partner_id, &vals).await.map_err(|e| {
            ApiError::BadGateway(format!("Writing partner {} failed: {}", partner_id, e))
        })?;
        info!(partner_id, fields = vals.len(), written, "Partner write-back done");
        (written, written)
    };

    Ok(WriteBackResponse {
        ok,
        updated,
        partner_id,
        vals,
        identity,
    })
}

/// Build webhook routes
pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(resolve_webhook))
        .route("/webhook/odoo", post(odoo_webhook))
}
