//! Webhook and health endpoints through the full router

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use helpers::*;
use http_body_util::BodyExt;
use rues_common::config::FieldNames;
use rues_common::RecordStore;
use rues_resolver::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn acme_fakes() -> Fakes {
    Fakes::new(
        Reply::Found(acme_candidate()),
        Reply::Found(full_detail()),
        Reply::Nothing,
    )
}

fn router(fakes: &Fakes, store: Option<Arc<FakeStore>>) -> Router {
    let store = store.map(|s| s as Arc<dyn RecordStore>);
    build_router(AppState::new(
        Arc::new(fakes.resolver()),
        store,
        FieldNames::default(),
    ))
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read_json(response).await
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read_json(response).await
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

// ============================================================================
// GET /health
// ============================================================================

#[tokio::test]
async fn health_reports_module_and_store() {
    let fakes = acme_fakes();

    let (status, body) = get(router(&fakes, Some(Arc::new(FakeStore::default()))), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "rues-resolver");
    assert_eq!(body["record_store"], true);
    assert!(body.get("last_error").is_none());

    let (_, body) = get(router(&fakes, None), "/health").await;
    assert_eq!(body["record_store"], false);
}

// ============================================================================
// POST /webhook
// ============================================================================

#[tokio::test]
async fn webhook_returns_identity_values_and_trace() {
    let fakes = acme_fakes();

    let (status, body) = post(
        router(&fakes, None),
        "/webhook",
        json!({"vat": "900.123.456-7", "name": "whatever"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identity"]["legal_name"]["value"], "ACME SAS");
    assert_eq!(body["identity"]["legal_name"]["source"], "dataset");
    assert_eq!(body["identity"]["industry_code"]["source"], "registry_api");
    assert_eq!(body["vals"]["name"], "ACME SAS");
    assert_eq!(body["vals"]["x_studio_cdigo_ciiu_1"], "4711");
    assert_eq!(body["vals"]["comment"], "ANA PEREZ");
    // Chamber fields have no default target
    assert_eq!(body["vals"].as_object().unwrap().len(), 5);
    assert_eq!(body["trace"]["detail_key"], "050000000321");
    assert_eq!(body["trace"]["steps"][2]["status"], "skipped");
}

#[tokio::test]
async fn webhook_prefers_nit_over_vat() {
    let fakes = acme_fakes();

    let (status, body) = post(
        router(&fakes, None),
        "/webhook",
        json!({"nit": "800.111.222-3", "vat": "900123456-7"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trace"]["base_identifier"], "800111222");
}

#[tokio::test]
async fn webhook_rejects_identifier_without_digits() {
    let fakes = acme_fakes();

    let (status, body) = post(router(&fakes, None), "/webhook", json!({"nit": "N/A"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = post(router(&fakes, None), "/webhook", json!({"vat": false})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(fakes.dataset.calls(), 0);
}

#[tokio::test]
async fn webhook_unknown_company_is_404() {
    let fakes = Fakes::new(Reply::Nothing, Reply::Nothing, Reply::Nothing);

    let (status, body) = post(router(&fakes, None), "/webhook", json!({"nit": "900123456-7"})).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

// ============================================================================
// POST /webhook/odoo
// ============================================================================

#[tokio::test]
async fn odoo_webhook_requires_partner_id() {
    let fakes = acme_fakes();
    let store = Arc::new(FakeStore::default());

    let (status, body) = post(
        router(&fakes, Some(store.clone())),
        "/webhook/odoo",
        json!({"vat": "900123456-7"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("partner id"));
    assert!(store.writes().is_empty());
    assert_eq!(fakes.dataset.calls(), 0);
}

#[tokio::test]
async fn odoo_webhook_missing_partner_is_404() {
    let fakes = acme_fakes();
    let store = Arc::new(FakeStore::default());

    let (status, _) = post(
        router(&fakes, Some(store.clone())),
        "/webhook/odoo",
        json!({"id": 7, "vat": "900123456-7"}),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(fakes.dataset.calls(), 0);
}

#[tokio::test]
async fn odoo_webhook_writes_only_changed_values() {
    let fakes = acme_fakes();
    let store = Arc::new(FakeStore::with_record(json!({
        "id": 7,
        "name": "ACME SAS",
        "x_sigla": false,
        "comment": " ANA PEREZ ",
        "x_studio_fecha_de_matricula": "2001-01-01"
    })));

    let (status, body) = post(
        router(&fakes, Some(store.clone())),
        "/webhook/odoo",
        json!({"_id": "7", "vat": "900123456-7"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["updated"], true);
    assert_eq!(body["partner_id"], 7);

    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    let (partner_id, vals) = &writes[0];
    assert_eq!(*partner_id, 7);
    assert_eq!(vals.len(), 3);
    assert_eq!(vals["x_sigla"], "ACME");
    assert_eq!(vals["x_studio_fecha_de_matricula"], "2015-03-09");
    assert_eq!(vals["x_studio_cdigo_ciiu_1"], "4711");
    assert_eq!(&body["vals"], &Value::Object(vals.clone()));
}

#[tokio::test]
async fn odoo_webhook_skips_write_when_up_to_date() {
    let fakes = acme_fakes();
    let store = Arc::new(FakeStore::with_record(json!({
        "id": 7,
        "name": "ACME SAS",
        "x_sigla": "ACME",
        "comment": "ANA PEREZ",
        "x_studio_fecha_de_matricula": "2015-03-09",
        "x_studio_cdigo_ciiu_1": "4711"
    })));

    let (status, body) = post(
        router(&fakes, Some(store.clone())),
        "/webhook/odoo",
        json!({"partner_id": 7, "nit": "900123456-7"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["updated"], false);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn odoo_webhook_unreadable_record_writes_everything() {
    let fakes = acme_fakes();
    let store = Arc::new(FakeStore {
        read_fails: true,
        ..FakeStore::default()
    });

    let (status, body) = post(
        router(&fakes, Some(store.clone())),
        "/webhook/odoo",
        json!({"res_id": 7, "vat": "900123456-7"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], true);
    assert_eq!(store.writes()[0].1.len(), 5);
}

#[tokio::test]
async fn odoo_webhook_write_failure_is_bad_gateway_and_reported_in_health() {
    let fakes = acme_fakes();
    let store = Arc::new(FakeStore {
        record: json!({"id": 7}).as_object().cloned(),
        write_fails: true,
        ..FakeStore::default()
    });
    let app = router(&fakes, Some(store));

    let (status, body) = post(
        app.clone(),
        "/webhook/odoo",
        json!({"id": 7, "vat": "900123456-7"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "RECORD_STORE_ERROR");
    assert!(body["error"]["message"].as_str().unwrap().contains("x_sigla"));

    let (_, health) = get(app, "/health").await;
    assert!(health["last_error"].as_str().unwrap().contains("Record store error"));
}

#[tokio::test]
async fn odoo_webhook_without_store_is_500() {
    let fakes = acme_fakes();

    let (status, body) = post(
        router(&fakes, None),
        "/webhook/odoo",
        json!({"id": 7, "vat": "900123456-7"}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
}
