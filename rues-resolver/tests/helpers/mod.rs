//! Test Helper Utilities
//!
//! Shared fakes for rues-resolver tests: scripted registry sources that count
//! their calls, an in-memory record store, and a local HTTP server spawner.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use rues_common::{Error, Record, RecordStore};
use rues_resolver::identifier::BaseIdentifier;
use rues_resolver::types::{
    DatasetCandidate, DatasetSource, RegistryDetail, RegistryDetailKey, RegistryDetailSource,
    RegistryPageSource, ScrapedDetail, SourceError,
};
use rues_resolver::IdentityResolver;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted answer of a fake source
#[derive(Clone)]
pub enum Reply<T> {
    Found(T),
    Nothing,
    Fail,
}

impl<T: Clone> Reply<T> {
    fn answer(&self) -> Result<Option<T>, SourceError> {
        match self {
            Reply::Found(value) => Ok(Some(value.clone())),
            Reply::Nothing => Ok(None),
            Reply::Fail => Err(SourceError::Network("simulated outage".to_string())),
        }
    }
}

pub struct FakeDataset {
    reply: Reply<DatasetCandidate>,
    calls: AtomicUsize,
}

impl FakeDataset {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetSource for FakeDataset {
    fn source_id(&self) -> &'static str {
        "FakeDataset"
    }

    async fn lookup_dataset(
        &self,
        _base_id: &BaseIdentifier,
    ) -> Result<Option<DatasetCandidate>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.answer()
    }
}

pub struct FakeRegistryApi {
    reply: Reply<RegistryDetail>,
    calls: AtomicUsize,
    keys: Mutex<Vec<String>>,
}

impl FakeRegistryApi {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryDetailSource for FakeRegistryApi {
    fn source_id(&self) -> &'static str {
        "FakeRegistryApi"
    }

    async fn lookup_detail(
        &self,
        key: &RegistryDetailKey,
    ) -> Result<Option<RegistryDetail>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(key.as_str().to_string());
        self.reply.answer()
    }
}

pub struct FakeRegistryPage {
    reply: Reply<ScrapedDetail>,
    calls: AtomicUsize,
    web_ids: Mutex<Vec<Option<String>>>,
}

impl FakeRegistryPage {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn web_ids(&self) -> Vec<Option<String>> {
        self.web_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryPageSource for FakeRegistryPage {
    fn source_id(&self) -> &'static str {
        "FakeRegistryPage"
    }

    async fn scrape_detail(
        &self,
        web_id: Option<&str>,
        _base_id: &BaseIdentifier,
    ) -> Result<Option<ScrapedDetail>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.web_ids.lock().unwrap().push(web_id.map(str::to_string));
        self.reply.answer()
    }
}

/// The three fake sources behind one resolver
pub struct Fakes {
    pub dataset: Arc<FakeDataset>,
    pub registry_api: Arc<FakeRegistryApi>,
    pub registry_page: Arc<FakeRegistryPage>,
}

impl Fakes {
    pub fn new(
        dataset: Reply<DatasetCandidate>,
        registry_api: Reply<RegistryDetail>,
        registry_page: Reply<ScrapedDetail>,
    ) -> Self {
        Self {
            dataset: Arc::new(FakeDataset {
                reply: dataset,
                calls: AtomicUsize::new(0),
            }),
            registry_api: Arc::new(FakeRegistryApi {
                reply: registry_api,
                calls: AtomicUsize::new(0),
                keys: Mutex::new(Vec::new()),
            }),
            registry_page: Arc::new(FakeRegistryPage {
                reply: registry_page,
                calls: AtomicUsize::new(0),
                web_ids: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn resolver(&self) -> IdentityResolver {
        IdentityResolver::new(
            self.dataset.clone(),
            self.registry_api.clone(),
            self.registry_page.clone(),
        )
    }
}

/// Dataset row for ACME with chamber 5 / registration 321
pub fn acme_candidate() -> DatasetCandidate {
    DatasetCandidate {
        identifier: "900123456".to_string(),
        legal_name: Some("ACME SAS".to_string()),
        trade_name: Some("ACME".to_string()),
        chamber_code: Some("5".to_string()),
        chamber_name: Some("MEDELLIN".to_string()),
        registration_number: Some("321".to_string()),
    }
}

/// Registry record carrying both enrichment fields
pub fn full_detail() -> RegistryDetail {
    RegistryDetail {
        legal_name: Some("ACME S.A.S. (registry)".to_string()),
        trade_name: None,
        registration_date: Some("2015-03-09".to_string()),
        industry_code: Some("4711".to_string()),
        legal_representation: Some("ANA PEREZ".to_string()),
        web_id: Some("123".to_string()),
    }
}

pub fn scraped_detail() -> ScrapedDetail {
    ScrapedDetail {
        legal_name: Some("ACME PAGE".to_string()),
        trade_name: None,
        registration_date: Some("2015-03-10".to_string()),
        industry_code: Some("6201".to_string()),
        legal_representation: Some("<section>ANA PEREZ</section>".to_string()),
    }
}

/// In-memory record store
#[derive(Default)]
pub struct FakeStore {
    /// Current record; `None` means the partner does not exist
    pub record: Option<Record>,
    pub read_fails: bool,
    pub write_fails: bool,
    pub writes: Mutex<Vec<(i64, Record)>>,
}

impl FakeStore {
    pub fn with_record(record: serde_json::Value) -> Self {
        Self {
            record: record.as_object().cloned(),
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<(i64, Record)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn read(&self, _record_id: i64, _fields: &[&str]) -> rues_common::Result<Option<Record>> {
        if self.read_fails {
            return Err(Error::Rpc("Access Denied".to_string()));
        }
        Ok(self.record.clone())
    }

    async fn write(&self, record_id: i64, values: &Record) -> rues_common::Result<bool> {
        if self.write_fails {
            return Err(Error::Rpc("Invalid field 'x_sigla' on model 'res.partner'".to_string()));
        }
        self.writes.lock().unwrap().push((record_id, values.clone()));
        Ok(true)
    }

    async fn fields_get(&self, _attributes: &[&str]) -> rues_common::Result<Record> {
        Ok(json!({"name": {"string": "Name", "type": "char"}})
            .as_object()
            .cloned()
            .unwrap_or_default())
    }
}

/// Serve `app` on an ephemeral local port; returns `http://127.0.0.1:<port>`
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}
