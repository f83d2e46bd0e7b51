//! Registry detail API client (Tier 2)
//!
//! Fetches the structured registration record for a chamber + registration key.
//! Some chambers answer on one API deployment and not the other, so a primary
//! and a secondary endpoint are tried in that order, once each.
//!
//! The record schema varies between chambers and API versions. Extraction is
//! tolerant: every field is optional and several key spellings are accepted.

use crate::dates::{to_iso_date, without_dates};
use crate::extractors::http::{build_client, fill_template, send_checked};
use crate::types::{RegistryDetail, RegistryDetailKey, RegistryDetailSource, SourceError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use rues_common::config::SourcesConfig;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

type Record = Map<String, Value>;

const NAME_KEYS: [&str; 2] = ["razonSocial", "razon_social"];
const DATE_KEYS: [&str; 5] = [
    "fechaMatricula",
    "fecha_matricula",
    "fechaMatriculaRegistro",
    "fechaInscripcion",
    "fechaConstitucion",
];
const NESTED_DATE_KEYS: [&str; 3] = ["fechaMatricula", "fechaInscripcion", "fechaConstitucion"];
const ACTIVITY_KEYS: [&str; 3] = ["actividadesEconomicas", "actividades", "actividadEconomica"];
const ACTIVITY_CODE_KEYS: [&str; 4] = ["codigoCIIU", "ciiu", "codigo", "codigoCiiu"];
const PEOPLE_KEYS: [&str; 5] = [
    "representantesLegales",
    "representantes",
    "apoderados",
    "junta",
    "personas",
];
const PERSON_NAME_KEYS: [&str; 4] = ["nombreCompleto", "nombre", "razonSocial", "nombres"];
const ROLE_KEYS: [&str; 3] = ["rol", "cargo", "tipo"];
const WEB_ID_KEYS: [&str; 3] = ["id", "id_detalle", "id_detalle_web"];

/// Names kept in the legal representation summary
const MAX_REPRESENTATIVES: usize = 2;

/// Keys that name an activity code, not just an activity
static INDUSTRY_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)ciiu|c[oó]digo\w*actividad|actividad\w*c[oó]digo").expect("valid regex")
});
static FOUR_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").expect("valid regex"));
static REPRESENT_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)represent").expect("valid regex"));
static DOC_DASH_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-\s*([A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑ\s\.]+)$").expect("valid regex")
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

pub struct RegistryApiClient {
    http_client: Client,
    primary_url: String,
    secondary_url: String,
}

impl RegistryApiClient {
    pub fn new(config: &SourcesConfig) -> Result<Self, SourceError> {
        Ok(Self::with_client(build_client(config)?, config))
    }

    pub fn with_client(http_client: Client, config: &SourcesConfig) -> Self {
        Self {
            http_client,
            primary_url: config.registry_detail_url.clone(),
            secondary_url: config.registry_detail_fallback_url.clone(),
        }
    }

    /// One attempt against one endpoint template
    async fn fetch_record(
        &self,
        template: &str,
        key: &RegistryDetailKey,
    ) -> Result<Option<Record>, SourceError> {
        let url = fill_template(template, key.as_str());
        let response = send_checked(self.http_client.get(&url)).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Registry detail is not JSON: {}", e)))?;

        let record = unwrap_record(body);
        if let Some(r) = &record {
            debug!(%url, keys = ?r.keys().take(15).collect::<Vec<_>>(), "Registry record unwrapped");
        }
        Ok(record)
    }
}

#[async_trait]
impl RegistryDetailSource for RegistryApiClient {
    fn source_id(&self) -> &'static str {
        "RegistryApi"
    }

    async fn lookup_detail(
        &self,
        key: &RegistryDetailKey,
    ) -> Result<Option<RegistryDetail>, SourceError> {
        let record = match self.fetch_record(&self.primary_url, key).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                info!(key = %key, "Primary registry endpoint returned no record, trying secondary");
                self.fetch_record(&self.secondary_url, key).await?
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Primary registry endpoint failed, trying secondary");
                self.fetch_record(&self.secondary_url, key).await?
            }
        };

        Ok(record.map(|r| extract_detail(&r)))
    }
}

/// Unwrap the record from the response envelope
///
/// Accepts `registros: [record, ...]`, `registros: {record}`, `registro: {record}`
/// or a bare record. Empty objects count as no record.
pub fn unwrap_record(body: Value) -> Option<Record> {
    let Value::Object(mut envelope) = body else {
        return None;
    };

    let record = match envelope.remove("registros") {
        Some(Value::Array(mut items)) if !items.is_empty() => match items.swap_remove(0) {
            Value::Object(r) => r,
            _ => return None,
        },
        Some(Value::Object(r)) if !r.is_empty() => r,
        Some(other) => {
            envelope.insert("registros".to_string(), other);
            match envelope.remove("registro") {
                Some(Value::Object(r)) => r,
                _ => envelope,
            }
        }
        None => match envelope.remove("registro") {
            Some(Value::Object(r)) => r,
            Some(other) => {
                envelope.insert("registro".to_string(), other);
                envelope
            }
            None => envelope,
        },
    };

    (!record.is_empty()).then_some(record)
}

/// Extract the identity fields from an unwrapped record
pub fn extract_detail(record: &Record) -> RegistryDetail {
    let company = record.get("empresa").and_then(Value::as_object);

    let legal_name = first_text(record, &NAME_KEYS)
        .or_else(|| company.and_then(|c| first_text(c, &NAME_KEYS)));
    let trade_name = first_text(record, &["sigla"])
        .or_else(|| company.and_then(|c| first_text(c, &["sigla"])));

    let registration_date = first_text(record, &DATE_KEYS)
        .or_else(|| company.and_then(|c| first_text(c, &NESTED_DATE_KEYS)))
        .and_then(|raw| to_iso_date(&raw));

    let industry_code = industry_from_activities(record, company)
        .or_else(|| find_industry_code_anywhere(&Value::Object(record.clone())));

    let legal_representation = representatives_from_people(record, company)
        .or_else(|| find_representative_anywhere(&Value::Object(record.clone())));

    RegistryDetail {
        legal_name,
        trade_name,
        registration_date,
        industry_code,
        legal_representation,
        web_id: first_text(record, &WEB_ID_KEYS),
    }
}

/// First activity entry's code
fn industry_from_activities(record: &Record, company: Option<&Record>) -> Option<String> {
    let mut lists: Vec<&Value> = ACTIVITY_KEYS.iter().filter_map(|k| record.get(*k)).collect();
    if !lists.iter().any(|v| is_truthy(v)) {
        if let Some(c) = company {
            lists = ACTIVITY_KEYS.iter().filter_map(|k| c.get(*k)).collect();
        }
    }

    lists.into_iter().find_map(|list| match list {
        Value::Array(items) => items
            .first()
            .and_then(Value::as_object)
            .and_then(|item| first_text(item, &ACTIVITY_CODE_KEYS)),
        Value::Object(item) => first_text(item, &ACTIVITY_CODE_KEYS),
        _ => None,
    })
}

/// Names of people acting as legal representative
///
/// People whose role mentions "representante" are preferred; any other named
/// person is used only while nobody has been collected yet.
fn representatives_from_people(record: &Record, company: Option<&Record>) -> Option<String> {
    let mut blocks: Vec<&Value> = PEOPLE_KEYS.iter().filter_map(|k| record.get(*k)).collect();
    if !blocks.iter().any(|v| is_truthy(v)) {
        if let Some(c) = company {
            blocks = PEOPLE_KEYS.iter().filter_map(|k| c.get(*k)).collect();
        }
    }

    let mut names: Vec<String> = Vec::new();
    for block in blocks {
        match block {
            Value::Array(people) => {
                for person in people.iter().filter_map(Value::as_object) {
                    let name = first_text(person, &PERSON_NAME_KEYS);
                    let role = first_text(person, &ROLE_KEYS);
                    match (name, role) {
                        (Some(n), Some(r)) if r.to_lowercase().contains("representante") => {
                            names.push(n)
                        }
                        (Some(n), _) if names.is_empty() => names.push(n),
                        _ => {}
                    }
                }
            }
            Value::Object(person) => {
                if let Some(n) = first_text(person, &PERSON_NAME_KEYS) {
                    names.push(n);
                }
            }
            _ => {}
        }
    }

    let mut unique: Vec<String> = Vec::new();
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    if unique.is_empty() {
        return None;
    }
    unique.truncate(MAX_REPRESENTATIVES);
    Some(unique.join(", "))
}

/// Recursive search for a 4-digit code under code-naming keys, ignoring dates
pub fn find_industry_code_anywhere(value: &Value) -> Option<String> {
    let mut found = None;
    walk(value, &mut |key, v| {
        if found.is_some() || !INDUSTRY_KEY.is_match(key) {
            return;
        }
        found = first_code_in(v);
    });
    found
}

/// Recursive search under keys mentioning "represent"
///
/// A person whose role mentions "principal" wins over everyone else.
pub fn find_representative_anywhere(value: &Value) -> Option<String> {
    let mut principal: Vec<String> = Vec::new();
    let mut general: Vec<String> = Vec::new();

    walk(value, &mut |key, v| {
        if !REPRESENT_KEY.is_match(key) {
            return;
        }
        match v {
            Value::Array(people) => {
                for person in people.iter().filter_map(Value::as_object) {
                    let Some(name) = person_name(person) else {
                        continue;
                    };
                    let is_principal = first_text(person, &ROLE_KEYS)
                        .map(|r| r.to_lowercase().contains("principal"))
                        .unwrap_or(false);
                    if is_principal {
                        principal.push(name);
                    } else {
                        general.push(name);
                    }
                }
            }
            Value::Object(person) => {
                if let Some(name) = person_name(person) {
                    general.push(name);
                }
            }
            _ => {}
        }
    });

    principal.into_iter().chain(general).next()
}

fn person_name(person: &Record) -> Option<String> {
    if let Some(name) = first_text(person, &PERSON_NAME_KEYS) {
        return Some(collapse_whitespace(&name));
    }
    // "<document> - NAME" strings
    let mut found = None;
    walk(&Value::Object(person.clone()), &mut |_, v| {
        if found.is_some() {
            return;
        }
        if let Value::String(s) = v {
            if let Some(caps) = DOC_DASH_NAME.captures(s.trim()) {
                found = Some(collapse_whitespace(&caps[1]));
            }
        }
    });
    found
}

fn first_code_in(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => code_in_text(s),
        Value::Number(n) => code_in_text(&n.to_string()),
        Value::Array(_) | Value::Object(_) => {
            let mut found = None;
            walk(value, &mut |_, v| {
                if found.is_none() {
                    if let Value::String(s) = v {
                        found = code_in_text(s);
                    }
                }
            });
            if found.is_none() {
                if let Value::Array(items) = value {
                    found = items
                        .iter()
                        .filter_map(Value::as_str)
                        .find_map(code_in_text);
                }
            }
            found
        }
        _ => None,
    }
}

fn code_in_text(text: &str) -> Option<String> {
    FOUR_DIGITS
        .captures(&without_dates(text))
        .map(|c| c[1].to_string())
}

/// Depth-first visit of every `(key, value)` pair in nested objects and arrays
fn walk<'a>(value: &'a Value, visit: &mut dyn FnMut(&'a str, &'a Value)) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                visit(k, v);
                walk(v, visit);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, visit);
            }
        }
        _ => {}
    }
}

/// First non-blank string (or number) among `keys`
fn first_text(record: &Record, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match record.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}
