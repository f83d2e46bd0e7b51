//! Record store field diagnostics
//!
//! Custom Odoo fields differ between databases (Studio prefixes, typos in
//! generated names). The report lists fields matching a set of keywords,
//! checks that every configured target name exists, and suggests names for
//! the fields most often misconfigured.

use crate::identity::IdentityField;
use crate::mapper::target_name;
use rues_common::config::FieldNames;
use rues_common::{Record, RecordStore};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

pub const DEFAULT_KEYWORDS: [&str; 7] = [
    "comercial", "matricula", "ciiu", "camara", "sigla", "comment", "note",
];

/// Field metadata attributes requested from the store
pub const FIELD_ATTRIBUTES: [&str; 4] = ["string", "type", "required", "readonly"];

const MAX_SIMILAR: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimilarField {
    pub name: String,
    pub label: String,
}

/// Whether one configured target name exists in the store
#[derive(Debug, Clone, Serialize)]
pub struct FieldStatus {
    pub field: IdentityField,
    pub target: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub similar: Vec<SimilarField>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Suggestions {
    pub trade_name: Option<String>,
    pub registration_date: Option<String>,
    pub industry_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub all_fields_count: usize,
    pub keywords: Vec<String>,
    pub matches: BTreeMap<String, Value>,
    pub configured_fields: Vec<FieldStatus>,
    pub suggestions: Suggestions,
}

/// Fetch field metadata from the store and build the report
pub async fn run(
    store: &dyn RecordStore,
    names: &FieldNames,
    keywords: &[String],
) -> rues_common::Result<DiagnosticsReport> {
    let fields = store.fields_get(&FIELD_ATTRIBUTES).await?;
    info!(count = fields.len(), "Field metadata fetched");
    Ok(build_report(&fields, names, keywords))
}

pub fn build_report(fields: &Record, names: &FieldNames, keywords: &[String]) -> DiagnosticsReport {
    let matches = search_fields_by_keywords(fields, keywords);

    let configured_fields = IdentityField::ALL
        .into_iter()
        .filter_map(|field| {
            let target = target_name(names, field)?;
            let exists = fields.contains_key(target);
            Some(FieldStatus {
                field,
                target: target.to_string(),
                exists,
                similar: if exists {
                    Vec::new()
                } else {
                    similar_fields(fields, target)
                },
            })
        })
        .collect();

    let suggestions = Suggestions {
        trade_name: first_match(&matches, "comercial", true),
        registration_date: first_match(&matches, "matricula", false),
        industry_code: first_match(&matches, "ciiu", false),
    };

    DiagnosticsReport {
        all_fields_count: fields.len(),
        keywords: keywords.to_vec(),
        matches,
        configured_fields,
        suggestions,
    }
}

/// Fields whose technical name or label contains any keyword (case-insensitive)
pub fn search_fields_by_keywords(fields: &Record, keywords: &[String]) -> BTreeMap<String, Value> {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    fields
        .iter()
        .filter(|(name, info)| {
            let name = name.to_lowercase();
            let label = label_of(info).to_lowercase();
            keywords
                .iter()
                .any(|k| name.contains(k.as_str()) || label.contains(k.as_str()))
        })
        .map(|(name, info)| (name.clone(), info.clone()))
        .collect()
}

/// Up to three fields resembling a missing target name
///
/// The Studio prefix is dropped and underscores become spaces before
/// matching against names and labels.
pub fn similar_fields(fields: &Record, target: &str) -> Vec<SimilarField> {
    let term = target
        .trim_start_matches("x_studio_")
        .replace('_', " ")
        .to_lowercase();
    let term_underscored = term.replace(' ', "_");

    fields
        .iter()
        .filter(|(name, info)| {
            let name = name.to_lowercase();
            name.contains(&term)
                || name.contains(&term_underscored)
                || label_of(info).to_lowercase().contains(&term)
        })
        .take(MAX_SIMILAR)
        .map(|(name, info)| SimilarField {
            name: name.clone(),
            label: label_of(info).to_string(),
        })
        .collect()
}

fn first_match(matches: &BTreeMap<String, Value>, keyword: &str, check_label: bool) -> Option<String> {
    matches
        .iter()
        .find(|(name, info)| {
            name.to_lowercase().contains(keyword)
                || (check_label && label_of(info).to_lowercase().contains(keyword))
        })
        .map(|(name, _)| name.clone())
}

fn label_of(info: &Value) -> &str {
    info.get("string").and_then(Value::as_str).unwrap_or_default()
}
