//! Webhook payload fields

use serde::Deserialize;
use serde_json::{Map, Value};

/// Keys that may carry the partner record id, in priority order
pub const PARTNER_ID_KEYS: [&str; 5] = ["id", "_id", "record_id", "res_id", "partner_id"];

/// Inbound webhook body
///
/// Only the tax id fields are typed; everything else Odoo sends is kept in
/// `extra` for partner id extraction.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub nit: Option<Value>,
    #[serde(default)]
    pub vat: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WebhookPayload {
    pub fn raw_identifier(&self) -> Option<String> {
        crate::identifier::extract_raw_identifier(self.nit.as_ref(), self.vat.as_ref())
    }

    /// First key in [`PARTNER_ID_KEYS`] whose value converts to an integer
    pub fn partner_id(&self) -> Option<i64> {
        PARTNER_ID_KEYS
            .iter()
            .filter_map(|k| self.extra.get(*k))
            .find_map(as_record_id)
    }
}

/// Integer, integral float, or numeric string
fn as_record_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
