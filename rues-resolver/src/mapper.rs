//! Projection of a resolved identity onto record store field names

use crate::identity::{IdentityField, ResolvedIdentity};
use rues_common::config::FieldNames;
use rues_common::Record;
use serde_json::Value;

/// External field name → value; never contains absent values
pub type MappedFields = Record;

/// Target field name for `field`, if configured
pub fn target_name(names: &FieldNames, field: IdentityField) -> Option<&str> {
    let name = match field {
        IdentityField::LegalName => &names.legal_name,
        IdentityField::TradeName => &names.trade_name,
        IdentityField::ChamberCode => &names.chamber_code,
        IdentityField::ChamberName => &names.chamber_name,
        IdentityField::RegistrationDate => &names.registration_date,
        IdentityField::IndustryCode => &names.industry_code,
        IdentityField::LegalRepresentation => &names.legal_representation,
    };
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

/// Copy every populated field under its configured external name
///
/// Absent values and unconfigured targets are left out. When two identity
/// fields share a target name, the first in canonical order wins.
pub fn map_to_external_fields(identity: &ResolvedIdentity, names: &FieldNames) -> MappedFields {
    let mut mapped = MappedFields::new();
    for (field, resolved) in identity.iter() {
        let Some(target) = target_name(names, field) else {
            continue;
        };
        if resolved.value.trim().is_empty() || mapped.contains_key(target) {
            continue;
        }
        mapped.insert(target.to_string(), Value::String(resolved.value.clone()));
    }
    mapped
}

/// Keep only values that differ from the record's current values
///
/// Odoo reports empty fields as `false`; those always differ from a value.
pub fn diff_against_current(mapped: MappedFields, current: Option<&Record>) -> MappedFields {
    let Some(current) = current else {
        return mapped;
    };
    mapped
        .into_iter()
        .filter(|(name, value)| !same_value(current.get(name), value))
        .collect()
}

fn same_value(current: Option<&Value>, new: &Value) -> bool {
    match (current, new) {
        (Some(Value::String(c)), Value::String(n)) => c.trim() == n.trim(),
        (Some(c), n) => c == n,
        (None, _) => false,
    }
}
