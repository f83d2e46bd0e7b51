//! Merged company identity with per-field provenance

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Canonical identity fields, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityField {
    LegalName,
    TradeName,
    ChamberCode,
    ChamberName,
    RegistrationDate,
    IndustryCode,
    LegalRepresentation,
}

impl IdentityField {
    pub const ALL: [IdentityField; 7] = [
        IdentityField::LegalName,
        IdentityField::TradeName,
        IdentityField::ChamberCode,
        IdentityField::ChamberName,
        IdentityField::RegistrationDate,
        IdentityField::IndustryCode,
        IdentityField::LegalRepresentation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityField::LegalName => "legal_name",
            IdentityField::TradeName => "trade_name",
            IdentityField::ChamberCode => "chamber_code",
            IdentityField::ChamberName => "chamber_name",
            IdentityField::RegistrationDate => "registration_date",
            IdentityField::IndustryCode => "industry_code",
            IdentityField::LegalRepresentation => "legal_representation",
        }
    }
}

impl fmt::Display for IdentityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which source produced a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    Dataset,
    RegistryApi,
    RegistryPage,
}

impl IdentitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentitySource::Dataset => "dataset",
            IdentitySource::RegistryApi => "registry_api",
            IdentitySource::RegistryPage => "registry_page",
        }
    }
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial identity as answered by one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityFields {
    pub legal_name: Option<String>,
    pub trade_name: Option<String>,
    pub chamber_code: Option<String>,
    pub chamber_name: Option<String>,
    pub registration_date: Option<String>,
    pub industry_code: Option<String>,
    pub legal_representation: Option<String>,
}

impl IdentityFields {
    pub fn get(&self, field: IdentityField) -> Option<&str> {
        match field {
            IdentityField::LegalName => self.legal_name.as_deref(),
            IdentityField::TradeName => self.trade_name.as_deref(),
            IdentityField::ChamberCode => self.chamber_code.as_deref(),
            IdentityField::ChamberName => self.chamber_name.as_deref(),
            IdentityField::RegistrationDate => self.registration_date.as_deref(),
            IdentityField::IndustryCode => self.industry_code.as_deref(),
            IdentityField::LegalRepresentation => self.legal_representation.as_deref(),
        }
    }

    /// True when no field carries a non-blank value
    pub fn is_empty(&self) -> bool {
        IdentityField::ALL
            .iter()
            .all(|f| self.get(*f).map_or(true, |v| v.trim().is_empty()))
    }
}

/// A populated field and the source that set it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedField {
    pub value: String,
    pub source: IdentitySource,
}

/// Merged identity across all consulted sources
///
/// Fields are filled first-writer-wins: once a source sets a field, later
/// sources cannot replace it. Blank values never count as set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedIdentity {
    fields: [Option<ResolvedField>; 7],
}

impl ResolvedIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(field: IdentityField) -> usize {
        match field {
            IdentityField::LegalName => 0,
            IdentityField::TradeName => 1,
            IdentityField::ChamberCode => 2,
            IdentityField::ChamberName => 3,
            IdentityField::RegistrationDate => 4,
            IdentityField::IndustryCode => 5,
            IdentityField::LegalRepresentation => 6,
        }
    }

    /// Merge a source's partial answer; returns how many fields it filled
    pub fn merge(&mut self, incoming: &IdentityFields, source: IdentitySource) -> usize {
        let mut filled = 0;
        for field in IdentityField::ALL {
            let Some(value) = incoming.get(field).map(str::trim) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            let slot = &mut self.fields[Self::slot(field)];
            if slot.is_none() {
                *slot = Some(ResolvedField {
                    value: value.to_string(),
                    source,
                });
                filled += 1;
            }
        }
        filled
    }

    pub fn value(&self, field: IdentityField) -> Option<&str> {
        self.fields[Self::slot(field)]
            .as_ref()
            .map(|f| f.value.as_str())
    }

    pub fn source_of(&self, field: IdentityField) -> Option<IdentitySource> {
        self.fields[Self::slot(field)].as_ref().map(|f| f.source)
    }

    pub fn has(&self, field: IdentityField) -> bool {
        self.value(field).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(Option::is_none)
    }

    pub fn populated_count(&self) -> usize {
        self.fields.iter().filter(|f| f.is_some()).count()
    }

    /// Enrichment fields the page scraper can still fill
    pub fn missing_enrichment(&self) -> Vec<IdentityField> {
        [IdentityField::IndustryCode, IdentityField::LegalRepresentation]
            .into_iter()
            .filter(|f| !self.has(*f))
            .collect()
    }

    /// Populated fields in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (IdentityField, &ResolvedField)> {
        IdentityField::ALL
            .into_iter()
            .zip(self.fields.iter())
            .filter_map(|(field, slot)| slot.as_ref().map(|v| (field, v)))
    }
}

impl Serialize for ResolvedIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.populated_count()))?;
        for (field, resolved) in self.iter() {
            map.serialize_entry(field.as_str(), resolved)?;
        }
        map.end()
    }
}
