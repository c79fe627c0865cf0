//! Supplementary reference document (construction material costs, fuel sources).
//!
//! The document is a JSON object. Material sections map an integer id (as an object key) to
//! `{"name", "unit", "cost"}`; `EnergySources.FuelSource` maps a fuel name to
//! `{"unit", "AverageCarbonOutput"}`. Object key order is preserved, and fuel-source ids are the
//! 1-based positions of the entries in the document.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{RebuildError, RebuildResult};

/// One construction material entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MaterialEntry {
    pub name: String,
    pub unit: String,
    /// Kept as raw JSON so integer and decimal costs render the way they were written.
    pub cost: serde_json::Value,
}

/// One fuel-source entry; the fuel name is the object key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FuelSourceEntry {
    pub unit: String,
    #[serde(rename = "AverageCarbonOutput")]
    pub average_carbon_output: serde_json::Value,
}

/// Parsed supplementary document.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplementaryData {
    document: serde_json::Map<String, serde_json::Value>,
}

impl SupplementaryData {
    pub fn from_path(path: impl AsRef<Path>) -> RebuildResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(input: &str) -> RebuildResult<Self> {
        match serde_json::from_str::<serde_json::Value>(input)? {
            serde_json::Value::Object(document) => Ok(Self { document }),
            _ => Err(RebuildError::SchemaMismatch {
                message: "supplementary document must be a json object".to_string(),
            }),
        }
    }

    /// Top-level section names, in document order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.document.keys().map(String::as_str)
    }

    /// Entries of a material section as `(id, entry)`, in document order.
    pub fn materials(&self, section: &str) -> RebuildResult<Vec<(i64, MaterialEntry)>> {
        let entries = section_object(&self.document, section, section)?;
        entries
            .iter()
            .map(|(key, value)| {
                let id = key.trim().parse::<i64>().map_err(|_| RebuildError::MissingReferenceData {
                    message: format!("{section}: material id '{key}' is not an integer"),
                })?;
                let entry = MaterialEntry::deserialize(value).map_err(|e| {
                    RebuildError::MissingReferenceData {
                        message: format!("{section}.{key}: {e}"),
                    }
                })?;
                Ok((id, entry))
            })
            .collect()
    }

    /// `EnergySources.FuelSource` entries as `(fuel name, entry)`, in document order.
    pub fn fuel_sources(&self) -> RebuildResult<Vec<(String, FuelSourceEntry)>> {
        let energy = section_object(&self.document, "EnergySources", "EnergySources")?;
        let fuels = section_object(energy, "FuelSource", "EnergySources.FuelSource")?;
        fuels
            .iter()
            .map(|(name, value)| {
                let entry = FuelSourceEntry::deserialize(value).map_err(|e| {
                    RebuildError::MissingReferenceData {
                        message: format!("EnergySources.FuelSource.{name}: {e}"),
                    }
                })?;
                Ok((name.clone(), entry))
            })
            .collect()
    }
}

fn section_object<'a>(
    parent: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
    path: &str,
) -> RebuildResult<&'a serde_json::Map<String, serde_json::Value>> {
    match parent.get(key) {
        Some(serde_json::Value::Object(map)) => Ok(map),
        Some(_) => Err(RebuildError::MissingReferenceData {
            message: format!("section '{path}' is not a json object"),
        }),
        None => Err(RebuildError::MissingReferenceData {
            message: format!("section '{path}' not found"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::SupplementaryData;
    use crate::error::RebuildError;

    const DOC: &str = r#"{
        "roofMatAvg": {
            "1": {"name": "Built-up", "unit": "sqft", "cost": 5.5},
            "2": {"name": "Metal surfacing", "unit": "sqft", "cost": 9}
        },
        "EnergySources": {
            "FuelSource": {
                "Natural gas": {"unit": "lb/MMBtu", "AverageCarbonOutput": 117},
                "Electricity": {"unit": "lb/MWh", "AverageCarbonOutput": 852.3}
            }
        }
    }"#;

    #[test]
    fn materials_keep_document_order_and_integer_ids() {
        let doc = SupplementaryData::from_json_str(DOC).unwrap();
        let roof = doc.materials("roofMatAvg").unwrap();
        assert_eq!(roof.len(), 2);
        assert_eq!(roof[0].0, 1);
        assert_eq!(roof[0].1.name, "Built-up");
        assert_eq!(roof[1].1.cost, serde_json::json!(9));
    }

    #[test]
    fn fuel_sources_follow_document_order() {
        let doc = SupplementaryData::from_json_str(DOC).unwrap();
        let fuels = doc.fuel_sources().unwrap();
        let names: Vec<&str> = fuels.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Natural gas", "Electricity"]);
        assert_eq!(fuels[1].1.average_carbon_output, serde_json::json!(852.3));
    }

    #[test]
    fn missing_section_is_reported() {
        let doc = SupplementaryData::from_json_str(DOC).unwrap();
        match doc.materials("WallConstructionMaterial").unwrap_err() {
            RebuildError::MissingReferenceData { message } => {
                assert!(message.contains("WallConstructionMaterial"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn entry_without_required_field_is_reported() {
        let doc = SupplementaryData::from_json_str(r#"{"roofMatAvg": {"1": {"name": "x", "cost": 1}}}"#).unwrap();
        let err = doc.materials("roofMatAvg").unwrap_err();
        assert!(err.to_string().contains("roofMatAvg.1"));
    }

    #[test]
    fn document_must_be_an_object() {
        assert!(matches!(
            SupplementaryData::from_json_str("[1, 2]"),
            Err(RebuildError::SchemaMismatch { .. })
        ));
    }
}
