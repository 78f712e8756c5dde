//! Per-cycle document of decoded measurements.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::decode::ScaledValue;

/// A decoded value with its display unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub value: ScaledValue,
    pub unit: String,
}

impl Measurement {
    pub fn new(value: ScaledValue, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

/// Ordered mapping from register name to measurement.
///
/// Serializes as a JSON object whose keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Measurement)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a measurement, replacing any previous entry with the same name
    /// in place.
    pub fn insert(&mut self, name: impl Into<String>, measurement: Measurement) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = measurement,
            None => self.entries.push((name, measurement)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Measurement> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, measurement)| measurement)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Measurement)> {
        self.entries.iter().map(|(key, m)| (key.as_str(), m))
    }

    /// Compact JSON encoding.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, measurement) in self.iter() {
            map.serialize_entry(name, measurement)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(serde::Deserialize)]
    struct Entry {
        value: f64,
        unit: String,
    }

    fn sample() -> Document {
        let mut doc = Document::new();
        doc.insert(
            "Voltage L-N Phase 1 (V1)",
            Measurement::new(ScaledValue::Single(230.125), "V"),
        );
        doc.insert(
            "Imported Active Energy",
            Measurement::new(ScaledValue::Double(1234.5678), "kWh"),
        );
        doc.insert(
            "Frequency (F)",
            Measurement::new(ScaledValue::Single(50.0), "Hz"),
        );
        doc
    }

    #[test]
    fn test_compact_ordered_json() {
        let json = sample().to_json().unwrap();
        assert_eq!(
            json,
            r#"{"Voltage L-N Phase 1 (V1)":{"value":230.125,"unit":"V"},"Imported Active Energy":{"value":1234.5678,"unit":"kWh"},"Frequency (F)":{"value":50.0,"unit":"Hz"}}"#
        );
    }

    #[test]
    fn test_json_round_trip() {
        let doc = sample();
        let parsed: HashMap<String, Entry> = serde_json::from_str(&doc.to_json().unwrap()).unwrap();

        assert_eq!(parsed.len(), doc.len());
        for (name, measurement) in doc.iter() {
            let entry = &parsed[name];
            assert!((entry.value - measurement.value.as_f64()).abs() < 1e-6);
            assert_eq!(entry.unit, measurement.unit);
        }
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut doc = sample();
        doc.insert(
            "Voltage L-N Phase 1 (V1)",
            Measurement::new(ScaledValue::Single(231.0), "V"),
        );

        assert_eq!(doc.len(), 3);
        assert_eq!(doc.iter().next().map(|(name, _)| name), Some("Voltage L-N Phase 1 (V1)"));
        assert_eq!(
            doc.get("Voltage L-N Phase 1 (V1)").unwrap().value,
            ScaledValue::Single(231.0)
        );
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert!(!doc.contains("anything"));
        assert_eq!(doc.to_json().unwrap(), "{}");
    }
}
