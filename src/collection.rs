//! Collection and record types persisted per namespace

use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Free-form metadata attached to a record. Always carries `text`.
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key holding the embedded text.
pub const TEXT_KEY: &str = "text";
/// Metadata key holding the owning prescription.
pub const PRESCRIPTION_ID_KEY: &str = "prescription_id";
/// Metadata key holding a chunk's position within its prescription.
pub const CHUNK_ID_KEY: &str = "chunk_id";

/// One embedded text chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vector,
    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorRecord {
    /// The embedded text, if the metadata carries one.
    pub fn text(&self) -> Option<&str> {
        self.metadata.get(TEXT_KEY).and_then(Value::as_str)
    }

    /// True when `metadata.prescription_id` is exactly this string.
    pub fn belongs_to(&self, prescription_id: &str) -> bool {
        self.metadata.get(PRESCRIPTION_ID_KEY).and_then(Value::as_str) == Some(prescription_id)
    }
}

/// All records stored under one namespace, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub vectors: Vec<VectorRecord>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Set of ids already present, for dedup during ingestion.
    pub fn id_set(&self) -> HashSet<String> {
        self.vectors.iter().map(|v| v.id.clone()).collect()
    }

    /// Record ids in storage order.
    pub fn ids(&self) -> Vec<String> {
        self.vectors.iter().map(|v| v.id.clone()).collect()
    }

    /// Append records. Callers are responsible for id uniqueness.
    pub fn extend(&mut self, records: Vec<VectorRecord>) {
        self.vectors.extend(records);
    }
}

/// A scored search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMatch {
    pub id: String,
    pub score: f64,
    pub metadata: Metadata,
}

impl SearchMatch {
    pub fn text(&self) -> Option<&str> {
        self.metadata.get(TEXT_KEY).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, pid: Value) -> VectorRecord {
        let mut metadata = Metadata::new();
        metadata.insert(TEXT_KEY.into(), json!("take with food"));
        metadata.insert(PRESCRIPTION_ID_KEY.into(), pid);
        VectorRecord {
            id: id.to_string(),
            embedding: Vector::new(vec![1.0, 0.0]),
            metadata,
        }
    }

    #[test]
    fn test_belongs_to_is_exact_string_match() {
        let r = record("a", json!("P1"));
        assert!(r.belongs_to("P1"));
        assert!(!r.belongs_to("P"));
        assert!(!r.belongs_to("P10"));

        // A numeric id is not the string "1"
        let numeric = record("b", json!(1));
        assert!(!numeric.belongs_to("1"));
    }

    #[test]
    fn test_collection_file_layout() {
        let mut c = Collection::new();
        c.extend(vec![record("a", json!("P1"))]);

        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(value["vectors"][0]["id"], "a");
        assert_eq!(value["vectors"][0]["embedding"], json!([1.0, 0.0]));
        assert_eq!(value["vectors"][0]["metadata"]["text"], "take with food");
    }

    #[test]
    fn test_missing_vectors_key_reads_as_empty() {
        let c: Collection = serde_json::from_str("{}").unwrap();
        assert!(c.is_empty());
    }

    #[test]
    fn test_id_set() {
        let mut c = Collection::new();
        c.extend(vec![record("a", json!("P1")), record("b", json!("P1"))]);
        let ids = c.id_set();
        assert!(ids.contains("a") && ids.contains("b"));
        assert_eq!(c.ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(c.vectors[0].text(), Some("take with food"));
    }
}
