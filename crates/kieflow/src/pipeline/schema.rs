//! Extraction schema: the ordered `field name -> description` map that steers
//! the language model for one pipeline.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Ordered mapping of field names to field descriptions.
///
/// Field order is significant: it is the order fields are presented to the
/// extractor and the order the box matcher walks them. Serializes to a plain
/// JSON object in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionSchema {
    fields: IndexMap<String, String>,
}

impl ExtractionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from pairs. Later duplicates overwrite earlier ones.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut schema = Self::new();
        for (name, description) in pairs {
            schema.insert(name, description);
        }
        schema
    }

    /// Inserts or replaces a field. A replaced field keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, description: impl Into<String>) {
        self.fields.insert(name.into(), description.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.shift_remove(name)
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Rejects empty schemas, blank field names and blank descriptions.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::Empty);
        }

        for (index, (name, description)) in self.fields.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(SchemaError::EmptyFieldName { index });
            }
            if description.trim().is_empty() {
                return Err(SchemaError::EmptyDescription {
                    field: name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Canonical serialization used for persistence.
    pub fn to_json(&self) -> String {
        // A map of strings always serializes.
        serde_json::to_string(&self.fields).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(|e| SchemaError::InvalidJson(e.to_string()))
    }
}

impl<'a> IntoIterator for &'a ExtractionSchema {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice_schema() -> ExtractionSchema {
        ExtractionSchema::from_pairs([
            ("company", "Name of the issuing company"),
            ("issue_date", "Date the invoice was issued"),
            ("total", "Total amount including tax"),
        ])
    }

    #[test]
    fn test_preserves_insertion_order() {
        let schema = invoice_schema();
        let names: Vec<&str> = schema.field_names().collect();
        assert_eq!(names, vec!["company", "issue_date", "total"]);
    }

    #[test]
    fn test_duplicate_insert_last_write_wins() {
        let mut schema = invoice_schema();
        schema.insert("company", "Legal entity name");

        assert_eq!(schema.len(), 3);
        assert_eq!(schema.description("company"), Some("Legal entity name"));
        assert_eq!(schema.field_names().next(), Some("company"));
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let schema = invoice_schema();
        let json = schema.to_json();
        assert_eq!(
            json,
            r#"{"company":"Name of the issuing company","issue_date":"Date the invoice was issued","total":"Total amount including tax"}"#
        );

        let parsed = ExtractionSchema::from_json(&json).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let err = ExtractionSchema::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidJson(_)));
    }

    #[test]
    fn test_validate_accepts_complete_schema() {
        assert!(invoice_schema().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_schema() {
        assert_eq!(ExtractionSchema::new().validate(), Err(SchemaError::Empty));
    }

    #[test]
    fn test_validate_rejects_blank_description() {
        let schema = ExtractionSchema::from_pairs([("total", "  ")]);
        assert_eq!(
            schema.validate(),
            Err(SchemaError::EmptyDescription {
                field: "total".to_string()
            })
        );
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let schema = ExtractionSchema::from_pairs([("company", "Company"), ("", "Orphan")]);
        assert_eq!(
            schema.validate(),
            Err(SchemaError::EmptyFieldName { index: 1 })
        );
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let mut schema = invoice_schema();
        assert_eq!(
            schema.remove("issue_date").as_deref(),
            Some("Date the invoice was issued")
        );
        let names: Vec<&str> = schema.field_names().collect();
        assert_eq!(names, vec!["company", "total"]);
    }
}
