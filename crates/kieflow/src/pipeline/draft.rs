//! Editable pipeline form state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::schema::ExtractionSchema;
use crate::error::SchemaError;
use crate::model::PipelineRecord;

/// One row of the field editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRow {
    pub field: String,
    pub description: String,
}

impl FieldRow {
    fn is_blank(&self) -> bool {
        self.field.trim().is_empty() && self.description.trim().is_empty()
    }
}

/// A pipeline being created or edited.
///
/// Rows are keyed by a stable index so deleting a row never renumbers the
/// others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDraft {
    pub name: String,
    rows: BTreeMap<usize, FieldRow>,
}

impl Default for PipelineDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineDraft {
    /// A fresh form with two blank rows.
    pub fn new() -> Self {
        let mut rows = BTreeMap::new();
        rows.insert(0, FieldRow::default());
        rows.insert(1, FieldRow::default());
        Self {
            name: String::new(),
            rows,
        }
    }

    /// Loads an existing pipeline into the form.
    pub fn from_pipeline(pipeline: &PipelineRecord) -> Self {
        let rows = pipeline
            .config
            .iter()
            .enumerate()
            .map(|(i, (field, description))| {
                (
                    i,
                    FieldRow {
                        field: field.to_string(),
                        description: description.to_string(),
                    },
                )
            })
            .collect();
        Self {
            name: pipeline.name.clone(),
            rows,
        }
    }

    /// Appends a blank row and returns its index.
    pub fn add_field(&mut self) -> usize {
        let index = self.rows.keys().next_back().map_or(0, |max| max + 1);
        self.rows.insert(index, FieldRow::default());
        index
    }

    pub fn delete_field(&mut self, index: usize) -> Option<FieldRow> {
        self.rows.remove(&index)
    }

    pub fn set_field(&mut self, index: usize, field: &str, description: &str) {
        self.rows.insert(
            index,
            FieldRow {
                field: field.to_string(),
                description: description.to_string(),
            },
        );
    }

    pub fn rows(&self) -> impl Iterator<Item = (usize, &FieldRow)> {
        self.rows.iter().map(|(i, row)| (*i, row))
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Converts the form into a validated `(name, schema)` pair.
    ///
    /// Fully blank rows are ignored; half-filled rows and repeated field names
    /// are rejected.
    pub fn build(&self) -> Result<(String, ExtractionSchema), SchemaError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(SchemaError::EmptyPipelineName);
        }

        let mut schema = ExtractionSchema::new();
        for (index, row) in &self.rows {
            if row.is_blank() {
                continue;
            }
            let field = row.field.trim();
            let description = row.description.trim();
            if field.is_empty() {
                return Err(SchemaError::EmptyFieldName { index: *index });
            }
            if description.is_empty() {
                return Err(SchemaError::EmptyDescription {
                    field: field.to_string(),
                });
            }
            if schema.contains(field) {
                return Err(SchemaError::DuplicateField {
                    field: field.to_string(),
                });
            }
            schema.insert(field, description);
        }

        schema.validate()?;
        Ok((name.to_string(), schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_draft() -> PipelineDraft {
        let mut draft = PipelineDraft::new();
        draft.name = "Invoices".to_string();
        draft.set_field(0, "company", "Issuing company");
        draft.set_field(1, "total", "Total amount");
        draft
    }

    #[test]
    fn test_new_draft_has_two_blank_rows() {
        let draft = PipelineDraft::new();
        assert_eq!(draft.rows().count(), 2);
        assert!(draft.rows().all(|(_, row)| row.is_blank()));
    }

    #[test]
    fn test_add_field_uses_next_index_after_max() {
        let mut draft = PipelineDraft::new();
        draft.delete_field(0);
        assert_eq!(draft.add_field(), 2);

        draft.delete_field(1);
        draft.delete_field(2);
        assert_eq!(draft.add_field(), 0);
    }

    #[test]
    fn test_build_skips_blank_rows() {
        let mut draft = filled_draft();
        draft.add_field();

        let (name, schema) = draft.build().unwrap();
        assert_eq!(name, "Invoices");
        let names: Vec<&str> = schema.field_names().collect();
        assert_eq!(names, vec!["company", "total"]);
    }

    #[test]
    fn test_build_rejects_missing_description() {
        let mut draft = filled_draft();
        let idx = draft.add_field();
        draft.set_field(idx, "vat", "");

        assert_eq!(
            draft.build(),
            Err(SchemaError::EmptyDescription {
                field: "vat".to_string()
            })
        );
    }

    #[test]
    fn test_build_rejects_duplicate_field() {
        let mut draft = filled_draft();
        let idx = draft.add_field();
        draft.set_field(idx, "total", "Grand total");

        assert_eq!(
            draft.build(),
            Err(SchemaError::DuplicateField {
                field: "total".to_string()
            })
        );
    }

    #[test]
    fn test_build_rejects_blank_name() {
        let mut draft = filled_draft();
        draft.name = "   ".to_string();
        assert_eq!(draft.build(), Err(SchemaError::EmptyPipelineName));
    }

    #[test]
    fn test_build_rejects_all_blank_rows() {
        let mut draft = PipelineDraft::new();
        draft.name = "Empty".to_string();
        assert_eq!(draft.build(), Err(SchemaError::Empty));
    }

    #[test]
    fn test_reset_restores_initial_form() {
        let mut draft = filled_draft();
        draft.reset();
        assert_eq!(draft, PipelineDraft::new());
    }
}
