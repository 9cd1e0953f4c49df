//! Attribution of OCR boxes to extracted field values.
//!
//! A box with text `T` matches a field `(name, value)` when any of these hold
//! (comparisons are case-insensitive, lengths are in characters):
//!
//! 1. `T` is contained in `value`, and `T` is longer than two characters or
//!    equal to `value`.
//! 2. `name` mentions "date" or "tax", `value` is contained in `T`, and
//!    `value` is longer than two characters.
//! 3. `value` is longer than three characters, longer than 45% of `T`, and
//!    contained in `T`.
//!
//! Empty values never match. When a box matches several fields, the last one
//! in iteration order owns the attribution.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::ExtractedFields;
use crate::ocr::OcrBox;
use crate::pipeline::ExtractionSchema;

const FUZZY_MIN_RATIO: f64 = 0.45;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoxMatch {
    /// Per input page, the boxes that matched at least one field, in page
    /// order. Pages without a match map to an empty list.
    pub filtered_boxes: BTreeMap<u32, Vec<OcrBox>>,
    /// Box text to the field it is attributed to.
    pub attribution: IndexMap<String, String>,
}

impl BoxMatch {
    pub fn field_for(&self, box_text: &str) -> Option<&str> {
        self.attribution.get(box_text).map(String::as_str)
    }

    pub fn matched_box_count(&self) -> usize {
        self.filtered_boxes.values().map(Vec::len).sum()
    }
}

pub struct BoxMatcher;

impl BoxMatcher {
    /// Matches every box on every page against `fields`, in the given order.
    pub fn match_boxes<'f, I>(ocr_boxes: &BTreeMap<u32, Vec<OcrBox>>, fields: I) -> BoxMatch
    where
        I: IntoIterator<Item = (&'f str, &'f str)>,
    {
        let fields: Vec<(&str, &str)> = fields
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .collect();
        let mut result = BoxMatch::default();

        for (page, boxes) in ocr_boxes {
            let mut kept = Vec::new();
            for ocr_box in boxes {
                let mut matched = false;
                for (name, value) in &fields {
                    if Self::is_match(&ocr_box.text, name, value) {
                        matched = true;
                        result
                            .attribution
                            .insert(ocr_box.text.clone(), (*name).to_string());
                    }
                }
                if matched {
                    kept.push(ocr_box.clone());
                }
            }
            result.filtered_boxes.insert(*page, kept);
        }

        result
    }

    /// Matches extracted values in the pipeline's field order, followed by
    /// any fields the extraction returned that the schema does not list.
    pub fn match_extraction(
        ocr_boxes: &BTreeMap<u32, Vec<OcrBox>>,
        schema: &ExtractionSchema,
        extracted: &ExtractedFields,
    ) -> BoxMatch {
        Self::match_boxes(ocr_boxes, ordered_fields(schema, extracted))
    }

    pub fn is_match(box_text: &str, field_name: &str, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }

        let text_lower = box_text.to_lowercase();
        let value_lower = value.to_lowercase();
        let text_len = box_text.chars().count();
        let value_len = value.chars().count();

        let text_in_value = value_lower.contains(&text_lower);
        let value_in_text = text_lower.contains(&value_lower);

        let containment = text_in_value && (text_len > 2 || text_lower == value_lower);

        let name_lower = field_name.to_lowercase();
        let structured = (name_lower.contains("date") || name_lower.contains("tax"))
            && value_in_text
            && value_len > 2;

        let fuzzy =
            value_len > 3 && value_len as f64 > FUZZY_MIN_RATIO * text_len as f64 && value_in_text;

        containment || structured || fuzzy
    }
}

fn ordered_fields<'a>(
    schema: &'a ExtractionSchema,
    extracted: &'a ExtractedFields,
) -> Vec<(&'a str, &'a str)> {
    let mut ordered: Vec<(&str, &str)> = schema
        .field_names()
        .filter_map(|name| extracted.get_key_value(name))
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    ordered.extend(
        extracted
            .iter()
            .filter(|(name, _)| !schema.contains(name))
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::BoundingBox;

    fn ocr_box(text: &str) -> OcrBox {
        OcrBox {
            bounding_box: BoundingBox([[0.0, 0.0], [10.0, 0.0], [10.0, 5.0], [0.0, 5.0]]),
            text: text.to_string(),
        }
    }

    fn page(texts: &[&str]) -> BTreeMap<u32, Vec<OcrBox>> {
        let mut pages = BTreeMap::new();
        pages.insert(1, texts.iter().map(|t| ocr_box(t)).collect());
        pages
    }

    #[test]
    fn test_box_contained_in_value() {
        assert!(BoxMatcher::is_match(
            "ACME Corp",
            "company",
            "ACME Corp International"
        ));
        assert!(BoxMatcher::is_match("acme corp", "company", "ACME CORP"));
    }

    #[test]
    fn test_short_box_needs_exact_match() {
        assert!(BoxMatcher::is_match("A", "grade", "A"));
        assert!(!BoxMatcher::is_match("A", "company", "ACME"));
        assert!(!BoxMatcher::is_match("AC", "company", "ACME"));
    }

    #[test]
    fn test_date_field_inside_longer_box() {
        assert!(BoxMatcher::is_match(
            "Issued on 2024-01-01 at HQ",
            "issue_date",
            "2024-01-01"
        ));
        assert!(BoxMatcher::is_match("VAT: 19%", "Tax_Rate", "19%"));
        // too short for the date rule
        assert!(!BoxMatcher::is_match("Tax 7 percent", "tax", "7"));
    }

    #[test]
    fn test_fuzzy_rule_enforces_ratio() {
        // 9 chars vs 0.45 * 23 = 10.35
        assert!(!BoxMatcher::is_match(
            "Reference No. INV-20231",
            "reference",
            "INV-20231"
        ));
        // 9 chars vs 0.45 * 15 = 6.75
        assert!(BoxMatcher::is_match("Ref: INV-20231.", "reference", "INV-20231"));
    }

    #[test]
    fn test_fuzzy_rule_needs_more_than_three_chars() {
        assert!(!BoxMatcher::is_match("No 123", "number", "123"));
    }

    #[test]
    fn test_empty_value_never_matches() {
        assert!(!BoxMatcher::is_match("", "name", ""));
        assert!(!BoxMatcher::is_match("Jane", "name", ""));
    }

    #[test]
    fn test_match_boxes_filters_and_attributes() {
        let boxes = page(&["PASSPORT", "Jane Doe", "Nationality", "French"]);
        let result =
            BoxMatcher::match_boxes(&boxes, [("name", "Jane Doe"), ("nationality", "French")]);

        let kept: Vec<&str> = result.filtered_boxes[&1]
            .iter()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(kept, vec!["Jane Doe", "French"]);
        assert_eq!(result.field_for("Jane Doe"), Some("name"));
        assert_eq!(result.field_for("French"), Some("nationality"));
        assert_eq!(result.field_for("PASSPORT"), None);
    }

    #[test]
    fn test_last_matching_field_wins_and_box_kept_once() {
        let boxes = page(&["Paris"]);
        let result = BoxMatcher::match_boxes(
            &boxes,
            [("birth_place", "Paris"), ("issue_place", "Paris")],
        );

        assert_eq!(result.filtered_boxes[&1].len(), 1);
        assert_eq!(result.field_for("Paris"), Some("issue_place"));
    }

    #[test]
    fn test_pages_without_matches_keep_an_empty_list() {
        let mut boxes = page(&["Jane Doe"]);
        boxes.insert(2, vec![ocr_box("Terms and conditions")]);

        let result = BoxMatcher::match_boxes(&boxes, [("name", "Jane Doe")]);
        assert_eq!(result.filtered_boxes.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert!(result.filtered_boxes[&2].is_empty());
        assert_eq!(result.matched_box_count(), 1);
    }

    #[test]
    fn test_unmatched_fields_are_silent() {
        let boxes = page(&["Jane Doe"]);
        let result = BoxMatcher::match_boxes(&boxes, [("iban", "FR76 3000 6000")]);
        assert!(result.filtered_boxes[&1].is_empty());
        assert!(result.attribution.is_empty());
    }

    #[test]
    fn test_extraction_follows_schema_order_then_extras() {
        let schema = ExtractionSchema::from_pairs([("second", "b"), ("first", "a")]);
        let mut extracted = ExtractedFields::new();
        extracted.insert("extra".to_string(), "Lyon".to_string());
        extracted.insert("first".to_string(), "Lyon".to_string());
        extracted.insert("second".to_string(), "Lyon".to_string());

        let boxes = page(&["Lyon"]);
        let result = BoxMatcher::match_extraction(&boxes, &schema, &extracted);
        // order: second, first, extra
        assert_eq!(result.field_for("Lyon"), Some("extra"));

        let ordered = ordered_fields(&schema, &extracted);
        let names: Vec<&str> = ordered.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["second", "first", "extra"]);
    }
}
