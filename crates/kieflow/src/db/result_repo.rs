//! Result repository: extraction results per `(file, pipeline)` pair.

use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, parse_json_column, parse_timestamp, Database, DatabaseError};
use crate::model::{ExtractedFields, ResultRecord, ResultStatus};

const TABLE: &str = "results";

#[derive(Debug, Clone)]
struct ResultRow {
    id: String,
    created_at: String,
    pipeline_id: String,
    file_id: String,
    llm_json: Option<String>,
    llm_score: Option<f64>,
    status: String,
    corrected: Option<String>,
    corrected_score: Option<f64>,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            created_at: row.get("created_at")?,
            pipeline_id: row.get("pipeline_id")?,
            file_id: row.get("file_id")?,
            llm_json: row.get("llm_json")?,
            llm_score: row.get("llm_score")?,
            status: row.get("status")?,
            corrected: row.get("corrected")?,
            corrected_score: row.get("corrected_score")?,
        })
    }

    fn into_record(self) -> Result<ResultRecord, DatabaseError> {
        let created_at = parse_timestamp(TABLE, &self.id, &self.created_at)?;
        let llm_json = parse_json_column(TABLE, "llm_json", &self.id, self.llm_json.as_deref())?;
        let corrected =
            parse_json_column(TABLE, "corrected", &self.id, self.corrected.as_deref())?;
        let status = self
            .status
            .parse::<ResultStatus>()
            .map_err(|reason| DatabaseError::CorruptColumn {
                table: TABLE,
                column: "status",
                id: self.id.clone(),
                reason,
            })?;

        Ok(ResultRecord {
            id: self.id,
            created_at,
            pipeline_id: self.pipeline_id,
            file_id: self.file_id,
            llm_json,
            llm_score: self.llm_score,
            status,
            corrected,
            corrected_score: self.corrected_score,
        })
    }
}

fn encode_fields(
    id: &str,
    column: &'static str,
    fields: Option<&ExtractedFields>,
) -> Result<Option<String>, DatabaseError> {
    fields
        .map(|f| {
            serde_json::to_string(f).map_err(|e| DatabaseError::CorruptColumn {
                table: TABLE,
                column,
                id: id.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn query_many(
    db: &Database,
    sql: &str,
    args: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<ResultRecord>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, ResultRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    rows.into_iter().map(ResultRow::into_record).collect()
}

/// Inserts a new result row. The file and pipeline must exist.
pub fn insert(db: &Database, result: &ResultRecord) -> Result<(), DatabaseError> {
    let llm_json = encode_fields(&result.id, "llm_json", result.llm_json.as_ref())?;
    let corrected = encode_fields(&result.id, "corrected", result.corrected.as_ref())?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO results (id, created_at, pipeline_id, file_id, llm_json, llm_score,
             status, corrected, corrected_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                result.id,
                format_timestamp(&result.created_at),
                result.pipeline_id,
                result.file_id,
                llm_json,
                result.llm_score,
                result.status.as_str(),
                corrected,
                result.corrected_score,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ResultRecord>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM results WHERE id = ?1",
                params![id],
                ResultRow::from_row,
            )
            .optional()?;
        Ok(row)
    })?;
    row.map(ResultRow::into_record).transpose()
}

/// The most recent result for a `(file, pipeline)` pair.
pub fn find_by_pair(
    db: &Database,
    file_id: &str,
    pipeline_id: &str,
) -> Result<Option<ResultRecord>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM results WHERE file_id = ?1 AND pipeline_id = ?2
                 ORDER BY rowid DESC LIMIT 1",
                params![file_id, pipeline_id],
                ResultRow::from_row,
            )
            .optional()?;
        Ok(row)
    })?;
    row.map(ResultRow::into_record).transpose()
}

/// All results in creation order.
pub fn list_all(db: &Database) -> Result<Vec<ResultRecord>, DatabaseError> {
    query_many(db, "SELECT * FROM results ORDER BY rowid", &[])
}

/// Stores a human correction and marks the result completed.
pub fn record_validation(
    db: &Database,
    id: &str,
    corrected: &ExtractedFields,
    corrected_score: Option<f64>,
) -> Result<bool, DatabaseError> {
    let encoded = encode_fields(id, "corrected", Some(corrected))?;
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE results SET corrected = ?2, corrected_score = ?3, status = ?4 WHERE id = ?1",
            params![
                id,
                encoded,
                corrected_score,
                ResultStatus::Completed.as_str()
            ],
        )?;
        Ok(updated > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{file_repo, pipeline_repo};
    use crate::model::{FileRecord, FileStatus, PipelineRecord};
    use crate::pipeline::ExtractionSchema;
    use chrono::Utc;

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test database");
        for (id, name) in [("f1", "kyc-files/a.png"), ("f2", "kyc-files/b.png")] {
            file_repo::insert(
                &db,
                &FileRecord {
                    id: id.to_string(),
                    name: name.to_string(),
                    created_at: Utc::now(),
                    ocr_json: None,
                    ocr_text: None,
                    storage_id: id.to_string(),
                    status: FileStatus::Unused,
                },
            )
            .unwrap();
        }
        pipeline_repo::insert(
            &db,
            &PipelineRecord {
                id: "p1".to_string(),
                created_at: Utc::now(),
                name: "Passport".to_string(),
                config: ExtractionSchema::from_pairs([("name", "Holder name")]),
                prompt: None,
            },
        )
        .unwrap();
        db
    }

    fn sample_result(id: &str, file_id: &str, value: &str) -> ResultRecord {
        let mut fields = ExtractedFields::new();
        fields.insert("name".to_string(), value.to_string());
        ResultRecord {
            id: id.to_string(),
            created_at: Utc::now(),
            pipeline_id: "p1".to_string(),
            file_id: file_id.to_string(),
            llm_json: Some(fields),
            llm_score: None,
            status: ResultStatus::PendingValidation,
            corrected: None,
            corrected_score: None,
        }
    }

    #[test]
    fn test_insert_and_find_by_pair() {
        let db = seeded_db();
        insert(&db, &sample_result("r1", "f1", "Jane")).unwrap();
        insert(&db, &sample_result("r2", "f1", "Jane Doe")).unwrap();

        let latest = find_by_pair(&db, "f1", "p1").unwrap().unwrap();
        assert_eq!(latest.id, "r2");
        assert!(find_by_pair(&db, "f2", "p1").unwrap().is_none());
        assert_eq!(list_all(&db).unwrap().len(), 2);
    }

    #[test]
    fn test_record_validation_completes_result() {
        let db = seeded_db();
        insert(&db, &sample_result("r1", "f1", "Jane")).unwrap();

        let mut corrected = ExtractedFields::new();
        corrected.insert("name".to_string(), "Jane Doe".to_string());
        assert!(record_validation(&db, "r1", &corrected, Some(0.5)).unwrap());

        let found = find_by_id(&db, "r1").unwrap().unwrap();
        assert_eq!(found.status, ResultStatus::Completed);
        assert_eq!(found.corrected, Some(corrected));
        assert_eq!(found.corrected_score, Some(0.5));
    }

    #[test]
    fn test_results_cascade_with_file_and_pipeline() {
        let db = seeded_db();
        insert(&db, &sample_result("r1", "f1", "Jane")).unwrap();
        insert(&db, &sample_result("r2", "f2", "John")).unwrap();

        file_repo::delete(&db, "f1").unwrap();
        let remaining: Vec<String> = list_all(&db).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec!["r2"]);

        pipeline_repo::delete(&db, "p1").unwrap();
        assert!(list_all(&db).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_file_rejected() {
        let db = seeded_db();
        assert!(insert(&db, &sample_result("r1", "ghost", "Jane")).is_err());
    }
}
