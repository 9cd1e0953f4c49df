//! Pipeline repository: CRUD operations for the `pipelines` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::model::PipelineRecord;
use crate::pipeline::ExtractionSchema;

const TABLE: &str = "pipelines";

#[derive(Debug, Clone)]
struct PipelineRow {
    id: String,
    created_at: String,
    name: String,
    config: String,
    prompt: Option<String>,
}

impl PipelineRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            created_at: row.get("created_at")?,
            name: row.get("name")?,
            config: row.get("config")?,
            prompt: row.get("prompt")?,
        })
    }

    fn into_record(self) -> Result<PipelineRecord, DatabaseError> {
        let created_at = parse_timestamp(TABLE, &self.id, &self.created_at)?;
        let config =
            ExtractionSchema::from_json(&self.config).map_err(|e| DatabaseError::CorruptColumn {
                table: TABLE,
                column: "config",
                id: self.id.clone(),
                reason: e.to_string(),
            })?;

        Ok(PipelineRecord {
            id: self.id,
            created_at,
            name: self.name,
            config,
            prompt: self.prompt,
        })
    }
}

fn query_many(
    db: &Database,
    sql: &str,
    args: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<PipelineRecord>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, PipelineRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    rows.into_iter().map(PipelineRow::into_record).collect()
}

fn query_one(
    db: &Database,
    sql: &str,
    arg: &str,
) -> Result<Option<PipelineRecord>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(sql, params![arg], PipelineRow::from_row)
            .optional()?;
        Ok(row)
    })?;
    row.map(PipelineRow::into_record).transpose()
}

/// Inserts a new pipeline row. Names are unique.
pub fn insert(db: &Database, pipeline: &PipelineRecord) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO pipelines (id, created_at, name, config, prompt)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                pipeline.id,
                format_timestamp(&pipeline.created_at),
                pipeline.name,
                pipeline.config.to_json(),
                pipeline.prompt,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<PipelineRecord>, DatabaseError> {
    query_one(db, "SELECT * FROM pipelines WHERE id = ?1", id)
}

pub fn find_by_name(db: &Database, name: &str) -> Result<Option<PipelineRecord>, DatabaseError> {
    query_one(db, "SELECT * FROM pipelines WHERE name = ?1", name)
}

/// All pipelines in creation order.
pub fn list_all(db: &Database) -> Result<Vec<PipelineRecord>, DatabaseError> {
    query_many(db, "SELECT * FROM pipelines ORDER BY rowid", &[])
}

/// Pipelines whose name contains `query`, ignoring ASCII case.
pub fn search_by_name(db: &Database, query: &str) -> Result<Vec<PipelineRecord>, DatabaseError> {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let pattern = format!("%{}%", escaped);
    query_many(
        db,
        "SELECT * FROM pipelines WHERE name LIKE ?1 ESCAPE '\\' ORDER BY rowid",
        &[&pattern as &dyn rusqlite::types::ToSql],
    )
}

/// Renames a pipeline. Returns `false` if it does not exist.
pub fn update_name(db: &Database, id: &str, name: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE pipelines SET name = ?2 WHERE id = ?1",
            params![id, name],
        )?;
        Ok(updated > 0)
    })
}

/// Replaces a pipeline's schema. Returns `false` if it does not exist.
pub fn update_config(
    db: &Database,
    id: &str,
    config: &ExtractionSchema,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE pipelines SET config = ?2 WHERE id = ?1",
            params![id, config.to_json()],
        )?;
        Ok(updated > 0)
    })
}

/// Deletes a pipeline and, through the foreign key, its results.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute("DELETE FROM pipelines WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    })
}
