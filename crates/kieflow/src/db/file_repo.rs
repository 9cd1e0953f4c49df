//! File repository: CRUD operations for the `files` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, parse_json_column, parse_timestamp, Database, DatabaseError};
use crate::model::{FileRecord, FileStatus};
use crate::ocr::OcrDocument;

const TABLE: &str = "files";

/// A raw file row from the database.
#[derive(Debug, Clone)]
struct FileRow {
    id: String,
    name: String,
    created_at: String,
    ocr_json: Option<String>,
    ocr_text: Option<String>,
    storage_id: String,
    status: String,
}

impl FileRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            created_at: row.get("created_at")?,
            ocr_json: row.get("ocr_json")?,
            ocr_text: row.get("ocr_text")?,
            storage_id: row.get("storage_id")?,
            status: row.get("status")?,
        })
    }

    fn into_record(self) -> Result<FileRecord, DatabaseError> {
        let created_at = parse_timestamp(TABLE, &self.id, &self.created_at)?;
        let ocr_json: Option<OcrDocument> =
            parse_json_column(TABLE, "ocr_json", &self.id, self.ocr_json.as_deref())?;
        let status = self
            .status
            .parse::<FileStatus>()
            .map_err(|reason| DatabaseError::CorruptColumn {
                table: TABLE,
                column: "status",
                id: self.id.clone(),
                reason,
            })?;

        Ok(FileRecord {
            id: self.id,
            name: self.name,
            created_at,
            ocr_json,
            ocr_text: self.ocr_text,
            storage_id: self.storage_id,
            status,
        })
    }
}

fn encode_ocr(id: &str, doc: Option<&OcrDocument>) -> Result<Option<String>, DatabaseError> {
    doc.map(|d| {
        d.to_json().map_err(|e| DatabaseError::CorruptColumn {
            table: TABLE,
            column: "ocr_json",
            id: id.to_string(),
            reason: e.to_string(),
        })
    })
    .transpose()
}

fn collect(rows: Vec<FileRow>) -> Result<Vec<FileRecord>, DatabaseError> {
    rows.into_iter().map(FileRow::into_record).collect()
}

/// Inserts a new file row.
pub fn insert(db: &Database, file: &FileRecord) -> Result<(), DatabaseError> {
    let ocr_json = encode_ocr(&file.id, file.ocr_json.as_ref())?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO files (id, name, created_at, ocr_json, ocr_text, storage_id, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                file.id,
                file.name,
                format_timestamp(&file.created_at),
                ocr_json,
                file.ocr_text,
                file.storage_id,
                file.status.as_str(),
            ],
        )?;
        Ok(())
    })
}

/// Finds a file by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM files WHERE id = ?1",
                params![id],
                FileRow::from_row,
            )
            .optional()?;
        Ok(row)
    })?;
    row.map(FileRow::into_record).transpose()
}

/// Finds a file by its storage path (`bucket/filename`).
pub fn find_by_name(db: &Database, name: &str) -> Result<Option<FileRecord>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM files WHERE name = ?1",
                params![name],
                FileRow::from_row,
            )
            .optional()?;
        Ok(row)
    })?;
    row.map(FileRow::into_record).transpose()
}

/// All files in upload order.
pub fn list_all(db: &Database) -> Result<Vec<FileRecord>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM files ORDER BY rowid")?;
        let rows = stmt
            .query_map([], FileRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    collect(rows)
}

/// Stores OCR output for a file. Returns `false` if the file does not exist.
pub fn update_ocr(
    db: &Database,
    id: &str,
    ocr_json: &OcrDocument,
    ocr_text: &str,
) -> Result<bool, DatabaseError> {
    let encoded = encode_ocr(id, Some(ocr_json))?;
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE files SET ocr_json = ?2, ocr_text = ?3 WHERE id = ?1",
            params![id, encoded, ocr_text],
        )?;
        Ok(updated > 0)
    })
}

pub fn update_status(db: &Database, id: &str, status: FileStatus) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE files SET status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        Ok(())
    })
}

/// Deletes a file row and, through the foreign key, its results.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute("DELETE FROM files WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    })
}
