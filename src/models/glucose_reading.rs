//! Glucose reading model
//!
//! Persisted glucose measurements. Values are always stored in mg/dL and
//! `measured_at` is the subject's local wall-clock time.

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, Row, ToSql};
use serde::{Deserialize, Serialize};

use crate::analytics::{Reading, ReadingType};
use crate::db::{DbError, DbResult};

/// Storage format for `measured_at`; sorts lexicographically
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Subject used when the caller does not name one
pub const DEFAULT_SUBJECT: &str = "default";

impl ToSql for ReadingType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ReadingType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        ReadingType::from_str(s).ok_or_else(|| {
            FromSqlError::Other(format!("unknown reading type '{}'", s).into())
        })
    }
}

/// Parse a stored timestamp
pub fn parse_timestamp(s: &str) -> DbResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|_| DbError::InvalidTimestamp(s.to_string()))
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// A stored glucose reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlucoseReading {
    pub id: i64,
    pub subject: String,
    pub reading_type: ReadingType,
    /// mg/dL
    pub value: f64,
    pub measured_at: NaiveDateTime,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlucoseReadingCreate {
    pub subject: String,
    pub reading_type: ReadingType,
    pub value: f64,
    pub measured_at: NaiveDateTime,
    pub notes: Option<String>,
}

/// Data for updating a reading
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlucoseReadingUpdate {
    pub reading_type: Option<ReadingType>,
    pub value: Option<f64>,
    pub measured_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
}

impl GlucoseReading {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let idx = row.as_ref().column_index("measured_at")?;
        let raw: String = row.get(idx)?;
        let measured_at = parse_timestamp(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: row.get("id")?,
            subject: row.get("subject")?,
            reading_type: row.get("reading_type")?,
            value: row.get("value")?,
            measured_at,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// The analytics view of this row
    pub fn to_reading(&self) -> Reading {
        Reading::new(self.value, self.reading_type, self.measured_at)
    }

    /// Create a new reading
    pub fn create(conn: &Connection, data: &GlucoseReadingCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO glucose_readings (subject, reading_type, value, measured_at, notes)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                data.subject,
                data.reading_type,
                data.value,
                format_timestamp(&data.measured_at),
                data.notes,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    /// Get a reading by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM glucose_readings WHERE id = ?1")?;

        match stmt.query_row([id], Self::from_row) {
            Ok(reading) => Ok(Some(reading)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Readings for one subject within `[start, end]`, newest first
    pub fn list_in_window(
        conn: &Connection,
        subject: &str,
        start: &NaiveDateTime,
        end: &NaiveDateTime,
    ) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM glucose_readings
            WHERE subject = ?1 AND measured_at >= ?2 AND measured_at <= ?3
            ORDER BY measured_at DESC
            "#,
        )?;
        let readings = stmt
            .query_map(
                params![subject, format_timestamp(start), format_timestamp(end)],
                Self::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Most recent readings for one subject
    pub fn list_recent(conn: &Connection, subject: &str, limit: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM glucose_readings WHERE subject = ?1 ORDER BY measured_at DESC LIMIT ?2",
        )?;
        let readings = stmt
            .query_map(params![subject, limit], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Whether an identical reading (same subject, time and value) is already stored
    pub fn exists(
        conn: &Connection,
        subject: &str,
        measured_at: &NaiveDateTime,
        value: f64,
    ) -> DbResult<bool> {
        let count: i64 = conn.query_row(
            r#"SELECT COUNT(*) FROM glucose_readings
               WHERE subject = ?1 AND measured_at = ?2 AND value = ?3"#,
            params![subject, format_timestamp(measured_at), value],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Update a reading
    pub fn update(conn: &Connection, id: i64, data: &GlucoseReadingUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(rt) = data.reading_type {
            updates.push(format!("reading_type = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(rt));
        }
        if let Some(value) = data.value {
            updates.push(format!("value = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(value));
        }
        if let Some(ts) = data.measured_at {
            updates.push(format!("measured_at = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(format_timestamp(&ts)));
        }
        if let Some(ref notes) = data.notes {
            updates.push(format!("notes = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(notes.clone()));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE glucose_readings SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );
        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Delete a reading
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM glucose_readings WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    pub fn format_value(&self) -> String {
        format!("{:.0} mg/dL", self.value)
    }
}
