//! Glucose MCP Tools
//!
//! Tools for logging, browsing and importing glucose readings.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;

use crate::analytics::stats::round1;
use crate::analytics::ReadingType;
use crate::db::Database;
use crate::models::{
    format_timestamp, GlucoseReading, GlucoseReadingCreate, GlucoseReadingUpdate,
};

/// mg/dL per mmol/L
pub const MMOL_TO_MG_DL: f64 = 18.0182;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_IMPORT_ERRORS: usize = 10;

/// Response for add_glucose_reading
#[derive(Debug, Serialize)]
pub struct AddGlucoseReadingResponse {
    pub id: i64,
    pub subject: String,
    pub reading_type: String,
    pub value: String,
    pub value_mg_dl: f64,
    pub measured_at: String,
    pub created_at: String,
}

/// Reading summary for listing
#[derive(Debug, Serialize)]
pub struct GlucoseReadingSummary {
    pub id: i64,
    pub reading_type: String,
    pub reading_type_display: String,
    pub value: String,
    pub measured_at: String,
    pub notes: Option<String>,
}

/// Full reading detail
#[derive(Debug, Serialize)]
pub struct GlucoseReadingDetail {
    pub id: i64,
    pub subject: String,
    pub reading_type: String,
    pub reading_type_display: String,
    pub value_mg_dl: f64,
    pub value_formatted: String,
    pub measured_at: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&GlucoseReading> for GlucoseReadingSummary {
    fn from(reading: &GlucoseReading) -> Self {
        Self {
            id: reading.id,
            reading_type: reading.reading_type.as_str().to_string(),
            reading_type_display: reading.reading_type.display_name().to_string(),
            value: reading.format_value(),
            measured_at: format_timestamp(&reading.measured_at),
            notes: reading.notes.clone(),
        }
    }
}

impl From<GlucoseReading> for GlucoseReadingDetail {
    fn from(reading: GlucoseReading) -> Self {
        let value_formatted = reading.format_value();
        Self {
            id: reading.id,
            subject: reading.subject,
            reading_type: reading.reading_type.as_str().to_string(),
            reading_type_display: reading.reading_type.display_name().to_string(),
            value_mg_dl: reading.value,
            value_formatted,
            measured_at: format_timestamp(&reading.measured_at),
            notes: reading.notes,
            created_at: reading.created_at,
            updated_at: reading.updated_at,
        }
    }
}

/// Response for list_glucose_readings
#[derive(Debug, Serialize)]
pub struct ListGlucoseReadingsResponse {
    pub subject: String,
    pub readings: Vec<GlucoseReadingSummary>,
    pub total: usize,
}

/// Response for update_glucose_reading
#[derive(Debug, Serialize)]
pub struct UpdateGlucoseReadingResponse {
    pub success: bool,
    pub reading: GlucoseReadingDetail,
}

/// Response for delete operations
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted_id: i64,
}

// ============================================================================
// Input parsing
// ============================================================================

/// Current local wall-clock time, whole seconds
pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Parse a user-supplied timestamp into local wall-clock time
///
/// RFC3339 inputs keep the wall-clock time of their own offset. A bare date
/// means midnight.
pub fn parse_measured_at(input: &str) -> Result<NaiveDateTime, String> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local().with_nanosecond(0).unwrap_or(dt.naive_local()));
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| {
            format!(
                "Invalid timestamp: '{}'. Use YYYY-MM-DDTHH:MM:SS, YYYY-MM-DD HH:MM, YYYY-MM-DD or RFC3339",
                input
            )
        })
}

/// End of a window bound; a bare date covers the whole day
fn parse_window_end(input: &str) -> Result<NaiveDateTime, String> {
    let s = input.trim();
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(d) => d
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| format!("Invalid end date: '{}'", input)),
        Err(_) => parse_measured_at(s),
    }
}

/// Start of a window reaching `days` back from `end`
pub fn days_before(end: NaiveDateTime, days: u32) -> Result<NaiveDateTime, String> {
    end.checked_sub_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| format!("Lookback of {} days is out of range", days))
}

/// Convert a value in the given unit to mg/dL
pub fn normalize_value(value: f64, unit: Option<&str>) -> Result<f64, String> {
    if !value.is_finite() || value <= 0.0 {
        return Err("Glucose value must be a positive number".to_string());
    }

    let unit = unit
        .map(|u| u.trim().to_lowercase().replace(' ', ""))
        .unwrap_or_default();

    match unit.as_str() {
        "" | "mg/dl" | "mgdl" | "mg" => Ok(value),
        "mmol/l" | "mmol" | "mmoll" => Ok(round1(value * MMOL_TO_MG_DL)),
        _ => Err(format!(
            "Unsupported unit: '{}'. Valid units: mg/dL, mmol/L",
            unit
        )),
    }
}

fn parse_reading_type(input: &str) -> Result<ReadingType, String> {
    ReadingType::from_str(input).ok_or_else(|| {
        format!(
            "Invalid reading type: '{}'. Valid types: fasting, before_meal (pre_meal), post_meal (after_meal), random",
            input
        )
    })
}

// ============================================================================
// Reading Tool Functions
// ============================================================================

/// Add a new glucose reading
pub fn add_glucose_reading(
    db: &Database,
    subject: &str,
    value: f64,
    unit: Option<&str>,
    reading_type: &str,
    measured_at: Option<&str>,
    notes: Option<&str>,
) -> Result<AddGlucoseReadingResponse, String> {
    let rt = parse_reading_type(reading_type)?;
    let value_mg_dl = normalize_value(value, unit)?;
    let measured_at = match measured_at {
        Some(ts) => parse_measured_at(ts)?,
        None => local_now(),
    };

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let data = GlucoseReadingCreate {
        subject: subject.to_string(),
        reading_type: rt,
        value: value_mg_dl,
        measured_at,
        notes: notes.map(String::from),
    };

    let reading = GlucoseReading::create(&conn, &data)
        .map_err(|e| format!("Failed to create glucose reading: {}", e))?;

    tracing::info!(id = reading.id, subject, value = reading.value, "Added glucose reading");

    Ok(AddGlucoseReadingResponse {
        id: reading.id,
        subject: reading.subject.clone(),
        reading_type: reading.reading_type.as_str().to_string(),
        value: reading.format_value(),
        value_mg_dl: reading.value,
        measured_at: format_timestamp(&reading.measured_at),
        created_at: reading.created_at,
    })
}

/// Get a reading by ID
pub fn get_glucose_reading(db: &Database, id: i64) -> Result<Option<GlucoseReadingDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let reading = GlucoseReading::get_by_id(&conn, id)
        .map_err(|e| format!("Failed to get glucose reading: {}", e))?;

    Ok(reading.map(GlucoseReadingDetail::from))
}

/// List readings for a subject
///
/// An explicit start/end window wins over `days`. With neither, the most
/// recent readings are returned.
pub fn list_glucose_readings(
    db: &Database,
    subject: &str,
    days: Option<u32>,
    start: Option<&str>,
    end: Option<&str>,
    limit: Option<i64>,
) -> Result<ListGlucoseReadingsResponse, String> {
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).max(1);
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let window = match (start, end, days) {
        (None, None, None) => None,
        (None, None, Some(days)) => {
            let now = local_now();
            Some((days_before(now, days)?, now))
        }
        (start, end, _) => {
            let end = match end {
                Some(e) => parse_window_end(e)?,
                None => local_now(),
            };
            let start = match start {
                Some(s) => parse_measured_at(s)?,
                None => days_before(end, 30)?,
            };
            if start > end {
                return Err("Start of window must not be after its end".to_string());
            }
            Some((start, end))
        }
    };

    let readings = match window {
        Some((start, end)) => GlucoseReading::list_in_window(&conn, subject, &start, &end),
        None => GlucoseReading::list_recent(&conn, subject, limit),
    }
    .map_err(|e| format!("Failed to list glucose readings: {}", e))?;

    let summaries: Vec<GlucoseReadingSummary> = readings
        .iter()
        .take(limit as usize)
        .map(GlucoseReadingSummary::from)
        .collect();
    let total = summaries.len();

    Ok(ListGlucoseReadingsResponse {
        subject: subject.to_string(),
        readings: summaries,
        total,
    })
}

/// Update a glucose reading
pub fn update_glucose_reading(
    db: &Database,
    id: i64,
    value: Option<f64>,
    unit: Option<&str>,
    reading_type: Option<&str>,
    measured_at: Option<&str>,
    notes: Option<&str>,
) -> Result<UpdateGlucoseReadingResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let existing = GlucoseReading::get_by_id(&conn, id)
        .map_err(|e| format!("Database error: {}", e))?;

    if existing.is_none() {
        return Err(format!("Glucose reading not found with id: {}", id));
    }

    let data = GlucoseReadingUpdate {
        reading_type: reading_type.map(parse_reading_type).transpose()?,
        value: value.map(|v| normalize_value(v, unit)).transpose()?,
        measured_at: measured_at.map(parse_measured_at).transpose()?,
        notes: notes.map(String::from),
    };

    let updated = GlucoseReading::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update glucose reading: {}", e))?
        .ok_or_else(|| format!("Glucose reading not found with id: {}", id))?;

    Ok(UpdateGlucoseReadingResponse {
        success: true,
        reading: GlucoseReadingDetail::from(updated),
    })
}

/// Delete a glucose reading
pub fn delete_glucose_reading(db: &Database, id: i64) -> Result<DeleteResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let deleted = GlucoseReading::delete(&conn, id)
        .map_err(|e| format!("Failed to delete glucose reading: {}", e))?;

    if !deleted {
        return Err(format!("Glucose reading not found with id: {}", id));
    }

    Ok(DeleteResponse {
        success: true,
        deleted_id: id,
    })
}

// ============================================================================
// CSV Import
// ============================================================================

/// Response for import_glucose_csv
#[derive(Debug, Serialize)]
pub struct ImportGlucoseCsvResponse {
    pub success: bool,
    pub file_path: String,
    pub subject: String,
    pub total_rows: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub date_range: String,
}

struct CsvRow {
    measured_at: NaiveDateTime,
    value: f64,
    reading_type: ReadingType,
    notes: Option<String>,
}

/// Parse one `timestamp,value,type[,notes]` line; notes may contain commas
fn parse_csv_row(line: &str) -> Result<CsvRow, String> {
    let fields: Vec<&str> = line.splitn(4, ',').map(str::trim).collect();
    if fields.len() < 3 {
        return Err("Not enough fields".to_string());
    }

    let measured_at = parse_measured_at(fields[0])?;
    let value: f64 = fields[1]
        .parse()
        .map_err(|_| format!("Invalid value '{}'", fields[1]))?;
    let value = normalize_value(value, None)?;
    let reading_type = parse_reading_type(fields[2])?;
    let notes = fields
        .get(3)
        .filter(|n| !n.is_empty())
        .map(|n| n.to_string());

    Ok(CsvRow {
        measured_at,
        value,
        reading_type,
        notes,
    })
}

/// Import glucose readings from a CSV file (values in mg/dL)
pub fn import_glucose_csv(
    db: &Database,
    subject: &str,
    file_path: &str,
) -> Result<ImportGlucoseCsvResponse, String> {
    let contents = std::fs::read_to_string(file_path)
        .map_err(|e| format!("Failed to open file '{}': {}", file_path, e))?;
    // Meter exports often start with a UTF-8 byte-order mark
    let body = contents.strip_prefix('\u{feff}').unwrap_or(&contents);

    let mut errors = Vec::new();
    let mut skipped = 0;
    let mut duplicates = 0;
    let mut imported = 0;
    let mut first: Option<NaiveDateTime> = None;
    let mut last: Option<NaiveDateTime> = None;

    db.with_transaction(|tx| {
        for (line_num, line) in body.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if line_num == 0 && line.trim_start().to_lowercase().starts_with("timestamp") {
                continue;
            }

            let row = match parse_csv_row(line) {
                Ok(r) => r,
                Err(e) => {
                    errors.push(format!("Row {}: {}", line_num + 1, e));
                    skipped += 1;
                    continue;
                }
            };

            if GlucoseReading::exists(tx, subject, &row.measured_at, row.value)? {
                duplicates += 1;
                continue;
            }

            GlucoseReading::create(
                tx,
                &GlucoseReadingCreate {
                    subject: subject.to_string(),
                    reading_type: row.reading_type,
                    value: row.value,
                    measured_at: row.measured_at,
                    notes: row.notes,
                },
            )?;
            imported += 1;

            first = Some(first.map_or(row.measured_at, |f| f.min(row.measured_at)));
            last = Some(last.map_or(row.measured_at, |l| l.max(row.measured_at)));
        }
        Ok(())
    })
    .map_err(|e| format!("Failed to import glucose readings: {}", e))?;

    tracing::info!(
        subject,
        imported,
        duplicates,
        skipped,
        "Imported glucose CSV"
    );

    let date_range = match (first, last) {
        (Some(start), Some(end)) => format!(
            "{} to {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ),
        _ => "N/A".to_string(),
    };

    errors.truncate(MAX_IMPORT_ERRORS);

    Ok(ImportGlucoseCsvResponse {
        success: errors.is_empty(),
        file_path: file_path.to_string(),
        subject: subject.to_string(),
        total_rows: imported + duplicates + skipped,
        imported,
        duplicates,
        skipped,
        errors,
        date_range,
    })
}
