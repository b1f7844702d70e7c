//! Analysis MCP Tools
//!
//! Loads a subject's lookback window from the store and runs it through the
//! analytics pipeline.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::analytics::{self, AnalysisConfig, AnalysisResult, Reading};
use crate::db::Database;
use crate::models::{format_timestamp, GlucoseReading};
use crate::tools::glucose::{days_before, local_now, parse_measured_at};

/// Response for analyze_glucose
#[derive(Debug, Serialize)]
pub struct AnalyzeGlucoseResponse {
    pub subject: String,
    pub window_start: String,
    pub window_end: String,
    #[serde(flatten)]
    pub analysis: AnalysisResult,
}

/// Response for glucose_summary
#[derive(Debug, Serialize)]
pub struct GlucoseSummaryResponse {
    pub subject: String,
    pub reading_count: usize,
    pub summary: String,
}

struct Window {
    start: NaiveDateTime,
    end: NaiveDateTime,
    lookback_days: u32,
}

fn resolve_window(
    config: &AnalysisConfig,
    lookback_days: Option<u32>,
    now: Option<&str>,
) -> Result<Window, String> {
    let lookback_days = lookback_days.unwrap_or(config.default_lookback_days);
    if lookback_days == 0 {
        return Err("lookback_days must be at least 1".to_string());
    }

    let end = match now {
        Some(ts) => parse_measured_at(ts)?,
        None => local_now(),
    };
    let start = days_before(end, lookback_days)?;

    Ok(Window {
        start,
        end,
        lookback_days,
    })
}

fn load_readings(db: &Database, subject: &str, window: &Window) -> Result<Vec<Reading>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let rows = GlucoseReading::list_in_window(&conn, subject, &window.start, &window.end)
        .map_err(|e| format!("Failed to load glucose readings: {}", e))?;

    Ok(rows.iter().map(GlucoseReading::to_reading).collect())
}

/// Run the full analysis over the last `lookback_days` days ending at `now`
pub fn analyze_glucose(
    db: &Database,
    config: &AnalysisConfig,
    subject: &str,
    lookback_days: Option<u32>,
    now: Option<&str>,
) -> Result<AnalyzeGlucoseResponse, String> {
    let window = resolve_window(config, lookback_days, now)?;
    let readings = load_readings(db, subject, &window)?;

    tracing::info!(
        subject,
        lookback_days = window.lookback_days,
        readings = readings.len(),
        "Analyzing glucose window"
    );

    let analysis = analytics::analyze(&readings, window.lookback_days, config);

    Ok(AnalyzeGlucoseResponse {
        subject: subject.to_string(),
        window_start: format_timestamp(&window.start),
        window_end: format_timestamp(&window.end),
        analysis,
    })
}

/// Prompt-ready Markdown summary of the lookback window
pub fn glucose_summary(
    db: &Database,
    config: &AnalysisConfig,
    subject: &str,
    lookback_days: Option<u32>,
) -> Result<GlucoseSummaryResponse, String> {
    let response = analyze_glucose(db, config, subject, lookback_days, None)?;

    Ok(GlucoseSummaryResponse {
        subject: response.subject,
        reading_count: response.analysis.reading_count,
        summary: response.analysis.to_prompt_summary(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::db::test_database;
    use crate::tools::glucose::add_glucose_reading;

    fn seed(db: &Database, subject: &str, entries: &[(&str, f64, &str)]) {
        for (ts, value, rt) in entries {
            add_glucose_reading(db, subject, *value, None, rt, Some(ts), None).unwrap();
        }
    }

    #[test]
    fn test_analyze_uses_window_and_subject() {
        let db = test_database("analysis-window");
        let config = AnalysisConfig::default();
        seed(
            &db,
            "dana",
            &[
                ("2026-03-01T07:00:00", 95.0, "fasting"),
                ("2026-03-01T13:00:00", 135.0, "post_meal"),
                ("2026-03-02T07:00:00", 99.0, "fasting"),
                ("2026-01-01T07:00:00", 300.0, "random"),
            ],
        );
        seed(&db, "eli", &[("2026-03-01T08:00:00", 250.0, "random")]);

        let result =
            analyze_glucose(&db, &config, "dana", Some(7), Some("2026-03-03T00:00:00")).unwrap();
        assert!(result.analysis.has_data);
        assert_eq!(result.analysis.reading_count, 3);
        assert_eq!(result.analysis.basic_stats.max, Some(135.0));
        assert_eq!(result.window_start, "2026-02-24T00:00:00");
        assert_eq!(result.window_end, "2026-03-03T00:00:00");
    }

    #[test]
    fn test_analyze_empty_window() {
        let db = test_database("analysis-empty");
        let config = AnalysisConfig::default();

        let result =
            analyze_glucose(&db, &config, "nobody", None, Some("2026-03-03T00:00:00")).unwrap();
        assert!(!result.analysis.has_data);
        assert_eq!(result.analysis.lookback_days, 30);
        assert_eq!(
            result.analysis.insights,
            vec!["No glucose readings recorded in the last 30 days.".to_string()]
        );
    }

    #[test]
    fn test_analyze_rejects_zero_lookback() {
        let db = test_database("analysis-zero");
        let config = AnalysisConfig::default();
        assert!(analyze_glucose(&db, &config, "x", Some(0), None).is_err());
    }

    #[test]
    fn test_analyze_rejects_lookback_past_calendar_start() {
        let db = test_database("analysis-huge");
        let config = AnalysisConfig::default();
        let err = analyze_glucose(
            &db,
            &config,
            "x",
            Some(200_000_000),
            Some("2026-03-03T00:00:00"),
        )
        .unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn test_response_flattens_analysis() {
        let db = test_database("analysis-json");
        let config = AnalysisConfig::default();
        seed(&db, "fay", &[("2026-03-01T07:00:00", 101.0, "fasting")]);

        let result =
            analyze_glucose(&db, &config, "fay", Some(3), Some("2026-03-02T07:00:00")).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["subject"], "fay");
        assert_eq!(json["reading_count"], 1);
        assert!(json["insights"].is_array());
    }

    #[test]
    fn test_summary_for_recent_readings() {
        let db = test_database("analysis-summary");
        let config = AnalysisConfig::default();
        let now = local_now();
        let earlier = format_timestamp(&(now - Duration::hours(2)));
        seed(&db, "gus", &[(earlier.as_str(), 120.0, "random")]);

        let summary = glucose_summary(&db, &config, "gus", Some(7)).unwrap();
        assert_eq!(summary.reading_count, 1);
        assert!(summary.summary.starts_with("## Glucose Analysis (last 7 days)"));
    }
}
