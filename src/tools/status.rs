//! GIM Status Tool
//!
//! Provides runtime status information about the GIM service.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::analytics::AnalysisConfig;
use crate::build_info::BuildInfo;

/// Glucose logging and analysis instructions for AI assistants
pub const GLUCOSE_INSTRUCTIONS: &str = r#"
# GIM Glucose Tracking Instructions

This guide explains how to log and analyze blood glucose with the Glucose Insight Manager (GIM) tools.

## Overview

Every reading has:
- **subject** - Whose reading it is (defaults to "default")
- **value** - Blood glucose, stored in mg/dL
- **reading_type** - The context the reading was taken in
- **measured_at** - Local wall-clock time of the measurement

## Reading Types

| Type | Aliases | When to use |
|------|---------|-------------|
| `fasting` | fast | First reading of the day, 8+ hours without food |
| `before_meal` | pre_meal, preprandial | Right before eating |
| `post_meal` | after_meal, postprandial | 1-2 hours after eating |
| `random` | other | Anything else |

Pick the type carefully. Fasting and post-meal averages drive most of the insights.

## Units

Values default to mg/dL. Pass `unit: "mmol/L"` to have the value converted
(1 mmol/L = 18.0182 mg/dL). Other units are rejected.

## Timestamps

`measured_at` accepts:
- `YYYY-MM-DDTHH:MM:SS`
- `YYYY-MM-DD HH:MM`
- `YYYY-MM-DD` (midnight)
- RFC3339 with an offset (the wall-clock part is kept)

When omitted, the server's current local time is used. Always pass the
subject's local time, never UTC, since time-of-day patterns use the hour as given.

## Step-by-Step Workflows

### Logging a Reading

```
add_glucose_reading(
  value: 112,
  reading_type: "fasting",
  measured_at: "2026-01-14T07:05:00"
)
```

### Reviewing Readings

```
list_glucose_readings(days: 7)
list_glucose_readings(start: "2026-01-01", end: "2026-01-31")
```

### Correcting a Reading

```
update_glucose_reading(id: 42, reading_type: "post_meal", notes: "after lunch")
delete_glucose_reading(id: 42)
```

### Importing Meter Exports

```
import_glucose_csv(file_path: "/path/to/export.csv")
```

The file needs a `timestamp,value,type[,notes]` header. Values must be mg/dL.
Rows already stored (same subject, time and value) are counted as duplicates
and skipped, so re-importing the same file is safe.

### Analyzing

```
analyze_glucose(lookback_days: 30)
glucose_summary(lookback_days: 14)
```

`analyze_glucose` returns the full structured result: averages, time in range,
variability, trend, time-of-day breakdown, reading type frequency, risk levels,
insights, concerns and goals.

`glucose_summary` returns a short Markdown block suited for a conversation.

## Interpreting Results

- **Time in range** uses 70-140 mg/dL by default, inclusive at both ends
- **Coefficient of variation** under 36% is stable, 36-50% moderate, above 50% high
- **Trend** is reported per day and per week; changes within ±0.5 mg/dL/day are stable
- **Concerns** are ordered by priority; address the first one first
- **Goals** start with the most urgent; lows always come before highs

## Important Notes

- GIM provides informational summaries, not medical advice
- Recommend that the user consult a clinician about any concern it raises
- Fewer than a handful of readings make most statistics unreliable; say so
"#;

/// Runtime status of the GIM service
#[derive(Debug, Clone, Serialize)]
pub struct GimStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Database information
    pub database_path: String,
    pub database_size_bytes: Option<u64>,

    /// Active analysis thresholds
    pub analysis_config: AnalysisConfig,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
    analysis_config: AnalysisConfig,
}

impl StatusTracker {
    /// Create a new status tracker
    pub fn new(database_path: PathBuf, analysis_config: AnalysisConfig) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
            analysis_config,
        }
    }

    /// Get the current status
    pub fn get_status(&self) -> GimStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        GimStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            analysis_config: self.analysis_config,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reports_missing_database() {
        let tracker = StatusTracker::new(
            PathBuf::from("/nonexistent/gim.db"),
            AnalysisConfig::default(),
        );
        let status = tracker.get_status();
        assert_eq!(status.database_size_bytes, None);
        assert_eq!(status.process_id, std::process::id());
        assert_eq!(status.analysis_config.target_high, 140.0);
    }

    #[test]
    fn test_instructions_cover_every_tool() {
        for tool in [
            "add_glucose_reading",
            "list_glucose_readings",
            "update_glucose_reading",
            "delete_glucose_reading",
            "import_glucose_csv",
            "analyze_glucose",
            "glucose_summary",
        ] {
            assert!(GLUCOSE_INSTRUCTIONS.contains(tool), "missing {}", tool);
        }
    }
}
