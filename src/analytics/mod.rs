//! Glucose analytics
//!
//! Turns one subject's readings over a lookback window into statistics,
//! pattern flags and generated text. Pure and synchronous: no I/O, no shared
//! state, a fresh result per call.

pub mod config;
pub mod insights;
pub mod patterns;
pub mod reading;
pub mod stats;

use serde::Serialize;

pub use config::{AnalysisConfig, ConfigError};
pub use insights::{GlucoseGoal, InsightContext};
pub use patterns::{PatternClassification, RiskLevel, VariabilityLevel};
pub use reading::{Reading, ReadingType};
pub use stats::{
    BasicStats, DateRange, GlucoseAverages, ReadingTypeBreakdown, TimeInRangeResult,
    TimeOfDayBreakdown, TrendDirection, TrendResult,
};

/// Complete analysis of a reading window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub has_data: bool,
    pub reading_count: usize,
    pub lookback_days: u32,
    pub days_with_readings: usize,
    pub date_range: Option<DateRange>,
    pub averages: GlucoseAverages,
    pub basic_stats: BasicStats,
    pub time_in_range: TimeInRangeResult,
    pub coefficient_of_variation: Option<f64>,
    pub variability: Option<VariabilityLevel>,
    pub trend: TrendResult,
    pub time_of_day: TimeOfDayBreakdown,
    pub reading_types: ReadingTypeBreakdown,
    pub patterns: PatternClassification,
    pub insights: Vec<String>,
    pub concerns: Vec<String>,
    pub glucose_goals: GlucoseGoal,
}

/// Analyze a batch of readings.
///
/// `readings` must already be limited to one subject and the lookback window;
/// `lookback_days` only feeds the no-data message and the reading-count line.
/// Order of `readings` does not affect the result.
pub fn analyze(readings: &[Reading], lookback_days: u32, config: &AnalysisConfig) -> AnalysisResult {
    if readings.is_empty() {
        tracing::debug!(lookback_days, "No glucose readings in window");
        return no_data(lookback_days);
    }

    let basic_stats = stats::calculate_basic_stats(readings);
    let time_in_range = stats::calculate_time_in_range(readings, config);
    let coefficient_of_variation = stats::calculate_coefficient_of_variation(readings);
    let variability = patterns::classify_variability(coefficient_of_variation, config);
    let trend = stats::calculate_trend(readings, config);
    let time_of_day = stats::analyze_time_of_day(readings);
    let reading_types = stats::analyze_reading_type_frequency(readings);
    let averages = GlucoseAverages::from_stats(&reading_types, &basic_stats);
    let patterns = patterns::detect_patterns(readings, &basic_stats, &time_in_range, config);
    let days_with_readings = stats::days_with_readings(readings);

    let ctx = InsightContext {
        config,
        reading_count: readings.len(),
        days_with_readings,
        lookback_days,
        averages: &averages,
        basic: &basic_stats,
        time_in_range: &time_in_range,
        coefficient_of_variation,
        variability,
        trend: &trend,
        time_of_day: &time_of_day,
        reading_types: &reading_types,
        patterns: &patterns,
    };

    let insights = insights::generate_insights(&ctx);
    let concerns = insights::identify_concerns(&ctx);
    let glucose_goals = insights::determine_glucose_goals(&ctx);

    tracing::debug!(
        readings = readings.len(),
        concerns = concerns.len(),
        goal = %glucose_goals.target,
        "Glucose analysis complete"
    );

    AnalysisResult {
        has_data: true,
        reading_count: readings.len(),
        lookback_days,
        days_with_readings,
        date_range: stats::date_range(readings),
        averages,
        basic_stats,
        time_in_range,
        coefficient_of_variation,
        variability,
        trend,
        time_of_day,
        reading_types,
        patterns,
        insights,
        concerns,
        glucose_goals,
    }
}

fn no_data(lookback_days: u32) -> AnalysisResult {
    AnalysisResult {
        has_data: false,
        reading_count: 0,
        lookback_days,
        days_with_readings: 0,
        date_range: None,
        averages: GlucoseAverages::default(),
        basic_stats: BasicStats::default(),
        time_in_range: TimeInRangeResult::default(),
        coefficient_of_variation: None,
        variability: None,
        trend: TrendResult::default(),
        time_of_day: TimeOfDayBreakdown::default(),
        reading_types: ReadingTypeBreakdown::default(),
        patterns: PatternClassification::default(),
        insights: vec![format!(
            "No glucose readings recorded in the last {} days.",
            lookback_days
        )],
        concerns: Vec::new(),
        glucose_goals: insights::baseline_goal(),
    }
}

impl AnalysisResult {
    /// Compact Markdown block for embedding in an assistant prompt
    pub fn to_prompt_summary(&self) -> String {
        let mut out = format!("## Glucose Analysis (last {} days)\n\n", self.lookback_days);

        if self.has_data {
            if let Some(range) = &self.date_range {
                out.push_str(&format!(
                    "- Readings: {} from {} to {}\n",
                    self.reading_count, range.start, range.end
                ));
            }
            if let Some(overall) = self.averages.overall {
                out.push_str(&format!("- Average: {:.1} mg/dL\n", overall));
            }
            out.push_str(&format!(
                "- Time in range: {:.1}% (above {:.1}%, below {:.1}%)\n",
                self.time_in_range.time_in_range,
                self.time_in_range.time_above_range,
                self.time_in_range.time_below_range
            ));
            if let (Some(level), Some(cv)) = (self.variability, self.coefficient_of_variation) {
                out.push_str(&format!("- Variability: {} (CV {:.1}%)\n", level.as_str(), cv));
            }
            if let Some(direction) = self.trend.direction {
                out.push_str(&format!("- Trend: {}\n", direction.as_str()));
            }
            out.push_str(&format!(
                "- Risk: hypoglycemia {}, hyperglycemia {}\n",
                self.patterns.hypoglycemia_risk.as_str(),
                self.patterns.hyperglycemia_risk.as_str()
            ));
        }

        out.push_str("\n### Insights\n");
        for line in &self.insights {
            out.push_str(&format!("- {}\n", line));
        }

        if !self.concerns.is_empty() {
            out.push_str("\n### Concerns\n");
            for line in &self.concerns {
                out.push_str(&format!("- {}\n", line));
            }
        }

        out.push_str(&format!(
            "\n### Goal\n{}: {}\n",
            self.glucose_goals.target, self.glucose_goals.reasoning
        ));
        out
    }
}
