//! Natural-language insights, concerns and goals
//!
//! Each output is driven by an ordered rule table. A rule yields at most one
//! line; when its numeric inputs are missing it yields nothing, so no text
//! ever references an unknown value.

use serde::Serialize;

use super::config::AnalysisConfig;
use super::patterns::{PatternClassification, RiskLevel, VariabilityLevel};
use super::stats::{
    BasicStats, GlucoseAverages, ReadingTypeBreakdown, TimeInRangeResult, TimeOfDayBreakdown,
    TrendDirection, TrendResult,
};

/// Everything the text rules may look at
#[derive(Debug, Clone, Copy)]
pub struct InsightContext<'a> {
    pub config: &'a AnalysisConfig,
    pub reading_count: usize,
    pub days_with_readings: usize,
    pub lookback_days: u32,
    pub averages: &'a GlucoseAverages,
    pub basic: &'a BasicStats,
    pub time_in_range: &'a TimeInRangeResult,
    pub coefficient_of_variation: Option<f64>,
    pub variability: Option<VariabilityLevel>,
    pub trend: &'a TrendResult,
    pub time_of_day: &'a TimeOfDayBreakdown,
    pub reading_types: &'a ReadingTypeBreakdown,
    pub patterns: &'a PatternClassification,
}

/// A single recommended focus
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlucoseGoal {
    pub target: String,
    pub reasoning: String,
}

/// A named entry in an ordered rule table
pub struct Rule<T> {
    pub name: &'static str,
    pub evaluate: fn(&InsightContext) -> Option<T>,
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

fn band(config: &AnalysisConfig) -> String {
    format!("{}-{} mg/dL", config.target_low, config.target_high)
}

fn tir_label(tir: f64, config: &AnalysisConfig) -> &'static str {
    if tir >= config.tir_excellent_pct {
        "excellent"
    } else if tir >= config.tir_good_pct {
        "good"
    } else {
        "needs improvement"
    }
}

fn fasting_status(avg: f64, config: &AnalysisConfig) -> &'static str {
    if avg < config.target_low {
        "low"
    } else if avg <= config.fasting_normal_max {
        "normal"
    } else if avg <= config.fasting_prediabetic_max {
        "elevated"
    } else {
        "high"
    }
}

fn is_rising_faster_than(trend: &TrendResult, per_week: f64) -> Option<f64> {
    match (trend.direction, trend.slope_per_week) {
        (Some(TrendDirection::Rising), Some(w)) if w > per_week => Some(w),
        _ => None,
    }
}

// ============================================================================
// Insights
// ============================================================================

pub const INSIGHT_RULES: [Rule<String>; 13] = [
    Rule { name: "reading_count", evaluate: insight_reading_count },
    Rule { name: "overall_average", evaluate: insight_overall_average },
    Rule { name: "range", evaluate: insight_range },
    Rule { name: "time_in_range", evaluate: insight_time_in_range },
    Rule { name: "fasting_average", evaluate: insight_fasting_average },
    Rule { name: "post_meal_average", evaluate: insight_post_meal_average },
    Rule { name: "variability", evaluate: insight_variability },
    Rule { name: "trend", evaluate: insight_trend },
    Rule { name: "time_of_day", evaluate: insight_time_of_day },
    Rule { name: "most_frequent_type", evaluate: insight_most_frequent_type },
    Rule { name: "post_meal_spikes", evaluate: insight_post_meal_spikes },
    Rule { name: "hypoglycemia_risk", evaluate: insight_hypoglycemia_risk },
    Rule { name: "hyperglycemia_risk", evaluate: insight_hyperglycemia_risk },
];

pub fn generate_insights(ctx: &InsightContext) -> Vec<String> {
    INSIGHT_RULES.iter().filter_map(|rule| (rule.evaluate)(ctx)).collect()
}

fn insight_reading_count(ctx: &InsightContext) -> Option<String> {
    if ctx.reading_count == 0 {
        return None;
    }
    Some(format!(
        "{} logged on {} in the last {} days.",
        plural(ctx.reading_count, "glucose reading"),
        plural(ctx.days_with_readings, "day"),
        ctx.lookback_days
    ))
}

fn insight_overall_average(ctx: &InsightContext) -> Option<String> {
    let overall = ctx.averages.overall?;
    Some(format!("Average glucose is {:.1} mg/dL.", overall))
}

fn insight_range(ctx: &InsightContext) -> Option<String> {
    let (min, max) = (ctx.basic.min?, ctx.basic.max?);
    Some(format!("Readings ranged from {:.1} to {:.1} mg/dL.", min, max))
}

fn insight_time_in_range(ctx: &InsightContext) -> Option<String> {
    if ctx.time_in_range.total == 0 {
        return None;
    }
    let tir = ctx.time_in_range.time_in_range;
    Some(format!(
        "{:.1}% of readings were within the target range ({}), which is {}.",
        tir,
        band(ctx.config),
        tir_label(tir, ctx.config)
    ))
}

fn insight_fasting_average(ctx: &InsightContext) -> Option<String> {
    let fasting = ctx.averages.fasting?;
    Some(format!(
        "Average fasting glucose is {:.1} mg/dL ({}).",
        fasting,
        fasting_status(fasting, ctx.config)
    ))
}

fn insight_post_meal_average(ctx: &InsightContext) -> Option<String> {
    let post_meal = ctx.averages.post_meal?;
    let status = if post_meal <= ctx.config.target_high {
        "normal"
    } else {
        "elevated"
    };
    Some(format!("Average post-meal glucose is {:.1} mg/dL ({}).", post_meal, status))
}

fn insight_variability(ctx: &InsightContext) -> Option<String> {
    let level = ctx.variability?;
    let cv = ctx.coefficient_of_variation?;
    Some(format!(
        "Glucose variability is {} (coefficient of variation {:.1}%).",
        level.as_str(),
        cv
    ))
}

fn insight_trend(ctx: &InsightContext) -> Option<String> {
    let direction = ctx.trend.direction?;
    let per_week = ctx.trend.slope_per_week?;
    Some(match direction {
        TrendDirection::Rising => format!(
            "Glucose is trending upward by about {:.1} mg/dL per week.",
            per_week
        ),
        TrendDirection::Falling => format!(
            "Glucose is trending downward by about {:.1} mg/dL per week.",
            per_week.abs()
        ),
        TrendDirection::Stable => "Glucose levels have been stable over this period.".to_string(),
    })
}

fn insight_time_of_day(ctx: &InsightContext) -> Option<String> {
    let parts: Vec<String> = ctx
        .time_of_day
        .iter()
        .filter(|(_, stats)| stats.count > 0)
        .filter_map(|(period, stats)| {
            stats
                .average
                .map(|avg| format!("{} {:.1} mg/dL", period.as_str(), avg))
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(format!("Average by time of day: {}.", parts.join(", ")))
}

fn insight_most_frequent_type(ctx: &InsightContext) -> Option<String> {
    let (reading_type, stats) = ctx.reading_types.most_frequent()?;
    Some(format!(
        "Most readings were {} readings ({} of {}).",
        reading_type.display_name().to_lowercase(),
        stats.count,
        ctx.reading_count
    ))
}

fn insight_post_meal_spikes(ctx: &InsightContext) -> Option<String> {
    if !ctx.patterns.post_meal_spikes {
        return None;
    }
    Some(format!(
        "Post-meal readings frequently spike above {} mg/dL.",
        ctx.config.post_meal_spike_threshold
    ))
}

fn insight_hypoglycemia_risk(ctx: &InsightContext) -> Option<String> {
    let risk = ctx.patterns.hypoglycemia_risk;
    if risk == RiskLevel::None {
        return None;
    }
    Some(format!(
        "Hypoglycemia risk is {}: {:.1}% of readings were below {} mg/dL.",
        risk.as_str(),
        ctx.time_in_range.time_below_range,
        ctx.config.target_low
    ))
}

fn insight_hyperglycemia_risk(ctx: &InsightContext) -> Option<String> {
    let risk = ctx.patterns.hyperglycemia_risk;
    if risk == RiskLevel::None {
        return None;
    }
    Some(format!(
        "Hyperglycemia risk is {}: {:.1}% of readings were above {} mg/dL.",
        risk.as_str(),
        ctx.time_in_range.time_above_range,
        ctx.config.target_high
    ))
}

// ============================================================================
// Concerns
// ============================================================================

pub const CONCERN_RULES: [Rule<String>; 8] = [
    Rule { name: "low_time_in_range", evaluate: concern_low_time_in_range },
    Rule { name: "consistently_high", evaluate: concern_consistently_high },
    Rule { name: "post_meal_spikes", evaluate: concern_post_meal_spikes },
    Rule { name: "consistently_low", evaluate: concern_consistently_low },
    Rule { name: "hypoglycemia_risk", evaluate: concern_hypoglycemia_risk },
    Rule { name: "high_variability", evaluate: concern_high_variability },
    Rule { name: "elevated_fasting", evaluate: concern_elevated_fasting },
    Rule { name: "rising_trend", evaluate: concern_rising_trend },
];

pub fn identify_concerns(ctx: &InsightContext) -> Vec<String> {
    CONCERN_RULES.iter().filter_map(|rule| (rule.evaluate)(ctx)).collect()
}

fn concern_low_time_in_range(ctx: &InsightContext) -> Option<String> {
    let tir = ctx.time_in_range;
    if tir.total == 0 || tir.time_in_range >= ctx.config.tir_good_pct {
        return None;
    }
    Some(format!(
        "Only {:.1}% of readings are within the target range of {}.",
        tir.time_in_range,
        band(ctx.config)
    ))
}

fn concern_consistently_high(ctx: &InsightContext) -> Option<String> {
    if !ctx.patterns.consistently_high {
        return None;
    }
    let overall = ctx.averages.overall?;
    Some(format!(
        "Glucose is frequently elevated: {:.1}% of readings were above {} mg/dL with an overall average of {:.1} mg/dL.",
        ctx.time_in_range.time_above_range, ctx.config.target_high, overall
    ))
}

fn concern_post_meal_spikes(ctx: &InsightContext) -> Option<String> {
    if !ctx.patterns.post_meal_spikes {
        return None;
    }
    Some(match ctx.averages.post_meal {
        Some(avg) => format!(
            "Most post-meal readings exceed {} mg/dL (post-meal average {:.1} mg/dL).",
            ctx.config.post_meal_spike_threshold, avg
        ),
        None => format!(
            "Most post-meal readings exceed {} mg/dL.",
            ctx.config.post_meal_spike_threshold
        ),
    })
}

fn concern_consistently_low(ctx: &InsightContext) -> Option<String> {
    if !ctx.patterns.consistently_low {
        return None;
    }
    let overall = ctx.averages.overall?;
    Some(format!(
        "Glucose is frequently low: {:.1}% of readings were below {} mg/dL with an overall average of {:.1} mg/dL.",
        ctx.time_in_range.time_below_range, ctx.config.target_low, overall
    ))
}

fn concern_hypoglycemia_risk(ctx: &InsightContext) -> Option<String> {
    let below = ctx.time_in_range.time_below_range;
    match ctx.patterns.hypoglycemia_risk {
        RiskLevel::High => Some(format!(
            "High risk of hypoglycemia: {:.1}% of readings were below {} mg/dL.",
            below, ctx.config.target_low
        )),
        RiskLevel::Moderate => Some(format!(
            "Moderate risk of hypoglycemia: {:.1}% of readings were below {} mg/dL.",
            below, ctx.config.target_low
        )),
        RiskLevel::Low | RiskLevel::None => None,
    }
}

fn concern_high_variability(ctx: &InsightContext) -> Option<String> {
    if !ctx.patterns.high_variability {
        return None;
    }
    let sd = ctx.basic.std_dev?;
    Some(format!(
        "Glucose swings widely between readings (standard deviation {:.1} mg/dL).",
        sd
    ))
}

fn concern_elevated_fasting(ctx: &InsightContext) -> Option<String> {
    let fasting = ctx.averages.fasting?;
    if fasting <= ctx.config.fasting_normal_max {
        return None;
    }
    Some(format!(
        "Average fasting glucose of {:.1} mg/dL is above the normal limit of {} mg/dL.",
        fasting, ctx.config.fasting_normal_max
    ))
}

fn concern_rising_trend(ctx: &InsightContext) -> Option<String> {
    let per_week = is_rising_faster_than(ctx.trend, ctx.config.concern_rising_per_week)?;
    Some(format!(
        "Glucose has been rising by about {:.1} mg/dL per week.",
        per_week
    ))
}

// ============================================================================
// Goals
// ============================================================================

pub const GOAL_RULES: [Rule<GlucoseGoal>; 5] = [
    Rule { name: "raise_lows", evaluate: goal_raise_lows },
    Rule { name: "increase_time_in_range", evaluate: goal_increase_time_in_range },
    Rule { name: "reduce_post_meal_spikes", evaluate: goal_reduce_post_meal_spikes },
    Rule { name: "stabilize", evaluate: goal_stabilize },
    Rule { name: "reverse_trend", evaluate: goal_reverse_trend },
];

/// First matching goal wins; otherwise maintain current control
pub fn determine_glucose_goals(ctx: &InsightContext) -> GlucoseGoal {
    GOAL_RULES
        .iter()
        .find_map(|rule| (rule.evaluate)(ctx))
        .unwrap_or_else(|| goal_maintain(ctx))
}

fn goal_raise_lows(ctx: &InsightContext) -> Option<GlucoseGoal> {
    if !ctx.patterns.consistently_low {
        return None;
    }
    let overall = ctx.averages.overall?;
    Some(GlucoseGoal {
        target: format!("Maintain glucose levels above {} mg/dL", ctx.config.target_low),
        reasoning: format!(
            "{:.1}% of readings were below {} mg/dL (overall average {:.1} mg/dL). Avoiding lows takes priority over other targets.",
            ctx.time_in_range.time_below_range, ctx.config.target_low, overall
        ),
    })
}

fn goal_increase_time_in_range(ctx: &InsightContext) -> Option<GlucoseGoal> {
    let tir = ctx.time_in_range;
    if tir.total == 0 || tir.time_in_range >= ctx.config.tir_good_pct {
        return None;
    }
    Some(GlucoseGoal {
        target: format!(
            "Increase time in range ({}) to at least {}%",
            band(ctx.config),
            ctx.config.tir_excellent_pct
        ),
        reasoning: format!(
            "Only {:.1}% of readings are currently within range.",
            tir.time_in_range
        ),
    })
}

fn goal_reduce_post_meal_spikes(ctx: &InsightContext) -> Option<GlucoseGoal> {
    if !ctx.patterns.post_meal_spikes {
        return None;
    }
    let post_meal = ctx.averages.post_meal?;
    Some(GlucoseGoal {
        target: format!(
            "Keep post-meal glucose below {} mg/dL",
            ctx.config.post_meal_spike_threshold
        ),
        reasoning: format!(
            "Post-meal readings average {:.1} mg/dL and most of them exceed {} mg/dL.",
            post_meal, ctx.config.post_meal_spike_threshold
        ),
    })
}

fn goal_stabilize(ctx: &InsightContext) -> Option<GlucoseGoal> {
    if !ctx.patterns.high_variability {
        return None;
    }
    let sd = ctx.basic.std_dev?;
    Some(GlucoseGoal {
        target: "Stabilize glucose levels and reduce swings".to_string(),
        reasoning: format!(
            "A standard deviation of {:.1} mg/dL shows large swings between readings.",
            sd
        ),
    })
}

fn goal_reverse_trend(ctx: &InsightContext) -> Option<GlucoseGoal> {
    let per_week = is_rising_faster_than(ctx.trend, ctx.config.goal_rising_per_week)?;
    Some(GlucoseGoal {
        target: "Reverse the upward glucose trend".to_string(),
        reasoning: format!(
            "Glucose has been rising by about {:.1} mg/dL per week.",
            per_week
        ),
    })
}

fn goal_maintain(ctx: &InsightContext) -> GlucoseGoal {
    let reasoning = match ctx.averages.overall {
        Some(overall) => format!(
            "Average glucose is {:.1} mg/dL with {:.1}% of readings in range.",
            overall, ctx.time_in_range.time_in_range
        ),
        None => "Glucose readings show no pressing issues.".to_string(),
    };
    GlucoseGoal {
        target: "Maintain current glucose control".to_string(),
        reasoning,
    }
}

/// Goal used when there are no readings in the window
pub fn baseline_goal() -> GlucoseGoal {
    GlucoseGoal {
        target: "Establish baseline glucose monitoring".to_string(),
        reasoning: "No glucose readings are available yet. Log fasting and post-meal readings regularly to build a baseline.".to_string(),
    }
}
