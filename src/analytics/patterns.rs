//! Pattern and risk classification
//!
//! Threshold rules over the statistics. Nothing here looks at time; the
//! only raw-reading input is the post-meal spike ratio.

use serde::Serialize;

use super::config::AnalysisConfig;
use super::reading::{Reading, ReadingType};
use super::stats::{BasicStats, TimeInRangeResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
        }
    }

    /// Tiered lookup, checked from high to low
    fn from_percentage(pct: f64, high_at: f64, moderate_at: f64) -> Self {
        if pct >= high_at {
            RiskLevel::High
        } else if pct >= moderate_at {
            RiskLevel::Moderate
        } else if pct > 0.0 {
            RiskLevel::Low
        } else {
            RiskLevel::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariabilityLevel {
    Stable,
    Moderate,
    High,
}

impl VariabilityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariabilityLevel::Stable => "stable",
            VariabilityLevel::Moderate => "moderate",
            VariabilityLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PatternClassification {
    pub consistently_high: bool,
    pub consistently_low: bool,
    pub high_variability: bool,
    pub post_meal_spikes: bool,
    pub hypoglycemia_risk: RiskLevel,
    pub hyperglycemia_risk: RiskLevel,
}

pub fn detect_patterns(
    readings: &[Reading],
    basic: &BasicStats,
    tir: &TimeInRangeResult,
    config: &AnalysisConfig,
) -> PatternClassification {
    PatternClassification {
        consistently_high: tir.time_above_range > config.consistently_high_pct,
        consistently_low: tir.time_below_range > config.consistently_low_pct,
        high_variability: basic
            .std_dev
            .is_some_and(|sd| sd > config.high_variability_std_dev),
        post_meal_spikes: has_post_meal_spikes(readings, config),
        hypoglycemia_risk: RiskLevel::from_percentage(
            tir.time_below_range,
            config.hypo_high_pct,
            config.hypo_moderate_pct,
        ),
        hyperglycemia_risk: RiskLevel::from_percentage(
            tir.time_above_range,
            config.hyper_high_pct,
            config.hyper_moderate_pct,
        ),
    }
}

fn has_post_meal_spikes(readings: &[Reading], config: &AnalysisConfig) -> bool {
    let post_meal: Vec<f64> = readings
        .iter()
        .filter(|r| r.reading_type == ReadingType::PostMeal)
        .map(|r| r.value)
        .collect();
    if post_meal.is_empty() {
        return false;
    }

    let spikes = post_meal
        .iter()
        .filter(|v| **v > config.post_meal_spike_threshold)
        .count();
    spikes as f64 / post_meal.len() as f64 * 100.0 > config.post_meal_spike_fraction
}

/// Band a coefficient of variation: below 36 stable, 36-50 moderate, above 50 high
pub fn classify_variability(cv: Option<f64>, config: &AnalysisConfig) -> Option<VariabilityLevel> {
    let cv = cv?;
    Some(if cv < config.cv_stable_max {
        VariabilityLevel::Stable
    } else if cv <= config.cv_moderate_max {
        VariabilityLevel::Moderate
    } else {
        VariabilityLevel::High
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::stats::{calculate_basic_stats, calculate_time_in_range};
    use chrono::{Duration, NaiveDate};

    fn readings_of(rt: ReadingType, values: &[f64]) -> Vec<Reading> {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Reading::new(*v, rt, start + Duration::hours(i as i64 * 5)))
            .collect()
    }

    fn classify(readings: &[Reading]) -> PatternClassification {
        let config = AnalysisConfig::default();
        let basic = calculate_basic_stats(readings);
        let tir = calculate_time_in_range(readings, &config);
        detect_patterns(readings, &basic, &tir, &config)
    }

    #[test]
    fn test_all_high_post_meal() {
        let patterns = classify(&readings_of(ReadingType::PostMeal, &[160.0; 10]));
        assert!(patterns.consistently_high);
        assert!(patterns.post_meal_spikes);
        assert!(!patterns.consistently_low);
        assert!(!patterns.high_variability);
        assert_eq!(patterns.hyperglycemia_risk, RiskLevel::High);
        assert_eq!(patterns.hypoglycemia_risk, RiskLevel::None);
    }

    #[test]
    fn test_all_low_fasting() {
        let patterns = classify(&readings_of(ReadingType::Fasting, &[50.0; 10]));
        assert!(patterns.consistently_low);
        assert!(!patterns.post_meal_spikes);
        assert_eq!(patterns.hypoglycemia_risk, RiskLevel::High);
        assert_eq!(patterns.hyperglycemia_risk, RiskLevel::None);
    }

    #[test]
    fn test_no_post_meal_readings_means_no_spikes() {
        let patterns = classify(&readings_of(ReadingType::Random, &[250.0, 260.0]));
        assert!(!patterns.post_meal_spikes);
        assert!(patterns.consistently_high);
    }

    #[test]
    fn test_post_meal_spike_needs_majority() {
        // Exactly half spiking is not more than 50%
        let patterns = classify(&readings_of(ReadingType::PostMeal, &[150.0, 130.0]));
        assert!(!patterns.post_meal_spikes);
        let patterns = classify(&readings_of(ReadingType::PostMeal, &[150.0, 160.0, 130.0]));
        assert!(patterns.post_meal_spikes);
    }

    #[test]
    fn test_risk_tiers() {
        assert_eq!(RiskLevel::from_percentage(10.0, 10.0, 5.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_percentage(5.0, 10.0, 5.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_percentage(0.1, 10.0, 5.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_percentage(0.0, 10.0, 5.0), RiskLevel::None);
        assert_eq!(RiskLevel::from_percentage(25.0, 50.0, 25.0), RiskLevel::Moderate);
    }

    #[test]
    fn test_risk_tiers_follow_config() {
        // 1 of 20 below range = 5%
        let mut values = vec![100.0; 19];
        values.push(60.0);
        let readings = readings_of(ReadingType::Random, &values);
        let basic = calculate_basic_stats(&readings);

        let config = AnalysisConfig::default();
        let tir = calculate_time_in_range(&readings, &config);
        let patterns = detect_patterns(&readings, &basic, &tir, &config);
        assert_eq!(patterns.hypoglycemia_risk, RiskLevel::Moderate);

        let cautious = AnalysisConfig {
            hypo_high_pct: 5.0,
            hypo_moderate_pct: 2.0,
            ..config
        };
        let patterns = detect_patterns(&readings, &basic, &tir, &cautious);
        assert_eq!(patterns.hypoglycemia_risk, RiskLevel::High);
    }

    #[test]
    fn test_low_tier_boundary_differs_from_consistently_low() {
        // 10% below range: high hypo risk but not "consistently low" (needs > 10%)
        let mut values = vec![100.0; 9];
        values.push(60.0);
        let patterns = classify(&readings_of(ReadingType::Random, &values));
        assert_eq!(patterns.hypoglycemia_risk, RiskLevel::High);
        assert!(!patterns.consistently_low);
    }

    #[test]
    fn test_high_variability() {
        let patterns = classify(&readings_of(ReadingType::Random, &[50.0, 250.0]));
        assert!(patterns.high_variability);
        let patterns = classify(&readings_of(ReadingType::Random, &[100.0, 120.0]));
        assert!(!patterns.high_variability);
        assert!(!classify(&[]).high_variability);
    }

    #[test]
    fn test_classify_variability() {
        let config = AnalysisConfig::default();
        assert_eq!(classify_variability(None, &config), None);
        assert_eq!(classify_variability(Some(35.9), &config), Some(VariabilityLevel::Stable));
        assert_eq!(classify_variability(Some(36.0), &config), Some(VariabilityLevel::Moderate));
        assert_eq!(classify_variability(Some(50.0), &config), Some(VariabilityLevel::Moderate));
        assert_eq!(classify_variability(Some(50.1), &config), Some(VariabilityLevel::High));
    }
}
