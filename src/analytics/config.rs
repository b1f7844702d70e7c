//! Analysis thresholds
//!
//! Every clinical cutoff used by the statistics, pattern and insight stages
//! lives here so a deployment can override them without touching the engine.

use serde::Serialize;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("Inconsistent thresholds: {0}")]
    Inconsistent(String),
}

/// Thresholds for glucose analysis (all glucose values in mg/dL)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalysisConfig {
    /// Readings below this value are below range
    pub target_low: f64,
    /// Readings above this value are above range
    pub target_high: f64,
    /// Standard deviation above which variability is flagged as high
    pub high_variability_std_dev: f64,
    /// A post-meal reading above this value counts as a spike
    pub post_meal_spike_threshold: f64,
    /// Percent of post-meal readings that must spike to flag the pattern
    pub post_meal_spike_fraction: f64,
    /// Percent of time above range that counts as consistently high
    pub consistently_high_pct: f64,
    /// Percent of time below range that counts as consistently low
    pub consistently_low_pct: f64,
    /// Upper bound of a normal fasting average
    pub fasting_normal_max: f64,
    /// Upper bound of an elevated (prediabetic) fasting average
    pub fasting_prediabetic_max: f64,
    /// Symmetric dead-zone (mg/dL per day) inside which a trend is stable
    pub trend_stable_band: f64,
    /// Percent of time below range at or above which hypoglycemia risk is high
    pub hypo_high_pct: f64,
    /// Percent of time below range at or above which hypoglycemia risk is moderate
    pub hypo_moderate_pct: f64,
    /// Percent of time above range at or above which hyperglycemia risk is high
    pub hyper_high_pct: f64,
    /// Percent of time above range at or above which hyperglycemia risk is moderate
    pub hyper_moderate_pct: f64,
    /// Time in range at or above this is excellent, and is the goal target
    pub tir_excellent_pct: f64,
    /// Time in range at or above this is good; below it raises a concern
    pub tir_good_pct: f64,
    /// Rising slope (mg/dL per week) above which a concern is raised
    pub concern_rising_per_week: f64,
    /// Rising slope (mg/dL per week) above which reversing the trend becomes the goal
    pub goal_rising_per_week: f64,
    /// CV below this is stable
    pub cv_stable_max: f64,
    /// CV up to and including this is moderate
    pub cv_moderate_max: f64,
    /// Window used when a caller does not supply one
    pub default_lookback_days: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_low: 70.0,
            target_high: 140.0,
            high_variability_std_dev: 40.0,
            post_meal_spike_threshold: 140.0,
            post_meal_spike_fraction: 50.0,
            consistently_high_pct: 50.0,
            consistently_low_pct: 10.0,
            fasting_normal_max: 100.0,
            fasting_prediabetic_max: 125.0,
            trend_stable_band: 0.5,
            hypo_high_pct: 10.0,
            hypo_moderate_pct: 5.0,
            hyper_high_pct: 50.0,
            hyper_moderate_pct: 25.0,
            tir_excellent_pct: 70.0,
            tir_good_pct: 50.0,
            concern_rising_per_week: 5.0,
            goal_rising_per_week: 3.0,
            cv_stable_max: 36.0,
            cv_moderate_max: 50.0,
            default_lookback_days: 30,
        }
    }
}

impl AnalysisConfig {
    /// Build a config from defaults overlaid with `GIM_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (env vars in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let overrides: [(&'static str, &mut f64); 15] = [
            ("GIM_TARGET_LOW", &mut config.target_low),
            ("GIM_TARGET_HIGH", &mut config.target_high),
            ("GIM_HIGH_VARIABILITY_STD_DEV", &mut config.high_variability_std_dev),
            ("GIM_POST_MEAL_SPIKE_THRESHOLD", &mut config.post_meal_spike_threshold),
            ("GIM_FASTING_NORMAL_MAX", &mut config.fasting_normal_max),
            ("GIM_FASTING_PREDIABETIC_MAX", &mut config.fasting_prediabetic_max),
            ("GIM_TREND_STABLE_BAND", &mut config.trend_stable_band),
            ("GIM_HYPO_HIGH_PCT", &mut config.hypo_high_pct),
            ("GIM_HYPO_MODERATE_PCT", &mut config.hypo_moderate_pct),
            ("GIM_HYPER_HIGH_PCT", &mut config.hyper_high_pct),
            ("GIM_HYPER_MODERATE_PCT", &mut config.hyper_moderate_pct),
            ("GIM_TIR_EXCELLENT_PCT", &mut config.tir_excellent_pct),
            ("GIM_TIR_GOOD_PCT", &mut config.tir_good_pct),
            ("GIM_CONCERN_RISING_PER_WEEK", &mut config.concern_rising_per_week),
            ("GIM_GOAL_RISING_PER_WEEK", &mut config.goal_rising_per_week),
        ];

        for (var, slot) in overrides {
            if let Some(raw) = lookup(var) {
                *slot = parse_f64(var, &raw)?;
                tracing::info!(var, value = *slot, "Analysis threshold overridden");
            }
        }

        if let Some(raw) = lookup("GIM_LOOKBACK_DAYS") {
            config.default_lookback_days = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|d| *d > 0)
                .ok_or(ConfigError::InvalidValue {
                    var: "GIM_LOOKBACK_DAYS",
                    value: raw.clone(),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the thresholds describe a coherent banding
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_low >= self.target_high {
            return Err(ConfigError::Inconsistent(format!(
                "target_low ({}) must be below target_high ({})",
                self.target_low, self.target_high
            )));
        }
        if self.fasting_normal_max > self.fasting_prediabetic_max {
            return Err(ConfigError::Inconsistent(format!(
                "fasting_normal_max ({}) must not exceed fasting_prediabetic_max ({})",
                self.fasting_normal_max, self.fasting_prediabetic_max
            )));
        }
        if self.cv_stable_max > self.cv_moderate_max {
            return Err(ConfigError::Inconsistent(format!(
                "cv_stable_max ({}) must not exceed cv_moderate_max ({})",
                self.cv_stable_max, self.cv_moderate_max
            )));
        }
        if self.hypo_moderate_pct > self.hypo_high_pct
            || self.hyper_moderate_pct > self.hyper_high_pct
        {
            return Err(ConfigError::Inconsistent(
                "moderate risk cutoffs must not exceed high risk cutoffs".to_string(),
            ));
        }
        if self.tir_good_pct > self.tir_excellent_pct {
            return Err(ConfigError::Inconsistent(format!(
                "tir_good_pct ({}) must not exceed tir_excellent_pct ({})",
                self.tir_good_pct, self.tir_excellent_pct
            )));
        }
        if self.trend_stable_band < 0.0 {
            return Err(ConfigError::Inconsistent(
                "trend_stable_band must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_f64(var: &'static str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConfigError::InvalidValue {
            var,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.target_low, 70.0);
        assert_eq!(config.target_high, 140.0);
        assert_eq!(config.default_lookback_days, 30);
    }

    #[test]
    fn test_no_overrides_matches_default() {
        let config = AnalysisConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_overrides_applied() {
        let config = AnalysisConfig::from_lookup(lookup_from(&[
            ("GIM_TARGET_HIGH", "180"),
            ("GIM_TREND_STABLE_BAND", " 1.0 "),
            ("GIM_LOOKBACK_DAYS", "14"),
        ]))
        .unwrap();
        assert_eq!(config.target_high, 180.0);
        assert_eq!(config.trend_stable_band, 1.0);
        assert_eq!(config.default_lookback_days, 14);
    }

    #[test]
    fn test_risk_and_trend_cutoffs_overridable() {
        let config = AnalysisConfig::from_lookup(lookup_from(&[
            ("GIM_HYPO_HIGH_PCT", "4"),
            ("GIM_HYPO_MODERATE_PCT", "1"),
            ("GIM_TIR_EXCELLENT_PCT", "80"),
            ("GIM_GOAL_RISING_PER_WEEK", "10"),
        ]))
        .unwrap();
        assert_eq!(config.hypo_high_pct, 4.0);
        assert_eq!(config.hypo_moderate_pct, 1.0);
        assert_eq!(config.tir_excellent_pct, 80.0);
        assert_eq!(config.goal_rising_per_week, 10.0);

        // moderate above high
        assert!(matches!(
            AnalysisConfig::from_lookup(lookup_from(&[("GIM_HYPER_MODERATE_PCT", "60")])),
            Err(ConfigError::Inconsistent(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_lookup(lookup_from(&[("GIM_TIR_GOOD_PCT", "90")])),
            Err(ConfigError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_invalid_value_rejected() {
        let err = AnalysisConfig::from_lookup(lookup_from(&[("GIM_TARGET_LOW", "abc")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "GIM_TARGET_LOW",
                value: "abc".to_string()
            }
        );

        assert!(AnalysisConfig::from_lookup(lookup_from(&[("GIM_TARGET_LOW", "NaN")])).is_err());
        assert!(AnalysisConfig::from_lookup(lookup_from(&[("GIM_LOOKBACK_DAYS", "0")])).is_err());
    }

    #[test]
    fn test_inconsistent_bands_rejected() {
        let err = AnalysisConfig::from_lookup(lookup_from(&[("GIM_TARGET_LOW", "150")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent(_)));

        let config = AnalysisConfig {
            fasting_normal_max: 130.0,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
