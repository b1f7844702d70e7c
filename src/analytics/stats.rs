//! Glucose statistics
//!
//! Pure numeric summaries over a batch of readings. Every function is total:
//! empty or degenerate input produces zero or `None` fields, never a panic.

use std::collections::HashSet;

use chrono::{NaiveDate, Timelike};
use serde::Serialize;

use super::config::AnalysisConfig;
use super::reading::{Reading, ReadingType};

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(count as f64 / total as f64 * 100.0)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation (divides by N)
fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn values_of(readings: &[Reading]) -> Vec<f64> {
    readings.iter().map(|r| r.value).collect()
}

// ============================================================================
// Basic Statistics
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BasicStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
}

pub fn calculate_basic_stats(readings: &[Reading]) -> BasicStats {
    let values = values_of(readings);
    let Some(avg) = mean(&values) else {
        return BasicStats::default();
    };

    BasicStats {
        min: Some(round1(values.iter().cloned().fold(f64::INFINITY, f64::min))),
        max: Some(round1(values.iter().cloned().fold(f64::NEG_INFINITY, f64::max))),
        mean: Some(round1(avg)),
        std_dev: Some(round1(population_std_dev(&values, avg))),
    }
}

// ============================================================================
// Time In Range
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimeInRangeResult {
    pub total: usize,
    pub in_range_count: usize,
    pub above_range_count: usize,
    pub below_range_count: usize,
    /// Percent of readings within the target band
    pub time_in_range: f64,
    pub time_above_range: f64,
    pub time_below_range: f64,
}

pub fn calculate_time_in_range(readings: &[Reading], config: &AnalysisConfig) -> TimeInRangeResult {
    let total = readings.len();
    let below_range_count = readings.iter().filter(|r| r.value < config.target_low).count();
    let above_range_count = readings.iter().filter(|r| r.value > config.target_high).count();
    let in_range_count = total - below_range_count - above_range_count;

    TimeInRangeResult {
        total,
        in_range_count,
        above_range_count,
        below_range_count,
        time_in_range: percentage(in_range_count, total),
        time_above_range: percentage(above_range_count, total),
        time_below_range: percentage(below_range_count, total),
    }
}

// ============================================================================
// Variability
// ============================================================================

/// Coefficient of variation as a percentage; `None` below two readings or at zero mean
pub fn calculate_coefficient_of_variation(readings: &[Reading]) -> Option<f64> {
    if readings.len() < 2 {
        return None;
    }
    let values = values_of(readings);
    let avg = mean(&values)?;
    if avg == 0.0 {
        return None;
    }
    Some(round1(population_std_dev(&values, avg) / avg * 100.0))
}

// ============================================================================
// Trend
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Rising => "rising",
            TrendDirection::Falling => "falling",
            TrendDirection::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrendResult {
    pub slope_per_day: Option<f64>,
    pub slope_per_week: Option<f64>,
    pub direction: Option<TrendDirection>,
    pub first_value: Option<f64>,
    pub last_value: Option<f64>,
}

/// Least-squares trend of value against days since the first reading.
///
/// Input order does not matter; readings are sorted chronologically here.
/// Fewer than two distinct calendar days yields an all-`None` result.
pub fn calculate_trend(readings: &[Reading], config: &AnalysisConfig) -> TrendResult {
    if days_with_readings(readings) < 2 {
        return TrendResult::default();
    }

    let mut sorted: Vec<&Reading> = readings.iter().collect();
    // Same-time readings still need a fixed order for first/last
    sorted.sort_by(|a, b| {
        a.measured_at
            .cmp(&b.measured_at)
            .then_with(|| a.value.total_cmp(&b.value))
            .then_with(|| a.reading_type.cmp(&b.reading_type))
    });

    let (first, last) = match (sorted.first(), sorted.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return TrendResult::default(),
    };

    let points: Vec<(f64, f64)> = sorted
        .iter()
        .map(|r| {
            let days = (r.measured_at - first.measured_at).num_seconds() as f64 / 86_400.0;
            (days, r.value)
        })
        .collect();

    let n = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let numerator: f64 = points.iter().map(|(x, y)| (x - x_mean) * (y - y_mean)).sum();
    let denominator: f64 = points.iter().map(|(x, _)| (x - x_mean).powi(2)).sum();
    if denominator == 0.0 {
        return TrendResult::default();
    }

    let slope = numerator / denominator;
    let direction = if slope > config.trend_stable_band {
        TrendDirection::Rising
    } else if slope < -config.trend_stable_band {
        TrendDirection::Falling
    } else {
        TrendDirection::Stable
    };

    TrendResult {
        slope_per_day: Some(round1(slope)),
        slope_per_week: Some(round1(slope * 7.0)),
        direction: Some(direction),
        first_value: Some(round1(first.value)),
        last_value: Some(round1(last.value)),
    }
}

// ============================================================================
// Time Of Day
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [
        TimeOfDay::Morning,
        TimeOfDay::Afternoon,
        TimeOfDay::Evening,
        TimeOfDay::Night,
    ];

    /// Morning 05-11, afternoon 12-16, evening 17-20, night 21-04
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeriodStats {
    pub count: usize,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimeOfDayBreakdown {
    pub morning: PeriodStats,
    pub afternoon: PeriodStats,
    pub evening: PeriodStats,
    pub night: PeriodStats,
}

impl TimeOfDayBreakdown {
    pub fn get(&self, period: TimeOfDay) -> &PeriodStats {
        match period {
            TimeOfDay::Morning => &self.morning,
            TimeOfDay::Afternoon => &self.afternoon,
            TimeOfDay::Evening => &self.evening,
            TimeOfDay::Night => &self.night,
        }
    }

    fn get_mut(&mut self, period: TimeOfDay) -> &mut PeriodStats {
        match period {
            TimeOfDay::Morning => &mut self.morning,
            TimeOfDay::Afternoon => &mut self.afternoon,
            TimeOfDay::Evening => &mut self.evening,
            TimeOfDay::Night => &mut self.night,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TimeOfDay, &PeriodStats)> + '_ {
        TimeOfDay::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

pub fn analyze_time_of_day(readings: &[Reading]) -> TimeOfDayBreakdown {
    let mut breakdown = TimeOfDayBreakdown::default();

    for period in TimeOfDay::ALL {
        let values: Vec<f64> = readings
            .iter()
            .filter(|r| TimeOfDay::from_hour(r.measured_at.hour()) == period)
            .map(|r| r.value)
            .collect();

        let slot = breakdown.get_mut(period);
        slot.count = values.len();
        slot.average = mean(&values).map(round1);
    }

    breakdown
}

// ============================================================================
// Reading Type Frequency
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TypeStats {
    pub count: usize,
    pub percentage: f64,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReadingTypeBreakdown {
    pub fasting: TypeStats,
    pub before_meal: TypeStats,
    pub post_meal: TypeStats,
    pub random: TypeStats,
}

impl ReadingTypeBreakdown {
    pub fn get(&self, reading_type: ReadingType) -> &TypeStats {
        match reading_type {
            ReadingType::Fasting => &self.fasting,
            ReadingType::BeforeMeal => &self.before_meal,
            ReadingType::PostMeal => &self.post_meal,
            ReadingType::Random => &self.random,
        }
    }

    fn get_mut(&mut self, reading_type: ReadingType) -> &mut TypeStats {
        match reading_type {
            ReadingType::Fasting => &mut self.fasting,
            ReadingType::BeforeMeal => &mut self.before_meal,
            ReadingType::PostMeal => &mut self.post_meal,
            ReadingType::Random => &mut self.random,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReadingType, &TypeStats)> + '_ {
        ReadingType::ALL.into_iter().map(move |t| (t, self.get(t)))
    }

    /// Type with the most readings; ties resolve to declaration order
    pub fn most_frequent(&self) -> Option<(ReadingType, &TypeStats)> {
        let mut best: Option<(ReadingType, &TypeStats)> = None;
        for (reading_type, stats) in self.iter() {
            if stats.count == 0 {
                continue;
            }
            match best {
                Some((_, b)) if b.count >= stats.count => {}
                _ => best = Some((reading_type, stats)),
            }
        }
        best
    }
}

pub fn analyze_reading_type_frequency(readings: &[Reading]) -> ReadingTypeBreakdown {
    let total = readings.len();
    let mut breakdown = ReadingTypeBreakdown::default();

    for reading_type in ReadingType::ALL {
        let values: Vec<f64> = readings
            .iter()
            .filter(|r| r.reading_type == reading_type)
            .map(|r| r.value)
            .collect();

        let slot = breakdown.get_mut(reading_type);
        slot.count = values.len();
        slot.percentage = percentage(values.len(), total);
        slot.average = mean(&values).map(round1);
    }

    breakdown
}

/// Per-context averages plus the overall mean
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GlucoseAverages {
    pub fasting: Option<f64>,
    pub before_meal: Option<f64>,
    pub post_meal: Option<f64>,
    pub random: Option<f64>,
    pub overall: Option<f64>,
}

impl GlucoseAverages {
    pub fn from_stats(types: &ReadingTypeBreakdown, basic: &BasicStats) -> Self {
        Self {
            fasting: types.fasting.average,
            before_meal: types.before_meal.average,
            post_meal: types.post_meal.average,
            random: types.random.average,
            overall: basic.mean,
        }
    }
}

// ============================================================================
// Coverage
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Number of distinct calendar dates with at least one reading
pub fn days_with_readings(readings: &[Reading]) -> usize {
    readings
        .iter()
        .map(|r| r.measured_at.date())
        .collect::<HashSet<_>>()
        .len()
}

pub fn date_range(readings: &[Reading]) -> Option<DateRange> {
    let start = readings.iter().map(|r| r.measured_at.date()).min()?;
    let end = readings.iter().map(|r| r.measured_at.date()).max()?;
    Some(DateRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDateTime};

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M").unwrap()
    }

    fn reading(value: f64, rt: ReadingType, ts: NaiveDateTime) -> Reading {
        Reading::new(value, rt, ts)
    }

    fn same_type(values: &[f64]) -> Vec<Reading> {
        let start = at("2026-01-01", "08:00");
        values
            .iter()
            .enumerate()
            .map(|(i, v)| reading(*v, ReadingType::Random, start + Duration::hours(i as i64)))
            .collect()
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(26.923), 26.9);
        assert_eq!(round1(0.05), 0.1);
        assert_eq!(round1(-3.86), -3.9);
    }

    #[test]
    fn test_basic_stats_empty() {
        assert_eq!(calculate_basic_stats(&[]), BasicStats::default());
    }

    #[test]
    fn test_basic_stats_population_std_dev() {
        let stats = calculate_basic_stats(&same_type(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]));
        assert_eq!(stats.min, Some(2.0));
        assert_eq!(stats.max, Some(9.0));
        assert_eq!(stats.mean, Some(5.0));
        // Population (N) gives exactly 2.0; sample (N-1) would give 2.1
        assert_eq!(stats.std_dev, Some(2.0));
    }

    #[test]
    fn test_basic_stats_single_reading() {
        let stats = calculate_basic_stats(&same_type(&[123.4]));
        assert_eq!(stats.min, Some(123.4));
        assert_eq!(stats.max, Some(123.4));
        assert_eq!(stats.mean, Some(123.4));
        assert_eq!(stats.std_dev, Some(0.0));
    }

    #[test]
    fn test_time_in_range_boundaries_inclusive() {
        let config = AnalysisConfig::default();
        let tir = calculate_time_in_range(&same_type(&[69.9, 70.0, 140.0, 140.1]), &config);
        assert_eq!(tir.below_range_count, 1);
        assert_eq!(tir.in_range_count, 2);
        assert_eq!(tir.above_range_count, 1);
        assert_eq!(tir.time_in_range, 50.0);
        assert_eq!(tir.time_above_range, 25.0);
        assert_eq!(tir.time_below_range, 25.0);
    }

    #[test]
    fn test_time_in_range_empty() {
        let tir = calculate_time_in_range(&[], &AnalysisConfig::default());
        assert_eq!(tir, TimeInRangeResult::default());
    }

    #[test]
    fn test_time_in_range_counts_and_percentages_sum() {
        let config = AnalysisConfig::default();
        let values = [55.0, 65.0, 90.0, 110.0, 120.0, 150.0, 210.0];
        let tir = calculate_time_in_range(&same_type(&values), &config);
        assert_eq!(tir.in_range_count + tir.above_range_count + tir.below_range_count, values.len());
        let sum = tir.time_in_range + tir.time_above_range + tir.time_below_range;
        assert!((sum - 100.0).abs() <= 0.1 + 1e-9, "sum was {}", sum);
    }

    #[test]
    fn test_cv_guards() {
        assert_eq!(calculate_coefficient_of_variation(&[]), None);
        assert_eq!(calculate_coefficient_of_variation(&same_type(&[100.0])), None);
        assert_eq!(calculate_coefficient_of_variation(&same_type(&[0.0, 0.0])), None);
        assert_eq!(calculate_coefficient_of_variation(&same_type(&[100.0, 100.0])), Some(0.0));
    }

    #[test]
    fn test_cv_value() {
        // mean 100, population sd 20 -> 20%
        let cv = calculate_coefficient_of_variation(&same_type(&[80.0, 120.0]));
        assert_eq!(cv, Some(20.0));
    }

    #[test]
    fn test_trend_requires_two_days() {
        let config = AnalysisConfig::default();
        let same_day = same_type(&[100.0, 150.0, 200.0]);
        assert_eq!(calculate_trend(&same_day, &config), TrendResult::default());
        assert_eq!(calculate_trend(&same_day[..1], &config), TrendResult::default());
        assert_eq!(calculate_trend(&[], &config), TrendResult::default());
    }

    #[test]
    fn test_trend_rising_linear() {
        let config = AnalysisConfig::default();
        let start = at("2026-02-01", "07:00");
        let readings: Vec<Reading> = (0..=13)
            .map(|d| {
                let value = 100.0 + 50.0 * d as f64 / 13.0;
                reading(value, ReadingType::Fasting, start + Duration::days(d))
            })
            .collect();

        let trend = calculate_trend(&readings, &config);
        assert_eq!(trend.direction, Some(TrendDirection::Rising));
        assert_eq!(trend.slope_per_day, Some(3.8));
        assert_eq!(trend.slope_per_week, Some(26.9));
        assert_eq!(trend.first_value, Some(100.0));
        assert_eq!(trend.last_value, Some(150.0));
    }

    #[test]
    fn test_trend_sorts_input() {
        let config = AnalysisConfig::default();
        let start = at("2026-02-01", "07:00");
        let mut readings: Vec<Reading> = (0..10)
            .map(|d| reading(200.0 - 5.0 * d as f64, ReadingType::Random, start + Duration::days(d)))
            .collect();
        readings.reverse();

        let trend = calculate_trend(&readings, &config);
        assert_eq!(trend.direction, Some(TrendDirection::Falling));
        assert_eq!(trend.slope_per_day, Some(-5.0));
        assert_eq!(trend.slope_per_week, Some(-35.0));
        assert_eq!(trend.first_value, Some(200.0));
        assert_eq!(trend.last_value, Some(155.0));
    }

    #[test]
    fn test_trend_same_time_readings_resolve_by_value() {
        let config = AnalysisConfig::default();
        let t0 = at("2026-02-01", "07:00");
        let t3 = t0 + Duration::days(3);
        let forward = vec![
            reading(90.0, ReadingType::Fasting, t0),
            reading(200.0, ReadingType::PostMeal, t0),
            reading(110.0, ReadingType::Random, t3),
            reading(60.0, ReadingType::Random, t3),
        ];
        let swapped = vec![forward[1], forward[0], forward[3], forward[2]];

        let a = calculate_trend(&forward, &config);
        let b = calculate_trend(&swapped, &config);
        assert_eq!(a, b);
        assert_eq!(a.first_value, Some(90.0));
        assert_eq!(a.last_value, Some(110.0));
    }

    #[test]
    fn test_trend_dead_zone() {
        let config = AnalysisConfig::default();
        let start = at("2026-02-01", "07:00");
        // 0.4 mg/dL per day sits inside the default +/-0.5 band
        let readings: Vec<Reading> = (0..10)
            .map(|d| reading(100.0 + 0.4 * d as f64, ReadingType::Random, start + Duration::days(d)))
            .collect();
        assert_eq!(calculate_trend(&readings, &config).direction, Some(TrendDirection::Stable));

        let tight = AnalysisConfig {
            trend_stable_band: 0.1,
            ..config
        };
        assert_eq!(calculate_trend(&readings, &tight).direction, Some(TrendDirection::Rising));
    }

    #[test]
    fn test_time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(4), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(11), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(16), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(20), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(21), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
    }

    #[test]
    fn test_analyze_time_of_day() {
        let readings = vec![
            reading(100.0, ReadingType::Fasting, at("2026-01-01", "06:30")),
            reading(110.0, ReadingType::Fasting, at("2026-01-02", "11:59")),
            reading(150.0, ReadingType::PostMeal, at("2026-01-01", "19:00")),
            reading(90.0, ReadingType::Random, at("2026-01-01", "23:15")),
            reading(95.0, ReadingType::Random, at("2026-01-02", "02:00")),
        ];
        let tod = analyze_time_of_day(&readings);
        assert_eq!(tod.morning, PeriodStats { count: 2, average: Some(105.0) });
        assert_eq!(tod.afternoon, PeriodStats { count: 0, average: None });
        assert_eq!(tod.evening, PeriodStats { count: 1, average: Some(150.0) });
        assert_eq!(tod.night, PeriodStats { count: 2, average: Some(92.5) });
    }

    #[test]
    fn test_reading_type_frequency() {
        let base = at("2026-01-01", "08:00");
        let readings = vec![
            reading(90.0, ReadingType::Fasting, base),
            reading(95.0, ReadingType::Fasting, base),
            reading(150.0, ReadingType::PostMeal, base),
        ];
        let freq = analyze_reading_type_frequency(&readings);
        assert_eq!(freq.fasting, TypeStats { count: 2, percentage: 66.7, average: Some(92.5) });
        assert_eq!(freq.post_meal, TypeStats { count: 1, percentage: 33.3, average: Some(150.0) });
        assert_eq!(freq.before_meal, TypeStats::default());
        assert_eq!(freq.random.count, 0);
        assert_eq!(freq.most_frequent().map(|(t, _)| t), Some(ReadingType::Fasting));
    }

    #[test]
    fn test_most_frequent_tie_uses_declaration_order() {
        let base = at("2026-01-01", "08:00");
        let readings = vec![
            reading(150.0, ReadingType::PostMeal, base),
            reading(95.0, ReadingType::BeforeMeal, base),
        ];
        let freq = analyze_reading_type_frequency(&readings);
        assert_eq!(freq.most_frequent().map(|(t, _)| t), Some(ReadingType::BeforeMeal));
        assert!(analyze_reading_type_frequency(&[]).most_frequent().is_none());
    }

    #[test]
    fn test_coverage() {
        let readings = vec![
            reading(100.0, ReadingType::Random, at("2026-01-03", "08:00")),
            reading(100.0, ReadingType::Random, at("2026-01-01", "08:00")),
            reading(100.0, ReadingType::Random, at("2026-01-01", "20:00")),
        ];
        assert_eq!(days_with_readings(&readings), 2);
        let range = date_range(&readings).unwrap();
        assert_eq!(range.start.to_string(), "2026-01-01");
        assert_eq!(range.end.to_string(), "2026-01-03");
        assert!(date_range(&[]).is_none());
    }
}
