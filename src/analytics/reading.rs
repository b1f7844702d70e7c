//! Glucose reading input type
//!
//! The engine only sees value, context and time. Persistence details stay in
//! `models::GlucoseReading`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Context under which a glucose reading was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingType {
    Fasting,
    BeforeMeal,
    PostMeal,
    Random,
}

impl ReadingType {
    pub const ALL: [ReadingType; 4] = [
        ReadingType::Fasting,
        ReadingType::BeforeMeal,
        ReadingType::PostMeal,
        ReadingType::Random,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingType::Fasting => "fasting",
            ReadingType::BeforeMeal => "before_meal",
            ReadingType::PostMeal => "post_meal",
            ReadingType::Random => "random",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "fasting" | "fast" => Some(ReadingType::Fasting),
            "before_meal" | "pre_meal" | "premeal" | "preprandial" => Some(ReadingType::BeforeMeal),
            "post_meal" | "after_meal" | "postmeal" | "postprandial" => Some(ReadingType::PostMeal),
            "random" | "other" => Some(ReadingType::Random),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ReadingType::Fasting => "Fasting",
            ReadingType::BeforeMeal => "Before meal",
            ReadingType::PostMeal => "Post-meal",
            ReadingType::Random => "Random",
        }
    }
}

/// A single glucose measurement in mg/dL
///
/// `measured_at` is a wall-clock time already localized by the caller; the
/// engine never converts time zones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    pub reading_type: ReadingType,
    pub measured_at: NaiveDateTime,
}

impl Reading {
    pub fn new(value: f64, reading_type: ReadingType, measured_at: NaiveDateTime) -> Self {
        Self {
            value,
            reading_type,
            measured_at,
        }
    }
}
