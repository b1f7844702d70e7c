//! Data models
//!
//! Rust structs representing database entities.

mod glucose_reading;

pub use glucose_reading::{
    format_timestamp, parse_timestamp, GlucoseReading, GlucoseReadingCreate, GlucoseReadingUpdate,
    DEFAULT_SUBJECT, TIMESTAMP_FORMAT,
};
