//! Glucose Insight Manager (GIM) Library
//!
//! Glucose reading storage, statistics, and rule-based insights.

pub mod analytics;
pub mod build_info;
pub mod db;
pub mod mcp;
pub mod models;
pub mod tools;
