//! GIM Tools module
//!
//! MCP tool implementations for the Glucose Insight Manager.

pub mod analysis;
pub mod glucose;
pub mod status;
