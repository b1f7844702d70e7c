//! GIM MCP Server Implementation
//!
//! Implements the MCP server with all GIM tools.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::analytics::AnalysisConfig;
use crate::db::Database;
use crate::models::DEFAULT_SUBJECT;
use crate::tools::analysis;
use crate::tools::glucose;
use crate::tools::status::StatusTracker;

/// GIM MCP Service
#[derive(Clone)]
pub struct GimService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    config: AnalysisConfig,
    tool_router: ToolRouter<GimService>,
}

impl GimService {
    pub fn new(database_path: PathBuf, database: Database, config: AnalysisConfig) -> Self {
        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(database_path, config))),
            database,
            config,
            tool_router: Self::tool_router(),
        }
    }
}

fn default_subject() -> String { DEFAULT_SUBJECT.to_string() }

fn to_json<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

// ============================================================================
// Glucose Reading Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddGlucoseReadingParams {
    /// Whose reading this is (defaults to "default")
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Glucose value, in mg/dL unless `unit` says otherwise
    pub value: f64,
    /// Unit: mg/dL (default) or mmol/L
    pub unit: Option<String>,
    /// Reading type: fasting, before_meal (pre_meal), post_meal (after_meal), random
    pub reading_type: String,
    /// Local time of the measurement (defaults to now): YYYY-MM-DDTHH:MM:SS, YYYY-MM-DD HH:MM, YYYY-MM-DD, or RFC3339
    pub measured_at: Option<String>,
    /// Notes (meal eaten, symptoms, etc.)
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetGlucoseReadingParams {
    /// Reading ID
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListGlucoseReadingsParams {
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Only readings from the last N days
    pub days: Option<u32>,
    /// Window start (takes precedence over days)
    pub start: Option<String>,
    /// Window end; a bare date includes the whole day
    pub end: Option<String>,
    /// Maximum readings to return (default 50)
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateGlucoseReadingParams {
    /// Reading ID
    pub id: i64,
    pub value: Option<f64>,
    /// Unit of `value`: mg/dL (default) or mmol/L
    pub unit: Option<String>,
    pub reading_type: Option<String>,
    pub measured_at: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteGlucoseReadingParams {
    /// Reading ID
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImportGlucoseCsvParams {
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Absolute path to a CSV file with a timestamp,value,type[,notes] header
    pub file_path: String,
}

// ============================================================================
// Analysis Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AnalyzeGlucoseParams {
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Days to look back (defaults to the configured lookback, normally 30)
    pub lookback_days: Option<u32>,
    /// End of the window in local time (defaults to now)
    pub now: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GlucoseSummaryParams {
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Days to look back (defaults to the configured lookback, normally 30)
    pub lookback_days: Option<u32>,
}

#[tool_router]
impl GimService {
    // ========================================================================
    // Status Tools
    // ========================================================================

    #[tool(description = "Get the current status of the GIM service including build info, database status, analysis thresholds, and process information")]
    async fn gim_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status();
        to_json(&status)
    }

    #[tool(description = "Get step-by-step instructions for logging and analyzing glucose. Call this when starting a glucose tracking session or when unsure how to use the glucose tools.")]
    fn glucose_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::GLUCOSE_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(GLUCOSE_INSTRUCTIONS)]))
    }

    // ========================================================================
    // Glucose Reading Tools
    // ========================================================================

    #[tool(description = "Add a glucose reading (fasting, before_meal, post_meal, random). Accepts mg/dL or mmol/L.")]
    fn add_glucose_reading(&self, Parameters(p): Parameters<AddGlucoseReadingParams>) -> Result<CallToolResult, McpError> {
        let result = glucose::add_glucose_reading(
            &self.database,
            &p.subject,
            p.value,
            p.unit.as_deref(),
            &p.reading_type,
            p.measured_at.as_deref(),
            p.notes.as_deref(),
        ).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Get a glucose reading by ID")]
    fn get_glucose_reading(&self, Parameters(p): Parameters<GetGlucoseReadingParams>) -> Result<CallToolResult, McpError> {
        let result = glucose::get_glucose_reading(&self.database, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(reading) => serde_json::to_string_pretty(&reading),
            None => Ok(format!(r#"{{"error": "Glucose reading not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List glucose readings, newest first. Filter by last N days or a start/end window; with neither, returns the most recent readings.")]
    fn list_glucose_readings(&self, Parameters(p): Parameters<ListGlucoseReadingsParams>) -> Result<CallToolResult, McpError> {
        let result = glucose::list_glucose_readings(
            &self.database,
            &p.subject,
            p.days,
            p.start.as_deref(),
            p.end.as_deref(),
            p.limit,
        ).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Update a glucose reading's value, type, time, or notes")]
    fn update_glucose_reading(&self, Parameters(p): Parameters<UpdateGlucoseReadingParams>) -> Result<CallToolResult, McpError> {
        let result = glucose::update_glucose_reading(
            &self.database,
            p.id,
            p.value,
            p.unit.as_deref(),
            p.reading_type.as_deref(),
            p.measured_at.as_deref(),
            p.notes.as_deref(),
        ).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Delete a glucose reading")]
    fn delete_glucose_reading(&self, Parameters(p): Parameters<DeleteGlucoseReadingParams>) -> Result<CallToolResult, McpError> {
        let result = glucose::delete_glucose_reading(&self.database, p.id)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Import glucose readings from a CSV file (timestamp,value,type[,notes], values in mg/dL). Duplicate readings are skipped.")]
    fn import_glucose_csv(&self, Parameters(p): Parameters<ImportGlucoseCsvParams>) -> Result<CallToolResult, McpError> {
        let result = glucose::import_glucose_csv(&self.database, &p.subject, &p.file_path)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    // ========================================================================
    // Analysis Tools
    // ========================================================================

    #[tool(description = "Analyze glucose over a lookback window: averages, time in range, variability, trend, time-of-day and reading type breakdowns, risk levels, insights, concerns, and goals")]
    fn analyze_glucose(&self, Parameters(p): Parameters<AnalyzeGlucoseParams>) -> Result<CallToolResult, McpError> {
        let result = analysis::analyze_glucose(
            &self.database,
            &self.config,
            &p.subject,
            p.lookback_days,
            p.now.as_deref(),
        ).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Get a short Markdown summary of recent glucose analysis, suitable for including in a conversation")]
    fn glucose_summary(&self, Parameters(p): Parameters<GlucoseSummaryParams>) -> Result<CallToolResult, McpError> {
        let result = analysis::glucose_summary(
            &self.database,
            &self.config,
            &p.subject,
            p.lookback_days,
        ).map_err(|e| McpError::internal_error(e, None))?;
        Ok(CallToolResult::success(vec![Content::text(result.summary)]))
    }
}

#[tool_handler]
impl ServerHandler for GimService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "gim".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Glucose Insight Manager".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Glucose Insight Manager (GIM) - Glucose logging and analysis. \
                 IMPORTANT: Call glucose_instructions before logging readings. \
                 Readings: add/get/update/delete_glucose_reading, list_glucose_readings, import_glucose_csv. \
                 Analysis: analyze_glucose (full structured result), glucose_summary (short Markdown). \
                 Timestamps are the subject's local time. Values are stored in mg/dL. \
                 Status: gim_status."
                    .into(),
            ),
        }
    }
}
