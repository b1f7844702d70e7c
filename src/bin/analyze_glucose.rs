//! Utility to run a glucose analysis from the command line
//!
//! Usage: analyze_glucose [subject] [lookback_days]

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

fn get_database_path() -> PathBuf {
    std::env::var("GIM_DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));

            // Go up from target/release or target/debug to project root
            if path.ends_with("release") || path.ends_with("debug") {
                if let Some(parent) = path.parent() {
                    if let Some(grandparent) = parent.parent() {
                        path = grandparent.to_path_buf();
                    }
                }
            }

            path.push("data");
            std::fs::create_dir_all(&path).ok();
            path.push("gim.db");
            path
        })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gim=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let subject = args
        .next()
        .unwrap_or_else(|| gim::models::DEFAULT_SUBJECT.to_string());
    let lookback_days = match args.next() {
        Some(days) => Some(
            days.parse::<u32>()
                .map_err(|_| format!("Invalid lookback_days: '{}'", days))?,
        ),
        None => None,
    };

    let config = gim::analytics::AnalysisConfig::from_env()?;

    let db_path = get_database_path();
    eprintln!("Database path: {}", db_path.display());

    let database = gim::db::Database::new(&db_path)?;

    database.with_conn(|conn| {
        gim::db::migrations::run_migrations(conn)?;
        Ok(())
    })?;

    let result = gim::tools::analysis::analyze_glucose(
        &database,
        &config,
        &subject,
        lookback_days,
        None,
    )?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    println!();
    println!("{}", result.analysis.to_prompt_summary());

    Ok(())
}
