//! Database module
//!
//! Handles SQLite connection and migrations.

pub mod connection;
pub mod migrations;

pub use connection::{Database, DbError, DbResult};

/// File-backed database with migrations applied, unique per test name
#[cfg(test)]
pub(crate) fn test_database(name: &str) -> Database {
    let mut path = std::env::temp_dir();
    path.push(format!("gim-test-{}-{}.db", name, std::process::id()));
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
    let db = Database::new(&path).expect("open test database");
    db.with_conn(migrations::run_migrations)
        .expect("migrate test database");
    db
}
