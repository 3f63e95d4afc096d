//! Database connection utilities for the mirror store.

use std::path::PathBuf;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

/// Pragmas applied to every SQLite connection.
///
/// WAL lets the CLI read cycle history while a cycle for another channel is
/// writing; the busy timeout absorbs the short lock windows of per-item upserts.
const SQLITE_PRAGMAS: [&str; 4] = [
    "PRAGMA journal_mode=WAL",
    "PRAGMA busy_timeout=5000",
    "PRAGMA synchronous=NORMAL",
    "PRAGMA foreign_keys=ON",
];

async fn configure_sqlite(db: &DatabaseConnection) -> Result<(), DbErr> {
    for pragma in SQLITE_PRAGMAS {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            pragma.to_string(),
        ))
        .await?;
    }
    Ok(())
}

fn is_sqlite_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite:")
}

/// Resolve the on-disk file behind a `sqlite://` URL.
///
/// Returns `None` for in-memory databases and non-SQLite URLs.
#[must_use]
pub fn sqlite_file_path(database_url: &str) -> Option<PathBuf> {
    let path = database_url.strip_prefix("sqlite://")?;
    // Strip query parameters (e.g., ?mode=rwc) before path operations
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Some(PathBuf::from(path))
}

/// Create the parent directory of a file-backed SQLite database.
///
/// # Errors
/// Returns the underlying I/O error if the directory cannot be created.
pub fn ensure_sqlite_parent_dir(database_url: &str) -> std::io::Result<()> {
    let Some(path) = sqlite_file_path(database_url) else {
        return Ok(());
    };

    if path.is_relative() {
        tracing::warn!(
            path = %path.display(),
            "SQLite path is relative; location depends on the working directory"
        );
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Establish a connection to the mirror database.
///
/// SQLite connections get WAL journaling, a 5 second busy timeout and
/// `synchronous=NORMAL`.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    if is_sqlite_url(database_url) {
        configure_sqlite(&db).await?;
    }

    Ok(db)
}

/// Establish a connection and run all pending migrations.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established or migrations fail.
///
/// # Example
/// ```ignore
/// let db = feedsync::connect_and_migrate("sqlite::memory:").await?;
/// ```
#[cfg(feature = "migrate")]
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    use sea_orm_migration::MigratorTrait;

    let db = connect(database_url).await?;
    crate::migration::Migrator::up(&db, None).await?;
    Ok(db)
}
