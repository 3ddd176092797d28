use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Open the SQLite database backing one vector index.
///
/// Staging indexes are opened with `create = true`; committed indexes are
/// opened read-only. Writers use the rollback journal instead of WAL so that
/// a closed index is a single self-contained file that can be moved.
pub async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool, sqlx::Error> {
    let mut options = SqliteConnectOptions::new().filename(db_path);
    options = if create {
        options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
    } else {
        options.read_only(true)
    };

    SqlitePoolOptions::new()
        .max_connections(if create { 1 } else { 5 })
        .connect_with(options)
        .await
}
