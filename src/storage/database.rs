//! SQLite Rules Database
//!
//! Read-only access to the rules database the tool worker serves from. The
//! orchestrator only needs the list of content categories, to tell the
//! generator which sections exist.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::utils::error::AppResult;

const CATEGORIES_QUERY: &str =
    "SELECT category FROM docs GROUP BY category ORDER BY COUNT(*) DESC";

/// Read all categories present in `docs`, most populated first.
pub fn try_load_categories(db_path: &Path) -> AppResult<Vec<String>> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let mut stmt = conn.prepare(CATEGORIES_QUERY)?;
    let rows = stmt.query_map([], |row| row.get::<_, Option<String>>(0))?;

    let mut categories = Vec::new();
    for row in rows {
        if let Some(category) = row? {
            categories.push(category);
        }
    }
    Ok(categories)
}

/// Like `try_load_categories`, but any failure yields an empty list.
pub fn load_categories(db_path: &Path) -> Vec<String> {
    match try_load_categories(db_path) {
        Ok(categories) => categories,
        Err(e) => {
            tracing::warn!(path = %db_path.display(), error = %e, "Could not read categories");
            Vec::new()
        }
    }
}
