use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::Result;

/// Initialise tables and run migrations. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_messages_table(conn)?;
    create_settings_table(conn)?;
    run_migrations(conn);
    Ok(())
}

fn create_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id       INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id  TEXT NOT NULL,
            user_id  TEXT NOT NULL,
            text     TEXT NOT NULL,
            ts       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id);
        CREATE INDEX IF NOT EXISTS idx_messages_user ON messages(user_id);
        CREATE INDEX IF NOT EXISTS idx_messages_ts   ON messages(ts);",
    )?;
    Ok(())
}

/// Base settings schema. Later columns are added by `run_migrations` so
/// databases created by older builds upgrade in place.
fn create_settings_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS settings (
            chat_id    TEXT PRIMARY KEY,
            mode       TEXT NOT NULL DEFAULT 'normal',
            threshold  REAL NOT NULL DEFAULT 0.65
        );",
    )?;
    Ok(())
}

/// Additive column migrations. SQLite has no `ADD COLUMN IF NOT EXISTS`, so
/// "duplicate column" failures are expected and tolerated.
fn run_migrations(conn: &Connection) {
    let columns = [
        ("personality", "TEXT DEFAULT 'chill'"),
        ("language_style", "TEXT DEFAULT 'casual'"),
        ("response_length", "TEXT DEFAULT 'normal'"),
        ("last_mention_time", "REAL DEFAULT 0.0"),
    ];
    for (name, definition) in columns {
        let sql = format!("ALTER TABLE settings ADD COLUMN {name} {definition}");
        match conn.execute_batch(&sql) {
            Ok(()) => info!(column = name, "settings column added"),
            Err(e) => {
                let msg = e.to_string().to_lowercase();
                if msg.contains("duplicate column") {
                    continue;
                }
                warn!(column = name, error = %e, "settings migration failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
    }

    #[test]
    fn migrated_columns_carry_defaults() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn.execute("INSERT INTO settings (chat_id) VALUES ('oc_1')", [])
            .unwrap();
        let (personality, last_mention): (String, f64) = conn
            .query_row(
                "SELECT personality, last_mention_time FROM settings WHERE chat_id = 'oc_1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(personality, "chill");
        assert_eq!(last_mention, 0.0);
    }
}
