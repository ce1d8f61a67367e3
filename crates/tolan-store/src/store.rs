use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use tolan_core::clock::display_timestamp;
use tolan_core::types::{ChatMode, ChatSettings, RecentMessage};

use crate::db::init_db;
use crate::error::Result;

/// SQLite-backed message log and per-chat settings repository.
///
/// Thread-safe: the connection sits behind a Mutex, and a read-through cache
/// of settings rows avoids hitting the database on every event. The cache is
/// invalidated on write, so a read never returns a value older than the last
/// successful write.
pub struct MessageStore {
    db: Mutex<Connection>,
    settings_cache: Mutex<HashMap<String, ChatSettings>>,
}

impl MessageStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        info!(path, "message store opened");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
            settings_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Run `op` against the connection, retrying once on failure. SQLite
    /// reports transient lock contention as an ordinary error.
    fn with_retry<T>(&self, op: impl Fn(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let db = self.db.lock().unwrap();
        match op(&db) {
            Ok(v) => Ok(v),
            Err(first) => {
                debug!(error = %first, "query failed, retrying once");
                op(&db).map_err(Into::into)
            }
        }
    }

    // ── Message log ─────────────────────────────────────────────────────────

    pub fn save_message(&self, chat_id: &str, user_id: &str, text: &str) -> Result<()> {
        let ts = display_timestamp();
        self.with_retry(|conn| {
            conn.execute(
                "INSERT INTO messages (chat_id, user_id, text, ts) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![chat_id, user_id, text, ts],
            )
            .map(|_| ())
        })?;
        debug!(chat_id, user_id, text_len = text.len(), "message saved");
        Ok(())
    }

    /// Up to `limit` most recent messages for the chat, oldest first.
    pub fn recent_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<RecentMessage>> {
        let mut rows = self.with_retry(|conn| {
            let mut stmt = conn.prepare(
                "SELECT ts, user_id, text FROM messages
                 WHERE chat_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )?;
            let mapped = stmt.query_map(rusqlite::params![chat_id, limit], |row| {
                Ok(RecentMessage {
                    ts: row.get(0)?,
                    user_id: row.get(1)?,
                    text: row.get(2)?,
                })
            })?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        rows.reverse();
        Ok(rows)
    }

    /// Every chat id with a settings row — the periodic summary audience.
    pub fn list_chat_ids(&self) -> Result<Vec<String>> {
        self.with_retry(|conn| {
            let mut stmt = conn.prepare("SELECT chat_id FROM settings")?;
            let mapped = stmt.query_map([], |row| row.get::<_, String>(0))?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()
        })
    }

    // ── Settings ────────────────────────────────────────────────────────────

    /// Current settings for the chat, inserting a default row on first read.
    pub fn get_or_create_settings(
        &self,
        chat_id: &str,
        default_threshold: f64,
    ) -> Result<ChatSettings> {
        if let Some(cached) = self.settings_cache.lock().unwrap().get(chat_id) {
            return Ok(cached.clone());
        }

        let existing = self.with_retry(|conn| {
            conn.query_row(
                "SELECT mode, threshold, personality, language_style,
                        response_length, last_mention_time
                 FROM settings WHERE chat_id = ?1",
                [chat_id],
                row_to_settings,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })?;

        let settings = match existing {
            Some(s) => s,
            None => {
                let defaults = ChatSettings::with_threshold(default_threshold);
                self.with_retry(|conn| {
                    conn.execute(
                        "INSERT OR IGNORE INTO settings (chat_id, mode, threshold)
                         VALUES (?1, ?2, ?3)",
                        rusqlite::params![chat_id, defaults.mode.as_str(), defaults.threshold],
                    )
                    .map(|_| ())
                })?;
                info!(chat_id, threshold = default_threshold, "settings row created");
                defaults
            }
        };

        self.settings_cache
            .lock()
            .unwrap()
            .insert(chat_id.to_string(), settings.clone());
        Ok(settings)
    }

    /// Threshold is clamped to [0, 1] on write.
    pub fn set_threshold(&self, chat_id: &str, value: f64) -> Result<()> {
        let clamped = value.clamp(0.0, 1.0);
        self.update_field(chat_id, "threshold", clamped)?;
        info!(chat_id, value = clamped, "threshold updated");
        Ok(())
    }

    pub fn set_mode(&self, chat_id: &str, mode: ChatMode) -> Result<()> {
        self.update_field(chat_id, "mode", mode.as_str())?;
        info!(chat_id, mode = mode.as_str(), "mode updated");
        Ok(())
    }

    pub fn set_personality(&self, chat_id: &str, personality: &str) -> Result<()> {
        self.update_field(chat_id, "personality", personality)
    }

    pub fn set_language_style(&self, chat_id: &str, style: &str) -> Result<()> {
        self.update_field(chat_id, "language_style", style)
    }

    pub fn set_response_length(&self, chat_id: &str, length: &str) -> Result<()> {
        self.update_field(chat_id, "response_length", length)
    }

    pub fn set_last_mention_time(&self, chat_id: &str, timestamp: f64) -> Result<()> {
        self.update_field(chat_id, "last_mention_time", timestamp)
    }

    /// Field-wise update: UPDATE the row, INSERT it when absent, then drop
    /// the cache entry so the next read observes the write.
    fn update_field<V: rusqlite::ToSql>(&self, chat_id: &str, column: &str, value: V) -> Result<()> {
        let result = self.with_retry(|conn| {
            let updated = conn.execute(
                &format!("UPDATE settings SET {column} = ?1 WHERE chat_id = ?2"),
                rusqlite::params![value, chat_id],
            )?;
            if updated == 0 {
                conn.execute(
                    &format!("INSERT INTO settings (chat_id, {column}) VALUES (?1, ?2)"),
                    rusqlite::params![chat_id, value],
                )?;
            }
            Ok(())
        });
        if let Err(ref e) = result {
            warn!(chat_id, column, error = %e, "settings update failed");
        }
        self.settings_cache.lock().unwrap().remove(chat_id);
        result
    }
}

fn row_to_settings(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatSettings> {
    let mode_str: String = row.get(0)?;
    Ok(ChatSettings {
        mode: ChatMode::parse(&mode_str).unwrap_or(ChatMode::Normal),
        threshold: row.get(1)?,
        personality: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        language_style: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        response_length: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        last_mention_time: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_round_trip_oldest_first() {
        let store = MessageStore::open_in_memory().unwrap();
        store.save_message("oc_1", "ou_a", "first").unwrap();
        store.save_message("oc_1", "ou_b", "second").unwrap();
        store.save_message("oc_2", "ou_c", "other chat").unwrap();

        let msgs = store.recent_messages("oc_1", 10).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].text, "first");
        assert_eq!(msgs[1].text, "second");
        assert_eq!(msgs[1].user_id, "ou_b");
    }

    #[test]
    fn recent_messages_respects_limit() {
        let store = MessageStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .save_message("oc_1", "ou_a", &format!("m{i}"))
                .unwrap();
        }
        let msgs = store.recent_messages("oc_1", 2).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].text, "m3");
        assert_eq!(msgs[1].text, "m4");
    }

    #[test]
    fn get_or_create_inserts_defaults() {
        let store = MessageStore::open_in_memory().unwrap();
        let s = store.get_or_create_settings("oc_1", 0.5).unwrap();
        assert_eq!(s.mode, ChatMode::Normal);
        assert_eq!(s.threshold, 0.5);

        // A second read returns the persisted row, not a new default.
        let again = store.get_or_create_settings("oc_1", 0.9).unwrap();
        assert_eq!(again.threshold, 0.5);
        assert_eq!(store.list_chat_ids().unwrap(), vec!["oc_1".to_string()]);
    }

    #[test]
    fn threshold_writes_are_clamped_and_read_back() {
        let store = MessageStore::open_in_memory().unwrap();
        store.get_or_create_settings("oc_1", 0.65).unwrap();

        store.set_threshold("oc_1", 1.7).unwrap();
        let s = store.get_or_create_settings("oc_1", 0.65).unwrap();
        assert_eq!(s.threshold, 1.0);

        store.set_threshold("oc_1", -0.2).unwrap();
        let s = store.get_or_create_settings("oc_1", 0.65).unwrap();
        assert_eq!(s.threshold, 0.0);
    }

    #[test]
    fn mode_write_is_visible_to_next_read() {
        let store = MessageStore::open_in_memory().unwrap();
        store.get_or_create_settings("oc_1", 0.65).unwrap();
        store.set_mode("oc_1", ChatMode::Quiet).unwrap();
        let s = store.get_or_create_settings("oc_1", 0.65).unwrap();
        assert_eq!(s.mode, ChatMode::Quiet);
    }

    #[test]
    fn update_on_missing_row_creates_it() {
        let store = MessageStore::open_in_memory().unwrap();
        store.set_mode("oc_new", ChatMode::Active).unwrap();
        let s = store.get_or_create_settings("oc_new", 0.65).unwrap();
        assert_eq!(s.mode, ChatMode::Active);
    }

    #[test]
    fn personality_fields_persist() {
        let store = MessageStore::open_in_memory().unwrap();
        store.set_personality("oc_1", "humorous").unwrap();
        store.set_language_style("oc_1", "formal").unwrap();
        store.set_response_length("oc_1", "brief").unwrap();
        store.set_last_mention_time("oc_1", 1234.5).unwrap();
        let s = store.get_or_create_settings("oc_1", 0.65).unwrap();
        assert_eq!(s.personality, "humorous");
        assert_eq!(s.language_style, "formal");
        assert_eq!(s.response_length, "brief");
        assert_eq!(s.last_mention_time, 1234.5);
    }
}
