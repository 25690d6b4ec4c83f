//! SQLite-based event storage implementation.
//!
//! `SqliteEventStore` keeps actors, events and the attendee join table in a
//! single database. The connection sits behind a mutex so the store can be
//! shared between request handlers.

use chrono::{DateTime, Utc};
use labsync_core::ActorId;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;

use crate::event::{validate_schedule, Actor, Event, EventPatch, NewEvent, PipelineStage, Role};
use crate::event_backend::{EventBackend, EventBackendError, EventBackendResult};

const EVENT_COLUMNS: &str = "id, title, description, start_date, end_date, location, category, \
     pipeline_stage, owner_id, max_attendees, linked_project, remote_event_id, remote_link, \
     created_at, updated_at";

/// SQLite-based event storage.
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
}

/// Event row before owner/attendees are resolved.
struct EventRow {
    event: Event,
    owner_id: ActorId,
}

impl SqliteEventStore {
    /// Open or create the event database at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store.
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn.lock().execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS actors (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT,
                role TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL,
                pipeline_stage TEXT NOT NULL,
                owner_id INTEGER NOT NULL REFERENCES actors(id),
                max_attendees INTEGER,
                linked_project INTEGER,
                remote_event_id TEXT UNIQUE,
                remote_link TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS event_attendees (
                event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                actor_id INTEGER NOT NULL REFERENCES actors(id),
                PRIMARY KEY (event_id, actor_id)
            );

            CREATE INDEX IF NOT EXISTS idx_events_start ON events(start_date);
            CREATE INDEX IF NOT EXISTS idx_events_stage ON events(pipeline_stage);
            "#,
        )?;
        Ok(())
    }

    /// Number of stored events.
    pub fn count(&self) -> anyhow::Result<usize> {
        let count: i64 =
            self.conn.lock().query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn row_to_actor(row: &Row) -> rusqlite::Result<Actor> {
        let role: String = row.get(3)?;
        Ok(Actor {
            id: ActorId(row.get(0)?),
            username: row.get(1)?,
            email: row.get(2)?,
            role: Role::from_stored(&role),
        })
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<EventRow> {
        let stage: String = row.get(7)?;
        let pipeline_stage = stage.parse::<PipelineStage>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;
        let owner_id = ActorId(row.get(8)?);

        Ok(EventRow {
            owner_id,
            event: Event {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                start: parse_timestamp(row, 3)?,
                end: parse_timestamp(row, 4)?,
                location: row.get(5)?,
                category: row.get(6)?,
                pipeline_stage,
                // Resolved by `resolve_actors`
                owner: Actor::new(owner_id.0, String::new(), None),
                attendees: Vec::new(),
                max_attendees: row.get(9)?,
                linked_project: row.get(10)?,
                remote_event_id: row.get(11)?,
                remote_link: row.get(12)?,
                created_at: parse_timestamp(row, 13)?,
                updated_at: parse_timestamp(row, 14)?,
            },
        })
    }

    fn actor_in(conn: &Connection, id: ActorId) -> rusqlite::Result<Option<Actor>> {
        conn.query_row(
            "SELECT id, username, email, role FROM actors WHERE id = ?1",
            params![id.0],
            Self::row_to_actor,
        )
        .optional()
    }

    fn resolve_actors(conn: &Connection, row: EventRow) -> EventBackendResult<Event> {
        let EventRow { mut event, owner_id } = row;

        event.owner = Self::actor_in(conn, owner_id)?
            .ok_or_else(|| EventBackendError::storage(format!("owner {} missing", owner_id)))?;

        let mut stmt = conn.prepare(
            "SELECT a.id, a.username, a.email, a.role
             FROM event_attendees ea JOIN actors a ON a.id = ea.actor_id
             WHERE ea.event_id = ?1
             ORDER BY a.id",
        )?;
        event.attendees = stmt
            .query_map(params![event.id], Self::row_to_actor)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(event)
    }

    fn load(conn: &Connection, id: i64) -> EventBackendResult<Option<Event>> {
        let sql = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
        let row = conn.query_row(&sql, params![id], Self::row_to_event).optional()?;

        match row {
            Some(row) => Ok(Some(Self::resolve_actors(conn, row)?)),
            None => Ok(None),
        }
    }

    fn ensure_actors_exist(tx: &Transaction, ids: &[ActorId]) -> EventBackendResult<()> {
        for id in ids {
            if Self::actor_in(tx, *id)?.is_none() {
                return Err(EventBackendError::validation(format!("Unknown actor: {}", id)));
            }
        }
        Ok(())
    }

    fn replace_attendees(tx: &Transaction, event_id: i64, ids: &[ActorId]) -> EventBackendResult<()> {
        tx.execute("DELETE FROM event_attendees WHERE event_id = ?1", params![event_id])?;
        for id in ids {
            tx.execute(
                "INSERT OR IGNORE INTO event_attendees (event_id, actor_id) VALUES (?1, ?2)",
                params![event_id, id.0],
            )?;
        }
        Ok(())
    }
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn dedup_ids(ids: &[ActorId]) -> Vec<ActorId> {
    let mut out: Vec<ActorId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

impl EventBackend for SqliteEventStore {
    fn upsert_actor(&self, actor: &Actor) -> EventBackendResult<()> {
        self.conn.lock().execute(
            r#"
            INSERT INTO actors (id, username, email, role) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                email = excluded.email,
                role = excluded.role
            "#,
            params![actor.id.0, actor.username, actor.email, actor.role.as_str()],
        )?;
        Ok(())
    }

    fn get_actor(&self, id: ActorId) -> EventBackendResult<Option<Actor>> {
        let conn = self.conn.lock();
        Ok(Self::actor_in(&conn, id)?)
    }

    fn create(&self, new: NewEvent) -> EventBackendResult<Event> {
        let attendees = dedup_ids(&new.attendees);
        validate_schedule(&new.title, new.start, new.end, attendees.len(), new.max_attendees)
            .map_err(EventBackendError::Validation)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        Self::ensure_actors_exist(&tx, &[new.owner])?;
        Self::ensure_actors_exist(&tx, &attendees)?;

        let now = Utc::now().to_rfc3339();
        tx.execute(
            r#"
            INSERT INTO events (title, description, start_date, end_date, location, category,
                pipeline_stage, owner_id, max_attendees, linked_project, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            "#,
            params![
                new.title,
                new.description,
                new.start.to_rfc3339(),
                new.end.to_rfc3339(),
                new.location,
                new.category,
                new.pipeline_stage.as_str(),
                new.owner.0,
                new.max_attendees,
                new.linked_project,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();
        Self::replace_attendees(&tx, id, &attendees)?;
        tx.commit()?;

        tracing::debug!("Created event with ID: {}", id);
        Self::load(&conn, id)?.ok_or_else(|| EventBackendError::not_found(id.to_string()))
    }

    fn get(&self, id: i64) -> EventBackendResult<Option<Event>> {
        let conn = self.conn.lock();
        Self::load(&conn, id)
    }

    fn list(&self) -> EventBackendResult<Vec<Event>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM events ORDER BY start_date, id", EVENT_COLUMNS);
        let rows = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], Self::row_to_event)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter().map(|row| Self::resolve_actors(&conn, row)).collect()
    }

    fn update(&self, id: i64, patch: EventPatch) -> EventBackendResult<Event> {
        let mut conn = self.conn.lock();
        let mut event =
            Self::load(&conn, id)?.ok_or_else(|| EventBackendError::not_found(id.to_string()))?;

        if let Some(title) = patch.title {
            event.title = title;
        }
        if let Some(description) = patch.description {
            event.description = description;
        }
        if let Some(start) = patch.start {
            event.start = start;
        }
        if let Some(end) = patch.end {
            event.end = end;
        }
        if let Some(location) = patch.location {
            event.location = location;
        }
        if let Some(category) = patch.category {
            event.category = category;
        }
        if let Some(stage) = patch.pipeline_stage {
            event.pipeline_stage = stage;
        }
        if patch.max_attendees.is_some() {
            event.max_attendees = patch.max_attendees;
        }
        if patch.linked_project.is_some() {
            event.linked_project = patch.linked_project;
        }

        let attendees = patch.attendees.as_deref().map(dedup_ids);
        let attendee_count = attendees.as_ref().map_or(event.attendees.len(), Vec::len);
        validate_schedule(&event.title, event.start, event.end, attendee_count, event.max_attendees)
            .map_err(EventBackendError::Validation)?;

        let tx = conn.transaction()?;
        if let Some(ids) = &attendees {
            Self::ensure_actors_exist(&tx, ids)?;
        }

        tx.execute(
            r#"
            UPDATE events SET title = ?1, description = ?2, start_date = ?3, end_date = ?4,
                location = ?5, category = ?6, pipeline_stage = ?7, max_attendees = ?8,
                linked_project = ?9, updated_at = ?10
            WHERE id = ?11
            "#,
            params![
                event.title,
                event.description,
                event.start.to_rfc3339(),
                event.end.to_rfc3339(),
                event.location,
                event.category,
                event.pipeline_stage.as_str(),
                event.max_attendees,
                event.linked_project,
                Utc::now().to_rfc3339(),
                id,
            ],
        )?;
        if let Some(ids) = &attendees {
            Self::replace_attendees(&tx, id, ids)?;
        }
        tx.commit()?;

        Self::load(&conn, id)?.ok_or_else(|| EventBackendError::not_found(id.to_string()))
    }

    fn delete(&self, id: i64) -> EventBackendResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM event_attendees WHERE event_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM events WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(EventBackendError::not_found(id.to_string()));
        }
        tx.commit()?;

        tracing::debug!("Deleted event {}", id);
        Ok(())
    }

    fn set_remote(
        &self,
        id: i64,
        remote_event_id: &str,
        remote_link: Option<&str>,
    ) -> EventBackendResult<()> {
        let rows = self.conn.lock().execute(
            "UPDATE events SET remote_event_id = ?1, remote_link = ?2 WHERE id = ?3",
            params![remote_event_id, remote_link, id],
        )?;
        if rows == 0 {
            return Err(EventBackendError::not_found(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use chrono::TimeZone;

    fn seeded_store() -> SqliteEventStore {
        let store = SqliteEventStore::in_memory().unwrap();
        store.upsert_actor(&Actor::new(1, "director", Some("director@lab.org"))).unwrap();
        store.upsert_actor(&Actor::new(2, "analyst", Some("analyst@lab.org"))).unwrap();
        store.upsert_actor(&Actor::new(3, "intern", None)).unwrap();
        store
    }

    fn new_event(attendees: Vec<i64>) -> NewEvent {
        NewEvent {
            title: "Quarterly review".to_string(),
            description: "Review of research outputs".to_string(),
            start: Utc.with_ymd_and_hms(2025, 4, 2, 13, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 4, 2, 15, 0, 0).unwrap(),
            location: "Room 4".to_string(),
            category: "Review".to_string(),
            pipeline_stage: PipelineStage::Planning,
            owner: ActorId(1),
            attendees: attendees.into_iter().map(ActorId).collect(),
            max_attendees: None,
            linked_project: None,
        }
    }

    #[test]
    fn test_create_and_get_event() {
        let store = seeded_store();
        let created = store.create(new_event(vec![2, 3, 2])).unwrap();

        assert_eq!(created.owner.username, "director");
        assert_eq!(created.attendees.len(), 2);
        assert!(created.remote_event_id.is_none());

        let loaded = store.get(created.id).unwrap().unwrap();
        assert_eq!(loaded, created);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_create_with_unknown_attendee_fails() {
        let store = seeded_store();
        let result = store.create(new_event(vec![99]));
        assert!(matches!(result, Err(EventBackendError::Validation(_))));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_update_applies_only_some_fields() {
        let store = seeded_store();
        let created = store.create(new_event(vec![2])).unwrap();

        let patch = EventPatch {
            title: Some("Quarterly review (moved)".to_string()),
            pipeline_stage: Some(PipelineStage::Confirmed),
            ..Default::default()
        };
        let updated = store.update(created.id, patch).unwrap();

        assert_eq!(updated.title, "Quarterly review (moved)");
        assert_eq!(updated.pipeline_stage, PipelineStage::Confirmed);
        assert_eq!(updated.location, "Room 4");
        assert_eq!(updated.attendees.len(), 1);
    }

    #[test]
    fn test_update_rejects_end_before_start() {
        let store = seeded_store();
        let created = store.create(new_event(vec![])).unwrap();

        let patch = EventPatch {
            end: Some(Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(created.id, patch),
            Err(EventBackendError::Validation(_))
        ));
    }

    #[test]
    fn test_set_remote_does_not_touch_other_fields() {
        let store = seeded_store();
        let created = store.create(new_event(vec![2])).unwrap();

        store
            .set_remote(created.id, "abc123", Some("https://calendar.example/abc123"))
            .unwrap();
        let loaded = store.get(created.id).unwrap().unwrap();

        assert_eq!(loaded.remote_event_id.as_deref(), Some("abc123"));
        assert_eq!(loaded.remote_link.as_deref(), Some("https://calendar.example/abc123"));
        assert_eq!(loaded.title, created.title);
        assert_eq!(loaded.updated_at, created.updated_at);
    }

    #[test]
    fn test_remote_id_is_never_shared_between_events() {
        let store = seeded_store();
        let first = store.create(new_event(vec![])).unwrap();
        let second = store.create(new_event(vec![])).unwrap();

        store.set_remote(first.id, "shared", None).unwrap();
        assert!(store.set_remote(second.id, "shared", None).is_err());
    }

    #[test]
    fn test_delete_event() {
        let store = seeded_store();
        let created = store.create(new_event(vec![2, 3])).unwrap();

        store.delete(created.id).unwrap();
        assert!(store.get(created.id).unwrap().is_none());
        assert!(matches!(store.delete(created.id), Err(EventBackendError::NotFound(_))));
    }

    #[test]
    fn test_list_is_ordered_by_start() {
        let store = seeded_store();
        let mut later = new_event(vec![]);
        later.start = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
        later.end = Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap();
        store.create(later).unwrap();
        store.create(new_event(vec![])).unwrap();

        let events = store.list().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].start < events[1].start);
    }
}
