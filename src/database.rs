use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;

use crate::models::{AuditStamp, EntryFields, EntryId, PlanningEntry};
use crate::session::Identity;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Failed to encode document: {0}")]
    EncodeError(#[from] serde_json::Error),
    #[error("Invalid collection path: {0}")]
    InvalidCollection(String),
    #[error("Document not found: {0}")]
    NotFound(EntryId),
}

/// Slash-separated path naming a collection (odd number of segments,
/// e.g. `artifacts/app/public/data/content_posts`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn parse(path: &str) -> Result<Self, DatabaseError> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        if segments.iter().any(|s| s.trim().is_empty()) || segments.len() % 2 == 0 {
            return Err(DatabaseError::InvalidCollection(path.to_string()));
        }
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full current entry set of a collection
pub type Snapshot = Vec<PlanningEntry>;

struct Subscriber {
    id: u64,
    collection: CollectionPath,
    sender: Sender<Snapshot>,
}

/// Live push stream of snapshots for one collection. Dropping it ends the
/// subscription.
pub struct Subscription {
    pub collection: CollectionPath,
    id: u64,
    receiver: Receiver<Snapshot>,
}

impl Subscription {
    /// Newest pending snapshot, skipping any older ones queued behind it
    pub fn latest(&self) -> Option<Snapshot> {
        self.receiver.try_iter().last()
    }
}

pub struct Database {
    conn: Connection,
    subscribers: RefCell<Vec<Subscriber>>,
    next_subscriber: Cell<u64>,
    data_version: Cell<i64>,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        Self::from_connection(Connection::open(&db_path)?)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        // Collaborators share one file; wait briefly instead of failing on a lock
        conn.busy_timeout(std::time::Duration::from_secs(2))?;
        let db = Database {
            conn,
            subscribers: RefCell::new(Vec::new()),
            next_subscriber: Cell::new(0),
            data_version: Cell::new(0),
        };
        db.initialize_schema()?;
        db.data_version.set(db.read_data_version()?);
        Ok(db)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id              TEXT PRIMARY KEY,
                collection      TEXT NOT NULL,
                body            TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                created_by      TEXT NOT NULL,
                updated_at      TEXT,
                updated_by      TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS identities (
                token           TEXT PRIMARY KEY,
                uid             TEXT NOT NULL,
                display_name    TEXT,
                created_at      TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
            [],
        )?;

        Ok(())
    }

    fn read_data_version(&self) -> Result<i64, DatabaseError> {
        Ok(self.conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
    }

    fn now() -> String {
        Utc::now().to_rfc3339()
    }

    fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
        value
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Insert a document and return its new identifier
    pub fn create(
        &self,
        collection: &CollectionPath,
        fields: &EntryFields,
        actor: &str,
    ) -> Result<EntryId, DatabaseError> {
        let id = EntryId::new(uuid::Uuid::new_v4().simple().to_string());
        let body = serde_json::to_string(fields)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO documents (id, collection, body, created_at, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![id.as_str(), collection.as_str(), body, Self::now(), actor],
        )?;
        tx.commit()?;

        tracing::info!(collection = %collection, id = %id, actor, "document created");
        self.notify(collection);
        Ok(id)
    }

    /// Overwrite the editable fields of a document and stamp the update
    pub fn update(
        &self,
        collection: &CollectionPath,
        id: &EntryId,
        fields: &EntryFields,
        actor: &str,
    ) -> Result<(), DatabaseError> {
        let body = serde_json::to_string(fields)?;

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE documents SET body = ?1, updated_at = ?2, updated_by = ?3
             WHERE id = ?4 AND collection = ?5",
            rusqlite::params![body, Self::now(), actor, id.as_str(), collection.as_str()],
        )?;
        tx.commit()?;

        if changed == 0 {
            return Err(DatabaseError::NotFound(id.clone()));
        }
        tracing::info!(collection = %collection, id = %id, actor, "document updated");
        self.notify(collection);
        Ok(())
    }

    /// Delete a document by ID
    pub fn delete(&self, collection: &CollectionPath, id: &EntryId) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "DELETE FROM documents WHERE id = ?1 AND collection = ?2",
            rusqlite::params![id.as_str(), collection.as_str()],
        )?;
        tx.commit()?;

        if changed == 0 {
            return Err(DatabaseError::NotFound(id.clone()));
        }
        tracing::info!(collection = %collection, id = %id, "document deleted");
        self.notify(collection);
        Ok(())
    }

    /// All documents in a collection, oldest first
    pub fn snapshot(&self, collection: &CollectionPath) -> Result<Snapshot, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, body, created_at, created_by, updated_at, updated_by
             FROM documents WHERE collection = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![collection.as_str()], Self::read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().filter_map(Self::row_to_entry).collect())
    }

    fn read_row(row: &rusqlite::Row) -> Result<RawDocument, rusqlite::Error> {
        Ok(RawDocument {
            id: row.get(0)?,
            body: row.get(1)?,
            created_at: row.get(2)?,
            created_by: row.get(3)?,
            updated_at: row.get(4)?,
            updated_by: row.get(5)?,
        })
    }

    fn row_to_entry(raw: RawDocument) -> Option<PlanningEntry> {
        let fields = match serde_json::from_str::<EntryFields>(&raw.body) {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!(id = %raw.id, error = %e, "skipping unreadable document");
                return None;
            }
        };
        Some(PlanningEntry {
            id: EntryId::new(raw.id),
            fields,
            audit: AuditStamp {
                created_at: Self::parse_timestamp(Some(raw.created_at)),
                created_by: Some(raw.created_by),
                updated_at: Self::parse_timestamp(raw.updated_at),
                updated_by: raw.updated_by,
            },
        })
    }

    /// Subscribe to a collection. The current snapshot is delivered
    /// immediately, then a fresh one after every change.
    pub fn subscribe(&self, collection: &CollectionPath) -> Result<Subscription, DatabaseError> {
        let (sender, receiver) = mpsc::channel();
        // The receiver is alive here, so this send cannot fail
        let _ = sender.send(self.snapshot(collection)?);
        let id = self.next_subscriber.get();
        self.next_subscriber.set(id + 1);
        self.subscribers.borrow_mut().push(Subscriber {
            id,
            collection: collection.clone(),
            sender,
        });
        tracing::debug!(collection = %collection, id, "subscription opened");
        Ok(Subscription {
            collection: collection.clone(),
            id,
            receiver,
        })
    }

    /// End a subscription now instead of at the next push
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.subscribers.borrow_mut().retain(|sub| sub.id != subscription.id);
        tracing::debug!(collection = %subscription.collection, id = subscription.id, "subscription closed");
    }

    /// Push a fresh snapshot to every live subscriber of `collection`,
    /// pruning subscriptions that were dropped
    fn notify(&self, collection: &CollectionPath) {
        let snapshot = match self.snapshot(collection) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(collection = %collection, error = %e, "failed to build snapshot");
                return;
            }
        };
        self.subscribers.borrow_mut().retain(|sub| {
            sub.collection != *collection || sub.sender.send(snapshot.clone()).is_ok()
        });
    }

    /// Detect commits made by other connections (collaborators sharing the
    /// file) and push fresh snapshots. Returns true when something changed.
    pub fn poll_external_changes(&self) -> Result<bool, DatabaseError> {
        let version = self.read_data_version()?;
        if version == self.data_version.get() {
            return Ok(false);
        }
        self.data_version.set(version);

        let mut collections: Vec<CollectionPath> = Vec::new();
        for sub in self.subscribers.borrow().iter() {
            if !collections.contains(&sub.collection) {
                collections.push(sub.collection.clone());
            }
        }
        for collection in &collections {
            self.notify(collection);
        }
        tracing::debug!(version, "external change detected");
        Ok(true)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Issue a pre-issued session token for a named collaborator
    pub fn issue_token(&self, display_name: &str) -> Result<(String, Identity), DatabaseError> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let uid = format!("user-{}", uuid::Uuid::new_v4().simple());
        self.conn.execute(
            "INSERT INTO identities (token, uid, display_name, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![token, uid, display_name, Self::now()],
        )?;
        Ok((
            token,
            Identity {
                uid,
                display_name: Some(display_name.to_string()),
                anonymous: false,
            },
        ))
    }

    /// Resolve a pre-issued token to its identity
    pub fn find_identity(&self, token: &str) -> Result<Option<Identity>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT uid, display_name FROM identities WHERE token = ?1")?;
        let identity = stmt
            .query_row(rusqlite::params![token], |row| {
                Ok(Identity {
                    uid: row.get(0)?,
                    display_name: row.get(1)?,
                    anonymous: false,
                })
            })
            .optional()?;
        Ok(identity)
    }

    /// Drop all subscriptions and close the connection
    pub fn close(self) -> Result<(), DatabaseError> {
        self.subscribers.borrow_mut().clear();
        self.conn.close().map_err(|(_, e)| DatabaseError::SqliteError(e))
    }
}

struct RawDocument {
    id: String,
    body: String,
    created_at: String,
    created_by: String,
    updated_at: Option<String>,
    updated_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Business, PostType, Status};

    fn collection() -> CollectionPath {
        CollectionPath::parse("artifacts/test/public/data/content_posts").unwrap()
    }

    fn fields(date: &str, title: &str) -> EntryFields {
        EntryFields {
            title: Some(title.to_string()),
            content: None,
            post_type: PostType::LocationPost,
            business: Business::Howdy,
            status: Some(Status::Idea),
            date: date.to_string(),
            image_data: None,
            external_link: None,
        }
    }

    #[test]
    fn test_collection_path_validation() {
        assert!(CollectionPath::parse("content_posts").is_ok());
        assert_eq!(collection().as_str(), "artifacts/test/public/data/content_posts");
        assert_eq!(CollectionPath::parse("/a/b/c/").unwrap().as_str(), "a/b/c");
        assert!(CollectionPath::parse("a/b").is_err());
        assert!(CollectionPath::parse("a//c").is_err());
        assert!(CollectionPath::parse("").is_err());
    }

    #[test]
    fn test_create_stamps_created_fields_only() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create(&collection(), &fields("2025-03-15", "Spring"), "user-a").unwrap();

        let snapshot = db.snapshot(&collection()).unwrap();
        let entry = &snapshot[0];
        assert_eq!(entry.id, id);
        assert!(entry.audit.created_at.is_some());
        assert_eq!(entry.audit.created_by.as_deref(), Some("user-a"));
        assert!(entry.audit.updated_at.is_none());
        assert!(entry.audit.updated_by.is_none());
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_update_overwrites_fields_and_keeps_identifier() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create(&collection(), &fields("2025-03-15", "Spring"), "user-a").unwrap();

        let mut changed = fields("2025-03-16", "Summer");
        changed.business = Business::PinkShark;
        db.update(&collection(), &id, &changed, "user-b").unwrap();

        let snapshot = db.snapshot(&collection()).unwrap();
        assert_eq!(snapshot.len(), 1);
        let entry = &snapshot[0];
        assert_eq!(entry.id, id);
        assert_eq!(entry.fields, changed);
        assert_eq!(entry.audit.created_by.as_deref(), Some("user-a"));
        assert_eq!(entry.audit.updated_by.as_deref(), Some("user-b"));
        assert!(entry.audit.updated_at.is_some());
    }

    #[test]
    fn test_update_and_delete_missing_document() {
        let db = Database::open_in_memory().unwrap();
        let missing = EntryId::new("nope");
        assert!(matches!(
            db.update(&collection(), &missing, &fields("2025-01-01", "x"), "u"),
            Err(DatabaseError::NotFound(_))
        ));
        assert!(matches!(db.delete(&collection(), &missing), Err(DatabaseError::NotFound(_))));
    }

    #[test]
    fn test_collections_are_isolated() {
        let db = Database::open_in_memory().unwrap();
        let other = CollectionPath::parse("other_posts").unwrap();
        db.create(&collection(), &fields("2025-03-15", "Shared"), "u").unwrap();
        assert!(db.snapshot(&other).unwrap().is_empty());
    }

    #[test]
    fn test_subscription_receives_initial_and_pushed_snapshots() {
        let db = Database::open_in_memory().unwrap();
        let sub = db.subscribe(&collection()).unwrap();
        assert_eq!(sub.latest().map(|s| s.len()), Some(0));
        assert!(sub.latest().is_none());

        let id = db.create(&collection(), &fields("2025-03-15", "One"), "u").unwrap();
        db.create(&collection(), &fields("2025-03-16", "Two"), "u").unwrap();
        assert_eq!(sub.latest().map(|s| s.len()), Some(2));

        db.delete(&collection(), &id).unwrap();
        let after = sub.latest().unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].fields.title.as_deref(), Some("Two"));
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let db = Database::open_in_memory().unwrap();
        let sub = db.subscribe(&collection()).unwrap();
        assert_eq!(db.subscriber_count(), 1);
        drop(sub);
        db.create(&collection(), &fields("2025-03-15", "One"), "u").unwrap();
        assert_eq!(db.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_subscriber() {
        let db = Database::open_in_memory().unwrap();
        let first = db.subscribe(&collection()).unwrap();
        let second = db.subscribe(&collection()).unwrap();
        assert_eq!(db.subscriber_count(), 2);

        db.unsubscribe(first);
        assert_eq!(db.subscriber_count(), 1);
        let _ = second.latest();
        db.create(&collection(), &fields("2025-03-15", "One"), "u").unwrap();
        assert_eq!(second.latest().map(|s| s.len()), Some(1));
    }

    #[test]
    fn test_malformed_enum_and_date_values_stay_visible() {
        let db = Database::open_in_memory().unwrap();
        let bodies = [
            ("null-business", r#"{"business":null,"type":"BLOG","date":"2025-03-01"}"#),
            ("null-type", r#"{"business":"PINK","type":null,"date":"2025-03-02"}"#),
            ("numeric-business", r#"{"business":42,"status":7,"date":null}"#),
            ("unknown", r#"{"business":"ACME","type":"TWEET","date":"2025-03-04"}"#),
        ];
        for (id, body) in bodies {
            db.conn
                .execute(
                    "INSERT INTO documents (id, collection, body, created_at, created_by)
                     VALUES (?1, ?2, ?3, '2025-01-01T00:00:00Z', 'u')",
                    rusqlite::params![id, collection().as_str(), body],
                )
                .unwrap();
        }

        let snapshot = db.snapshot(&collection()).unwrap();
        assert_eq!(snapshot.len(), 4);
        let by_id = |id: &str| snapshot.iter().find(|e| e.id.as_str() == id).unwrap();
        assert_eq!(by_id("null-business").fields.business, Business::Howdy);
        assert_eq!(by_id("null-business").fields.post_type, PostType::MonthlyBlog);
        assert_eq!(by_id("null-type").fields.post_type, PostType::LocationPost);
        assert_eq!(by_id("numeric-business").fields.business, Business::Howdy);
        assert_eq!(by_id("numeric-business").fields.status, None);
        assert_eq!(by_id("numeric-business").fields.date, "");
        assert_eq!(by_id("unknown").fields.business, Business::Howdy);
    }

    #[test]
    fn test_unreadable_documents_are_skipped() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO documents (id, collection, body, created_at, created_by)
                 VALUES ('bad', ?1, 'not json', '2025-01-01T00:00:00Z', 'u')",
                rusqlite::params![collection().as_str()],
            )
            .unwrap();
        db.create(&collection(), &fields("2025-03-15", "Good"), "u").unwrap();
        let snapshot = db.snapshot(&collection()).unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_external_writes_are_pushed_to_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let path = path.to_str().unwrap();

        let mine = Database::new(path).unwrap();
        let theirs = Database::new(path).unwrap();
        let sub = mine.subscribe(&collection()).unwrap();
        let _ = sub.latest();

        assert!(!mine.poll_external_changes().unwrap());
        theirs.create(&collection(), &fields("2025-03-15", "From collaborator"), "user-b").unwrap();
        assert!(mine.poll_external_changes().unwrap());

        let snapshot = sub.latest().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].audit.created_by.as_deref(), Some("user-b"));
    }

    #[test]
    fn test_issue_and_find_token() {
        let db = Database::open_in_memory().unwrap();
        let (token, identity) = db.issue_token("Jess").unwrap();
        let found = db.find_identity(&token).unwrap().unwrap();
        assert_eq!(found, identity);
        assert_eq!(found.display_name.as_deref(), Some("Jess"));
        assert!(db.find_identity("unknown").unwrap().is_none());
    }
}
