use std::sync::mpsc::Receiver;

use crate::config::Config;
use crate::database::{CollectionPath, Database, DatabaseError, Snapshot, Subscription};
use crate::models::{EntryFields, EntryId};
use crate::session::{AuthError, Identity, SessionEvent, SessionManager};

/// Backend collaborators for one client: the shared store, the session and
/// the live subscription to the workspace collection.
///
/// Built once in `main` and handed to whoever needs it. The subscription only
/// exists while a session does.
pub struct Services {
    database: Database,
    session: SessionManager,
    collection: CollectionPath,
    subscription: Option<Subscription>,
    session_events: Receiver<SessionEvent>,
}

impl Services {
    pub fn new(database: Database, collection: CollectionPath) -> Self {
        let mut session = SessionManager::new();
        let session_events = session.subscribe();
        Self {
            database,
            session,
            collection,
            subscription: None,
            session_events,
        }
    }

    /// Open the configured database without signing in
    pub fn open(config: &Config) -> Result<Self, DatabaseError> {
        let collection = CollectionPath::parse(&config.collection_path)?;
        let path = config.get_database_path();
        let database = Database::new(&path.to_string_lossy())?;
        tracing::info!(database = %path.display(), collection = %collection, "services opened");
        Ok(Self::new(database, collection))
    }

    pub fn open_in_memory(collection: &str) -> Result<Self, DatabaseError> {
        Ok(Self::new(Database::open_in_memory()?, CollectionPath::parse(collection)?))
    }

    /// Open the database and establish a session. A rejected token is handed
    /// back for display; the services stay usable but signed out.
    pub fn start(config: &Config, token: Option<&str>) -> Result<(Self, Option<AuthError>), DatabaseError> {
        let mut services = Self::open(config)?;
        let rejected = match services.sign_in(token) {
            Ok(_) => None,
            Err(AuthError::DatabaseError(e)) => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "sign-in failed");
                Some(e)
            }
        };
        Ok((services, rejected))
    }

    pub fn sign_in(&mut self, token: Option<&str>) -> Result<Identity, AuthError> {
        let identity = self.session.establish(&self.database, token)?;
        self.pump_session_events()?;
        Ok(identity)
    }

    pub fn sign_out(&mut self) {
        self.session.sign_out();
        // Sign-out cannot fail to apply; only a resubscribe touches the database
        let _ = self.pump_session_events();
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.current()
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    fn pump_session_events(&mut self) -> Result<(), DatabaseError> {
        while let Ok(event) = self.session_events.try_recv() {
            match event {
                SessionEvent::SignedIn(_) => {
                    if self.subscription.is_none() {
                        self.subscription = Some(self.database.subscribe(&self.collection)?);
                    }
                }
                SessionEvent::SignedOut => {
                    if let Some(subscription) = self.subscription.take() {
                        self.database.unsubscribe(subscription);
                    }
                }
            }
        }
        Ok(())
    }

    /// React to session changes and collaborator writes, returning the newest
    /// snapshot if one arrived since the last call
    pub fn pump(&mut self) -> Result<Option<Snapshot>, DatabaseError> {
        self.pump_session_events()?;
        let Some(subscription) = &self.subscription else {
            return Ok(None);
        };
        self.database.poll_external_changes()?;
        Ok(subscription.latest())
    }

    /// Create the entry when `id` is absent, otherwise overwrite it.
    /// Returns `Ok(false)` without touching the store when signed out.
    pub fn save(&self, id: Option<&EntryId>, fields: &EntryFields) -> Result<bool, DatabaseError> {
        let Some(identity) = self.session.current() else {
            tracing::debug!("save ignored without a session");
            return Ok(false);
        };
        match id {
            Some(id) => self.database.update(&self.collection, id, fields, &identity.uid)?,
            None => {
                self.database.create(&self.collection, fields, &identity.uid)?;
            }
        }
        Ok(true)
    }

    /// Returns `Ok(false)` without touching the store when signed out
    pub fn delete(&self, id: &EntryId) -> Result<bool, DatabaseError> {
        if !self.session.is_signed_in() {
            tracing::debug!(id = %id, "delete ignored without a session");
            return Ok(false);
        }
        self.database.delete(&self.collection, id)?;
        Ok(true)
    }

    /// Drop the subscription, end the session and close the connection
    pub fn shutdown(mut self) -> Result<(), DatabaseError> {
        if let Some(subscription) = self.subscription.take() {
            self.database.unsubscribe(subscription);
        }
        self.session.sign_out();
        tracing::info!("services shut down");
        self.database.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryDraft, PostType};
    use chrono::NaiveDate;

    const COLLECTION: &str = "artifacts/test/public/data/content_posts";

    fn fields(day: u32, title: &str) -> EntryFields {
        EntryDraft::for_date(NaiveDate::from_ymd_opt(2025, 3, day).unwrap(), None)
            .with_title(title)
            .validate()
            .unwrap()
    }

    #[test]
    fn test_signed_out_writes_are_no_ops() {
        let services = Services::open_in_memory(COLLECTION).unwrap();
        assert!(!services.save(None, &fields(1, "Nope")).unwrap());
        assert!(!services.delete(&EntryId::new("x")).unwrap());
        assert!(services.database().snapshot(services.collection()).unwrap().is_empty());
    }

    #[test]
    fn test_subscription_follows_session() {
        let mut services = Services::open_in_memory(COLLECTION).unwrap();
        assert!(!services.is_live());
        assert!(services.pump().unwrap().is_none());

        services.sign_in(None).unwrap();
        assert!(services.is_live());
        assert_eq!(services.pump().unwrap().map(|s| s.len()), Some(0));

        services.sign_out();
        assert!(!services.is_live());
        assert_eq!(services.database().subscriber_count(), 0);

        // Repeated cycles without writes do not pile up subscribers
        for _ in 0..3 {
            services.sign_in(None).unwrap();
            services.sign_out();
        }
        assert_eq!(services.database().subscriber_count(), 0);
    }

    #[test]
    fn test_save_creates_then_updates() {
        let mut services = Services::open_in_memory(COLLECTION).unwrap();
        let identity = services.sign_in(None).unwrap();
        let _ = services.pump().unwrap();

        assert!(services.save(None, &fields(15, "Spring")).unwrap());
        let snapshot = services.pump().unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        let entry = &snapshot[0];
        assert_eq!(entry.audit.created_by.as_deref(), Some(identity.uid.as_str()));

        let updated = EntryDraft::from_entry(entry)
            .with_post_type(PostType::MonthlyBlog)
            .validate()
            .unwrap();
        assert!(services.save(Some(&entry.id), &updated).unwrap());
        let snapshot = services.pump().unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, entry.id);
        assert_eq!(snapshot[0].fields.post_type, PostType::MonthlyBlog);

        assert!(services.delete(&entry.id).unwrap());
        assert!(services.pump().unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_start_reports_rejected_token() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: dir.path().join("calendar.db").to_string_lossy().to_string(),
            ..Config::default()
        };
        let (services, rejected) = Services::start(&config, Some("bogus")).unwrap();
        assert!(matches!(rejected, Some(AuthError::InvalidToken)));
        assert!(services.identity().is_none());
        assert!(!services.is_live());
        services.shutdown().unwrap();

        let (services, rejected) = Services::start(&config, None).unwrap();
        assert!(rejected.is_none());
        assert!(services.identity().unwrap().anonymous);
        services.shutdown().unwrap();
    }
}
