use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;

use crate::database::{Database, DatabaseError};

/// Signed-in collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
    pub anonymous: bool,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            uid: format!("anon-{}", uuid::Uuid::new_v4().simple()),
            display_name: None,
            anonymous: true,
        }
    }

    pub fn display(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) => name,
            None if self.anonymous => "Anonymous",
            None => &self.uid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Identity),
    SignedOut,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Sign-in token was not recognized")]
    InvalidToken,
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

/// Owns the current session and notifies listeners when it changes
#[derive(Default)]
pub struct SessionManager {
    current: Option<Identity>,
    listeners: Vec<Sender<SessionEvent>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.is_some()
    }

    /// Listen for session changes. The current state is delivered first.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (sender, receiver) = mpsc::channel();
        let initial = match &self.current {
            Some(identity) => SessionEvent::SignedIn(identity.clone()),
            None => SessionEvent::SignedOut,
        };
        let _ = sender.send(initial);
        self.listeners.push(sender);
        receiver
    }

    /// Sign in with a pre-issued token when one is supplied, otherwise as an
    /// anonymous collaborator
    pub fn establish(&mut self, database: &Database, token: Option<&str>) -> Result<Identity, AuthError> {
        let identity = match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => database.find_identity(token)?.ok_or(AuthError::InvalidToken)?,
            None => Identity::anonymous(),
        };
        tracing::info!(uid = %identity.uid, anonymous = identity.anonymous, "signed in");
        self.current = Some(identity.clone());
        self.broadcast(SessionEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    pub fn sign_out(&mut self) {
        if let Some(identity) = self.current.take() {
            tracing::info!(uid = %identity.uid, "signed out");
            self.broadcast(SessionEvent::SignedOut);
        }
    }

    fn broadcast(&mut self, event: SessionEvent) {
        self.listeners.retain(|listener| listener.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_session_without_token() {
        let db = Database::open_in_memory().unwrap();
        let mut session = SessionManager::new();
        let identity = session.establish(&db, None).unwrap();
        assert!(identity.anonymous);
        assert!(identity.uid.starts_with("anon-"));
        assert_eq!(session.current(), Some(&identity));
    }

    #[test]
    fn test_blank_token_is_treated_as_absent() {
        let db = Database::open_in_memory().unwrap();
        let mut session = SessionManager::new();
        assert!(session.establish(&db, Some("  ")).unwrap().anonymous);
    }

    #[test]
    fn test_pre_issued_token_signs_in_named_identity() {
        let db = Database::open_in_memory().unwrap();
        let (token, issued) = db.issue_token("Jess").unwrap();
        let mut session = SessionManager::new();
        let identity = session.establish(&db, Some(&token)).unwrap();
        assert_eq!(identity, issued);
        assert_eq!(identity.display(), "Jess");
    }

    #[test]
    fn test_unknown_token_leaves_session_signed_out() {
        let db = Database::open_in_memory().unwrap();
        let mut session = SessionManager::new();
        assert!(matches!(session.establish(&db, Some("bogus")), Err(AuthError::InvalidToken)));
        assert!(!session.is_signed_in());
    }

    #[test]
    fn test_listeners_see_state_changes() {
        let db = Database::open_in_memory().unwrap();
        let mut session = SessionManager::new();
        let events = session.subscribe();
        assert_eq!(events.try_recv().unwrap(), SessionEvent::SignedOut);

        let identity = session.establish(&db, None).unwrap();
        assert_eq!(events.try_recv().unwrap(), SessionEvent::SignedIn(identity));

        session.sign_out();
        assert_eq!(events.try_recv().unwrap(), SessionEvent::SignedOut);
        // Signing out twice is silent
        session.sign_out();
        assert!(events.try_recv().is_err());
    }
}
