//! Session and page controller
//!
//! Decides which view is current and whether the viewer is authenticated.
//! The controller owns one stored-credential slot through [`CredentialStore`];
//! in the HTTP layer that slot is the session cookie, in tests it is memory.

use crate::models::{PageName, Session};
use crate::services::credentials::CredentialTable;
use crate::services::token::{SessionCodec, TokenError};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Error types for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Username/password pair not in the credential table
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// The single slot a credential is persisted under
pub trait CredentialStore {
    fn load(&self) -> Option<String>;
    fn store(&mut self, credential: String);
    fn clear(&mut self);
}

/// Credential slot held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Option<String>,
}

impl MemoryCredentialStore {
    pub fn with(credential: impl Into<String>) -> Self {
        Self {
            slot: Some(credential.into()),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<String> {
        self.slot.clone()
    }

    fn store(&mut self, credential: String) {
        self.slot = Some(credential);
    }

    fn clear(&mut self) {
        self.slot = None;
    }
}

/// Whether a viewer may see a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAccess {
    Allowed,
    /// Needs a login (or an admin login for the admin page)
    LoginRequired,
}

/// Page/session state machine for one viewer
pub struct SessionController<S: CredentialStore> {
    codec: Arc<SessionCodec>,
    credentials: Arc<CredentialTable>,
    ttl: Duration,
    store: S,
    session: Option<Session>,
    current_page: PageName,
}

impl<S: CredentialStore> SessionController<S> {
    pub fn new(
        codec: Arc<SessionCodec>,
        credentials: Arc<CredentialTable>,
        ttl: Duration,
        store: S,
    ) -> Self {
        Self {
            codec,
            credentials,
            ttl,
            store,
            session: None,
            current_page: PageName::Home,
        }
    }

    /// Adopt the stored credential if it decodes and has not expired.
    ///
    /// Anything else clears the slot and leaves the viewer logged out.
    pub fn restore_session(&mut self) -> Option<&Session> {
        self.restore_session_at(Utc::now())
    }

    pub fn restore_session_at(&mut self, now: DateTime<Utc>) -> Option<&Session> {
        self.session = None;

        let credential = self.store.load()?;
        match self.codec.decode(&credential) {
            Ok(session) if !session.is_expired_at(now) => {
                self.session = Some(session);
            }
            Ok(session) => {
                tracing::debug!("Discarding expired credential for {}", session.username);
                self.store.clear();
            }
            Err(e) => {
                tracing::debug!("Discarding stored credential: {}", e);
                self.store.clear();
            }
        }

        self.session.as_ref()
    }

    /// Check the pair against the credential table and open a session.
    ///
    /// On failure nothing changes: no session, no stored credential, same page.
    pub fn login(&mut self, username: &str, password: &str) -> Result<&Session, SessionError> {
        self.login_at(username, password, Utc::now())
    }

    pub fn login_at(
        &mut self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<&Session, SessionError> {
        let account = self
            .credentials
            .authenticate(username, password)
            .ok_or(SessionError::InvalidCredentials)?;

        let session = Session::for_account(account, now, self.ttl);
        let credential = self.codec.encode(&session)?;

        tracing::info!("User {} logged in as {}", session.username, session.role);
        self.store.store(credential);
        self.current_page = session.role.landing_page();
        Ok(self.session.insert(session))
    }

    /// Drop the session and stored credential, back to home
    pub fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!("User {} logged out", session.username);
        }
        self.store.clear();
        self.current_page = PageName::Home;
    }

    /// Switch to the named page. Unknown identifiers leave the view unchanged.
    pub fn navigate(&mut self, page: &str) -> Option<PageName> {
        let page = PageName::parse(page)?;
        self.current_page = page;
        Some(page)
    }

    pub fn current_page(&self) -> PageName {
        self.current_page
    }

    /// The current session, if one is open and still valid
    pub fn session(&self) -> Option<&Session> {
        self.session_at(Utc::now())
    }

    pub fn session_at(&self, now: DateTime<Utc>) -> Option<&Session> {
        self.session.as_ref().filter(|s| !s.is_expired_at(now))
    }

    pub fn is_logged_in(&self) -> bool {
        self.session().is_some()
    }

    /// Render-time access rule for a page
    pub fn access(&self, page: PageName) -> PageAccess {
        match (page, self.session()) {
            (PageName::User, None) => PageAccess::LoginRequired,
            (PageName::Admin, Some(s)) if s.is_admin() => PageAccess::Allowed,
            (PageName::Admin, _) => PageAccess::LoginRequired,
            _ => PageAccess::Allowed,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
