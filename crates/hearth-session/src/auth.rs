//! Credential checks for `Login`.
//!
//! Hearth doesn't store accounts itself. A [`CredentialStore`] answers one
//! question: does this username/password pair belong to someone, and what
//! should they be called? Production deployments back it with a database
//! or an auth service; [`MemoryCredentialStore`] covers tests and demos.
//!
//! [`Authenticator`] wraps a store with the rules the server enforces on
//! every lookup: usernames are trimmed and lowercased, and a store that
//! does not answer within the timeout is reported as
//! [`AuthError::Unavailable`] instead of stalling the caller.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::AuthError;

/// Who a successful lookup says the player is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub display_name: String,
}

/// Failure reported by a [`CredentialStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// No such account, or the password does not match.
    #[error("credentials rejected")]
    Rejected,

    /// The store itself is down or misbehaving.
    #[error("credential store unreachable: {0}")]
    Unreachable(String),
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Rejected => Self::BadCredentials,
            CredentialError::Unreachable(detail) => Self::Unavailable(detail),
        }
    }
}

/// An external source of accounts.
///
/// `username` arrives already normalized (trimmed, lowercase, non-empty).
///
/// # Example
///
/// ```rust
/// use hearth_session::{CredentialError, CredentialStore, Identity};
///
/// /// Lets anyone in whose password equals their name reversed.
/// struct MirrorStore;
///
/// impl CredentialStore for MirrorStore {
///     async fn validate(
///         &self,
///         username: &str,
///         password: &str,
///     ) -> Result<Identity, CredentialError> {
///         let reversed: String = username.chars().rev().collect();
///         if password == reversed {
///             Ok(Identity { display_name: username.to_owned() })
///         } else {
///             Err(CredentialError::Rejected)
///         }
///     }
/// }
/// ```
pub trait CredentialStore: Send + Sync + 'static {
    fn validate(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, CredentialError>> + Send;
}

/// Normalizes usernames and bounds every store lookup by a timeout.
#[derive(Debug)]
pub struct Authenticator<S> {
    store: S,
    timeout: Duration,
}

impl<S: CredentialStore> Authenticator<S> {
    pub fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Checks a username/password pair against the store.
    ///
    /// # Errors
    /// - [`AuthError::BadCredentials`] for a blank username or a rejected pair
    /// - [`AuthError::Unavailable`] if the store errors or exceeds the timeout
    pub async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let Some(username) = normalize_username(username) else {
            return Err(AuthError::BadCredentials);
        };

        match tokio::time::timeout(
            self.timeout,
            self.store.validate(&username, password),
        )
        .await
        {
            Ok(Ok(identity)) => Ok(identity),
            Ok(Err(err)) => {
                tracing::debug!(%username, error = %err, "credential check failed");
                Err(err.into())
            }
            Err(_) => {
                tracing::warn!(
                    %username,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "credential store timed out"
                );
                Err(AuthError::Unavailable("credential store timed out".into()))
            }
        }
    }
}

/// Trims and lowercases; `None` for names that are blank after trimming.
pub fn normalize_username(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// A fixed set of accounts held in memory.
///
/// Usernames are normalized on insert, so `"Alice"` and `"alice"` are the
/// same account.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    accounts: HashMap<String, String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an account. Blank usernames are ignored.
    pub fn insert(&mut self, username: &str, password: impl Into<String>) {
        if let Some(name) = normalize_username(username) {
            self.accounts.insert(name, password.into());
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_account(mut self, username: &str, password: impl Into<String>) -> Self {
        self.insert(username, password);
        self
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn validate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, CredentialError> {
        match self.accounts.get(username) {
            Some(stored) if stored == password => Ok(Identity {
                display_name: username.to_owned(),
            }),
            _ => Err(CredentialError::Rejected),
        }
    }
}
