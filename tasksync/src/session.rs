//! Cached user profile and the secure session token.
//!
//! The profile is an ordinary blob under `user` in the regular store. The
//! token only ever goes to the secure store under `session_token`, and its
//! in-memory copy is wiped on drop.

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroizing;

use tasksync_model::codec::{self, BlobFormat};
use tasksync_model::user::UserProfile;

use crate::storage::{KeyValueStore, StorageError, keys};

/// Opaque bearer secret for the backend session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(Zeroizing<String>);

impl SessionToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    /// The raw token.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Reads and writes the signed-in user's profile and token.
pub struct SessionStore<K: KeyValueStore, S: KeyValueStore> {
    kv: Arc<K>,
    secure: Arc<S>,
    format: BlobFormat,
}

impl<K: KeyValueStore, S: KeyValueStore> SessionStore<K, S> {
    /// Create a session store using `kv` for the profile and `secure` for
    /// the token.
    #[must_use]
    pub const fn new(kv: Arc<K>, secure: Arc<S>, format: BlobFormat) -> Self {
        Self { kv, secure, format }
    }

    /// Cache `user` as the signed-in profile.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the profile cannot be encoded or written.
    pub async fn save_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        let blob = codec::encode(self.format, user)?;
        self.kv.set(keys::USER, blob).await?;
        tracing::debug!(user_id = %user.id, "user profile cached");
        Ok(())
    }

    /// The cached profile, if any. An undecodable blob reads as absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store cannot be read.
    pub async fn load_user(&self) -> Result<Option<UserProfile>, StorageError> {
        let Some(blob) = self.kv.get(keys::USER).await? else {
            return Ok(None);
        };
        match codec::decode(self.format, &blob) {
            Ok(user) => Ok(Some(user)),
            Err(err) => {
                tracing::warn!(error = %err, "cached user profile undecodable, ignoring");
                Ok(None)
            }
        }
    }

    /// Forget the cached profile.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the entry cannot be removed.
    pub async fn clear_user(&self) -> Result<(), StorageError> {
        self.kv.remove(keys::USER).await
    }

    /// Store `token` in the secure store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the token cannot be written.
    pub async fn save_token(&self, token: &SessionToken) -> Result<(), StorageError> {
        self.secure
            .set(keys::SESSION_TOKEN, token.expose().as_bytes().to_vec())
            .await
    }

    /// The stored token, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the secure store cannot be read or the
    /// entry is not UTF-8.
    pub async fn load_token(&self) -> Result<Option<SessionToken>, StorageError> {
        let Some(bytes) = self.secure.get(keys::SESSION_TOKEN).await? else {
            return Ok(None);
        };
        let bytes = Zeroizing::new(bytes);
        let token = std::str::from_utf8(&bytes).map_err(|e| StorageError::ReadFailed {
            key: keys::SESSION_TOKEN.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(SessionToken::new(token)))
    }

    /// Remove the stored token.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the entry cannot be removed.
    pub async fn clear_token(&self) -> Result<(), StorageError> {
        self.secure.remove(keys::SESSION_TOKEN).await
    }

    /// Clear both the profile and the token.
    ///
    /// # Errors
    ///
    /// Returns the first [`StorageError`] encountered.
    pub async fn sign_out(&self) -> Result<(), StorageError> {
        self.clear_token().await?;
        self.clear_user().await?;
        tracing::info!("signed out");
        Ok(())
    }
}
