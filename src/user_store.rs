//! User registry and credential verification.
//!
//! Users live in an embedded sled database: one tree mapping user id to the
//! stored record, and one mapping username to user id as a uniqueness index.
//! Passwords are stored as argon2id PHC strings and never leave this module.

use std::path::PathBuf;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use tracing::{event, Level};
use uuid::Uuid;

use crate::cli::CommandLineArgs;
use crate::error::EquistatError;
use crate::models::UserInfo;

/// Resolved identity of an authenticated request.
#[derive(Clone, Debug, PartialEq)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

/// Stored record for one user.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    /// Argon2id PHC string.
    password_hash: String,
}

impl UserRecord {
    /// The identity carried through request handling.
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
        }
    }

    /// Convert to the wire representation.
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
        }
    }
}

/// sled-backed user registry.
pub struct UserStore {
    /// Handle to the embedded database, used for flushing.
    db: sled::Db,

    /// user id -> JSON-encoded [UserRecord].
    users: sled::Tree,

    /// username -> user id, the uniqueness index.
    usernames: sled::Tree,
}

impl UserStore {
    /// Open or create a registry under the configured data directory.
    pub fn new(args: &CommandLineArgs) -> Result<Self, EquistatError> {
        let data_dir = PathBuf::from(&args.data_dir);
        std::fs::create_dir_all(&data_dir)?;
        let db = sled::open(data_dir.join("users"))?;
        let users = db.open_tree("users")?;
        let usernames = db.open_tree("usernames")?;
        Ok(Self {
            db,
            users,
            usernames,
        })
    }

    /// Register a new user with a freshly hashed password.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
        is_admin: bool,
    ) -> Result<UserRecord, EquistatError> {
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            is_admin,
            password_hash: hash_password(password)?,
        };
        // Claim the username first; compare-and-swap keeps it unique under
        // concurrent registrations.
        let claim = self.usernames.compare_and_swap(
            username.as_bytes(),
            None as Option<&[u8]>,
            Some(record.id.to_string().as_bytes()),
        )?;
        if claim.is_err() {
            return Err(EquistatError::UsernameTaken {
                username: username.to_string(),
            });
        }
        self.users
            .insert(record.id.to_string().as_bytes(), serde_json::to_vec(&record)?)?;
        self.db.flush_async().await?;
        Ok(record)
    }

    /// Verify credentials and return the caller's principal.
    ///
    /// Unknown usernames and wrong passwords produce the same error, so the
    /// registry cannot be probed for usernames.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Principal, EquistatError> {
        let record = match self.get_by_username(username)? {
            Some(record) => record,
            None => return Err(EquistatError::InvalidCredentials),
        };
        verify_password(password, &record.password_hash)?;
        Ok(record.principal())
    }

    /// Return the record for a user.
    pub fn get(&self, id: Uuid) -> Result<UserRecord, EquistatError> {
        match self.users.get(id.to_string().as_bytes())? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Err(EquistatError::UserNotFound { user_id: id }),
        }
    }

    /// All users, ordered by username.
    pub fn list(&self) -> Result<Vec<UserRecord>, EquistatError> {
        let mut users: Vec<UserRecord> = Vec::new();
        for entry in self.users.iter() {
            let (_, raw) = entry?;
            users.push(serde_json::from_slice(&raw)?);
        }
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    /// Delete a user and release their username.
    pub async fn delete(&self, id: Uuid) -> Result<UserRecord, EquistatError> {
        let record = self.get(id)?;
        self.users.remove(id.to_string().as_bytes())?;
        self.usernames.remove(record.username.as_bytes())?;
        self.db.flush_async().await?;
        Ok(record)
    }

    /// Ensure the administrator account from the command line exists.
    pub async fn ensure_admin(&self, args: &CommandLineArgs) -> Result<(), EquistatError> {
        let (username, password) = match (&args.admin_username, &args.admin_password) {
            (Some(username), Some(password)) => (username, password),
            _ => return Ok(()),
        };
        if self.get_by_username(username)?.is_some() {
            return Ok(());
        }
        let email = args.admin_email.clone().unwrap_or_default();
        self.register(username, password, &email, true).await?;
        event!(Level::INFO, username = %username, "created administrator account");
        Ok(())
    }

    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>, EquistatError> {
        let id = match self.usernames.get(username.as_bytes())? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match self.users.get(&id)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }
}

/// Hash a password with argon2id and a random salt, producing a PHC string.
fn hash_password(password: &str) -> Result<String, EquistatError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| EquistatError::PasswordHash {
            detail: err.to_string(),
        })
}

/// Verify a password against a stored PHC string.
///
/// A mismatch is an invalid-credentials error; a stored hash that does not
/// parse is a server error.
fn verify_password(password: &str, password_hash: &str) -> Result<(), EquistatError> {
    let parsed = PasswordHash::new(password_hash).map_err(|err| EquistatError::PasswordHash {
        detail: err.to_string(),
    })?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| EquistatError::InvalidCredentials)
}
