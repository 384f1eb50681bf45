//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};

use crate::{
    Error,
    config::{AppEnvironment, Config},
    db::initialize,
    session::SessionCookieSettings,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// How session cookies are issued.
    pub session_settings: SessionCookieSettings,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// The cookie key is derived from `config.session_secret` if it is set,
    /// otherwise a random key is used and sessions will not survive a restart.
    /// Session cookies are marked secure in production.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection, config: &Config) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let cookie_key = match config.session_secret.as_deref() {
            Some(secret) => create_cookie_key(secret),
            None => {
                tracing::warn!("SESSION_SECRET is not set, sessions will reset on restart");
                Key::generate()
            }
        };

        let session_settings = SessionCookieSettings {
            secure: config.environment == AppEnvironment::Production,
            ..Default::default()
        };

        Ok(Self {
            cookie_key,
            session_settings,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
