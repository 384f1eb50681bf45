//! Assigns and reads the session identity that scopes a client's transactions.
//!
//! A session is issued on the first write and stored in a private cookie, so
//! the client cannot forge or tamper with the cookie to act as another
//! session. Reads never issue a session: a client without one simply has no
//! transactions.

use std::fmt::{self, Display};

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::Duration;
use uuid::Uuid;

pub(crate) const COOKIE_SESSION_ID: &str = "sessionId";
/// How long the session cookie lives in the client.
pub(crate) const DEFAULT_SESSION_DURATION: Duration = Duration::days(7);

/// An opaque identifier for one client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new, random session ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a session ID, returning `None` if `text` is not a valid ID.
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text)
            .ok()
            .map(|uuid| Self(uuid.hyphenated().to_string()))
    }

    /// The ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for SessionId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for SessionId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(|id| Self(id.to_owned()))
    }
}

/// The settings used when issuing a session cookie.
#[derive(Debug, Clone, Copy)]
pub struct SessionCookieSettings {
    /// How long the cookie lives in the client.
    pub duration: Duration,
    /// Whether the cookie should only be sent over HTTPS.
    pub secure: bool,
}

impl Default for SessionCookieSettings {
    fn default() -> Self {
        Self {
            duration: DEFAULT_SESSION_DURATION,
            secure: false,
        }
    }
}

/// Get the session ID from `jar`.
///
/// Returns `None` if the cookie is missing, cannot be decrypted, or does not
/// hold a valid session ID.
pub(crate) fn get_session_id(jar: &PrivateCookieJar) -> Option<SessionId> {
    jar.get(COOKIE_SESSION_ID)
        .and_then(|cookie| SessionId::parse(cookie.value_trimmed()))
}

/// Get the session ID from `jar`, issuing a new session if there is none.
///
/// The returned jar holds the new cookie if one was issued, and must be
/// included in the response for the client to receive it.
pub(crate) fn get_or_create_session(
    jar: PrivateCookieJar,
    settings: SessionCookieSettings,
) -> (PrivateCookieJar, SessionId) {
    if let Some(session_id) = get_session_id(&jar) {
        return (jar, session_id);
    }

    let session_id = SessionId::generate();
    tracing::debug!("Issuing new session {session_id}");

    (set_session_cookie(jar, &session_id, settings), session_id)
}

fn set_session_cookie(
    jar: PrivateCookieJar,
    session_id: &SessionId,
    settings: SessionCookieSettings,
) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION_ID, session_id.to_string()))
            .path("/")
            .max_age(settings.duration)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(settings.secure),
    )
}
