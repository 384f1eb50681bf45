//! Defines the endpoint for the balance of a session's transactions.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use axum_extra::extract::PrivateCookieJar;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    session::get_session_id,
    transaction::core::{Summary, get_summary},
};

/// The state needed to summarise transactions.
#[derive(Debug, Clone)]
pub struct SummaryState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SummaryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The JSON body for the summary of a session's transactions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    /// The balance of the session.
    pub summary: Summary,
}

/// A route handler for the sum of the client's transactions.
///
/// Clients without a session get a balance of zero.
pub async fn get_summary_endpoint(
    State(state): State<SummaryState>,
    jar: PrivateCookieJar,
) -> Result<Json<SummaryResponse>, Error> {
    let Some(session_id) = get_session_id(&jar) else {
        return Ok(Json(SummaryResponse {
            summary: Summary {
                amount: Decimal::ZERO,
            },
        }));
    };

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let summary = get_summary(&session_id, &connection)?;

    Ok(Json(SummaryResponse { summary }))
}
