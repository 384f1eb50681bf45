//! Defines the endpoint for creating a new transaction.
use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
};
use axum_extra::extract::PrivateCookieJar;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    session::{SessionCookieSettings, get_or_create_session},
    transaction::core::{NewTransaction, TransactionType, create_transaction},
};

/// The state needed to create a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// How to issue a session cookie to new clients.
    pub session_settings: SessionCookieSettings,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            session_settings: state.session_settings,
        }
    }
}

/// The JSON body for creating a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionForm {
    /// A short description of the transaction.
    pub title: String,
    /// The unsigned value of the transaction.
    pub amount: Decimal,
    /// Either "credit" or "debit".
    ///
    /// Kept as text so that an unknown type is reported as a validation error.
    #[serde(rename = "type")]
    pub kind: String,
}

/// A route handler for creating a new transaction, responds with 201 Created.
///
/// A new session is issued via the response cookies if the client does not
/// have one yet. Nothing is stored and no session is issued if the body is
/// invalid.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    jar: PrivateCookieJar,
    payload: Result<Json<TransactionForm>, JsonRejection>,
) -> Result<(StatusCode, PrivateCookieJar), Error> {
    let Json(form) = payload?;
    let kind: TransactionType = form.kind.parse()?;
    let new_transaction = NewTransaction::new(&form.title, form.amount, kind)?;

    let (jar, session_id) = get_or_create_session(jar, state.session_settings);

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let transaction = create_transaction(&session_id, new_transaction, &connection)?;

    tracing::debug!(
        "Created transaction {} for session {}",
        transaction.id,
        session_id
    );

    Ok((StatusCode::CREATED, jar))
}
