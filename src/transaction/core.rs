//! Defines the core data models and database queries for transactions.

use std::str::FromStr;

use rusqlite::{Connection, Row, types::Type};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::TransactionId, session::SessionId};

// ============================================================================
// MODELS
// ============================================================================

/// The largest unsigned amount accepted for a single transaction.
pub const MAX_AMOUNT: Decimal = dec!(1000000000000);

/// A credit or debit recorded for a session.
///
/// Transactions are immutable once created. To create one, validate the
/// input with [NewTransaction::new] and pass it to [create_transaction].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The session that created the transaction.
    pub session_id: SessionId,
    /// A short description of the transaction.
    pub title: String,
    /// The signed amount: positive for credits, negative for debits.
    pub amount: Decimal,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Whether money was received or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money received, stored as a positive amount.
    Credit,
    /// Money spent, stored as a negative amount.
    Debit,
}

impl TransactionType {
    /// Apply the sign for this type to an unsigned `amount`.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            TransactionType::Credit => amount,
            TransactionType::Debit => -amount,
        }
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionType::Credit),
            "debit" => Ok(TransactionType::Debit),
            other => Err(ValidationError::InvalidType(other.to_owned())),
        }
    }
}

/// The reasons a new transaction can be rejected before it is stored.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The title was empty or only whitespace.
    #[error("title cannot be empty")]
    EmptyTitle,

    /// The amount was zero or negative.
    #[error("amount must be a number greater than zero, got {0}")]
    InvalidAmount(Decimal),

    /// The amount was larger than [MAX_AMOUNT].
    #[error("amount must not be greater than {max}, got {0}", max = MAX_AMOUNT)]
    AmountTooLarge(Decimal),

    /// The type was something other than "credit" or "debit".
    #[error("type must be \"credit\" or \"debit\", got \"{0}\"")]
    InvalidType(String),
}

/// A validated transaction that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    title: String,
    amount: Decimal,
}

impl NewTransaction {
    /// Validate the input for a new transaction.
    ///
    /// `amount` is the unsigned value entered by the user; the sign is taken
    /// from `kind`.
    ///
    /// # Errors
    /// Returns a:
    /// - [ValidationError::EmptyTitle] if `title` is empty or only whitespace,
    /// - [ValidationError::InvalidAmount] if `amount` is not greater than zero,
    /// - or [ValidationError::AmountTooLarge] if `amount` is greater than [MAX_AMOUNT].
    pub fn new(
        title: &str,
        amount: Decimal,
        kind: TransactionType,
    ) -> Result<Self, ValidationError> {
        let title = title.trim();

        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        if amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount(amount));
        }

        if amount > MAX_AMOUNT {
            return Err(ValidationError::AmountTooLarge(amount));
        }

        Ok(Self {
            title: title.to_owned(),
            amount: kind.signed(amount),
        })
    }

    /// The trimmed title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The signed amount that will be stored.
    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

/// The balance of a session's transactions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// The sum of all signed amounts.
    pub amount: Decimal,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Store a new transaction for `session_id`.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn create_transaction(
    session_id: &SessionId,
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (session_id, title, amount, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, session_id, title, amount, created_at",
        )?
        .query_row(
            (
                session_id,
                new_transaction.title,
                new_transaction.amount.to_string(),
                OffsetDateTime::now_utc(),
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Get all the transactions for `session_id` in the order they were created.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_transactions(
    session_id: &SessionId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, session_id, title, amount, created_at FROM \"transaction\"
             WHERE session_id = :session_id
             ORDER BY id ASC",
        )?
        .query_map(&[(":session_id", session_id)], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Retrieve the transaction `id` belonging to `session_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction of this session,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_transaction(
    session_id: &SessionId,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, session_id, title, amount, created_at FROM \"transaction\"
             WHERE id = ?1 AND session_id = ?2",
        )?
        .query_row((id, session_id), map_transaction_row)?;

    Ok(transaction)
}

/// Sum the amounts of all the transactions for `session_id`.
///
/// The amount is zero if the session has no transactions. Amounts are added
/// as decimals, so cents never pick up rounding errors.
///
/// # Errors
/// This function will return a:
/// - [Error::SummaryOverflow] if the total does not fit in a decimal,
/// - or [Error::SqlError] if there is an SQL error.
pub fn get_summary(session_id: &SessionId, connection: &Connection) -> Result<Summary, Error> {
    let mut statement = connection
        .prepare("SELECT amount FROM \"transaction\" WHERE session_id = :session_id")?;
    let amounts = statement.query_map(&[(":session_id", session_id)], |row| get_amount(row, 0))?;

    let mut total = Decimal::ZERO;
    for amount in amounts {
        total = total.checked_add(amount?).ok_or(Error::SummaryOverflow)?;
    }

    Ok(Summary { amount: total })
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                title TEXT NOT NULL,
                amount TEXT NOT NULL,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    // Every query filters on the session.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_session_id ON \"transaction\"(session_id);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let session_id = row.get(1)?;
    let title = row.get(2)?;
    let amount = get_amount(row, 3)?;
    let created_at = row.get(4)?;

    Ok(Transaction {
        id,
        session_id,
        title,
        amount,
        created_at,
    })
}

/// Read the decimal stored as text in column `index`.
fn get_amount(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    Decimal::from_str(&text).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
    })
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use time::OffsetDateTime;

    use crate::{
        Error,
        db::initialize,
        session::SessionId,
        transaction::{
            NewTransaction, TransactionType, create_transaction, get_summary, get_transaction,
            list_transactions,
        },
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn new_transaction(title: &str, amount: Decimal, kind: TransactionType) -> NewTransaction {
        NewTransaction::new(title, amount, kind).unwrap()
    }

    #[test]
    fn create_succeeds() {
        let conn = get_test_connection();
        let session_id = SessionId::generate();

        let result = create_transaction(
            &session_id,
            new_transaction("New transaction", dec!(5000), TransactionType::Credit),
            &conn,
        );

        match result {
            Ok(transaction) => {
                assert_eq!(transaction.id, 1);
                assert_eq!(transaction.session_id, session_id);
                assert_eq!(transaction.title, "New transaction");
                assert_eq!(transaction.amount, dec!(5000));
            }
            Err(error) => panic!("Unexpected error: {error}"),
        }
    }

    #[test]
    fn list_returns_transactions_in_insertion_order() {
        let conn = get_test_connection();
        let session_id = SessionId::generate();
        let want: Vec<_> = ["first", "second", "third"]
            .into_iter()
            .map(|title| {
                create_transaction(
                    &session_id,
                    new_transaction(title, dec!(1), TransactionType::Credit),
                    &conn,
                )
                .expect("Could not create transaction")
            })
            .collect();

        let got = list_transactions(&session_id, &conn).expect("Could not list transactions");

        assert_eq!(got, want);
    }

    #[test]
    fn list_is_scoped_to_session() {
        let conn = get_test_connection();
        let alice = SessionId::generate();
        let bob = SessionId::generate();
        create_transaction(
            &alice,
            new_transaction("Alice's", dec!(10), TransactionType::Credit),
            &conn,
        )
        .unwrap();
        let bobs = create_transaction(
            &bob,
            new_transaction("Bob's", dec!(20), TransactionType::Debit),
            &conn,
        )
        .unwrap();

        let got = list_transactions(&bob, &conn).unwrap();

        assert_eq!(got, vec![bobs]);
    }

    #[test]
    fn list_is_empty_for_unknown_session() {
        let conn = get_test_connection();
        create_transaction(
            &SessionId::generate(),
            new_transaction("Someone else's", dec!(10), TransactionType::Credit),
            &conn,
        )
        .unwrap();

        let got = list_transactions(&SessionId::generate(), &conn).unwrap();

        assert!(got.is_empty());
    }

    #[test]
    fn get_returns_created_transaction() {
        let conn = get_test_connection();
        let session_id = SessionId::generate();
        let want = create_transaction(
            &session_id,
            new_transaction("Groceries", dec!(82.5), TransactionType::Debit),
            &conn,
        )
        .unwrap();

        let got = get_transaction(&session_id, want.id, &conn);

        assert_eq!(got, Ok(want));
    }

    #[test]
    fn get_fails_on_missing_id() {
        let conn = get_test_connection();

        let got = get_transaction(&SessionId::generate(), 42, &conn);

        assert_eq!(got, Err(Error::NotFound));
    }

    #[test]
    fn get_fails_on_other_session() {
        let conn = get_test_connection();
        let owner = SessionId::generate();
        let transaction = create_transaction(
            &owner,
            new_transaction("Private", dec!(1), TransactionType::Credit),
            &conn,
        )
        .unwrap();

        let got = get_transaction(&SessionId::generate(), transaction.id, &conn);

        assert_eq!(got, Err(Error::NotFound));
    }

    #[test]
    fn summary_is_signed_sum() {
        let conn = get_test_connection();
        let session_id = SessionId::generate();
        create_transaction(
            &session_id,
            new_transaction("Credit transaction", dec!(5000), TransactionType::Credit),
            &conn,
        )
        .unwrap();
        create_transaction(
            &session_id,
            new_transaction("Debit transaction", dec!(2000), TransactionType::Debit),
            &conn,
        )
        .unwrap();

        let summary = get_summary(&session_id, &conn).unwrap();

        assert_eq!(summary.amount, dec!(3000));
    }

    #[test]
    fn summary_can_be_negative() {
        let conn = get_test_connection();
        let session_id = SessionId::generate();
        for (amount, kind) in [
            (dec!(100), TransactionType::Credit),
            (dec!(250), TransactionType::Debit),
            (dec!(25), TransactionType::Debit),
        ] {
            create_transaction(&session_id, new_transaction("t", amount, kind), &conn).unwrap();
        }

        let summary = get_summary(&session_id, &conn).unwrap();

        assert_eq!(summary.amount, dec!(-175));
    }

    #[test]
    fn summary_ignores_other_sessions() {
        let conn = get_test_connection();
        let session_id = SessionId::generate();
        create_transaction(
            &session_id,
            new_transaction("Mine", dec!(10), TransactionType::Credit),
            &conn,
        )
        .unwrap();
        create_transaction(
            &SessionId::generate(),
            new_transaction("Theirs", dec!(99), TransactionType::Credit),
            &conn,
        )
        .unwrap();

        let summary = get_summary(&session_id, &conn).unwrap();

        assert_eq!(summary.amount, dec!(10));
    }

    #[test]
    fn summary_is_zero_without_transactions() {
        let conn = get_test_connection();

        let summary = get_summary(&SessionId::generate(), &conn).unwrap();

        assert_eq!(summary.amount, dec!(0));
    }

    #[test]
    fn summary_of_cents_cancels_exactly() {
        let conn = get_test_connection();
        let session_id = SessionId::generate();
        for (amount, kind) in [
            (dec!(10.10), TransactionType::Credit),
            (dec!(0.2), TransactionType::Credit),
            (dec!(10.3), TransactionType::Debit),
        ] {
            create_transaction(&session_id, new_transaction("t", amount, kind), &conn).unwrap();
        }

        let summary = get_summary(&session_id, &conn).unwrap();

        assert_eq!(summary.amount, Decimal::ZERO);
    }

    #[test]
    fn amount_keeps_its_decimal_places() {
        let conn = get_test_connection();
        let session_id = SessionId::generate();
        let created = create_transaction(
            &session_id,
            new_transaction("Bus fare", dec!(0.1), TransactionType::Debit),
            &conn,
        )
        .unwrap();

        let got = get_transaction(&session_id, created.id, &conn).unwrap();

        assert_eq!(got.amount, dec!(-0.1));
    }

    #[test]
    fn summary_fails_on_overflow() {
        let conn = get_test_connection();
        let session_id = SessionId::generate();
        for _ in 0..2 {
            conn.execute(
                "INSERT INTO \"transaction\" (session_id, title, amount, created_at)
                 VALUES (?1, 'Huge', ?2, ?3)",
                (&session_id, Decimal::MAX.to_string(), OffsetDateTime::now_utc()),
            )
            .unwrap();
        }

        let got = get_summary(&session_id, &conn);

        assert_eq!(got, Err(Error::SummaryOverflow));
    }
}
