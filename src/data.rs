use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

pub type ClientId = i64;
pub type EventId = i64;
pub type Amount = i64;

/// Format used both on the command line and in the store. Keeping the store
/// column in this exact shape means text order and time order agree.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const PREVIOUS_BALANCE: &str = "Previous balance";
pub const TOTALS: &str = "Totals";

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
}

/// The two kinds of ledger events. Each one lives in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Deposit,
    Withdrawal,
}

impl EventKind {
    pub(crate) fn table(self) -> &'static str {
        match self {
            EventKind::Deposit => "deposits",
            EventKind::Withdrawal => "withdrawals",
        }
    }
}

/// A recorded deposit or withdrawal. Never mutated once stored. Events are
/// always loaded for one client at a time, so the client isn't repeated here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    pub timestamp: NaiveDateTime,
    pub amount: Amount,
    pub description: Option<String>,
}

/// Closed interval `[since, till]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub since: NaiveDateTime,
    pub till: NaiveDateTime,
}

impl DateRange {
    pub fn new(since: NaiveDateTime, till: NaiveDateTime) -> Result<Self, Error> {
        if since > till {
            return Err(Error::ReversedRange { since, till });
        }
        Ok(Self { since, till })
    }

    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        self.since <= *timestamp && *timestamp <= self.till
    }
}

/// One line of a statement. Synthetic rows (previous balance, totals) have no
/// date; grouped rows leave an amount column empty when nothing of that kind
/// happened at that instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "StatementRowSerializer")]
pub struct StatementRow {
    pub date: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub withdrawal: Option<Amount>,
    pub deposit: Option<Amount>,
    pub balance: Amount,
}

/// Proxy used for CSV export: renames the columns to the grid headers and
/// formats the date the same way the command line accepts it.
#[derive(Serialize)]
pub(crate) struct StatementRowSerializer {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Withdrawals")]
    pub withdrawal: Option<Amount>,
    #[serde(rename = "Deposits")]
    pub deposit: Option<Amount>,
    #[serde(rename = "Balance")]
    pub balance: Amount,
}

impl From<StatementRow> for StatementRowSerializer {
    fn from(row: StatementRow) -> Self {
        Self {
            date: row.date.as_ref().map(format_timestamp).unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            withdrawal: row.withdrawal,
            deposit: row.deposit,
            balance: row.balance,
        }
    }
}

/// A full statement: previous-balance row, the grouped rows in date order,
/// then the totals row. Always at least two rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub rows: Vec<StatementRow>,
}

impl Statement {
    pub fn previous(&self) -> &StatementRow {
        &self.rows[0]
    }

    pub fn totals(&self) -> &StatementRow {
        &self.rows[self.rows.len() - 1]
    }

    /// The grouped, dated rows between the two synthetic ones.
    pub fn entries(&self) -> &[StatementRow] {
        &self.rows[1..self.rows.len() - 1]
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot open store: {0}")]
    StoreConnection(#[source] rusqlite::Error),
    #[error("Store write failed: {0}")]
    StoreWrite(#[source] rusqlite::Error),
    #[error("Store read failed: {0}")]
    StoreRead(#[source] rusqlite::Error),
    #[error("Client {0:?} not found")]
    ClientNotFound(String),
    #[error("Statement range is reversed (since {since} is after till {till})")]
    ReversedRange {
        since: NaiveDateTime,
        till: NaiveDateTime,
    },
    #[error("Balance does not fit in a 64-bit amount")]
    BalanceOverflow,
    #[error("Unterminated quote in command line")]
    UnterminatedQuote,
}
