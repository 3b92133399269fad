//! SQLite persistence. Only this module talks SQL; everything above it works
//! with `Client` and `Event` values.

use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::{params, types::Type, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::{
    data::{
        format_timestamp, parse_timestamp, Amount, Client, ClientId, Error, Event, EventId,
        EventKind,
    },
    statement::EventSource,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS clients (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS deposits (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id   INTEGER NOT NULL REFERENCES clients (id),
    timestamp   TEXT NOT NULL,
    amount      INTEGER NOT NULL,
    description TEXT
);
CREATE TABLE IF NOT EXISTS withdrawals (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id   INTEGER NOT NULL REFERENCES clients (id),
    timestamp   TEXT NOT NULL,
    amount      INTEGER NOT NULL,
    description TEXT
);
"#;

/// Owns the single connection used for the whole process. Commands run one at
/// a time so there is no locking here.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file at `path` and make sure the tables exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(Error::StoreConnection)?;
        info!(path = %path.display(), "opened store");
        Self::init(conn)
    }

    /// Fresh in-memory database; used by tests and throwaway sessions.
    pub fn in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(Error::StoreConnection)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(Error::StoreConnection)?;
        conn.execute_batch(SCHEMA).map_err(Error::StoreConnection)?;
        Ok(Self { conn })
    }

    /// Drop every table and recreate an empty schema. This used to happen on
    /// every start; it's now only done on request (`--reset`) so the ledger
    /// actually survives a restart.
    pub fn reset(&self) -> Result<(), Error> {
        self.conn
            .execute_batch(
                "DROP TABLE IF EXISTS withdrawals;
                 DROP TABLE IF EXISTS deposits;
                 DROP TABLE IF EXISTS clients;",
            )
            .map_err(Error::StoreWrite)?;
        self.conn.execute_batch(SCHEMA).map_err(Error::StoreWrite)?;
        info!("store reset");
        Ok(())
    }

    /// Insert the baseline clients. Names already present are left alone, so
    /// this can run on every start. Returns how many clients were added.
    pub fn seed_clients<S: AsRef<str>>(&mut self, names: &[S]) -> Result<usize, Error> {
        let tx = self.conn.transaction().map_err(Error::StoreWrite)?;
        let mut added = 0;
        {
            let mut stmt = tx
                .prepare("INSERT OR IGNORE INTO clients (name) VALUES (?1)")
                .map_err(Error::StoreWrite)?;
            for name in names {
                let name = name.as_ref().trim();
                if name.is_empty() {
                    continue;
                }
                added += stmt.execute(params![name]).map_err(Error::StoreWrite)?;
            }
        }
        tx.commit().map_err(Error::StoreWrite)?;
        debug!(added, "seeded clients");
        Ok(added)
    }

    pub fn clients(&self) -> Result<Vec<Client>, Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM clients ORDER BY id ASC")
            .map_err(Error::StoreRead)?;
        let clients = stmt
            .query_map([], |row| {
                Ok(Client {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .map_err(Error::StoreRead)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(Error::StoreRead)?;
        Ok(clients)
    }

    pub fn client_id(&self, name: &str) -> Result<Option<ClientId>, Error> {
        self.conn
            .query_row(
                "SELECT id FROM clients WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::StoreRead)
    }

    pub fn insert_event(
        &self,
        client: ClientId,
        kind: EventKind,
        timestamp: &NaiveDateTime,
        amount: Amount,
        description: Option<&str>,
    ) -> Result<EventId, Error> {
        let sql = format!(
            "INSERT INTO {} (client_id, timestamp, amount, description) VALUES (?1, ?2, ?3, ?4)",
            kind.table()
        );
        self.conn
            .execute(
                &sql,
                params![client, format_timestamp(timestamp), amount, description],
            )
            .map_err(Error::StoreWrite)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Every event of `kind` for `client`, oldest first. The rows don't carry
    /// the client back out: the caller asked for exactly one.
    pub fn events(&self, client: ClientId, kind: EventKind) -> Result<Vec<Event>, Error> {
        let sql = format!(
            "SELECT id, timestamp, amount, description FROM {}
             WHERE client_id = ?1 ORDER BY timestamp ASC, id ASC",
            kind.table()
        );
        let mut stmt = self.conn.prepare(&sql).map_err(Error::StoreRead)?;
        let events = stmt
            .query_map(params![client], |row| {
                let raw: String = row.get(1)?;
                let timestamp = parse_timestamp(&raw).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                })?;
                Ok(Event {
                    id: row.get(0)?,
                    kind,
                    timestamp,
                    amount: row.get(2)?,
                    description: row.get(3)?,
                })
            })
            .map_err(Error::StoreRead)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(Error::StoreRead)?;
        Ok(events)
    }
}

impl EventSource for Store {
    fn client_id(&self, name: &str) -> Result<Option<ClientId>, Error> {
        Store::client_id(self, name)
    }

    fn events(&self, client: ClientId, kind: EventKind) -> Result<Vec<Event>, Error> {
        Store::events(self, client, kind)
    }
}
