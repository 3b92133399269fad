use chrono::{Local, NaiveDateTime, SubsecRound};
use tracing::{info, warn};

use crate::{
    data::{Amount, Client, DateRange, Error, EventId, EventKind, Statement},
    statement::build_statement,
    store::Store,
};

/// Source of "now" for new events.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock, truncated to whole seconds to match the stored format.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local().trunc_subsecs(0)
    }
}

/// Front door for every command: records events and produces statements on
/// top of a `Store`.
#[derive(Debug)]
pub struct Ledger<C: Clock = SystemClock> {
    store: Store,
    clock: C,
}

impl Ledger<SystemClock> {
    pub fn new(store: Store) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<C: Clock> Ledger<C> {
    pub fn with_clock(store: Store, clock: C) -> Self {
        Self { store, clock }
    }

    /// Append one deposit or withdrawal for `client`, stamped with the clock's
    /// current time.
    ///
    /// The old shell stamped withdrawals one day into the future, which pushed
    /// a fresh withdrawal out of any statement ending "now" and sorted it after
    /// deposits made the next morning. Nothing explained it, so both kinds get
    /// the same instant here. An unknown client used to be written anyway with
    /// a dangling id; now it's refused before anything reaches the store.
    pub fn record(
        &self,
        client: &str,
        amount: Amount,
        description: Option<&str>,
        kind: EventKind,
    ) -> Result<EventId, Error> {
        let id = self
            .store
            .client_id(client)?
            .ok_or_else(|| Error::ClientNotFound(client.to_string()))?;
        if amount < 0 {
            warn!(client, amount, ?kind, "recording a negative amount");
        }
        let timestamp = self.clock.now().trunc_subsecs(0);
        let event = self
            .store
            .insert_event(id, kind, &timestamp, amount, description)?;
        info!(client, amount, ?kind, %timestamp, event, "recorded event");
        Ok(event)
    }

    pub fn statement(&self, client: &str, range: DateRange) -> Result<Statement, Error> {
        build_statement(&self.store, client, range)
    }

    pub fn clients(&self) -> Result<Vec<Client>, Error> {
        self.store.clients()
    }
}
