use crate::data::{
    Amount, ClientId, DateRange, Error, Event, EventKind, Statement, StatementRow,
    PREVIOUS_BALANCE, TOTALS,
};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// Where statement data comes from. The store implements it; tests use a plain
/// in-memory list so the aggregation can be checked without a database.
pub(crate) trait EventSource {
    fn client_id(&self, name: &str) -> Result<Option<ClientId>, Error>;
    fn events(&self, client: ClientId, kind: EventKind) -> Result<Vec<Event>, Error>;
}

/// Load a client's events and fold them into a statement for `range`.
///
/// An unknown client name is not an error: it reads as a client with no
/// activity and gives the two synthetic rows only. Writing to an unknown client
/// is refused in `Ledger::record`, so the only way to get here with a bad name
/// is a typo on the statement command, and an empty statement says as much.
pub(crate) fn build_statement<S: EventSource>(
    source: &S,
    client: &str,
    range: DateRange,
) -> Result<Statement, Error> {
    let Some(id) = source.client_id(client)? else {
        warn!(client, "statement requested for unknown client");
        return fold_statement(&[], &[], range);
    };
    let deposits = source.events(id, EventKind::Deposit)?;
    let withdrawals = source.events(id, EventKind::Withdrawal)?;
    debug!(
        client,
        deposits = deposits.len(),
        withdrawals = withdrawals.len(),
        "building statement"
    );
    let statement = fold_statement(&deposits, &withdrawals, range)?;
    debug!(
        client,
        previous = statement.previous().balance,
        entries = statement.entries().len(),
        net = statement.totals().balance,
        "statement ready"
    );
    Ok(statement)
}

/// Accumulator for all events sharing one timestamp.
#[derive(Debug, Default)]
struct Group {
    description: Option<String>,
    withdrawal: Option<Amount>,
    deposit: Option<Amount>,
}

impl Group {
    fn add(&mut self, event: &Event) -> Result<(), Error> {
        let slot = match event.kind {
            EventKind::Deposit => &mut self.deposit,
            EventKind::Withdrawal => &mut self.withdrawal,
        };
        *slot = Some(add(slot.unwrap_or_default(), event.amount)?);
        if self.description.is_none() {
            self.description = event.description.clone();
        }
        Ok(())
    }
}

/// The statement pipeline proper: split by window, union, group by instant,
/// run the balance forward, then bracket with previous balance and totals.
///
/// The previous balance is what the client really had before `since`, i.e. the
/// net of every earlier event, and the running column starts from it. The
/// totals row on the other hand only covers the window and is summed on its
/// own rather than copied from the last running balance; with no earlier
/// activity the two must agree. Amounts are full `i64`, so every sum is
/// checked: a statement that doesn't fit is an error, not a wrapped number.
pub(crate) fn fold_statement(
    deposits: &[Event],
    withdrawals: &[Event],
    range: DateRange,
) -> Result<Statement, Error> {
    let mut previous: Amount = 0;
    let mut groups: BTreeMap<NaiveDateTime, Group> = BTreeMap::new();

    // Deposits go first so they win the description on a shared instant.
    for event in deposits.iter().chain(withdrawals) {
        if event.timestamp < range.since {
            previous = add(previous, signed(event)?)?;
        } else if range.contains(&event.timestamp) {
            groups.entry(event.timestamp).or_default().add(event)?;
        } else {
            trace!(event = event.id, kind = ?event.kind, "after statement window");
        }
    }

    let mut rows = Vec::with_capacity(groups.len() + 2);
    rows.push(StatementRow {
        date: None,
        description: Some(PREVIOUS_BALANCE.to_string()),
        withdrawal: None,
        deposit: None,
        balance: previous,
    });

    let mut balance = previous;
    let mut total_withdrawn: Amount = 0;
    let mut total_deposited: Amount = 0;
    for (date, group) in groups {
        let withdrawal = group.withdrawal.unwrap_or_default();
        let deposit = group.deposit.unwrap_or_default();
        balance = sub(add(balance, deposit)?, withdrawal)?;
        total_withdrawn = add(total_withdrawn, withdrawal)?;
        total_deposited = add(total_deposited, deposit)?;
        rows.push(StatementRow {
            date: Some(date),
            description: group.description,
            withdrawal: group.withdrawal,
            deposit: group.deposit,
            balance,
        });
    }

    rows.push(StatementRow {
        date: None,
        description: Some(TOTALS.to_string()),
        withdrawal: Some(total_withdrawn),
        deposit: Some(total_deposited),
        balance: sub(total_deposited, total_withdrawn)?,
    });
    Ok(Statement { rows })
}

fn add(a: Amount, b: Amount) -> Result<Amount, Error> {
    a.checked_add(b).ok_or(Error::BalanceOverflow)
}

fn sub(a: Amount, b: Amount) -> Result<Amount, Error> {
    a.checked_sub(b).ok_or(Error::BalanceOverflow)
}

fn signed(event: &Event) -> Result<Amount, Error> {
    match event.kind {
        EventKind::Deposit => Ok(event.amount),
        EventKind::Withdrawal => event.amount.checked_neg().ok_or(Error::BalanceOverflow),
    }
}
