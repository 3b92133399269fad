use crate::data::{format_timestamp, Statement, StatementRow};

const HEADERS: [&str; 5] = ["Date", "Description", "Withdrawals", "Deposits", "Balance"];
/// Text columns hug the left, amounts the right.
const RIGHT_ALIGNED: [bool; 5] = [false, false, true, true, true];

fn cells(row: &StatementRow) -> [String; 5] {
    let amount = |a: Option<i64>| a.map(|a| a.to_string()).unwrap_or_default();
    [
        row.date.as_ref().map(format_timestamp).unwrap_or_default(),
        row.description.clone().unwrap_or_default(),
        amount(row.withdrawal),
        amount(row.deposit),
        row.balance.to_string(),
    ]
}

/// Render a statement as a bordered grid, one ruled line between rows.
pub(crate) fn write_grid<W: std::io::Write>(
    mut writer: W,
    statement: &Statement,
) -> std::io::Result<()> {
    let body: Vec<[String; 5]> = statement.rows.iter().map(cells).collect();
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &body {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule = |fill: char| {
        let mut line = String::from("+");
        for width in widths {
            line.extend(std::iter::repeat(fill).take(width + 2));
            line.push('+');
        }
        line
    };
    let line = |row: &[String]| {
        let mut line = String::from("|");
        for ((cell, width), right) in row.iter().zip(widths).zip(RIGHT_ALIGNED) {
            let pad = " ".repeat(width - cell.chars().count());
            if right {
                line.push_str(&format!(" {pad}{cell} |"));
            } else {
                line.push_str(&format!(" {cell}{pad} |"));
            }
        }
        line
    };

    writeln!(writer, "{}", rule('-'))?;
    writeln!(writer, "{}", line(&HEADERS.map(String::from)))?;
    writeln!(writer, "{}", rule('='))?;
    for row in &body {
        writeln!(writer, "{}", line(row))?;
        writeln!(writer, "{}", rule('-'))?;
    }
    Ok(())
}

/// Basic CSV exporter for a `Statement`, same columns as the grid.
pub(crate) fn write_csv<W: std::io::Write>(
    writer: W,
    statement: &Statement,
) -> Result<(), anyhow::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in &statement.rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
