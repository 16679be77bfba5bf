//! Human-readable run report.
//!
//! Prices are kept in minor units everywhere else; this is the only place
//! they are converted for display.

use rust_decimal::Decimal;
use std::io::{self, Write};

use crate::engine::aggregator::Aggregation;
use crate::types::CURRENCY_LABEL;

/// Minor units to major units (cents to dollars).
pub fn to_major_units(minor: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(minor), 2)
}

/// Print the priced items table, the grand total and the sorted list of
/// items without a price.
pub fn write_results<W: Write>(out: &mut W, aggregation: &Aggregation) -> io::Result<()> {
    let headers = [
        "Item".to_string(),
        format!("Price ({CURRENCY_LABEL})"),
        "Amount".to_string(),
        format!("Total ({CURRENCY_LABEL})"),
    ];

    let rows: Vec<[String; 4]> = aggregation
        .lines
        .iter()
        .map(|l| {
            [
                l.market_hash_name.clone(),
                format!("{:.2}", to_major_units(l.price)),
                l.amount.to_string(),
                format!("{:.2}", to_major_units(l.total())),
            ]
        })
        .collect();

    let mut widths = [0usize; 4];
    for row in std::iter::once(&headers).chain(&rows) {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let separator = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{separator}+");

    writeln!(out, "{separator}")?;
    write_row(out, &headers, &widths)?;
    writeln!(out, "{separator}")?;
    for row in &rows {
        write_row(out, row, &widths)?;
    }
    writeln!(out, "{separator}")?;

    writeln!(
        out,
        "Total: {:.2} {CURRENCY_LABEL} across {} items ({} unique)",
        to_major_units(aggregation.total_value()),
        aggregation.priced_copies(),
        aggregation.lines.len()
    )?;

    if !aggregation.failures.is_empty() {
        writeln!(out)?;
        writeln!(out, "Items with no price:")?;
        for f in &aggregation.failures {
            writeln!(out, "- {}: {}", f.market_hash_name, f.reason)?;
        }
    }

    Ok(())
}

fn write_row<W: Write>(out: &mut W, cells: &[String; 4], widths: &[usize; 4]) -> io::Result<()> {
    // Item name left-aligned, numbers right-aligned.
    write!(out, "| {:<w$} ", cells[0], w = widths[0])?;
    for (cell, w) in cells.iter().zip(widths).skip(1) {
        write!(out, "| {:>w$} ", cell, w = *w)?;
    }
    writeln!(out, "|")
}
