use comfy_table::{Attribute, Cell, Color, Table};

use crate::model::{LedgerEntry, SheetInfo};

const RED: Color = Color::Rgb { r: 185, g: 28, b: 28 };
const GREEN: Color = Color::Rgb { r: 4, g: 120, b: 87 };

/// Ledger overview: one row per invoice with its sheet's visibility.
pub fn ledger_table(entries: &[LedgerEntry], sheets: &[SheetInfo], unpaid_only: bool) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Invoice"),
        Cell::new("Date"),
        Cell::new("Paid"),
        Cell::new("Sheet"),
    ]);

    let (mut paid_count, mut unpaid_count) = (0, 0);
    for entry in entries {
        if entry.paid {
            paid_count += 1;
        } else {
            unpaid_count += 1;
        }
        if unpaid_only && entry.paid {
            continue;
        }

        let date = entry
            .created
            .map(|d| d.format("%m/%d/%Y").to_string())
            .unwrap_or_default();
        let paid_cell = if entry.paid {
            Cell::new("PAID").fg(GREEN)
        } else {
            Cell::new("UNPAID").fg(RED)
        };
        let name = entry.id.to_string();
        let sheet_cell = match sheets.iter().find(|s| s.name == name) {
            Some(s) if s.hidden => Cell::new("hidden"),
            Some(_) => Cell::new("visible"),
            None => Cell::new("missing").fg(RED).add_attribute(Attribute::Bold),
        };

        table.add_row(vec![Cell::new(entry.id), Cell::new(date), paid_cell, sheet_cell]);
    }

    table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(format!("{} paid / {} unpaid", paid_count, unpaid_count)).add_attribute(Attribute::Bold),
        Cell::new(""),
    ]);
    table
}
