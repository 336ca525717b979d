//! The invoice ledger on the summary sheet: one `(id, date, paid)` row per
//! invoice, below the ledger header row.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::SummaryLayout;
use crate::error::{InvoiceError, Result};
use crate::model::{CellAddr, CellRange, CellValue, InvoiceId, LedgerEntry, Validation};
use crate::workbook::Spreadsheet;

pub const HEADERS: [&str; 3] = ["Invoice", "Date", "Paid"];

const ID_COL: u32 = 1;
const DATE_COL: u32 = 2;
const PAID_COL: u32 = 3;

/// Ledger rows in sheet order. Rows without an integer id are skipped.
pub fn read_entries(book: &dyn Spreadsheet, layout: &SummaryLayout) -> Result<Vec<LedgerEntry>> {
    let first = layout.ledger_header_row + 1;
    let last = book.last_row(&layout.sheet)?;
    if last < first {
        return Ok(Vec::new());
    }
    let range = CellRange::new(CellAddr::new(first, ID_COL), CellAddr::new(last, PAID_COL));
    let rows = book.get_range(&layout.sheet, &range)?;

    Ok((first..)
        .zip(rows)
        .filter_map(|(row, cells)| {
            let cell = |col: u32| &cells[(col - ID_COL) as usize];
            let id = cell(ID_COL).as_u32()?;
            Some(LedgerEntry {
                id: InvoiceId(id),
                created: cell(DATE_COL).as_date(),
                paid: cell(PAID_COL).is_truthy(),
                row,
            })
        })
        .collect())
}

pub fn paid_invoice_ids(entries: &[LedgerEntry]) -> BTreeSet<InvoiceId> {
    entries.iter().filter(|e| e.paid).map(|e| e.id).collect()
}

/// Appends `(id, date, false)` and turns the paid cell into an unchecked checkbox.
pub fn append_entry(book: &mut dyn Spreadsheet, layout: &SummaryLayout, id: InvoiceId, date: NaiveDate) -> Result<u32> {
    let row = book.append_row(
        &layout.sheet,
        vec![CellValue::from(id), CellValue::Date(date), CellValue::Bool(false)],
    )?;
    let paid_cell = CellAddr::new(row, PAID_COL);
    book.set_validation(&layout.sheet, paid_cell, Validation::Checkbox)?;
    book.set_value(&layout.sheet, paid_cell, CellValue::Bool(false))?;
    debug!(%id, row, "ledger row appended");
    Ok(row)
}

/// Writes the ledger header labels on the header row.
pub fn write_header(book: &mut dyn Spreadsheet, layout: &SummaryLayout) -> Result<()> {
    for (col, label) in (ID_COL..).zip(HEADERS) {
        book.set_value(&layout.sheet, CellAddr::new(layout.ledger_header_row, col), CellValue::text(label))?;
    }
    Ok(())
}

/// Flips the paid checkbox of invoice `id`.
pub fn set_paid(book: &mut dyn Spreadsheet, layout: &SummaryLayout, id: InvoiceId, paid: bool) -> Result<()> {
    let entry = read_entries(book, layout)?
        .into_iter()
        .find(|e| e.id == id)
        .ok_or(InvoiceError::UnknownInvoice(id.0))?;
    book.set_value(&layout.sheet, CellAddr::new(entry.row, PAID_COL), CellValue::Bool(paid))?;
    info!(%id, paid, "paid flag updated");
    Ok(())
}
