//! Scaffolding for a fresh workbook: the summary sheet and a first invoice
//! that later invoices are copied from.

use chrono::NaiveDate;

use crate::config::{SummaryLayout, TemplateLayout};
use crate::error::Result;
use crate::ledger;
use crate::model::{CellAddr, CellValue, InvoiceId};
use crate::period::BillingPeriod;
use crate::settings::KNOWN_KEYS;
use crate::workbook::{LocalWorkbook, Spreadsheet};

/// Adds a hidden summary sheet (settings keys, ledger header) and invoice
/// sheet `1` laid out per `template`, with its ledger row.
pub fn scaffold(book: &mut LocalWorkbook, summary: &SummaryLayout, template: &TemplateLayout, today: NaiveDate) -> Result<()> {
    book.add_sheet(&summary.sheet)?;
    let range = summary.settings_range;
    for (row, key) in range.rows().zip(KNOWN_KEYS) {
        book.set_value(&summary.sheet, CellAddr::new(row, range.start.col), CellValue::text(key))?;
    }
    ledger::write_header(book, summary)?;
    // Exports only ever show invoice sheets.
    book.set_hidden(&summary.sheet, true)?;

    let first = InvoiceId(1);
    let sheet = first.to_string();
    book.add_sheet(&sheet)?;
    book.set_value(&sheet, CellAddr::new(1, 1), CellValue::text("INVOICE"))?;
    for (_, field) in template.fields() {
        if let Some(label) = &field.label {
            book.set_value(&sheet, label.cell, CellValue::text(label.text.as_str()))?;
        }
    }

    let period = BillingPeriod::previous_month(today);
    book.set_value(&sheet, template.invoice_id.cell, CellValue::from(first))?;
    book.set_value(&sheet, template.issue_date.cell, CellValue::Date(today))?;
    book.set_value(&sheet, template.period_start.cell, CellValue::Date(period.start))?;
    book.set_value(&sheet, template.period_end.cell, CellValue::Date(period.end))?;

    ledger::append_entry(book, summary, first, today)?;
    Ok(())
}
