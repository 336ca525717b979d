//! Creating the next invoice sheet and its ledger row.

use chrono::NaiveDate;
use tracing::info;

use crate::config::{SummaryLayout, TemplateLayout};
use crate::error::{InvoiceError, Result};
use crate::ledger;
use crate::model::{CellValue, InvoiceId, SheetInfo};
use crate::period::BillingPeriod;
use crate::settings::Settings;
use crate::workbook::Spreadsheet;

#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub id: InvoiceId,
    pub sheet: String,
    pub issued: NaiveDate,
    pub period: BillingPeriod,
    pub ledger_row: u32,
    /// Invoice sheets that existed before this one, in workbook order.
    pub earlier_sheets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Provisioned {
    Created(NewInvoice),
    /// `MAX_INVOICES` reached; nothing was touched.
    Skipped { sheet_count: usize, cap: u32 },
}

/// Invoice sheets are every sheet except the summary sheet.
pub fn invoice_sheets(sheets: &[SheetInfo], summary: &SummaryLayout) -> Vec<String> {
    sheets
        .iter()
        .filter(|s| s.name != summary.sheet)
        .map(|s| s.name.clone())
        .collect()
}

pub struct Provisioner<'a> {
    pub settings: &'a Settings,
    pub summary: &'a SummaryLayout,
    pub template: &'a TemplateLayout,
}

impl<'a> Provisioner<'a> {
    pub fn new(settings: &'a Settings, summary: &'a SummaryLayout, template: &'a TemplateLayout) -> Self {
        Provisioner {
            settings,
            summary,
            template,
        }
    }

    /// Duplicates the latest invoice sheet into invoice `ledger rows + 1`,
    /// stamps the template fields and records the ledger row.
    pub fn provision(&self, book: &mut dyn Spreadsheet, today: NaiveDate) -> Result<Provisioned> {
        let sheets = book.sheets();
        if !sheets.iter().any(|s| s.name == self.summary.sheet) {
            return Err(InvoiceError::SheetNotFound(self.summary.sheet.clone()));
        }

        // The sheet count includes the summary sheet.
        let sheet_count = sheets.len();
        if let Some(cap) = self.settings.max_invoices {
            if sheet_count > cap as usize {
                info!(cap, sheet_count, "Already generated {} invoices...skipping this invoice", cap);
                return Ok(Provisioned::Skipped { sheet_count, cap });
            }
        }

        let earlier_sheets = invoice_sheets(&sheets, self.summary);
        let source = earlier_sheets.last().cloned().ok_or(InvoiceError::NoTemplate)?;
        let entries = ledger::read_entries(book, self.summary)?;
        if entries.len() != earlier_sheets.len() {
            return Err(InvoiceError::LedgerOutOfSync {
                ledger_rows: entries.len(),
                invoice_sheets: earlier_sheets.len(),
            });
        }
        self.template.validate(book, &source)?;

        let id = InvoiceId(entries.len() as u32 + 1);
        let name = id.to_string();
        if book.has_sheet(&name) {
            return Err(InvoiceError::SheetExists(name));
        }
        info!(%id, source = %source, "Generating invoice {}", id);

        let copy = book.duplicate_sheet(&source)?;
        book.set_hidden(&copy, false)?;
        book.rename_sheet(&copy, &name)?;

        let period = BillingPeriod::previous_month(today);
        book.set_value(&name, self.template.invoice_id.cell, CellValue::from(id))?;
        book.set_value(&name, self.template.issue_date.cell, CellValue::Date(today))?;
        book.set_value(&name, self.template.period_start.cell, CellValue::Date(period.start))?;
        book.set_value(&name, self.template.period_end.cell, CellValue::Date(period.end))?;

        let ledger_row = ledger::append_entry(book, self.summary, id, today)?;

        Ok(Provisioned::Created(NewInvoice {
            id,
            sheet: name,
            issued: today,
            period,
            ledger_row,
            earlier_sheets,
        }))
    }
}
