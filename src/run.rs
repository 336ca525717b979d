use chrono::NaiveDate;
use tera::Tera;
use tracing::info;

use crate::config::{SummaryLayout, TemplateLayout};
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::ledger;
use crate::mail::{MailTransport, Message};
use crate::model::InvoiceId;
use crate::provision::{Provisioned, Provisioner};
use crate::settings::Settings;
use crate::workbook::Spreadsheet;

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Sent { invoice: InvoiceId, message: Message },
    Skipped { sheet_count: usize, cap: u32 },
}

/// One monthly invocation: provision the next invoice, then send it.
pub struct MonthlyRun<'a> {
    pub settings: &'a Settings,
    pub summary: &'a SummaryLayout,
    pub template: &'a TemplateLayout,
    pub templates: &'a Tera,
}

impl MonthlyRun<'_> {
    pub fn execute(&self, book: &mut dyn Spreadsheet, mailer: &dyn MailTransport, today: NaiveDate) -> Result<RunOutcome> {
        let provisioner = Provisioner::new(self.settings, self.summary, self.template);
        let invoice = match provisioner.provision(book, today)? {
            Provisioned::Created(invoice) => invoice,
            Provisioned::Skipped { sheet_count, cap } => return Ok(RunOutcome::Skipped { sheet_count, cap }),
        };

        // Read after provisioning so the new row is included.
        let paid = ledger::paid_invoice_ids(&ledger::read_entries(book, self.summary)?);
        info!(paid = ?paid, "paid invoices stay hidden after sending");

        let dispatcher = Dispatcher::new(self.settings, self.templates);
        let message = dispatcher.send_invoice(
            invoice.period.end,
            invoice.id,
            book,
            &invoice.earlier_sheets,
            &paid,
            mailer,
        )?;
        Ok(RunOutcome::Sent {
            invoice: invoice.id,
            message,
        })
    }
}
