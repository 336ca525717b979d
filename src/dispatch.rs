//! Sending the newest invoice: hide earlier invoices, export, mail, then show
//! the ones still unpaid.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::error::Result;
use crate::mail::{MailTransport, Message};
use crate::model::InvoiceId;
use crate::period::month_and_year;
use crate::render::EMAIL_BODY_TEMPLATE;
use crate::settings::Settings;
use crate::workbook::Spreadsheet;

pub struct Dispatcher<'a> {
    settings: &'a Settings,
    templates: &'a Tera,
}

impl<'a> Dispatcher<'a> {
    pub fn new(settings: &'a Settings, templates: &'a Tera) -> Self {
        Dispatcher { settings, templates }
    }

    /// Builds the message for invoice `invoice` covering the month of `period_date`.
    /// The attachment is filled in by [`Dispatcher::send_invoice`].
    pub fn message(&self, period_date: NaiveDate, invoice: InvoiceId) -> Result<Message> {
        let label = month_and_year(period_date);
        let mut context = Context::new();
        context.insert("invoice", &invoice.0);
        context.insert("period", &label);
        let body = self.templates.render(EMAIL_BODY_TEMPLATE, &context)?;

        Ok(Message {
            to: self.settings.email_to.clone(),
            cc: self.settings.email_cc.clone(),
            subject: format!("{} - {}", self.settings.subject_prefix, label),
            body: body.trim_end().to_string(),
            attachments: Vec::new(),
        })
    }

    /// Order matters: the export must run while every sheet in
    /// `invoice_sheets` is hidden, and visibility is restored only after the
    /// message went out. Sheets whose id is in `paid` stay hidden.
    pub fn send_invoice(
        &self,
        period_date: NaiveDate,
        invoice: InvoiceId,
        book: &mut dyn Spreadsheet,
        invoice_sheets: &[String],
        paid: &BTreeSet<InvoiceId>,
        mailer: &dyn MailTransport,
    ) -> Result<Message> {
        for sheet in invoice_sheets {
            if !book.is_hidden(sheet)? {
                book.set_hidden(sheet, true)?;
                debug!(sheet = %sheet, "hid sheet for export");
            }
        }

        let mut message = self.message(period_date, invoice)?;
        let document = book.export(&format!("{}{}", self.settings.pdf_name_prefix, invoice))?;
        message.attachments.push(document);

        mailer.send(&message)?;
        info!(%invoice, to = %message.to, subject = %message.subject, "invoice sent");

        for sheet in invoice_sheets {
            let is_paid = sheet.parse::<InvoiceId>().is_ok_and(|id| paid.contains(&id));
            if !is_paid {
                book.set_hidden(sheet, false)?;
            }
        }
        Ok(message)
    }
}
