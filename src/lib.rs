//! Monthly invoice generation from a spreadsheet workbook.
//!
//! Each run duplicates the latest invoice sheet, stamps it with the next
//! invoice number and last month's billing period, records it in the ledger on
//! the summary sheet, and mails the workbook export with earlier invoices
//! hidden. Invoices whose ledger row is ticked as paid stay hidden afterwards.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod init;
pub mod ledger;
pub mod mail;
pub mod model;
pub mod period;
pub mod provision;
pub mod render;
pub mod report;
pub mod run;
pub mod settings;
pub mod workbook;

pub use config::AppConfig;
pub use error::{InvoiceError, Result};
pub use mail::{MailTransport, Message};
pub use model::{CellAddr, CellValue, InvoiceId};
pub use run::{MonthlyRun, RunOutcome};
pub use settings::Settings;
pub use workbook::{LocalWorkbook, Spreadsheet};
