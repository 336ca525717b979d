//! Run settings kept in the key/value block on the summary sheet.

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::config::SummaryLayout;
use crate::error::{InvoiceError, Result};
use crate::model::{CellAddr, CellValue};
use crate::workbook::Spreadsheet;

pub const EMAIL_TO: &str = "EMAIL_TO";
pub const EMAIL_CC: &str = "EMAIL_CC";
pub const SUBJECT_PREFIX: &str = "SUBJECT_PREFIX";
pub const PDF_NAME_PREFIX: &str = "PDF_NAME_PREFIX";
pub const MAX_INVOICES: &str = "MAX_INVOICES";

/// Every key the settings block understands, required ones first.
pub const KNOWN_KEYS: [&str; 5] = [EMAIL_TO, SUBJECT_PREFIX, PDF_NAME_PREFIX, EMAIL_CC, MAX_INVOICES];

/// Snapshot of the settings block, read once per process.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub email_to: String,
    pub email_cc: Option<String>,
    pub subject_prefix: String,
    pub pdf_name_prefix: String,
    pub max_invoices: Option<u32>,
    pub loaded_at: DateTime<Local>,
}

impl Settings {
    /// Reads the settings block. Rows with an empty key are skipped; a missing
    /// required key is an error.
    pub fn load(book: &dyn Spreadsheet, layout: &SummaryLayout) -> Result<Self> {
        layout.validate()?;
        let rows = book.get_range(&layout.sheet, &layout.settings_range)?;
        let pairs = rows.into_iter().filter_map(|row| {
            let mut cells = row.into_iter();
            let key = cells.next().unwrap_or_default();
            let value = cells.next().unwrap_or_default();
            if key.is_empty() {
                None
            } else {
                Some((key.to_string().trim().to_string(), value))
            }
        });
        let settings = Self::from_pairs(pairs, Local::now())?;
        info!(?settings, "loaded settings");
        Ok(settings)
    }

    pub fn from_pairs<I>(pairs: I, loaded_at: DateTime<Local>) -> Result<Self>
    where
        I: IntoIterator<Item = (String, CellValue)>,
    {
        let mut email_to = None;
        let mut email_cc = None;
        let mut subject_prefix = None;
        let mut pdf_name_prefix = None;
        let mut max_invoices = None;

        for (key, value) in pairs {
            let text = Some(value.to_string()).filter(|s| !s.trim().is_empty());
            match key.as_str() {
                EMAIL_TO => email_to = text,
                EMAIL_CC => email_cc = text,
                SUBJECT_PREFIX => subject_prefix = text,
                PDF_NAME_PREFIX => pdf_name_prefix = text,
                MAX_INVOICES if value.is_empty() => max_invoices = None,
                MAX_INVOICES => {
                    let cap = value.as_u32().ok_or_else(|| InvoiceError::InvalidSetting {
                        key: key.clone(),
                        value: value.to_string(),
                    })?;
                    max_invoices = Some(cap);
                }
                other => debug!(key = other, "ignoring unknown setting"),
            }
        }

        Ok(Settings {
            email_to: email_to.ok_or(InvoiceError::MissingSetting(EMAIL_TO))?,
            email_cc,
            subject_prefix: subject_prefix.ok_or(InvoiceError::MissingSetting(SUBJECT_PREFIX))?,
            pdf_name_prefix: pdf_name_prefix.ok_or(InvoiceError::MissingSetting(PDF_NAME_PREFIX))?,
            max_invoices,
            loaded_at,
        })
    }

    /// Re-reads the block, replacing this snapshot.
    pub fn reload(&mut self, book: &dyn Spreadsheet, layout: &SummaryLayout) -> Result<()> {
        *self = Self::load(book, layout)?;
        Ok(())
    }
}

/// Cell value for a typed setting. Only the cap is numeric; the other known
/// keys keep their text as typed, so `007` stays `007`.
pub fn setting_value(key: &str, raw: &str) -> CellValue {
    match key {
        MAX_INVOICES => CellValue::parse_input(raw),
        _ if KNOWN_KEYS.contains(&key) && !raw.trim().is_empty() => CellValue::text(raw),
        _ if KNOWN_KEYS.contains(&key) => CellValue::Empty,
        _ => CellValue::parse_input(raw),
    }
}

/// Writes `key = value` into the settings block: over the row already holding
/// `key`, else into the first row whose key cell is empty.
pub fn write_setting(book: &mut dyn Spreadsheet, layout: &SummaryLayout, key: &str, value: CellValue) -> Result<CellAddr> {
    let range = layout.settings_range;
    let rows = book.get_range(&layout.sheet, &range)?;
    let keys: Vec<String> = rows
        .iter()
        .map(|row| row.first().map(|k| k.to_string().trim().to_string()).unwrap_or_default())
        .collect();

    let offset = keys
        .iter()
        .position(|k| k == key)
        .or_else(|| keys.iter().position(|k| k.is_empty()))
        .ok_or_else(|| InvoiceError::SettingsFull(range.to_string()))?;

    let row = range.start.row + offset as u32;
    let key_cell = CellAddr::new(row, range.start.col);
    let value_cell = CellAddr::new(row, range.start.col + 1);
    book.set_value(&layout.sheet, key_cell, CellValue::text(key))?;
    book.set_value(&layout.sheet, value_cell, value)?;
    info!(key, cell = %value_cell, "setting written");
    Ok(value_cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::TextRenderer;
    use crate::workbook::LocalWorkbook;

    fn pairs(items: &[(&str, CellValue)]) -> Vec<(String, CellValue)> {
        items.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn required() -> Vec<(&'static str, CellValue)> {
        vec![
            (EMAIL_TO, CellValue::text("billing@example.com")),
            (SUBJECT_PREFIX, CellValue::text("Consulting")),
            (PDF_NAME_PREFIX, CellValue::text("Invoice ")),
        ]
    }

    #[test]
    fn optional_keys_stay_absent() {
        let settings = Settings::from_pairs(pairs(&required()), Local::now()).unwrap();
        assert_eq!(settings.email_cc, None);
        assert_eq!(settings.max_invoices, None);
        assert_eq!(settings.pdf_name_prefix, "Invoice ");
    }

    #[test]
    fn blank_cc_is_treated_as_absent() {
        let mut items = required();
        items.push((EMAIL_CC, CellValue::text("  ")));
        items.push((MAX_INVOICES, CellValue::Number(12.0)));
        let settings = Settings::from_pairs(pairs(&items), Local::now()).unwrap();
        assert_eq!(settings.email_cc, None);
        assert_eq!(settings.max_invoices, Some(12));
    }

    #[test]
    fn missing_required_key_fails_fast() {
        let items: Vec<_> = required().into_iter().filter(|(k, _)| *k != SUBJECT_PREFIX).collect();
        let err = Settings::from_pairs(pairs(&items), Local::now()).unwrap_err();
        assert!(matches!(err, InvoiceError::MissingSetting(SUBJECT_PREFIX)));
    }

    #[test]
    fn non_integer_cap_is_rejected() {
        let mut items = required();
        items.push((MAX_INVOICES, CellValue::text("lots")));
        let err = Settings::from_pairs(pairs(&items), Local::now()).unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidSetting { .. }));
    }

    #[test]
    fn write_then_load_from_the_summary_block() {
        let layout = SummaryLayout::default();
        let mut book = LocalWorkbook::in_memory(Box::new(TextRenderer));
        book.add_sheet("Summary").unwrap();
        for (key, value) in required() {
            write_setting(&mut book, &layout, key, value).unwrap();
        }
        let cell = write_setting(&mut book, &layout, EMAIL_TO, CellValue::text("ap@example.com")).unwrap();
        assert_eq!(cell.to_string(), "B2");

        let settings = Settings::load(&book, &layout).unwrap();
        assert_eq!(settings.email_to, "ap@example.com");
        assert_eq!(settings.subject_prefix, "Consulting");
    }

    #[test]
    fn reload_picks_up_a_changed_recipient() {
        let layout = SummaryLayout::default();
        let mut book = LocalWorkbook::in_memory(Box::new(TextRenderer));
        book.add_sheet("Summary").unwrap();
        for (key, value) in required() {
            write_setting(&mut book, &layout, key, value).unwrap();
        }
        let mut settings = Settings::load(&book, &layout).unwrap();
        let first_load = settings.loaded_at;

        write_setting(&mut book, &layout, EMAIL_TO, CellValue::text("ap@example.com")).unwrap();
        assert_eq!(settings.email_to, "billing@example.com");
        settings.reload(&book, &layout).unwrap();
        assert_eq!(settings.email_to, "ap@example.com");
        assert!(settings.loaded_at >= first_load);
    }

    #[test]
    fn typed_values_stay_text_except_the_cap() {
        assert_eq!(setting_value(PDF_NAME_PREFIX, "007"), CellValue::text("007"));
        assert_eq!(setting_value(SUBJECT_PREFIX, "TRUE"), CellValue::text("TRUE"));
        assert_eq!(setting_value(EMAIL_CC, "  "), CellValue::Empty);
        assert_eq!(setting_value(MAX_INVOICES, "12"), CellValue::Number(12.0));
        assert_eq!(setting_value("OTHER", "3"), CellValue::Number(3.0));

        let settings = Settings::from_pairs(
            vec![
                (EMAIL_TO.to_string(), setting_value(EMAIL_TO, "billing@example.com")),
                (SUBJECT_PREFIX.to_string(), setting_value(SUBJECT_PREFIX, "Consulting")),
                (PDF_NAME_PREFIX.to_string(), setting_value(PDF_NAME_PREFIX, "007")),
            ],
            Local::now(),
        )
        .unwrap();
        assert_eq!(settings.pdf_name_prefix, "007");
    }

    #[test]
    fn overlapping_ledger_header_fails_load() {
        let mut layout = SummaryLayout::default();
        layout.ledger_header_row = 5;
        let mut book = LocalWorkbook::in_memory(Box::new(TextRenderer));
        book.add_sheet("Summary").unwrap();
        let err = Settings::load(&book, &layout).unwrap_err();
        assert!(matches!(err, InvoiceError::LedgerOverlapsSettings { .. }));
    }

    #[test]
    fn full_block_rejects_new_keys() {
        let layout = SummaryLayout::default();
        let mut book = LocalWorkbook::in_memory(Box::new(TextRenderer));
        book.add_sheet("Summary").unwrap();
        for n in 0..7 {
            write_setting(&mut book, &layout, &format!("KEY_{n}"), CellValue::Number(1.0)).unwrap();
        }
        let err = write_setting(&mut book, &layout, EMAIL_TO, CellValue::text("x")).unwrap_err();
        assert!(matches!(err, InvoiceError::SettingsFull(_)));
    }
}
