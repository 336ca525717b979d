//! Application configuration: where the workbook lives, how the summary and
//! template sheets are laid out, and which renderer and mail transport to use.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InvoiceError, Result};
use crate::model::{CellAddr, CellRange};
use crate::workbook::Spreadsheet;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub data_root: String,
    #[serde(default = "default_workbook")]
    pub workbook: String,
    #[serde(default)]
    pub summary: SummaryLayout,
    #[serde(default)]
    pub template: TemplateLayout,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

fn default_workbook() -> String {
    "workbook.json".to_string()
}

impl AppConfig {
    pub fn new(data_root: impl Into<String>) -> Self {
        AppConfig {
            data_root: data_root.into(),
            workbook: default_workbook(),
            summary: SummaryLayout::default(),
            template: TemplateLayout::default(),
            render: RenderConfig::default(),
            mail: MailConfig::default(),
        }
    }

    pub fn root(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.root().join(&self.workbook)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("output")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root().join("templates")
    }

    pub fn outbox_dir(&self) -> PathBuf {
        match &self.mail {
            MailConfig::Outbox { dir: Some(dir) } => PathBuf::from(expand_home_dir(dir)),
            _ => self.root().join("outbox"),
        }
    }

    /// Reads the config file, `None` when it does not exist yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.summary.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(Some(config))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Default location of `settings.toml` in the platform config directory.
pub fn default_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "invoice-mailer", "app") {
        return proj_dirs.config_dir().join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

/// Where the settings block and the ledger live on the summary sheet.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SummaryLayout {
    pub sheet: String,
    pub settings_range: CellRange,
    pub ledger_header_row: u32,
}

impl Default for SummaryLayout {
    fn default() -> Self {
        SummaryLayout {
            sheet: "Summary".to_string(),
            settings_range: CellRange::new(CellAddr::new(2, 1), CellAddr::new(8, 2)),
            ledger_header_row: 10,
        }
    }
}

impl SummaryLayout {
    /// The ledger header must sit below the settings block so appended ledger
    /// rows never land on a setting.
    pub fn validate(&self) -> Result<()> {
        if self.ledger_header_row <= self.settings_range.end.row {
            return Err(InvoiceError::LedgerOverlapsSettings {
                header_row: self.ledger_header_row,
                settings: self.settings_range.to_string(),
            });
        }
        Ok(())
    }
}

/// Text a template cell must hold for a field's address to be trusted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LabelCheck {
    pub cell: CellAddr,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FieldCell {
    pub cell: CellAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<LabelCheck>,
}

impl FieldCell {
    fn labelled(cell: CellAddr, label_cell: CellAddr, text: &str) -> Self {
        FieldCell {
            cell,
            label: Some(LabelCheck {
                cell: label_cell,
                text: text.to_string(),
            }),
        }
    }
}

/// Cells on an invoice sheet that get stamped for every new invoice.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TemplateLayout {
    pub invoice_id: FieldCell,
    pub issue_date: FieldCell,
    pub period_start: FieldCell,
    pub period_end: FieldCell,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        TemplateLayout {
            invoice_id: FieldCell::labelled(CellAddr::new(3, 5), CellAddr::new(3, 4), "Invoice #"),
            issue_date: FieldCell::labelled(CellAddr::new(4, 5), CellAddr::new(4, 4), "Date"),
            period_start: FieldCell::labelled(CellAddr::new(21, 3), CellAddr::new(20, 3), "From"),
            period_end: FieldCell::labelled(CellAddr::new(21, 4), CellAddr::new(20, 4), "To"),
        }
    }
}

impl TemplateLayout {
    pub fn fields(&self) -> [(&'static str, &FieldCell); 4] {
        [
            ("invoice_id", &self.invoice_id),
            ("issue_date", &self.issue_date),
            ("period_start", &self.period_start),
            ("period_end", &self.period_end),
        ]
    }

    /// Checks the layout against the sheet that is about to be duplicated.
    /// Field cells must be distinct and every configured label must match.
    pub fn validate(&self, book: &dyn Spreadsheet, sheet: &str) -> Result<()> {
        let mut seen = BTreeSet::new();
        for (field, field_cell) in self.fields() {
            if !seen.insert(field_cell.cell) {
                return Err(InvoiceError::LayoutMismatch {
                    field: field.to_string(),
                    cell: field_cell.cell.to_string(),
                    expected: "a cell no other field uses".to_string(),
                    found: "a duplicate address".to_string(),
                });
            }
            let Some(label) = &field_cell.label else { continue };
            let found = book.get_value(sheet, label.cell)?.to_string();
            if !found.trim().eq_ignore_ascii_case(label.text.trim()) {
                return Err(InvoiceError::LayoutMismatch {
                    field: field.to_string(),
                    cell: label.cell.to_string(),
                    expected: label.text.clone(),
                    found,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderKind {
    #[default]
    Typst,
    Text,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct RenderConfig {
    pub kind: RenderKind,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MailConfig {
    Outbox {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dir: Option<String>,
    },
    Http {
        endpoint: String,
        #[serde(default = "default_token_env")]
        token_env: String,
    },
}

fn default_token_env() -> String {
    "INVOICE_MAILER_TOKEN".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        MailConfig::Outbox { dir: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;
    use crate::render::TextRenderer;
    use crate::workbook::LocalWorkbook;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: AppConfig = toml::from_str(r#"data_root = "/srv/invoices""#).unwrap();
        assert_eq!(config.workbook, "workbook.json");
        assert_eq!(config.summary.sheet, "Summary");
        assert_eq!(config.summary.settings_range.to_string(), "A2:B8");
        assert_eq!(config.template.invoice_id.cell.to_string(), "E3");
        assert_eq!(config.template.period_end.cell.to_string(), "D21");
        assert_eq!(config.render.kind, RenderKind::Typst);
        assert_eq!(config.mail, MailConfig::Outbox { dir: None });
        assert_eq!(config.workbook_path(), PathBuf::from("/srv/invoices/workbook.json"));
    }

    #[test]
    fn overrides_parse_from_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            data_root = "/tmp/x"

            [summary]
            ledger_header_row = 12

            [template.invoice_id]
            cell = "F2"

            [render]
            kind = "text"

            [mail]
            kind = "http"
            endpoint = "https://mail.example.com/send"
            "#,
        )
        .unwrap();
        assert_eq!(config.summary.ledger_header_row, 12);
        assert_eq!(config.summary.sheet, "Summary");
        assert_eq!(config.template.invoice_id.cell, CellAddr::new(2, 6));
        assert!(config.template.invoice_id.label.is_none());
        assert_eq!(config.render.kind, RenderKind::Text);
        match config.mail {
            MailConfig::Http { endpoint, token_env } => {
                assert_eq!(endpoint, "https://mail.example.com/send");
                assert_eq!(token_env, "INVOICE_MAILER_TOKEN");
            }
            other => panic!("unexpected mail config {other:?}"),
        }
    }

    #[test]
    fn ledger_header_inside_settings_block_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "data_root = \"/tmp/x\"\n\n[summary]\nledger_header_row = 5\n").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, InvoiceError::LedgerOverlapsSettings { header_row: 5, .. }));

        let mut layout = SummaryLayout::default();
        layout.ledger_header_row = 8;
        assert!(layout.validate().is_err());
        layout.ledger_header_row = 9;
        layout.validate().unwrap();
    }

    #[test]
    fn layout_validation_catches_moved_labels() {
        let layout = TemplateLayout::default();
        let mut book = LocalWorkbook::in_memory(Box::new(TextRenderer));
        book.add_sheet("1").unwrap();
        for (_, field) in layout.fields() {
            let label = field.label.as_ref().unwrap();
            book.set_value("1", label.cell, CellValue::text(label.text.as_str())).unwrap();
        }
        layout.validate(&book, "1").unwrap();

        book.set_value("1", CellAddr::new(20, 3), CellValue::text("Qty")).unwrap();
        let err = layout.validate(&book, "1").unwrap_err();
        assert!(matches!(err, InvoiceError::LayoutMismatch { ref field, .. } if field == "period_start"));
    }

    #[test]
    fn layout_validation_rejects_shared_cells() {
        let mut layout = TemplateLayout::default();
        layout.period_end = FieldCell { cell: layout.period_start.cell, label: None };
        let mut book = LocalWorkbook::in_memory(Box::new(TextRenderer));
        book.add_sheet("1").unwrap();
        layout.period_start.label = None;
        layout.invoice_id.label = None;
        layout.issue_date.label = None;
        assert!(layout.validate(&book, "1").is_err());
    }
}
