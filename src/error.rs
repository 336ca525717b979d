use thiserror::Error;

#[derive(Error, Debug)]
pub enum InvoiceError {
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Sheet already exists: {0}")]
    SheetExists(String),

    #[error("Workbook has no invoice sheet to use as a template")]
    NoTemplate,

    #[error("Missing required setting {0} on the summary sheet")]
    MissingSetting(&'static str),

    #[error("Invalid value for setting {key}: {value:?}")]
    InvalidSetting { key: String, value: String },

    #[error("Settings block {0} has no free row left")]
    SettingsFull(String),

    #[error("Template field {field} at {cell}: expected {expected:?}, found {found:?}")]
    LayoutMismatch {
        field: String,
        cell: String,
        expected: String,
        found: String,
    },

    #[error("Summary layout: ledger header row {header_row} must be below the settings block {settings}")]
    LedgerOverlapsSettings { header_row: u32, settings: String },

    #[error("Ledger out of sync: {ledger_rows} ledger rows but {invoice_sheets} invoice sheets, reconcile the workbook by hand")]
    LedgerOutOfSync {
        ledger_rows: usize,
        invoice_sheets: usize,
    },

    #[error("Invoice {0} not found in ledger")]
    UnknownInvoice(u32),

    #[error("Workbook already exists: {0}")]
    WorkbookExists(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Mail delivery failed: {0}")]
    Mail(String),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InvoiceError>;
