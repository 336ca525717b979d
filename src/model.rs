use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{InvoiceError, Result};

/// Typed value stored in a workbook cell.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Spreadsheet truthiness, used for the ledger's paid column.
    /// Checkbox cells hold booleans, but hand-typed "TRUE" or 1 count too.
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Bool(b) => *b,
            CellValue::Number(n) => *n != 0.0,
            CellValue::Text(s) => s.trim().eq_ignore_ascii_case("true"),
            CellValue::Date(_) | CellValue::Empty => false,
        }
    }

    /// Whole, non-negative numbers (or text holding one) as an integer.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            CellValue::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX) => {
                Some(*n as u32)
            }
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Parse a user-typed value: integers become numbers, TRUE/FALSE booleans,
    /// anything else text.
    pub fn parse_input(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return CellValue::Number(n as f64);
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }
        CellValue::Text(raw.to_string())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            // Avoid ".0" suffix for whole numbers
            CellValue::Number(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::Date(d) => write!(f, "{}", d.format("%m/%d/%Y")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<InvoiceId> for CellValue {
    fn from(id: InvoiceId) -> Self {
        CellValue::Number(f64::from(id.0))
    }
}

fn a1_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Za-z]{1,3})([1-9][0-9]{0,6})$").expect("valid A1 pattern"))
}

/// A1-style cell address. Row and column are both 1-based (`A1` is `(1, 1)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellAddr {
    pub row: u32,
    pub col: u32,
}

impl CellAddr {
    pub const fn new(row: u32, col: u32) -> Self {
        CellAddr { row, col }
    }
}

/// Column letters for a 1-based column index: 1=A, 26=Z, 27=AA.
pub fn col_to_letters(col: u32) -> String {
    let mut result = String::new();
    let mut n = col;
    while n > 0 {
        let rem = (n - 1) % 26;
        result.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    result
}

impl fmt::Display for CellAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row)
    }
}

impl FromStr for CellAddr {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = a1_pattern()
            .captures(s.trim())
            .ok_or_else(|| InvoiceError::InvalidAddress(s.to_string()))?;
        let col = caps[1]
            .to_ascii_uppercase()
            .bytes()
            .fold(0u32, |acc, b| acc * 26 + u32::from(b - b'A' + 1));
        let row = caps[2]
            .parse()
            .map_err(|_| InvoiceError::InvalidAddress(s.to_string()))?;
        Ok(CellAddr { row, col })
    }
}

impl TryFrom<String> for CellAddr {
    type Error = InvoiceError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<CellAddr> for String {
    fn from(addr: CellAddr) -> Self {
        addr.to_string()
    }
}

/// Rectangular A1 range such as `A2:B8`, corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellRange {
    pub start: CellAddr,
    pub end: CellAddr,
}

impl CellRange {
    pub fn new(start: CellAddr, end: CellAddr) -> Self {
        CellRange {
            start: CellAddr::new(start.row.min(end.row), start.col.min(end.col)),
            end: CellAddr::new(start.row.max(end.row), start.col.max(end.col)),
        }
    }

    pub fn rows(&self) -> std::ops::RangeInclusive<u32> {
        self.start.row..=self.end.row
    }

    pub fn cols(&self) -> std::ops::RangeInclusive<u32> {
        self.start.col..=self.end.col
    }

    pub fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for CellRange {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s
            .split_once(':')
            .ok_or_else(|| InvoiceError::InvalidRange(s.to_string()))?;
        let start: CellAddr = start.parse().map_err(|_| InvoiceError::InvalidRange(s.to_string()))?;
        let end: CellAddr = end.parse().map_err(|_| InvoiceError::InvalidRange(s.to_string()))?;
        Ok(CellRange::new(start, end))
    }
}

impl TryFrom<String> for CellRange {
    type Error = InvoiceError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<CellRange> for String {
    fn from(range: CellRange) -> Self {
        range.to_string()
    }
}

/// Data validation rules the backend can attach to a cell.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    Checkbox,
}

/// Sequential invoice number. Doubles as the invoice sheet's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvoiceId(pub u32);

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InvoiceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(InvoiceId)
    }
}

/// Name and visibility of one sheet, in workbook order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub name: String,
    pub hidden: bool,
}

/// One ledger row on the summary sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: InvoiceId,
    pub created: Option<NaiveDate>,
    pub paid: bool,
    /// 1-based sheet row the entry lives on.
    pub row: u32,
}

/// A rendered document ready to be attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_a1_addresses() {
        let addr: CellAddr = "E3".parse().unwrap();
        assert_eq!(addr, CellAddr::new(3, 5));
        assert_eq!(addr.to_string(), "E3");

        let wide: CellAddr = "aa100".parse().unwrap();
        assert_eq!(wide, CellAddr::new(100, 27));
        assert_eq!(wide.to_string(), "AA100");
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!("3E".parse::<CellAddr>().is_err());
        assert!("A0".parse::<CellAddr>().is_err());
        assert!("".parse::<CellAddr>().is_err());
        assert!("A1:B2".parse::<CellAddr>().is_err());
    }

    #[test]
    fn range_normalises_corners() {
        let range: CellRange = "B8:A2".parse().unwrap();
        assert_eq!(range.to_string(), "A2:B8");
        assert_eq!(range.width(), 2);
        assert_eq!(range.rows().count(), 7);
    }

    #[test]
    fn paid_column_truthiness() {
        assert!(CellValue::Bool(true).is_truthy());
        assert!(!CellValue::Bool(false).is_truthy());
        assert!(CellValue::text("TRUE").is_truthy());
        assert!(!CellValue::text("FALSE").is_truthy());
        assert!(CellValue::Number(1.0).is_truthy());
        assert!(!CellValue::Empty.is_truthy());
    }

    #[test]
    fn whole_numbers_display_without_fraction() {
        assert_eq!(CellValue::Number(7.0).to_string(), "7");
        assert_eq!(CellValue::Number(7.5).to_string(), "7.5");
        assert_eq!(CellValue::parse_input("12"), CellValue::Number(12.0));
        assert_eq!(CellValue::parse_input("a@b.c"), CellValue::text("a@b.c"));
    }
}
