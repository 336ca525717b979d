//! The document backend: a trait over the spreadsheet operations the invoice
//! workflow needs, and a JSON-file workbook that implements it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{InvoiceError, Result};
use crate::model::{Attachment, CellAddr, CellRange, CellValue, SheetInfo, Validation};
use crate::render::Renderer;

/// Spreadsheet operations the invoice workflow relies on.
///
/// Calls are blocking and each one is expected to take effect immediately,
/// the way a hosted spreadsheet API behaves.
pub trait Spreadsheet {
    /// All sheets in workbook order.
    fn sheets(&self) -> Vec<SheetInfo>;

    /// Values in `range`, one inner vector per row. Unset cells are `Empty`.
    fn get_range(&self, sheet: &str, range: &CellRange) -> Result<Vec<Vec<CellValue>>>;

    /// Last row holding any non-empty cell, 0 for an empty sheet.
    fn last_row(&self, sheet: &str) -> Result<u32>;

    fn set_value(&mut self, sheet: &str, addr: CellAddr, value: CellValue) -> Result<()>;

    /// Copies `source` to a new sheet at the end of the order and returns its name.
    fn duplicate_sheet(&mut self, source: &str) -> Result<String>;

    fn set_hidden(&mut self, sheet: &str, hidden: bool) -> Result<()>;

    fn rename_sheet(&mut self, from: &str, to: &str) -> Result<()>;

    /// Writes `values` from column A on the row after `last_row`; returns that row.
    fn append_row(&mut self, sheet: &str, values: Vec<CellValue>) -> Result<u32>;

    fn set_validation(&mut self, sheet: &str, addr: CellAddr, validation: Validation) -> Result<()>;

    /// Renders the visible sheets into a single document called `name`.
    fn export(&self, name: &str) -> Result<Attachment>;

    fn get_value(&self, sheet: &str, addr: CellAddr) -> Result<CellValue> {
        let rows = self.get_range(sheet, &CellRange::new(addr, addr))?;
        Ok(rows.into_iter().flatten().next().unwrap_or_default())
    }

    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheets().iter().any(|s| s.name == sheet)
    }

    fn is_hidden(&self, sheet: &str) -> Result<bool> {
        self.sheets()
            .into_iter()
            .find(|s| s.name == sheet)
            .map(|s| s.hidden)
            .ok_or_else(|| InvoiceError::SheetNotFound(sheet.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub cells: BTreeMap<CellAddr, CellValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub validations: BTreeMap<CellAddr, Validation>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Sheet {
            name: name.into(),
            ..Sheet::default()
        }
    }

    pub fn value(&self, addr: CellAddr) -> CellValue {
        self.cells.get(&addr).cloned().unwrap_or_default()
    }

    pub fn last_row(&self) -> u32 {
        self.cells
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(a, _)| a.row)
            .max()
            .unwrap_or(0)
    }

    pub fn last_col(&self) -> u32 {
        self.cells
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(a, _)| a.col)
            .max()
            .unwrap_or(0)
    }

    /// Displayed text of the populated area, row by row.
    pub fn grid(&self) -> Vec<Vec<String>> {
        let (rows, cols) = (self.last_row(), self.last_col());
        (1..=rows)
            .map(|r| (1..=cols).map(|c| self.value(CellAddr::new(r, c)).to_string()).collect())
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct WorkbookDoc {
    pub sheets: Vec<Sheet>,
}

/// Workbook stored as a JSON file. Every mutating call is written through to
/// disk before it returns; a workbook without a path lives only in memory.
pub struct LocalWorkbook {
    path: Option<PathBuf>,
    doc: WorkbookDoc,
    renderer: Box<dyn Renderer>,
}

impl LocalWorkbook {
    pub fn open(path: &Path, renderer: Box<dyn Renderer>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let doc: WorkbookDoc = serde_json::from_str(&content)?;
        debug!(path = %path.display(), sheets = doc.sheets.len(), "opened workbook");
        Ok(LocalWorkbook {
            path: Some(path.to_path_buf()),
            doc,
            renderer,
        })
    }

    /// Writes `doc` to a new file at `path`; refuses to replace an existing one
    /// unless `overwrite` is set.
    pub fn create(path: &Path, doc: WorkbookDoc, renderer: Box<dyn Renderer>, overwrite: bool) -> Result<Self> {
        if path.exists() && !overwrite {
            return Err(InvoiceError::WorkbookExists(path.display().to_string()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let book = LocalWorkbook {
            path: Some(path.to_path_buf()),
            doc,
            renderer,
        };
        book.persist()?;
        info!(path = %path.display(), "created workbook");
        Ok(book)
    }

    pub fn in_memory(renderer: Box<dyn Renderer>) -> Self {
        Self::from_doc(WorkbookDoc::default(), renderer)
    }

    pub fn from_doc(doc: WorkbookDoc, renderer: Box<dyn Renderer>) -> Self {
        LocalWorkbook {
            path: None,
            doc,
            renderer,
        }
    }

    pub fn doc(&self) -> &WorkbookDoc {
        &self.doc
    }

    pub fn add_sheet(&mut self, name: &str) -> Result<()> {
        if self.sheet(name).is_ok() {
            return Err(InvoiceError::SheetExists(name.to_string()));
        }
        self.doc.sheets.push(Sheet::new(name));
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        if let Some(path) = &self.path {
            fs::write(path, serde_json::to_string_pretty(&self.doc)?)?;
        }
        Ok(())
    }

    fn sheet(&self, name: &str) -> Result<&Sheet> {
        self.doc
            .sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| InvoiceError::SheetNotFound(name.to_string()))
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        self.doc
            .sheets
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| InvoiceError::SheetNotFound(name.to_string()))
    }

    fn unique_copy_name(&self, source: &str) -> String {
        let base = format!("Copy of {}", source);
        let mut name = base.clone();
        let mut n = 2;
        while self.sheet(&name).is_ok() {
            name = format!("{} {}", base, n);
            n += 1;
        }
        name
    }
}

impl Spreadsheet for LocalWorkbook {
    fn sheets(&self) -> Vec<SheetInfo> {
        self.doc
            .sheets
            .iter()
            .map(|s| SheetInfo {
                name: s.name.clone(),
                hidden: s.hidden,
            })
            .collect()
    }

    fn get_range(&self, sheet: &str, range: &CellRange) -> Result<Vec<Vec<CellValue>>> {
        let sheet = self.sheet(sheet)?;
        Ok(range
            .rows()
            .map(|r| range.cols().map(|c| sheet.value(CellAddr::new(r, c))).collect())
            .collect())
    }

    fn last_row(&self, sheet: &str) -> Result<u32> {
        Ok(self.sheet(sheet)?.last_row())
    }

    fn set_value(&mut self, sheet: &str, addr: CellAddr, value: CellValue) -> Result<()> {
        let sheet = self.sheet_mut(sheet)?;
        if value == CellValue::Empty {
            sheet.cells.remove(&addr);
        } else {
            sheet.cells.insert(addr, value);
        }
        self.persist()
    }

    fn duplicate_sheet(&mut self, source: &str) -> Result<String> {
        let mut copy = self.sheet(source)?.clone();
        copy.name = self.unique_copy_name(source);
        let name = copy.name.clone();
        self.doc.sheets.push(copy);
        self.persist()?;
        debug!(source, copy = %name, "duplicated sheet");
        Ok(name)
    }

    fn set_hidden(&mut self, sheet: &str, hidden: bool) -> Result<()> {
        self.sheet_mut(sheet)?.hidden = hidden;
        self.persist()
    }

    fn rename_sheet(&mut self, from: &str, to: &str) -> Result<()> {
        if from != to && self.sheet(to).is_ok() {
            return Err(InvoiceError::SheetExists(to.to_string()));
        }
        self.sheet_mut(from)?.name = to.to_string();
        self.persist()
    }

    fn append_row(&mut self, sheet: &str, values: Vec<CellValue>) -> Result<u32> {
        let target = self.sheet_mut(sheet)?;
        let row = target.last_row() + 1;
        for (col, value) in (1u32..).zip(values) {
            if value != CellValue::Empty {
                target.cells.insert(CellAddr::new(row, col), value);
            }
        }
        self.persist()?;
        Ok(row)
    }

    fn set_validation(&mut self, sheet: &str, addr: CellAddr, validation: Validation) -> Result<()> {
        self.sheet_mut(sheet)?.validations.insert(addr, validation);
        self.persist()
    }

    fn export(&self, name: &str) -> Result<Attachment> {
        let visible: Vec<&Sheet> = self.doc.sheets.iter().filter(|s| !s.hidden).collect();
        debug!(
            sheets = ?visible.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "exporting visible sheets"
        );
        let bytes = self.renderer.render(&visible, name)?;
        Ok(Attachment {
            name: format!("{}.{}", name, self.renderer.extension()),
            mime: self.renderer.mime().to_string(),
            bytes,
        })
    }
}
