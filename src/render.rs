//! Turning visible sheets into an attachable document, and the tera templates
//! used for documents and message bodies.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use comfy_table::Table;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::error::{InvoiceError, Result};
use crate::workbook::Sheet;

pub const WORKBOOK_TEMPLATE: &str = "workbook.typ.tera";
pub const EMAIL_BODY_TEMPLATE: &str = "email_body.tera";

// Embed templates at compile time to ensure availability
const DEFAULT_WORKBOOK_TEMPLATE: &str = include_str!("../templates/workbook.typ.tera");
const DEFAULT_EMAIL_BODY_TEMPLATE: &str = include_str!("../templates/email_body.tera");

const DEFAULTS: [(&str, &str); 2] = [
    (WORKBOOK_TEMPLATE, DEFAULT_WORKBOOK_TEMPLATE),
    (EMAIL_BODY_TEMPLATE, DEFAULT_EMAIL_BODY_TEMPLATE),
];

/// Loads `*.tera` from `dir`, writing the built-in defaults for any that are missing.
pub fn load_templates(dir: &Path) -> Result<Tera> {
    fs::create_dir_all(dir)?;
    for (name, content) in DEFAULTS {
        let path = dir.join(name);
        if !path.exists() {
            info!(path = %path.display(), "initializing default template");
            fs::write(&path, content)?;
        }
    }
    let pattern = dir.join("*.tera");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| InvoiceError::Render(format!("non UTF-8 template path {}", dir.display())))?;
    Ok(Tera::new(pattern)?)
}

/// The built-in templates only, for runs without a data folder.
pub fn builtin_templates() -> Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(DEFAULTS)?;
    Ok(tera)
}

pub trait Renderer {
    fn render(&self, sheets: &[&Sheet], name: &str) -> Result<Vec<u8>>;
    fn mime(&self) -> &'static str;
    fn extension(&self) -> &'static str;
}

/// Plain text export: one grid per visible sheet.
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn render(&self, sheets: &[&Sheet], _name: &str) -> Result<Vec<u8>> {
        let mut out = String::new();
        for sheet in sheets {
            out.push_str(&format!("== {} ==\n", sheet.name));
            let mut table = Table::new();
            for row in sheet.grid() {
                table.add_row(row);
            }
            out.push_str(&table.to_string());
            out.push_str("\n\n");
        }
        Ok(out.into_bytes())
    }

    fn mime(&self) -> &'static str {
        "text/plain"
    }

    fn extension(&self) -> &'static str {
        "txt"
    }
}

#[derive(Serialize)]
struct SheetView {
    name: String,
    columns: usize,
    rows: Vec<Vec<String>>,
}

fn typst_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// PDF export through the `typst` CLI. The `.typ` source and the compiled PDF
/// are kept in `output_dir`.
pub struct TypstRenderer {
    tera: Tera,
    output_dir: PathBuf,
}

impl TypstRenderer {
    pub fn new(tera: Tera, output_dir: PathBuf) -> Self {
        TypstRenderer { tera, output_dir }
    }

    fn source(&self, sheets: &[&Sheet]) -> Result<String> {
        let views: Vec<SheetView> = sheets
            .iter()
            .map(|sheet| {
                let rows: Vec<Vec<String>> = sheet
                    .grid()
                    .into_iter()
                    .map(|row| row.iter().map(|cell| typst_escape(cell)).collect())
                    .collect();
                SheetView {
                    name: sheet.name.clone(),
                    columns: rows.first().map_or(0, Vec::len),
                    rows,
                }
            })
            .filter(|view| view.columns > 0)
            .collect();
        let mut context = Context::new();
        context.insert("sheets", &views);
        Ok(self.tera.render(WORKBOOK_TEMPLATE, &context)?)
    }
}

impl Renderer for TypstRenderer {
    fn render(&self, sheets: &[&Sheet], name: &str) -> Result<Vec<u8>> {
        // Check if Typst is installed
        if Command::new("typst").arg("--version").output().is_err() {
            return Err(InvoiceError::Render(
                "'typst' is not installed, see https://github.com/typst/typst".to_string(),
            ));
        }

        fs::create_dir_all(&self.output_dir)?;
        let typ_path = self.output_dir.join(format!("{}.typ", name));
        let pdf_path = self.output_dir.join(format!("{}.pdf", name));
        fs::write(&typ_path, self.source(sheets)?)?;

        debug!(path = %typ_path.display(), "compiling PDF");
        let status = Command::new("typst").arg("compile").arg(&typ_path).arg(&pdf_path).status()?;
        if !status.success() {
            return Err(InvoiceError::Render(format!("typst compile exited with {}", status)));
        }
        Ok(fs::read(&pdf_path)?)
    }

    fn mime(&self) -> &'static str {
        "application/pdf"
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }
}
