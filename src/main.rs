use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{CommandFactory, Parser, Subcommand};
use inquire::{Select, Text};
use tracing_subscriber::EnvFilter;

use invoice_mailer::config::{AppConfig, MailConfig, RenderKind, default_config_path};
use invoice_mailer::mail::{HttpMailer, MailTransport, OutboxMailer};
use invoice_mailer::render::{Renderer, TextRenderer, TypstRenderer, load_templates};
use invoice_mailer::settings::{KNOWN_KEYS, setting_value, write_setting};
use invoice_mailer::workbook::WorkbookDoc;
use invoice_mailer::{
    InvoiceId, LocalWorkbook, MonthlyRun, RunOutcome, Settings, Spreadsheet, init, ledger, report,
};

// ==========================================
// CLI
// ==========================================

#[derive(Parser)]
#[command(name = "invoice-mailer", version, about = "Generate last month's invoice and mail it")]
struct Cli {
    /// Path to settings.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the invoice for the previous month and mail it
    Run {
        /// Pretend today is this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Create a new workbook with a summary sheet and invoice 1
    Init {
        /// Replace an existing workbook
        #[arg(long)]
        force: bool,
    },
    /// Write a value into the settings block (EMAIL_TO, SUBJECT_PREFIX, ...)
    Setting { key: String, value: String },
    /// Mark invoice as PAID (stays hidden after the next run)
    Pay { id: Option<u32> },
    /// Revert invoice to UNPAID
    Unpay { id: Option<u32> },
    /// Show the invoice ledger
    Summary {
        /// Only list unpaid invoices
        #[arg(long)]
        unpaid: bool,
    },
    /// Configure data directory
    Config,
}

// ==========================================
// Main Function
// ==========================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Run { date } => {
            let today = date.unwrap_or_else(|| Local::now().date_naive());
            run_monthly(&load_config(&config_path)?, today)?;
        }
        Commands::Init { force } => {
            init_workbook(&load_config(&config_path)?, force)?;
        }
        Commands::Setting { key, value } => {
            let config = load_config(&config_path)?;
            let mut book = open_workbook(&config)?;
            if !KNOWN_KEYS.contains(&key.as_str()) {
                println!("⚠️  {} is not a known setting ({}), writing it anyway.", key, KNOWN_KEYS.join(", "));
            }
            let cell = write_setting(&mut book, &config.summary, &key, setting_value(&key, &value))?;
            println!("✅ {} written to {}!{}", key, config.summary.sheet, cell);
        }
        Commands::Pay { id } => {
            // true = Mark as Paid (offers only unpaid)
            change_invoice_status(&load_config(&config_path)?, true, id)?;
        }
        Commands::Unpay { id } => {
            // false = Mark as Unpaid (offers only paid)
            change_invoice_status(&load_config(&config_path)?, false, id)?;
        }
        Commands::Summary { unpaid } => {
            show_summary(&load_config(&config_path)?, unpaid)?;
        }
        Commands::Config => {
            setup_config_wizard(&config_path)?;
        }
    }
    Ok(())
}

// ==========================================
// 1. Monthly Run
// ==========================================

fn run_monthly(config: &AppConfig, today: NaiveDate) -> Result<()> {
    let mut book = open_workbook(config)?;
    let settings = Settings::load(&book, &config.summary).context("Failed to load settings from the summary sheet")?;
    let templates = load_templates(&config.templates_dir())?;
    let mailer = build_mailer(config)?;

    let run = MonthlyRun {
        settings: &settings,
        summary: &config.summary,
        template: &config.template,
        templates: &templates,
    };

    match run.execute(&mut book, mailer.as_ref(), today)? {
        RunOutcome::Sent { invoice, message } => {
            println!("✅ Invoice {} sent to {}", invoice, message.to);
            println!("   Subject: {}", message.subject);
            for attachment in &message.attachments {
                println!("   📎 {} ({} bytes)", attachment.name, attachment.bytes.len());
            }
        }
        RunOutcome::Skipped { cap, .. } => {
            println!("⏭️  Already generated {} invoices...skipping this invoice", cap);
        }
    }
    Ok(())
}

// ==========================================
// 2. Workbook Setup
// ==========================================

fn init_workbook(config: &AppConfig, force: bool) -> Result<()> {
    let path = config.workbook_path();
    let mut book = LocalWorkbook::create(&path, WorkbookDoc::default(), build_renderer(config)?, force)?;
    init::scaffold(&mut book, &config.summary, &config.template, Local::now().date_naive())?;
    load_templates(&config.templates_dir())?;

    println!("✅ Workbook created: {}", path.display());
    println!("💡 Next, fill in the settings:");
    for key in KNOWN_KEYS {
        println!("   invoice-mailer setting {} <value>", key);
    }
    Ok(())
}

fn open_workbook(config: &AppConfig) -> Result<LocalWorkbook> {
    let path = config.workbook_path();
    if !path.exists() {
        bail!("No workbook at {}. Run `invoice-mailer init` first.", path.display());
    }
    LocalWorkbook::open(&path, build_renderer(config)?)
        .with_context(|| format!("Failed to open workbook {}", path.display()))
}

fn build_renderer(config: &AppConfig) -> Result<Box<dyn Renderer>> {
    let renderer: Box<dyn Renderer> = match config.render.kind {
        RenderKind::Typst => Box::new(TypstRenderer::new(
            load_templates(&config.templates_dir())?,
            config.output_dir(),
        )),
        RenderKind::Text => Box::new(TextRenderer),
    };
    Ok(renderer)
}

fn build_mailer(config: &AppConfig) -> Result<Box<dyn MailTransport>> {
    let mailer: Box<dyn MailTransport> = match &config.mail {
        MailConfig::Outbox { .. } => Box::new(OutboxMailer::new(config.outbox_dir())),
        MailConfig::Http { endpoint, token_env } => Box::new(HttpMailer::from_env(endpoint, token_env)?),
    };
    Ok(mailer)
}

// ==========================================
// 3. Pay / Unpay Logic
// ==========================================

fn change_invoice_status(config: &AppConfig, target_paid: bool, id: Option<u32>) -> Result<()> {
    let mut book = open_workbook(config)?;

    let id = match id {
        Some(id) => InvoiceId(id),
        None => {
            let candidates: Vec<String> = ledger::read_entries(&book, &config.summary)?
                .into_iter()
                .filter(|e| e.paid != target_paid)
                .map(|e| match e.created {
                    Some(date) => format!("{} | {}", e.id, date.format("%m/%d/%Y")),
                    None => e.id.to_string(),
                })
                .collect();

            if candidates.is_empty() {
                println!("❌ No matching invoices found.");
                return Ok(());
            }

            let action_name = if target_paid { "Mark as PAID" } else { "Mark as UNPAID" };
            match Select::new(&format!("Select Invoice to {}:", action_name), candidates)
                .with_page_size(10)
                .prompt()
            {
                Ok(choice) => {
                    let raw = choice.split(" | ").next().unwrap_or_default();
                    raw.parse::<InvoiceId>().with_context(|| format!("Unexpected selection {:?}", choice))?
                }
                Err(_) => {
                    println!("Cancelled");
                    return Ok(());
                }
            }
        }
    };

    ledger::set_paid(&mut book, &config.summary, id, target_paid)?;
    let status = if target_paid { "PAID" } else { "UNPAID" };
    println!("✅ Invoice {} marked as {}. Visibility updates on the next run.", id, status);
    Ok(())
}

// ==========================================
// 4. Summary
// ==========================================

fn show_summary(config: &AppConfig, unpaid_only: bool) -> Result<()> {
    let book = open_workbook(config)?;
    let entries = ledger::read_entries(&book, &config.summary)?;
    if entries.is_empty() {
        println!("No invoices found.");
        return Ok(());
    }
    let table = report::ledger_table(&entries, &book.sheets(), unpaid_only);
    println!("\n--- Invoice Ledger ({}) ---", config.workbook_path().display());
    println!("{table}");
    Ok(())
}

// ==========================================
// 5. Config
// ==========================================

fn load_config(path: &Path) -> Result<AppConfig> {
    match AppConfig::load(path).with_context(|| format!("Failed to read {}", path.display()))? {
        Some(config) => Ok(config),
        None => setup_config_wizard(path),
    }
}

fn setup_config_wizard(path: &Path) -> Result<AppConfig> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = AppConfig::load(path).ok().flatten();
    let default_val = current
        .as_ref()
        .map(|c| c.data_root.clone())
        .unwrap_or_else(|| "~/Documents/Invoices".to_string());

    let data_root = Text::new("Enter Root Data Directory:").with_default(&default_val).prompt()?;

    let config = match current {
        Some(mut config) => {
            config.data_root = data_root;
            config
        }
        None => AppConfig::new(data_root),
    };
    config.save(path)?;
    println!("✅ Settings saved to {}", path.display());
    Ok(config)
}
