//! CLI binary for paygate.
//!
//! A thin shim over the library crate: maps flags to `VerifierConfig`, opens
//! the SQLite ledger, and prints reports. Handy for operators checking a
//! disputed receipt and for tuning markers against real documents.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use paygate::{
    extract_document, inspect_document, AcceptanceRules, AcceptanceVerdict, Document, Ledger,
    PaymentVerifier, ProgressCallback, RecordOutcome, SqliteLedger, SubmissionOutcome, UserId,
    VerificationProgressCallback, VerifierConfig,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── Spinner progress callback ────────────────────────────────────────────────

struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Reading");
        bar.set_message("opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    /// Stop and erase the spinner. Safe to call more than once.
    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl VerificationProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.bar.set_message(format!("{total_pages} page(s) to recognise"));
    }

    fn on_page_recognised(&self, page_num: usize, total_pages: usize, chars: usize) {
        self.bar.println(format!(
            "  {} Page {}/{}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{chars} chars"))
        ));
    }

    fn on_verdict(&self, _verdict: &AcceptanceVerdict) {
        self.finish();
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

/// Verify payment receipts and manage the payment ledger.
#[derive(Parser, Debug)]
#[command(
    name = "paygate",
    version,
    about = "Verify payment receipts with OCR and record accepted payments once",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAYGATE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "PAYGATE_QUIET")]
    quiet: bool,

    /// Print results as JSON.
    #[arg(long, global = true, env = "PAYGATE_JSON")]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a receipt for a user and record the payment if accepted.
    Verify {
        /// User identity (chat id or handle).
        #[arg(long)]
        user: String,
        /// Receipt file (PDF, PNG, JPEG or TIFF).
        file: PathBuf,
        #[command(flatten)]
        ledger: LedgerArgs,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Show whether a user has paid.
    Status {
        #[arg(long)]
        user: String,
        #[command(flatten)]
        ledger: LedgerArgs,
    },
    /// Record a payment by hand, e.g. after checking a receipt manually.
    Record {
        #[arg(long)]
        user: String,
        #[command(flatten)]
        ledger: LedgerArgs,
    },
    /// Print container metadata only (no OCR, no ledger).
    Inspect {
        file: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Print OCR text as the rule engine would see it.
    Extract {
        file: PathBuf,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[derive(Args, Debug)]
struct LedgerArgs {
    /// SQLite ledger file.
    #[arg(long, env = "PAYGATE_DB", default_value = "payments.db")]
    db: PathBuf,
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Rendering DPI (72–600).
    #[arg(long, env = "PAYGATE_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Tesseract language(s), e.g. rus or rus+eng.
    #[arg(long, env = "PAYGATE_LANG", default_value = "rus")]
    lang: String,

    /// Tesseract executable.
    #[arg(long, env = "PAYGATE_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// Tesseract page segmentation mode.
    #[arg(long, env = "PAYGATE_PSM")]
    psm: Option<u8>,

    /// Directory containing libpdfium.
    #[arg(long, env = "PAYGATE_PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Per-submission timeout in seconds.
    #[arg(long, env = "PAYGATE_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// JSON file with {"issuer": ..., "required_markers": [...]}.
    #[arg(long, env = "PAYGATE_RULES")]
    rules: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Verify {
            user,
            file,
            ledger,
            pipeline,
        } => run_verify(&cli, user, file, ledger, pipeline).await,
        Command::Status { user, ledger } => run_status(&cli, user, ledger),
        Command::Record { user, ledger } => run_record(&cli, user, ledger),
        Command::Inspect { file, pipeline } => run_inspect(&cli, file, pipeline).await,
        Command::Extract { file, pipeline } => run_extract(&cli, file, pipeline).await,
    }
}

async fn run_verify(
    cli: &Cli,
    user: &str,
    file: &Path,
    ledger_args: &LedgerArgs,
    pipeline: &PipelineArgs,
) -> Result<()> {
    let ledger = SqliteLedger::open(&ledger_args.db)
        .with_context(|| format!("Failed to open ledger {:?}", ledger_args.db))?;
    let spinner = show_progress(cli).then(CliProgressCallback::new);
    let progress = spinner.clone().map(|s| s as ProgressCallback);
    let config = build_config(pipeline, progress).await?;
    let verifier = PaymentVerifier::new(config, Arc::new(ledger));

    let document = read_document(file)?;
    let user = UserId::from(user);
    verifier.start(&user).await.context("Failed to read ledger")?;
    let submitted = verifier.submit(&user, document).await;
    // Outcomes that never reach the rule engine get no verdict event.
    if let Some(ref s) = spinner {
        s.finish();
    }
    let report = submitted.context("Verification failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
        return Ok(());
    }

    match &report.outcome {
        SubmissionOutcome::AlreadyPaid => {
            println!("{} user {} has already paid", green("✔"), report.user)
        }
        SubmissionOutcome::Accepted { inserted: true } => {
            println!("{} receipt accepted, payment recorded", green("✔"))
        }
        SubmissionOutcome::Accepted { inserted: false } => println!(
            "{} receipt accepted, payment was already recorded",
            green("✔")
        ),
        SubmissionOutcome::Rejected { reason } => {
            println!("{} receipt rejected: {}", red("✘"), reason)
        }
        SubmissionOutcome::ResubmitRequested { reason } => {
            println!("{} please resubmit: {}", yellow("⚠"), reason)
        }
        SubmissionOutcome::Throttled { retry_after_secs } => println!(
            "{} too many attempts, retry in {}s",
            yellow("⚠"),
            retry_after_secs
        ),
    }
    if !cli.quiet {
        eprintln!(
            "   state: {:?}  {}",
            report.state,
            dim(&format!("{}ms", report.duration_ms))
        );
    }
    Ok(())
}

fn run_status(cli: &Cli, user: &str, ledger_args: &LedgerArgs) -> Result<()> {
    let ledger = SqliteLedger::open(&ledger_args.db)
        .with_context(|| format!("Failed to open ledger {:?}", ledger_args.db))?;
    let user = UserId::from(user);
    let record = ledger.get(&user).context("Failed to read ledger")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&record).context("Failed to serialise record")?
        );
        return Ok(());
    }

    match record {
        Some(r) => println!("{} {} paid at {}", green("✔"), r.user, r.paid_at.to_rfc3339()),
        None => println!("{} {} has not paid", red("✘"), user),
    }
    if !cli.quiet {
        eprintln!(
            "   {}",
            dim(&format!("{} payments in ledger", ledger.count()?))
        );
    }
    Ok(())
}

fn run_record(cli: &Cli, user: &str, ledger_args: &LedgerArgs) -> Result<()> {
    let ledger = SqliteLedger::open(&ledger_args.db)
        .with_context(|| format!("Failed to open ledger {:?}", ledger_args.db))?;
    let user = UserId::from(user);
    let outcome = ledger.try_record(&user).context("Failed to write ledger")?;
    tracing::info!(user = %user, ?outcome, "Manual payment record");

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?
        );
        return Ok(());
    }

    match outcome {
        RecordOutcome::Inserted => println!("{} payment recorded for {}", green("✔"), user),
        RecordOutcome::AlreadyExists => {
            println!("{} {} had already paid; nothing changed", yellow("⚠"), user)
        }
    }
    Ok(())
}

async fn run_inspect(cli: &Cli, file: &Path, pipeline: &PipelineArgs) -> Result<()> {
    let config = build_config(pipeline, None).await?;
    let document = read_document(file)?;
    let meta = inspect_document(&document, &config)
        .await
        .context("Failed to inspect document")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
        );
        return Ok(());
    }

    println!("File:         {}", file.display());
    println!("Producer:     {}", meta.producer);
    if let Some(ref c) = meta.creator {
        println!("Creator:      {}", c);
    }
    if let Some(ref a) = meta.author {
        println!("Author:       {}", a);
    }
    if let Some(ref t) = meta.title {
        println!("Title:        {}", t);
    }
    if let Some(ref d) = meta.creation_date {
        println!("Created:      {}", d);
    }
    println!("Pages:        {}", meta.page_count);
    Ok(())
}

async fn run_extract(cli: &Cli, file: &Path, pipeline: &PipelineArgs) -> Result<()> {
    let spinner = show_progress(cli).then(CliProgressCallback::new);
    let progress = spinner.clone().map(|s| s as ProgressCallback);
    let config = build_config(pipeline, progress).await?;
    let document = read_document(file)?;
    let extracted = extract_document(&document, &config).await;
    if let Some(ref s) = spinner {
        s.finish();
    }
    let content = extracted.context("Text extraction failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&content).context("Failed to serialise text")?
        );
    } else {
        print!("{}", content.text());
    }
    Ok(())
}

fn show_progress(cli: &Cli) -> bool {
    !cli.quiet && !cli.json
}

fn read_document(file: &Path) -> Result<Document> {
    Document::from_path(file).with_context(|| format!("Failed to read {:?}", file))
}

/// Map CLI args to `VerifierConfig`.
async fn build_config(
    args: &PipelineArgs,
    progress: Option<ProgressCallback>,
) -> Result<VerifierConfig> {
    let mut builder = VerifierConfig::builder()
        .dpi(args.dpi)
        .language(&args.lang)
        .tesseract_program(&args.tesseract)
        .timeout_secs(args.timeout);

    if let Some(psm) = args.psm {
        builder = builder.page_segmentation(psm);
    }
    if let Some(ref dir) = args.pdfium_lib_path {
        builder = builder.pdfium_lib_path(dir);
    }
    if let Some(ref path) = args.rules {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read rules from {:?}", path))?;
        builder = builder.rules(AcceptanceRules::from_json(&json)?);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_finish_is_idempotent() {
        let cb = CliProgressCallback::new();
        assert!(!cb.bar.is_finished());
        cb.finish();
        assert!(cb.bar.is_finished());
        cb.finish();
        cb.on_verdict(&AcceptanceVerdict::Accepted);
        assert!(cb.bar.is_finished());
    }

    #[test]
    fn spinner_is_cleared_without_a_verdict() {
        let cb = CliProgressCallback::new();
        cb.on_extraction_start(1);
        cb.finish();
        assert!(cb.bar.is_finished());
    }

    #[test]
    fn verify_subcommand_parses_env_style_flags() {
        let cli = Cli::try_parse_from([
            "paygate", "verify", "--user", "42", "receipt.pdf", "--db", "/tmp/p.db", "--psm", "6",
        ])
        .unwrap();
        match cli.command {
            Command::Verify {
                user,
                file,
                ledger,
                pipeline,
            } => {
                assert_eq!(user, "42");
                assert_eq!(file, PathBuf::from("receipt.pdf"));
                assert_eq!(ledger.db, PathBuf::from("/tmp/p.db"));
                assert_eq!(pipeline.psm, Some(6));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
