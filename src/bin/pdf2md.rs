//! CLI binary for pdf2md-ocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and reports results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2md_ocr::config::{ENV_BACKEND, ENV_PDFIUM_LIB_PATH};
use pdf2md_ocr::pipeline::input::require_pdf_extension;
use pdf2md_ocr::{
    convert_with_backend, create_backend, ConversionConfig, ConversionOutput,
    ConversionProgressCallback, Environment, ProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the backend loads and pages render, then a page bar.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Starting…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
        })
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_model_load_start(&self, backend: &str) {
        self.bar.set_prefix("Loading");
        self.bar.set_message(format!("{backend} backend…"));
    }

    fn on_model_load_complete(&self, backend: &str, elapsed_ms: u64) {
        self.bar.println(format!(
            "{} {} backend ready  {}",
            cyan("◆"),
            bold(backend),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.set_prefix("Rendering");
        self.bar.set_message("rasterising pages…");
    }

    fn on_conversion_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut t) = self.page_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let secs = self.page_elapsed();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.page_elapsed();
        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    fn on_conversion_complete(&self, total_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages converted successfully",
            green("✔"),
            bold(&total_pages.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Write document.md next to the input
  pdf2md document.pdf

  # Choose the output file
  pdf2md document.pdf -o notes/output.md

  # Run the model in-process (build with --features local)
  pdf2md --backend local scan.pdf

  # JSON result (per-page text and timings) on stdout
  pdf2md --json document.pdf > result.json

ENVIRONMENT VARIABLES:
  PDF2MD_BACKEND          endpoint (default) or local
  HF_TOKEN                Hugging Face token (required for endpoint)
  HF_ENDPOINT_URL         Dedicated inference endpoint URL
  HF_MODEL_ID             Hosted model id, used when HF_ENDPOINT_URL is unset
  HF_TIMEOUT_S            Request timeout in seconds (default 120)
  HF_RETRIES              Retries per page on transient failures (default 4)
  PDF2MD_LOCAL_MODEL      Hub repo for the local backend
  PDF2MD_LOCAL_MODEL_DIR  Pre-downloaded model directory for the local backend
  PDF2MD_MAX_NEW_TOKENS   Generation cap per page for the local backend
  PDFIUM_LIB_PATH         Path to libpdfium (default: downloaded to the user
                          cache on first run, or embedded with --features bundled)
  PDFIUM_AUTO_CACHE_DIR   Override the pdfium download cache directory

  A .env file in the working directory is loaded if present.
"#;

/// Convert PDF files to Markdown with an OCR vision model.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md",
    version,
    about = "Convert PDF files to Markdown using LightOnOCR-2-1B",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the PDF file to convert.
    pdf_file: PathBuf,

    /// Output path for the Markdown file (default: same as input with .md extension).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// OCR backend: endpoint or local.
    #[arg(long, env = "PDF2MD_BACKEND")]
    backend: Option<String>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDF2MD_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2MD_PASSWORD")]
    password: Option<String>,

    /// Print the conversion result as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Must run before clap reads `env = ...` fallbacks.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", red(&bold("Error:")));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    // ── Validate input ───────────────────────────────────────────────────
    if !cli.pdf_file.exists() {
        anyhow::bail!("File not found: {}", cli.pdf_file.display());
    }
    require_pdf_extension(&cli.pdf_file)?;

    if !cli.quiet && !cli.json {
        eprintln!("{} {}", bold("Converting:"), cli.pdf_file.display());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(cli, progress)?;
    // Configuration errors (unknown backend, missing token) surface before
    // anything is downloaded.
    let backend = create_backend(&config).context("Conversion failed")?;

    ensure_pdf_engine(&config, cli.quiet || cli.json)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert_with_backend(&cli.pdf_file, cli.output.as_deref(), backend, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output, show_progress);
    }
    Ok(())
}

/// Make sure a pdfium library is available before rendering.
///
/// With `--features bundled` the library embedded at compile time is
/// extracted to the cache. Otherwise the first run downloads it (~30 MB)
/// with a progress bar; later runs only check the cached path.
/// `PDFIUM_LIB_PATH` skips provisioning entirely.
fn ensure_pdf_engine(config: &ConversionConfig, silent: bool) -> Result<()> {
    if config
        .resolved_environment()
        .get_non_blank(ENV_PDFIUM_LIB_PATH)
        .is_some()
    {
        return Ok(());
    }

    #[cfg(feature = "bundled")]
    {
        let _ = silent;
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_bundled())
            .context("Failed to extract bundled PDFium engine")?;
    }

    #[cfg(not(feature = "bundled"))]
    if !pdfium_auto::is_pdfium_cached() {
        if silent {
            tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
                .context("Failed to download PDFium engine")?;
            return Ok(());
        }

        let dl_bar = ProgressBar::new(0);
        dl_bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        dl_bar.set_prefix("PDF engine");
        dl_bar.set_message("Connecting…");
        dl_bar.enable_steady_tick(Duration::from_millis(80));

        let bar = dl_bar.clone();
        tokio::task::block_in_place(|| {
            pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
                if let Some(t) = total {
                    if bar.length().unwrap_or(0) != t {
                        bar.set_length(t);
                    }
                }
                bar.set_position(downloaded);
            }))
        })
        .context("Failed to download PDFium engine")?;

        dl_bar.finish_with_message("ready ✓");
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut env = Environment::capture();
    if let Some(ref backend) = cli.backend {
        env.set(ENV_BACKEND, backend.as_str());
    }

    let mut builder = ConversionConfig::builder().dpi(cli.dpi).environment(env);
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.as_str());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn print_summary(output: &ConversionOutput, show_progress: bool) {
    let stats = &output.stats;
    if !show_progress {
        eprintln!(
            "Converted {} pages with the {} backend",
            stats.page_count, stats.backend
        );
    }
    eprintln!(
        "{}  {} pages  {}ms  →  {}",
        green("✔"),
        stats.page_count,
        stats.total_duration_ms,
        bold(&output.output_path.display().to_string()),
    );
    eprintln!(
        "   {}",
        dim(&format!(
            "load {}ms  /  render {}ms  /  ocr {}ms",
            stats.load_duration_ms, stats.render_duration_ms, stats.ocr_duration_ms
        )),
    );
}
