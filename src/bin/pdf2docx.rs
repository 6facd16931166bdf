//! CLI binary for pdf2docx-studio.
//!
//! A thin shim over the library crate: `convert` drives one converter widget
//! end to end, `inspect` and `render` open the file in the viewer.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2docx_studio::{
    ConversionClient, ConversionMode, ConversionStatus, ConverterWidget, FullScreenViewer,
    PageContent, PdfUpload, PdfiumRenderer, PreviewCoordinator, StudioConfig, ViewerSource,
    WidgetListener, WidgetSnapshot,
};
use serde::Serialize;
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
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Widget progress bar using indicatif ──────────────────────────────────────

/// Mirrors the widget's 0–100 bar and status line in the terminal.
struct CliWidgetListener {
    bar: ProgressBar,
}

impl CliWidgetListener {
    fn new(file_name: &str) -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix(file_name.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl WidgetListener for CliWidgetListener {
    fn on_change(&self, snapshot: &WidgetSnapshot) {
        self.bar.set_position(u64::from(snapshot.progress));
        self.bar.set_message(snapshot.message.to_string());
        if matches!(
            snapshot.status,
            ConversionStatus::Success | ConversionStatus::Error
        ) {
            self.bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a digital PDF and save the .docx next to it
  pdf2docx convert report.pdf -o .

  # Scanned document through the OCR endpoint
  pdf2docx convert --mode image scan.pdf -o out/

  # Machine-readable result
  pdf2docx convert --json report.pdf

  # Page count of a local PDF
  pdf2docx inspect report.pdf

  # Render page 2 to PNG
  pdf2docx render report.pdf --page 2 -o pages/

ENVIRONMENT VARIABLES:
  PDF2DOCX_SERVER     Base URL of the conversion server (default http://localhost:5000)
  PDF2DOCX_TIMEOUT    Request timeout in seconds
  PDF2DOCX_PASSWORD   Password for encrypted PDFs (inspect/render)
  PDFIUM_LIB_PATH     Path to libpdfium (file or directory)
  RUST_LOG            Overrides the log filter
"#;

/// Convert PDFs to Word documents through a conversion server.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2docx",
    version,
    about = "Convert PDFs to DOCX through a conversion server and preview the result",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the conversion server.
    #[arg(long, global = true, env = "PDF2DOCX_SERVER", default_value = "http://localhost:5000")]
    server: String,

    /// Request timeout in seconds.
    #[arg(long, global = true, env = "PDF2DOCX_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Password for encrypted PDFs.
    #[arg(long, global = true, env = "PDF2DOCX_PASSWORD")]
    password: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2DOCX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF and convert it to DOCX.
    Convert {
        /// Local PDF file.
        file: PathBuf,

        /// Conversion endpoint: digital (text layer) or image (OCR).
        #[arg(long, value_enum, default_value = "digital")]
        mode: ModeArg,

        /// Download the converted document into this directory.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,

        /// Disable the progress bar.
        #[arg(long, env = "PDF2DOCX_NO_PROGRESS")]
        no_progress: bool,
    },
    /// Print the page count of a PDF.
    Inspect {
        file: PathBuf,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Render PDF pages to PNG files.
    Render {
        file: PathBuf,

        /// Render only this page (1-based). Default: all pages.
        #[arg(long)]
        page: Option<usize>,

        /// Longest edge of rendered pages in pixels.
        #[arg(long, default_value_t = 2000)]
        max_pixels: u32,

        /// Output directory.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Digital,
    Image,
}

impl From<ModeArg> for ConversionMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Digital => ConversionMode::Digital,
            ModeArg::Image => ConversionMode::Image,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConvertReport {
    file: String,
    mode: ConversionMode,
    download_url: String,
    preview_image_urls: Vec<String>,
    saved_to: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectReport {
    file: String,
    pages: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are noise next to the progress bar.
    let bar_active = matches!(
        cli.command,
        Command::Convert { json: false, no_progress: false, .. }
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || bar_active {
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

    let mut builder = StudioConfig::builder()
        .base_url(cli.server.clone())
        .request_timeout_secs(cli.timeout);
    if let Some(ref pwd) = cli.password {
        builder = builder.pdf_password(pwd.clone());
    }

    match cli.command {
        Command::Convert {
            ref file,
            mode,
            ref output,
            json,
            no_progress,
        } => {
            let config = builder.build().context("Invalid configuration")?;
            run_convert(&cli, config, file, mode.into(), output.as_deref(), json, !no_progress)
                .await
        }
        Command::Inspect { ref file, json } => {
            let config = builder.build().context("Invalid configuration")?;
            run_inspect(config, file, json).await
        }
        Command::Render {
            ref file,
            page,
            max_pixels,
            ref output,
        } => {
            let config = builder
                .max_rendered_pixels(max_pixels)
                .build()
                .context("Invalid configuration")?;
            run_render(&cli, config, file, page, output).await
        }
    }
}

// ── convert ──────────────────────────────────────────────────────────────────

async fn run_convert(
    cli: &Cli,
    config: StudioConfig,
    file: &Path,
    mode: ConversionMode,
    output: Option<&Path>,
    json: bool,
    progress: bool,
) -> Result<()> {
    let upload = PdfUpload::from_path(file).context("Failed to read input")?;
    let file_name = upload.file_name().to_string();

    let config = Arc::new(config);
    let client = Arc::new(
        ConversionClient::new(Arc::clone(&config)).context("Failed to set up HTTP client")?,
    );
    let coordinator = Arc::new(PreviewCoordinator::new());
    let mut widget = ConverterWidget::new(mode, Arc::clone(&client), coordinator);

    let listener = (progress && !json && !cli.quiet).then(|| CliWidgetListener::new(&file_name));
    if let Some(ref l) = listener {
        widget = widget.with_listener(Arc::clone(l) as Arc<dyn WidgetListener>);
    }

    widget
        .select_file(Some(upload))
        .with_context(|| format!("Cannot convert '{}'", file.display()))?;

    let result = match widget.convert().await {
        Ok(r) => r,
        Err(e) => {
            if let Some(ref l) = listener {
                l.bar.finish_and_clear();
            }
            if !cli.quiet {
                eprintln!("{} {}", red("✘"), e.user_message());
            }
            return Err(e).with_context(|| format!("Conversion of '{file_name}' failed"));
        }
    };

    let saved_to = match output {
        Some(dir) => Some(
            client
                .download(&result, dir)
                .await
                .context("Failed to save the converted document")?,
        ),
        None => None,
    };

    if json {
        let report = ConvertReport {
            file: file_name,
            mode,
            download_url: result.download_url(&config.base_url),
            preview_image_urls: result.preview_urls(&config.base_url),
            saved_to,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise result")?
        );
        return Ok(());
    }

    if !cli.quiet {
        eprintln!(
            "{} {} converted ({}, {} preview pages)",
            green("✔"),
            bold(&file_name),
            mode,
            result.preview_pages.len()
        );
        match saved_to {
            Some(ref path) => eprintln!("   saved to {}", bold(&path.display().to_string())),
            None => eprintln!("   {}", dim(&result.download_url(&config.base_url))),
        }
        for url in result.preview_urls(&config.base_url) {
            eprintln!("   {}", dim(&url));
        }
    }
    Ok(())
}

// ── inspect / render ─────────────────────────────────────────────────────────

async fn open_viewer(config: &StudioConfig, file: &Path) -> Result<FullScreenViewer> {
    let renderer = PdfiumRenderer::bind().context("Failed to load pdfium")?;
    let viewer = FullScreenViewer::new(Arc::new(renderer)).with_config(config);
    let upload = PdfUpload::from_path(file).context("Failed to read input")?;
    viewer
        .open(ViewerSource::from_upload(&upload), 1)
        .await
        .with_context(|| format!("Failed to open '{}'", file.display()))?;
    Ok(viewer)
}

async fn run_inspect(config: StudioConfig, file: &Path, json: bool) -> Result<()> {
    let viewer = open_viewer(&config, file).await?;
    let report = InspectReport {
        file: file.display().to_string(),
        pages: viewer.total_pages(),
    };
    viewer.close();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else {
        println!("File:   {}", report.file);
        println!("Pages:  {}", report.pages);
    }
    Ok(())
}

async fn run_render(
    cli: &Cli,
    config: StudioConfig,
    file: &Path,
    page: Option<usize>,
    output: &Path,
) -> Result<()> {
    let viewer = open_viewer(&config, file).await?;
    let total = viewer.total_pages();
    let pages: Vec<usize> = match page {
        Some(p) if p == 0 || p > total => {
            anyhow::bail!("Page {} out of range (document has {} pages)", p, total)
        }
        Some(p) => vec![p],
        None => (1..=total).collect(),
    };

    tokio::fs::create_dir_all(output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());

    for p in pages {
        if viewer.current_page() != p {
            viewer
                .go_to(p)
                .await
                .with_context(|| format!("Failed to render page {p}"))?;
        }
        let Some(PageContent::Rendered(rendered)) = viewer.display() else {
            anyhow::bail!("Page {} produced no image", p);
        };
        let path = output.join(format!("{stem}_page_{p:03}.png"));
        tokio::fs::write(&path, &rendered.png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            eprintln!(
                "  {} Page {:>3}/{:<3}  {}  {}",
                green("✓"),
                p,
                total,
                dim(&format!("{}x{}", rendered.width, rendered.height)),
                path.display()
            );
        }
    }
    viewer.close();
    Ok(())
}
