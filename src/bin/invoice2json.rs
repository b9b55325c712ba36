//! CLI binary for edgequake-invoice.
//!
//! A thin shim over the library crate: `extract` runs one extraction and
//! prints or writes the result, `serve` starts the browser UI.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_invoice::export::write_to_dir;
use edgequake_invoice::{
    extract, line_items_csv, to_json_pretty, web, ExtractionConfig, InvoiceView, ServeConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the invoice layout
  invoice2json extract invoice.png

  # Full JSON on stdout
  invoice2json extract --json scan.jpg > invoice.json

  # Line items as CSV
  invoice2json extract --csv scan.jpg > items.csv

  # Write invoice_data.json and invoice_line_items.csv into a directory
  invoice2json extract invoice.png --output-dir out/

  # Download the image first
  invoice2json extract https://example.com/invoice.png --json

  # Use another provider through edgequake-llm
  invoice2json extract --provider anthropic --model claude-sonnet-4-20250514 invoice.png

  # Browser UI on http://127.0.0.1:8501
  invoice2json serve

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          API key for the OpenAI-compatible endpoint
  OPENAI_BASE_URL         Endpoint base URL (default https://api.openai.com/v1)
  EDGEQUAKE_PROVIDER      Use an edgequake-llm provider instead of the API key
  EDGEQUAKE_MODEL         Model ID (default gpt-4.1-nano)
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Extract structured invoice data from images using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "invoice2json",
    version,
    about = "Extract structured invoice data from images using Vision LLMs",
    long_about = "Extract invoice numbers, dates, parties, line items and totals from \
PNG/JPEG invoice images using a Vision Language Model. Results are printed, exported as \
JSON/CSV, or explored in a small browser UI.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "INVOICE2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "INVOICE2JSON_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract one invoice image (local file or HTTP/HTTPS URL).
    Extract(ExtractArgs),
    /// Run the browser UI.
    Serve(ServeArgs),
}

/// Model and request settings shared by both subcommands.
#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4o, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// edgequake-llm provider (openai, anthropic, gemini, ollama, ...).
    /// Reads that provider's key from its own env var instead of --api-key.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Max output tokens for the extraction reply.
    #[arg(long, env = "INVOICE2JSON_MAX_TOKENS", default_value_t = 1000)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "INVOICE2JSON_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Image detail hint: low, high, auto.
    #[arg(long, env = "INVOICE2JSON_DETAIL", default_value = "high")]
    detail: String,

    /// Path to a text file replacing the built-in extraction prompt.
    #[arg(long, env = "INVOICE2JSON_PROMPT")]
    prompt_file: Option<PathBuf>,

    /// Reject replies with missing or unexpected keys.
    #[arg(long, env = "INVOICE2JSON_STRICT")]
    strict: bool,

    /// HTTP download timeout in seconds (URL inputs).
    #[arg(long, env = "INVOICE2JSON_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Local PNG/JPEG file path or HTTP/HTTPS URL.
    input: String,

    /// API key for the OpenAI-compatible endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print the full result as pretty JSON.
    #[arg(long, conflicts_with_all = ["csv", "output_dir"])]
    json: bool,

    /// Print the line items as CSV.
    #[arg(long, conflicts_with = "output_dir")]
    csv: bool,

    /// Write invoice_data.json (and invoice_line_items.csv when there are
    /// line items) into this directory.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Disable the spinner.
    #[arg(long, env = "INVOICE2JSON_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address.
    #[arg(long, env = "INVOICE2JSON_ADDR", default_value = "127.0.0.1:8501")]
    addr: SocketAddr,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "INVOICE2JSON_MAX_UPLOAD_MB", default_value_t = 20)]
    max_upload_mb: usize,

    /// Minutes of inactivity before a browser session is dropped.
    #[arg(long, env = "INVOICE2JSON_SESSION_IDLE_MINS", default_value_t = 30)]
    session_idle_mins: u64,

    /// Most browser sessions held at once.
    #[arg(long, env = "INVOICE2JSON_MAX_SESSIONS", default_value_t = 1000)]
    max_sessions: usize,

    #[command(flatten)]
    model: ModelArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers the interesting part of `extract`, so library INFO
    // logs are hidden there unless -v is given.
    let spinner_active = match &cli.command {
        Command::Extract(a) => !cli.quiet && !a.no_progress,
        Command::Serve(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner_active {
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

    match cli.command {
        Command::Extract(args) => run_extract(args, spinner_active, cli.quiet).await,
        Command::Serve(args) => run_serve(args).await,
    }
}

async fn run_extract(args: ExtractArgs, spinner_active: bool, quiet: bool) -> Result<()> {
    let config = build_config(&args.model).await?;

    let spinner = spinner_active.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_message("Analyzing invoice…");
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let outcome = extract(&args.input, args.api_key.as_deref(), &config).await;
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    let result = outcome.context("Error extracting data")?;

    if !quiet {
        eprintln!("{} Data extracted successfully!", green("✔"));
    }

    if let Some(ref dir) = args.output_dir {
        let written = write_to_dir(dir, &result)
            .await
            .context("Failed to write exports")?;
        if !quiet {
            for path in written {
                eprintln!("   {}", bold(&path.display().to_string()));
            }
        }
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.json {
        let json = to_json_pretty(&result).context("Failed to serialise result")?;
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    } else if args.csv {
        if !result.has_line_items() {
            anyhow::bail!("No line items found; nothing to write as CSV");
        }
        let csv = line_items_csv(result.line_items()).context("Failed to build CSV")?;
        handle
            .write_all(csv.as_bytes())
            .context("Failed to write to stdout")?;
    } else {
        let text = InvoiceView::from_result(&result).render_text();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !quiet && !args.json && !args.csv {
        eprintln!("{}", dim("Use --json or --csv for machine-readable output."));
    }
    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = build_config(&args.model).await?;
    let serve = ServeConfig {
        addr: args.addr,
        max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
        session_idle_ttl: Duration::from_secs(args.session_idle_mins.saturating_mul(60)),
        max_sessions: args.max_sessions,
    };
    eprintln!(
        "{} Invoice extractor on {}",
        green("◆"),
        bold(&format!("http://{}", serve.addr))
    );
    web::serve(config, serve).await.context("Server failed")
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(args: &ModelArgs) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .image_detail(args.detail.clone())
        .strict_schema(args.strict)
        .download_timeout_secs(args.download_timeout);

    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref url) = args.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref path) = args.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}
