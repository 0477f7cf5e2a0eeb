//! CLI binary for edgequake-pdfsplit.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `SplitConfig`, prints the preview table and asks before writing.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdfsplit::pipeline::acquire::acquire;
use edgequake_pdfsplit::{
    analyze, inspect, materialize, AnalysisResult, DocumentSource, FixedRangeParams,
    PlanStrategy, ProgressCallback, SplitConfig, SplitOutput, SplitProgressCallback,
    SplitSession,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Terminal progress callback: a spinner while the document is read and
/// planned, then a bar over sections during synthesis and writing.
struct CliProgressCallback {
    bar: ProgressBar,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            fallbacks: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, prefix: &'static str) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} sections  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
    }
}

impl SplitProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, page_count: usize, section_count: usize) {
        self.activate_bar(section_count, "Annotating");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "{page_count} pages planned into {section_count} section(s)"
            ))
        ));
    }

    fn on_section_start(&self, index: usize, _total: usize) {
        self.bar.set_message(format!("section {index}"));
    }

    fn on_section_complete(&self, index: usize, total: usize, title: &str) {
        self.bar.println(format!(
            "  {} Section {:>3}/{:<3}  {}",
            green("✓"),
            index,
            total,
            title
        ));
        self.bar.inc(1);
    }

    fn on_section_fallback(&self, index: usize, total: usize, reason: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
        let msg = truncate_display(reason, 80);
        self.bar.println(format!(
            "  {} Section {:>3}/{:<3}  {}",
            yellow("⚠"),
            index,
            total,
            dim(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_analysis_complete(&self, total: usize, generated: usize) {
        self.bar.finish_and_clear();
        let fallback = total.saturating_sub(generated);
        if fallback == 0 {
            eprintln!("{} {} sections annotated", green("✔"), bold(&total.to_string()));
        } else {
            eprintln!(
                "{} {}/{} sections annotated  ({} placeholder)",
                yellow("⚠"),
                bold(&generated.to_string()),
                total,
                fallback
            );
        }
    }

    fn on_file_written(&self, index: usize, total: usize, filename: &str) {
        eprintln!(
            "  {} {:>3}/{:<3}  {}",
            green("✓"),
            index,
            total,
            dim(filename)
        );
    }
}

fn truncate_display(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let cut: String = s.chars().take(max_chars - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Look at a PDF (no API key needed)
  pdfsplit inspect regulation.pdf

  # Analyze, review the preview, confirm, then write sections
  pdfsplit run regulation.pdf --out-dir sections/

  # Two steps: analyze to JSON, edit it, commit later
  pdfsplit analyze regulation.pdf -o plan.json
  pdfsplit commit --analysis plan.json --source regulation.pdf --out-dir sections/

  # Fixed ranges of 4-8 pages, no AI at all
  pdfsplit run --strategy fixed --min-pages 4 --max-pages 8 --no-ai doc.pdf --out-dir out/

  # Download and split
  pdfsplit run https://example.org/yonetmelik.pdf --out-dir out/ --yes

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         libpdfium location, only needed with --ocr

OUTPUT:
  <out-dir>/<Title>_<nn>_<a>-<b>.pdf     one file per section
  <out-dir>/pdf_sections_metadata.json  manifest with titles, descriptions, keywords
"#;

/// Split PDF files into annotated sections using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsplit",
    version,
    about = "Split PDF documents into sections with AI-generated titles, descriptions and keywords",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFSPLIT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFSPLIT_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDFSPLIT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print page count, sample text and PDF metadata. No AI calls.
    Inspect {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Phase 1 only: write the analysis JSON for review.
    Analyze {
        input: String,
        /// Write the analysis here instead of stdout.
        #[arg(short, long, env = "PDFSPLIT_ANALYSIS")]
        output: Option<PathBuf>,
        #[command(flatten)]
        opts: SplitArgs,
    },
    /// Phase 2 only: materialize a (possibly edited) analysis JSON.
    Commit {
        /// Analysis JSON produced by `analyze`.
        #[arg(long)]
        analysis: PathBuf,
        /// The PDF the analysis was made for (path or URL).
        #[arg(long)]
        source: String,
        #[arg(long, env = "PDFSPLIT_OUT_DIR")]
        out_dir: PathBuf,
    },
    /// Analyze, preview, confirm and commit.
    Run {
        input: String,
        #[arg(long, env = "PDFSPLIT_OUT_DIR")]
        out_dir: PathBuf,
        /// Commit without asking.
        #[arg(short, long)]
        yes: bool,
        #[command(flatten)]
        opts: SplitArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct SplitArgs {
    /// Boundary strategy.
    #[arg(long, env = "PDFSPLIT_STRATEGY", value_enum, default_value = "ai")]
    strategy: StrategyArg,

    /// Minimum pages per fixed-range section.
    #[arg(long, env = "PDFSPLIT_MIN_PAGES", default_value_t = 3)]
    min_pages: usize,

    /// Maximum pages per fixed-range section (≤ 30).
    #[arg(long, env = "PDFSPLIT_MAX_PAGES", default_value_t = 10)]
    max_pages: usize,

    /// Split documents at or below the small-document threshold anyway.
    #[arg(long, env = "PDFSPLIT_SPLIT_SMALL")]
    split_small: bool,

    /// Run without any AI calls: fixed ranges and placeholder metadata.
    #[arg(long, env = "PDFSPLIT_NO_AI")]
    no_ai: bool,

    /// Transcribe image-only pages with the vision model (needs pdfium).
    #[arg(long, env = "PDFSPLIT_OCR")]
    ocr: bool,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file containing a custom metadata system prompt.
    #[arg(long, env = "PDFSPLIT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Retries per AI call.
    #[arg(long, env = "PDFSPLIT_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call AI timeout in seconds.
    #[arg(long, env = "PDFSPLIT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFSPLIT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum StrategyArg {
    Fixed,
    Ai,
}

impl From<StrategyArg> for PlanStrategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::Fixed => PlanStrategy::Fixed,
            StrategyArg::Ai => PlanStrategy::AiSuggested,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the feedback; library INFO logs would tear it.
    let wants_json = matches!(cli.command, Command::Inspect { json: true, .. })
        || matches!(cli.command, Command::Analyze { output: None, .. });
    let show_progress = !cli.quiet && !cli.no_progress && !wants_json;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn SplitProgressCallback>)
    } else {
        None
    };

    match &cli.command {
        Command::Inspect { input, json } => {
            let config = SplitConfig::default();
            let report = inspect(input, &config)
                .await
                .context("Failed to inspect PDF")?;
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialize report")?
                );
            } else {
                println!("File:         {}", input);
                if let Some(ref t) = report.info.title {
                    println!("Title:        {}", t);
                }
                if let Some(ref a) = report.info.author {
                    println!("Author:       {}", a);
                }
                if let Some(ref s) = report.info.subject {
                    println!("Subject:      {}", s);
                }
                println!("Pages:        {}", report.page_count);
                println!("Size:         {} bytes", report.byte_size);
                println!(
                    "Text layer:   {} ({}/{} sampled pages)",
                    if report.has_text { "yes" } else { "no" },
                    report.text_pages,
                    report.sampled_pages
                );
                if let Some(ref p) = report.info.producer {
                    println!("Producer:     {}", p);
                }
                if let Some(ref adv) = report.advisory {
                    println!("Note:         {}", adv);
                }
                if !report.sample_text.is_empty() {
                    println!();
                    println!("{}", dim(&truncate_display(&report.sample_text, 400)));
                }
            }
        }

        Command::Analyze { input, output, opts } => {
            let config = build_config(opts, progress_cb).await?;
            let result = analyze(input, &config).await.context("Analysis failed")?;
            let json = result.to_json_pretty().context("Failed to serialise analysis")?;
            match output {
                Some(path) => {
                    tokio::fs::write(path, json)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    if !cli.quiet {
                        print_preview(&result);
                        eprintln!("{}  analysis → {}", green("✔"), bold(&path.display().to_string()));
                    }
                }
                None => println!("{json}"),
            }
        }

        Command::Commit {
            analysis,
            source,
            out_dir,
        } => {
            let text = tokio::fs::read_to_string(analysis)
                .await
                .with_context(|| format!("Failed to read {}", analysis.display()))?;
            let result = AnalysisResult::from_json(&text).context("Invalid analysis file")?;
            let mut builder = SplitConfig::builder();
            if let Some(cb) = progress_cb {
                builder = builder.progress_callback(cb);
            }
            let config = builder.build().context("Invalid configuration")?;
            let acquired = acquire(DocumentSource::from_input(source), &config)
                .await
                .context("Failed to read source PDF")?;
            let output = materialize(&acquired.bytes, &result, out_dir, &config)
                .await
                .context("Materialization failed")?;
            if !cli.quiet {
                print_summary(&output);
            }
        }

        Command::Run {
            input,
            out_dir,
            yes,
            opts,
        } => {
            let config = build_config(opts, progress_cb).await?;
            let mut session = SplitSession::plan(DocumentSource::from_input(input), config)
                .await
                .context("Analysis failed")?;
            let preview = session.preview().context("Preview failed")?;
            if !cli.quiet {
                print_preview(preview);
            }
            if !*yes && !confirm("Write these sections?")? {
                session.abort().context("Abort failed")?;
                eprintln!("{}", dim("Aborted, nothing written."));
                return Ok(());
            }
            let output = session.commit(out_dir).await.context("Materialization failed")?;
            if !cli.quiet {
                print_summary(&output);
            }
        }
    }

    Ok(())
}

/// Map CLI args to `SplitConfig`.
async fn build_config(opts: &SplitArgs, progress: Option<ProgressCallback>) -> Result<SplitConfig> {
    let mut builder = SplitConfig::builder()
        .strategy(opts.strategy.clone().into())
        .fixed_range(FixedRangeParams::new(opts.min_pages, opts.max_pages))
        .split_small_documents(opts.split_small)
        .ai_enabled(!opts.no_ai)
        .ocr_fallback(opts.ocr)
        .max_retries(opts.max_retries)
        .api_timeout_secs(opts.api_timeout)
        .download_timeout_secs(opts.download_timeout);

    if let Some(ref path) = opts.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = opts.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = opts.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_preview(result: &AnalysisResult) {
    eprintln!();
    if let Some(ref title) = result.document_title {
        eprintln!("{} {}", cyan("◆"), bold(title));
    }
    eprintln!(
        "{}",
        dim(&format!(
            "{} pages · {} sections · strategy {}",
            result.stats.page_count, result.stats.section_count, result.stats.strategy_used
        ))
    );
    for s in &result.sections {
        let marker = if s.metadata.fallback {
            yellow("·")
        } else {
            green("·")
        };
        eprintln!(
            " {} {:>3}  {:<9} {}",
            marker,
            s.index,
            s.plan.label(),
            s.metadata.title
        );
        if !s.metadata.keywords.is_empty() {
            eprintln!(
                "        {}",
                dim(&truncate_display(&s.metadata.keywords.join(", "), 90))
            );
        }
    }
    if let Some(ref adv) = result.advisory {
        eprintln!("{} {}", yellow("⚠"), adv);
    }
    for w in &result.warnings {
        eprintln!("{} {}", yellow("⚠"), w);
    }
    eprintln!();
}

fn print_summary(output: &SplitOutput) {
    eprintln!(
        "{}  {} file(s)  →  {}",
        green("✔"),
        output.manifest.files.len(),
        bold(&output.output_dir.display().to_string())
    );
    eprintln!(
        "   {}",
        dim(&format!("manifest: {}", output.manifest_path.display()))
    );
}

fn confirm(question: &str) -> Result<bool> {
    eprint!("{} {} ", bold(question), dim("[y/N]"));
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read confirmation")?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes" | "e" | "evet"))
}
