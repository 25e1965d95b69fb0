//! CLI binary for formfill.
//!
//! A thin shim over the library crate that maps CLI flags to `FillConfig`
//! and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use formfill::{discover, fill, FieldValue, FillConfig};
use std::path::PathBuf;
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

// ── CLI definition ───────────────────────────────────────────────────────────

/// Fill PDF form fields from free text using a locally-hosted LLM.
#[derive(Parser, Debug)]
#[command(name = "formfill", version, about, long_about = None)]
struct Cli {
    /// Input PDF (a fillable form, or a flat form for overlay mode).
    input: PathBuf,

    /// Free text to extract field values from.
    #[arg(short, long, required_unless_present = "discover_only")]
    text: Option<String>,

    /// Only discover and print the form's fields; no filling.
    #[arg(long)]
    discover_only: bool,

    /// LLM server base URL.
    #[arg(long, env = "OLLAMA_HOST", default_value = formfill::DEFAULT_HOST)]
    host: String,

    /// Model name to request.
    #[arg(long, env = "OLLAMA_MODEL", default_value = formfill::DEFAULT_MODEL)]
    model: String,

    /// Per-call LLM timeout in seconds.
    #[arg(long, default_value_t = 180)]
    timeout: u64,

    /// Send a JSON-schema format hint (requires server support).
    #[arg(long)]
    schema_hints: bool,

    /// Print the extracted values as JSON instead of a summary table.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = FillConfig::builder()
        .host(&cli.host)
        .model(&cli.model)
        .llm_timeout_secs(cli.timeout)
        .schema_hints(cli.schema_hints)
        .build()
        .context("invalid configuration")?;

    if cli.discover_only {
        let fields = discover(&cli.input, &config)
            .await
            .context("field discovery failed")?;
        println!("{}", bold(&format!("{} fields detected:", fields.len())));
        for f in &fields {
            println!("  {}  {}", green(&f.name), dim(&f.description));
        }
        return Ok(());
    }

    let text = cli.text.context("--text is required when filling")?;
    let output = fill(&cli.input, &text, &config)
        .await
        .context("fill run failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output.values)?);
    } else {
        println!("{}", bold("Extracted values:"));
        for (name, value) in output.values.iter() {
            let rendered = match value {
                FieldValue::Absent => yellow("—"),
                other => green(&other.as_widget_text().unwrap_or_default()),
            };
            println!("  {:<24} {}", name, rendered);
        }
        println!();
        if output.degraded {
            println!(
                "{}",
                yellow("extraction degraded: the model's reply was unusable, nothing was filled")
            );
        } else if output.widgets_filled > 0 {
            println!(
                "{} {}",
                green("✓"),
                format!("{} widget(s) filled", output.widgets_filled)
            );
        } else {
            println!(
                "{} {}",
                green("✓"),
                format!("{} value(s) stamped as overlay text", output.overlays.len())
            );
        }
        println!(
            "{} {} {}",
            green("✓"),
            bold("Output:"),
            output.output_path.display()
        );
        println!(
            "{}",
            dim(&format!(
                "discovery {}ms · extraction {}ms · fill {}ms · total {}ms",
                output.stats.discovery_ms,
                output.stats.extraction_ms,
                output.stats.fill_ms,
                output.stats.total_ms
            ))
        );
    }

    Ok(())
}
