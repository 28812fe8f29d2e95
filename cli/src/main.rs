//! linkcard - rewrite bare-link paragraphs into link-preview cards.
//!
//! Reads an HTML fragment (or a hast JSON tree with `--format hast`) from a
//! file or stdin, runs the link-preview transform over it, and writes the
//! result to stdout. Logs go to stderr.
//!
//! ```text
//! args + config.toml -> LinkPreviewConfig -> parse input -> transform -> print
//! ```

mod config;

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use linkcard_preview::{LinkPreview, LinkPreviewConfig, Node, html};

use crate::config::{LinkcardConfig, validate_site};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// HTML fragment in, HTML out.
    Html,
    /// hast JSON tree in, hast JSON tree out.
    Hast,
}

#[derive(Debug, Parser)]
#[command(name = "linkcard", version, about)]
struct Args {
    /// Input file; `-` reads stdin.
    #[arg(default_value = "-")]
    input: String,

    /// Canonical site origin; links to other origins are external.
    #[arg(long, value_name = "URL")]
    site: Option<String>,

    /// Preview cache file.
    #[arg(long = "cache", value_name = "PATH")]
    cache_path: Option<PathBuf>,

    /// Per-fetch timeout in milliseconds (0 disables the timeout).
    #[arg(long, value_name = "N")]
    timeout_ms: Option<u64>,

    /// Maximum simultaneous fetches.
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Description length bound in characters (0 disables truncation).
    #[arg(long, value_name = "N")]
    max_description: Option<usize>,

    /// Never touch the network; serve cached previews only.
    #[arg(long)]
    no_fetch: bool,

    #[arg(long, value_enum, default_value_t = Format::Html)]
    format: Format,

    /// Config file. Default: ~/.linkcard/config.toml when present.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Args {
    /// Layer command-line flags over the config file's values.
    fn apply_to(&self, mut config: LinkPreviewConfig) -> LinkPreviewConfig {
        if let Some(site) = &self.site {
            config.site = Some(site.clone());
        }
        if let Some(cache_path) = &self.cache_path {
            config.cache_path = Some(cache_path.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = Some(timeout_ms);
        }
        if let Some(concurrency) = self.concurrency {
            config.fetch_concurrency = Some(concurrency);
        }
        if let Some(max_description) = self.max_description {
            config.max_description_length = Some(max_description);
        }
        if self.no_fetch {
            config.enable_fetch = Some(false);
        }
        config
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(input).with_context(|| format!("failed to read {input}"))
}

fn parse_document(raw: &str, format: Format) -> Result<Node> {
    match format {
        Format::Html => Ok(html::parse_fragment(raw)),
        Format::Hast => serde_json::from_str(raw).context("input is not a valid hast tree"),
    }
}

fn render_document(tree: &Node, format: Format) -> Result<String> {
    match format {
        Format::Html => Ok(html::to_html(tree)),
        Format::Hast => serde_json::to_string_pretty(tree).context("failed to encode hast tree"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();

    let file_config = LinkcardConfig::load(args.config.as_deref())?.into_link_preview();
    let config = args.apply_to(file_config);
    validate_site(&config)?;

    let raw = read_input(&args.input)?;
    let mut tree = parse_document(&raw, args.format)?;

    let preview = LinkPreview::new(&config);
    tracing::debug!(config = ?preview.config(), "Resolved link preview config");
    preview.transform(&mut tree).await;

    let mut out = render_document(&tree, args.format)?;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    io::stdout()
        .lock()
        .write_all(out.as_bytes())
        .context("failed to write output")?;

    Ok(())
}
