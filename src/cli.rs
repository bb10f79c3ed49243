use crate::batch::{BatchReport, run_batch};
use crate::client::HttpClient;
use crate::config::{Config, Workers, default_icon_cache_dir, load_config};
use crate::error::ConfigError;
use crate::icons::IconCache;
use crate::pipeline::ThumbnailGenerator;
use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "gns3-snapshot",
    version,
    about = "Generate clean thumbnail images from GNS3 topologies using the API",
    after_help = "Examples:\n  gns3-snapshot --project-ids abc-123-def\n  gns3-snapshot --server http://192.168.1.100:3080 --username admin --password secret --project-ids abc-123,def-456\n  gns3-snapshot --project-ids abc-123 --output-dir ./topology-images --width 1920 --height 1080 --workers 30"
)]
pub struct Args {
    /// Comma-separated list of GNS3 project UUIDs
    #[arg(long = "project-ids")]
    pub project_ids: String,

    /// GNS3 server URL [default: http://localhost:3080]
    #[arg(long)]
    pub server: Option<String>,

    /// GNS3 username
    #[arg(long)]
    pub username: Option<String>,

    /// GNS3 password
    #[arg(long)]
    pub password: Option<String>,

    /// Output directory for thumbnails
    #[arg(long = "output-dir", default_value = "thumbnails")]
    pub output_dir: PathBuf,

    /// Thumbnail width in pixels [default: 1200]
    #[arg(short = 'w', long)]
    pub width: Option<u32>,

    /// Thumbnail height in pixels [default: 800]
    #[arg(short = 'H', long)]
    pub height: Option<u32>,

    /// Padding around the topology [default: 40]
    #[arg(long)]
    pub padding: Option<f64>,

    /// Size of node glyphs [default: 60]
    #[arg(long = "node-size")]
    pub node_size: Option<f64>,

    /// Font size for labels [default: 12]
    #[arg(long = "font-size")]
    pub font_size: Option<f64>,

    /// Hide interface labels on links
    #[arg(long = "no-interface-labels")]
    pub no_interface_labels: bool,

    /// Use GNS3 node icons instead of colored shapes
    #[arg(long = "use-node-icons")]
    pub use_node_icons: bool,

    /// Background color [default: white]
    #[arg(long)]
    pub background: Option<String>,

    /// Number of parallel workers, or "auto"
    #[arg(long, default_value = "auto")]
    pub workers: String,

    /// Also write the intermediate SVG for each project
    #[arg(long = "save-svg")]
    pub save_svg: bool,

    /// Directory for downloaded node symbols
    #[arg(long = "icon-cache-dir")]
    pub icon_cache_dir: Option<PathBuf>,

    /// Config JSON file with render and server settings
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Suppress progress messages
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,
}

/// Parse arguments, render every project and report whether all succeeded.
pub fn run() -> Result<bool> {
    let args = Args::parse();
    init_tracing(&args);
    let quiet = args.quiet;
    let report = run_with_args(args)?;
    if !quiet {
        print_summary(&report);
    }
    Ok(report.all_succeeded())
}

pub fn run_with_args(args: Args) -> Result<BatchReport> {
    let project_ids = parse_project_ids(&args.project_ids)?;
    let workers: Workers = args.workers.parse()?;
    let config = resolve_config(&args)?;
    config.render.validate()?;

    let auto = workers == Workers::Auto;
    let workers = workers.resolve();
    if auto {
        tracing::info!(workers, "auto-detected worker count");
    }

    let icon_dir = args.icon_cache_dir.clone().or_else(default_icon_cache_dir);
    let api = Arc::new(HttpClient::new(config.client.clone())?);
    let generator = ThumbnailGenerator::with_icon_cache(
        api,
        config.render,
        &args.output_dir,
        IconCache::global(),
        icon_dir,
    );
    let report = run_batch(&generator, &project_ids, workers).context("starting worker pool")?;
    Ok(report)
}

/// Comma-separated ids, trimmed, blanks dropped, duplicates removed in
/// first-seen order.
pub fn parse_project_ids(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut seen = HashSet::new();
    let ids: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(ConfigError::NoProjects);
    }
    Ok(ids)
}

fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = load_config(args.config.as_deref())?;

    let client = &mut config.client;
    if let Some(server) = &args.server {
        client.server_url = server.trim_end_matches('/').to_string();
    }
    if args.username.is_some() {
        client.username = args.username.clone();
    }
    if args.password.is_some() {
        client.password = args.password.clone();
    }

    let render = &mut config.render;
    if let Some(v) = args.width {
        render.width = v;
    }
    if let Some(v) = args.height {
        render.height = v;
    }
    if let Some(v) = args.padding {
        render.padding = v;
    }
    if let Some(v) = args.node_size {
        render.node_size = v;
    }
    if let Some(v) = args.font_size {
        render.font_size = v;
    }
    if let Some(v) = &args.background {
        render.background = v.clone();
    }
    if args.no_interface_labels {
        render.show_interface_labels = false;
    }
    if args.use_node_icons {
        render.use_node_icons = true;
    }
    if args.save_svg {
        render.save_svg = true;
    }
    Ok(config)
}

fn init_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_summary(report: &BatchReport) {
    let rule = "=".repeat(60);
    println!("{rule}");
    println!("Total Time: {:.2}s", report.elapsed.as_secs_f64());
    println!("Throughput: {:.2} projects/sec", report.throughput());
    println!("Success: {}", report.succeeded.len());
    println!("Failed: {}", report.failed.len());
    for (id, path) in &report.paths {
        println!("  {id}: {}", path.display());
    }
    println!("{rule}");
}
