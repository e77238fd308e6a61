//! Command-line interface for training, one-off prediction and serving.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::inference::{predict_once, MushroomRecord, Prediction};
use crate::pipeline::TrainingPipeline;
use crate::training::format_params;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mushroom")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mushroom edibility classifier: train, predict and serve")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full training pipeline on a CSV dataset
    Train {
        /// Source dataset (CSV with a header row)
        #[arg(short, long)]
        data: PathBuf,

        /// Pipeline configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Hyperparameter grid file (JSON), overrides the built-in grids
        #[arg(long)]
        grids: Option<PathBuf>,

        /// Record the winning model in an experiment tracking directory
        #[arg(long)]
        tracking_dir: Option<PathBuf>,
    },

    /// Classify a single mushroom with the persisted model
    Predict {
        #[command(flatten)]
        record: RecordArgs,

        /// Pipeline configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Start the prediction web server
    Serve {
        /// Server port
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Server host
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Pipeline configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// The seven attributes of a mushroom, by category code
#[derive(clap::Args, Debug, Clone)]
pub struct RecordArgs {
    #[arg(long)]
    pub bruises: Option<String>,
    #[arg(long)]
    pub gill_spacing: Option<String>,
    #[arg(long)]
    pub gill_size: Option<String>,
    #[arg(long)]
    pub gill_color: Option<String>,
    #[arg(long)]
    pub stalk_root: Option<String>,
    #[arg(long)]
    pub ring_type: Option<String>,
    #[arg(long)]
    pub spore_print_color: Option<String>,
}

impl From<RecordArgs> for MushroomRecord {
    fn from(args: RecordArgs) -> Self {
        MushroomRecord {
            bruises: args.bruises,
            gill_spacing: args.gill_spacing,
            gill_size: args.gill_size,
            gill_color: args.gill_color,
            stalk_root: args.stalk_root,
            ring_type: args.ring_type,
            spore_print_color: args.spore_print_color,
        }
    }
}

// ─── Configuration ─────────────────────────────────────────────────────────────

/// Configuration file when given, environment otherwise
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::from_env(),
    };
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    config_path: Option<&Path>,
    grids: Option<&Path>,
    tracking_dir: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let mut config = load_config(config_path)?;
    if let Some(grids) = grids {
        config = config.with_grids_path(grids);
    }
    if let Some(dir) = tracking_dir {
        config = config.with_tracking_dir(dir);
    }

    println!("  {:<16} {}", muted("Data"), data_path.display());
    println!("  {:<16} {}", muted("Seed"), config.seed);
    println!("  {:<16} {}", muted("CV folds"), config.cv_folds);
    println!("  {:<16} {:.2}", muted("Accuracy floor"), config.accuracy_floor);
    println!();

    step_run("Running pipeline");
    let start = Instant::now();
    let summary = TrainingPipeline::new(config).run(data_path)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    println!(
        "  {:<32} {:>8} {:>8} {:>8}",
        muted("Model"),
        muted("CV"),
        muted("Test"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(60)));
    for entry in &summary.report.entries {
        let name = if entry.name == summary.family {
            entry.name.white().bold()
        } else {
            entry.name.normal()
        };
        println!(
            "  {:<32} {:>8.4} {:>8.4} {:>7.2}s",
            name, entry.cv_score, entry.test_accuracy, entry.duration_secs
        );
    }
    for (name, reason) in &summary.report.skipped {
        println!("  {:<32} {}", name, format!("skipped: {}", reason).red());
    }
    println!("  {}", dim(&"─".repeat(60)));

    println!();
    println!(
        "  {} {} {} {:.4}",
        ok("best"),
        summary.family.white().bold(),
        muted("accuracy:"),
        summary.accuracy
    );
    println!("  {:<16} {}", muted("Params"), format_params(&summary.model.params).white());
    println!("  {:<16} {}", muted("Encoder"), summary.encoder_path.display());
    println!("  {:<16} {}", muted("Model"), summary.model_path.display());
    println!("  {:<16} {}", muted("Time"), format!("{:.3}s", summary.total_time_secs).white());
    println!();

    Ok(())
}

pub fn cmd_predict(record: RecordArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");

    let config = load_config(config_path)?;
    let record = MushroomRecord::from(record);
    let prediction = predict_once(&config, &record)?;

    let verdict = match prediction {
        Prediction::Edible => prediction.as_str().green().bold(),
        Prediction::Poisonous => prediction.as_str().red().bold(),
    };
    println!("  {:<16} {}", muted("Prediction"), verdict);
    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(host: &str, port: u16, config_path: Option<&Path>) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let pipeline = load_config(config_path)?;

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Mushroom Classifier".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Form   ", &format!("http://{}:{}/predict_datapoint", host, port)));
    line_box(&kv("API    ", &format!("http://{}:{}/api/predict", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/api/health", host, port)));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    let config = ServerConfig {
        host: host.to_string(),
        port,
        pipeline,
    };

    run_server(config).await
}
