//! Command-line interface
//!
//! The companion tool for offline training: import sample tables from CSV,
//! train configured networks against a container, evaluate and inspect the
//! results.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};

use crate::data::{dataframe_to_sample_set, sample_set_to_dataframe};
use crate::storage::{self, SampleGroup};
use crate::teacher::{MethodKind, MethodSpec, Teacher, TeacherSettings};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}

fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}

fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "neurotrack")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MLP training engine for track-parameter estimation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a network against samples stored in a container
    Train {
        /// Container file (created if absent)
        #[arg(short, long)]
        container: PathBuf,

        /// Group name for the trained models
        #[arg(short, long)]
        group: String,

        /// Training configuration string, e.g. "HiddenLayers=3*N:NCycles=1000"
        #[arg(long, default_value = "")]
        config: String,

        /// Method kind tag
        #[arg(long, default_value = "Mlp")]
        method: String,

        /// Key of the sample table inside the container
        #[arg(long, default_value = "samples")]
        samples: String,

        /// Directory for epoch-log artifacts
        #[arg(long, default_value = ".")]
        workdir: PathBuf,

        /// Filename prefix for artifacts
        #[arg(long, default_value = "")]
        prefix: String,

        /// Base seed for weight randomization
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Retrain even if the group already exists
        #[arg(long)]
        force: bool,
    },

    /// Import a CSV sample table into a container
    Import {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Container file (created if absent)
        #[arg(short, long)]
        container: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Key to store the sample table under
        #[arg(long, default_value = "samples")]
        key: String,
    },

    /// Export a sample table from a container to CSV
    Export {
        /// Container file
        #[arg(short, long)]
        container: PathBuf,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Key of the sample table
        #[arg(long, default_value = "samples")]
        key: String,
    },

    /// List the entries of a container
    Info {
        /// Container file
        #[arg(short, long)]
        container: PathBuf,
    },

    /// Evaluate a trained group on a sample table
    Eval {
        /// Container file
        #[arg(short, long)]
        container: PathBuf,

        /// Group name of the trained models
        #[arg(short, long)]
        group: String,

        /// Key of the sample table
        #[arg(long, default_value = "samples")]
        samples: String,
    },

    /// Dump a trained group as JSON
    Show {
        /// Container file
        #[arg(short, long)]
        container: PathBuf,

        /// Group name
        #[arg(short, long)]
        group: String,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    container: &Path,
    group: &str,
    method: &str,
    config: &str,
    samples_key: &str,
    workdir: &Path,
    prefix: &str,
    seed: u64,
    force: bool,
) -> anyhow::Result<()> {
    section("Train");

    let kind = MethodKind::from_name(method)
        .ok_or_else(|| anyhow::anyhow!("unknown method kind '{}'", method))?;

    let sample_group = storage::load_samples(container, samples_key).ok_or_else(|| {
        anyhow::anyhow!(
            "no sample table '{}' in {}; run `neurotrack import` first",
            samples_key,
            container.display()
        )
    })?;
    kv("Samples", &format!("{} rows × {} inputs", sample_group.set.len(), sample_group.set.n_inputs()));
    kv("Target", &sample_group.target_name);

    if force {
        // Drop the stored group so finalize retrains instead of reusing it.
        storage::remove_entry(container, group)?;
    }

    let settings = TeacherSettings::new(container)
        .with_target(sample_group.target_name.clone())
        .with_inputs(sample_group.input_names.clone())
        .with_sample_group(samples_key)
        .with_working_dir(workdir)
        .with_file_prefix(prefix)
        .with_seed(seed);

    let spec = MethodSpec {
        array_name: group.to_string(),
        kind,
        config: config.to_string(),
    };
    let teacher = Teacher::new(settings, vec![spec]).with_samples(sample_group.set);
    if teacher.methods().is_empty() {
        anyhow::bail!("configuration for '{}' was rejected", group);
    }

    let summary = teacher.finalize()?;
    println!();
    for name in &summary.trained {
        step_ok(&format!("trained {}", name.white().bold()));
    }
    for name in &summary.reused {
        println!("  {} {} {}", dim("·"), name, muted("already trained, reused"));
    }
    for name in &summary.skipped {
        println!("  {} {} {}", dim("·"), name, muted("skipped, not enough samples"));
    }
    for name in &summary.failed {
        println!("  {} {} {}", "✗".red(), name, muted("failed, see log"));
    }
    println!();
    Ok(())
}

pub fn cmd_import(data: &Path, container: &Path, target: &str, key: &str) -> anyhow::Result<()> {
    section("Import");

    let df = load_csv(data)?;
    kv("File", &data.display().to_string());
    kv("Rows", &df.height().to_string());

    let (set, input_names) = dataframe_to_sample_set(&df, target)?;
    let rows = set.len();
    storage::save_samples(
        container,
        key,
        SampleGroup::new(set, input_names, target.to_string()),
    )?;

    step_ok(&format!(
        "stored {} samples under '{}' in {}",
        rows,
        key,
        container.display()
    ));
    println!();
    Ok(())
}

pub fn cmd_export(container: &Path, key: &str, output: &Path) -> anyhow::Result<()> {
    section("Export");

    let group = storage::load_samples(container, key)
        .ok_or_else(|| anyhow::anyhow!("no sample table '{}' in {}", key, container.display()))?;
    let mut df = sample_set_to_dataframe(&group.set, &group.input_names, &group.target_name)?;

    let mut file = std::fs::File::create(output)?;
    CsvWriter::new(&mut file).finish(&mut df)?;

    step_ok(&format!(
        "wrote {} rows to {}",
        df.height(),
        output.display()
    ));
    println!();
    Ok(())
}

pub fn cmd_info(container: &Path) -> anyhow::Result<()> {
    section("Container");

    let entries = storage::list_entries(container);
    if entries.is_empty() {
        println!("  {}", muted("no entries"));
        println!();
        return Ok(());
    }

    for (key, detail) in entries {
        println!("  {:<24} {}", key.white(), muted(&detail));
    }
    println!();
    Ok(())
}

pub fn cmd_eval(container: &Path, group: &str, samples_key: &str) -> anyhow::Result<()> {
    section("Evaluate");

    let models = storage::load_models(container, group)
        .ok_or_else(|| anyhow::anyhow!("no model group '{}' in {}", group, container.display()))?;
    let samples = storage::load_samples(container, samples_key)
        .ok_or_else(|| anyhow::anyhow!("no sample table '{}' in {}", samples_key, container.display()))?;

    kv("Samples", &samples.set.len().to_string());
    println!();
    println!("  {:<24} {:>14}", muted("Model"), muted("RMS"));
    println!("  {}", dim(&"─".repeat(40)));

    for model in &models.models {
        let mut sq_sum = 0.0;
        for sample in samples.set.samples() {
            let predicted = model.run(sample.input())?;
            let residual = predicted - sample.target()[0];
            sq_sum += residual * residual;
        }
        let rms = (sq_sum / samples.set.len().max(1) as f64).sqrt();
        println!("  {:<24} {:>14.6}", model.array_name(), rms);
    }
    println!();
    Ok(())
}

pub fn cmd_show(container: &Path, group: &str) -> anyhow::Result<()> {
    let models = storage::load_models(container, group)
        .ok_or_else(|| anyhow::anyhow!("no model group '{}' in {}", group, container.display()))?;
    println!("{}", serde_json::to_string_pretty(&models.models)?);
    Ok(())
}

// ─── Data loading ──────────────────────────────────────────────────────────────

fn load_csv(path: &Path) -> anyhow::Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}
