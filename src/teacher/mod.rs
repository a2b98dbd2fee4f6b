//! Orchestration of a full training campaign
//!
//! A [`Teacher`] accumulates samples over many events, then trains every
//! configured network at finalization and persists the winners plus the
//! sample set. Per-method problems (bad config, too few samples, zero-range
//! target) stay local to that method; only container write failures abort
//! the run.

use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::NetworkConfig;
use crate::data::SampleSet;
use crate::error::Result;
use crate::model::NetworkModel;
use crate::storage::{self, ModelGroup, SampleGroup};
use crate::training::{TrainOutcome, TrainReport, Trainer};

/// Which trainer a method tuple selects. Closed set; unknown tags are
/// rejected when the method list is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Mlp,
}

impl MethodKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Mlp" | "MLP" => Some(Self::Mlp),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mlp => "Mlp",
        }
    }
}

/// One method tuple from the caller: group name, trainer kind, and the
/// compact configuration string.
#[derive(Debug, Clone)]
pub struct MethodSpec {
    pub array_name: String,
    pub kind: MethodKind,
    pub config: String,
}

/// Global settings for a training campaign.
#[derive(Debug, Clone)]
pub struct TeacherSettings {
    /// Container file holding model groups and the sample set.
    pub container: PathBuf,
    /// Key the accumulated sample set is stored under.
    pub sample_group: String,
    pub target_name: String,
    pub input_names: Vec<String>,
    /// Directory for epoch-log artifacts.
    pub working_dir: PathBuf,
    /// Prefix for artifact filenames.
    pub file_prefix: String,
    /// Base seed for weight randomization; restart `r` uses `seed + r`.
    pub base_seed: u64,
}

impl TeacherSettings {
    pub fn new(container: impl Into<PathBuf>) -> Self {
        Self {
            container: container.into(),
            sample_group: "samples".to_string(),
            target_name: "target".to_string(),
            input_names: Vec::new(),
            working_dir: PathBuf::from("."),
            file_prefix: String::new(),
            base_seed: 42,
        }
    }

    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target_name = name.into();
        self
    }

    pub fn with_inputs(mut self, names: Vec<String>) -> Self {
        self.input_names = names;
        self
    }

    pub fn with_sample_group(mut self, key: impl Into<String>) -> Self {
        self.sample_group = key.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }
}

/// What happened to each configured method.
#[derive(Debug, Clone, Default)]
pub struct TeacherSummary {
    pub trained: Vec<String>,
    pub reused: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Accumulates samples and trains every configured network at finalization.
pub struct Teacher {
    settings: TeacherSettings,
    methods: Vec<NetworkConfig>,
    set: SampleSet,
}

impl Teacher {
    /// Parse the method list once.
    ///
    /// A fatal configuration error (malformed hidden-layer expression)
    /// removes only that method; non-fatal issues keep the defaults and are
    /// logged.
    pub fn new(settings: TeacherSettings, specs: Vec<MethodSpec>) -> Self {
        let mut methods = Vec::with_capacity(specs.len());
        for spec in specs {
            match NetworkConfig::parse(spec.array_name.clone(), &spec.config) {
                Ok((config, issues)) => {
                    for issue in &issues {
                        warn!(method = %spec.array_name, %issue, "configuration issue; default retained");
                    }
                    methods.push(config);
                }
                Err(err) => {
                    error!(method = %spec.array_name, %err, "configuration rejected");
                }
            }
        }
        Self {
            settings,
            methods,
            set: SampleSet::new(),
        }
    }

    /// Start from an existing sample set instead of an empty one.
    pub fn with_samples(mut self, set: SampleSet) -> Self {
        self.set = set;
        self
    }

    pub fn sample_set(&self) -> &SampleSet {
        &self.set
    }

    pub fn methods(&self) -> &[NetworkConfig] {
        &self.methods
    }

    /// Append one sample. Non-finite or mis-shaped samples are rejected
    /// with a warning and leave the set unchanged.
    pub fn add_sample(&mut self, input: &[f64], target: &[f64]) -> bool {
        match self.set.add(input.to_vec(), target.to_vec()) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "sample rejected");
                false
            }
        }
    }

    /// Train every method that is not already stored, then persist the
    /// sample set.
    ///
    /// Per-method failures are logged and recorded in the summary; a write
    /// failure while persisting a model group or the sample set is fatal.
    pub fn finalize(&self) -> Result<TeacherSummary> {
        let mut summary = TeacherSummary::default();

        if self.set.is_empty() {
            warn!("no samples accumulated; nothing to train");
        } else {
            for config in &self.methods {
                self.finalize_method(config, &mut summary)?;
            }
        }

        storage::save_samples(
            &self.settings.container,
            &self.settings.sample_group,
            SampleGroup::new(
                self.set.clone(),
                self.settings.input_names.clone(),
                self.settings.target_name.clone(),
            ),
        )?;
        info!(
            container = %self.settings.container.display(),
            samples = self.set.len(),
            "sample set persisted"
        );
        Ok(summary)
    }

    fn finalize_method(&self, config: &NetworkConfig, summary: &mut TeacherSummary) -> Result<()> {
        let name = config.name.clone();
        if storage::load_models(&self.settings.container, &name).is_some() {
            info!(model = %name, "already trained; reusing stored group");
            summary.reused.push(name);
            return Ok(());
        }

        let topology = match config.resolve_topology(self.set.n_inputs()) {
            Ok(topology) => topology,
            Err(err) => {
                error!(model = %name, %err, "cannot resolve topology");
                summary.failed.push(name);
                return Ok(());
            }
        };
        let mut model =
            match NetworkModel::new(name.clone(), topology, config.activation, config.algorithm) {
                Ok(model) => model,
                Err(err) => {
                    error!(model = %name, %err, "cannot build model");
                    summary.failed.push(name);
                    return Ok(());
                }
            };

        let trainer = match Trainer::new(&self.set, config.clone()) {
            Ok(trainer) => trainer.with_seed(self.settings.base_seed),
            Err(err) => {
                error!(model = %name, %err, "cannot build trainer");
                summary.failed.push(name);
                return Ok(());
            }
        };

        match trainer.train(&mut model) {
            Ok(TrainOutcome::Trained(report)) => {
                info!(
                    model = %name,
                    test_rms = report.test_rms,
                    best_restart = report.best_restart,
                    "training finished"
                );
                if config.epoch_monitoring {
                    self.write_epoch_log(&name, &report);
                }
                let group = ModelGroup::new(
                    vec![model],
                    self.settings.input_names.clone(),
                    self.settings.target_name.clone(),
                );
                storage::save_models(&self.settings.container, &name, group)?;
                summary.trained.push(name);
            }
            Ok(TrainOutcome::Skipped(_)) => {
                // Trainer already warned with the counts.
                summary.skipped.push(name);
            }
            Err(err) => {
                error!(model = %name, %err, "training failed");
                summary.failed.push(name);
            }
        }
        Ok(())
    }

    /// Champion error curves as `"train valid"` lines, one per epoch.
    fn write_epoch_log(&self, name: &str, report: &TrainReport) {
        let path = self.epoch_log_path(name);
        let mut content = String::with_capacity(report.train_log.len() * 24);
        for (train, valid) in report.train_log.iter().zip(report.valid_log.iter()) {
            content.push_str(&format!("{} {}\n", train, valid));
        }
        if let Err(err) = std::fs::write(&path, content) {
            warn!(path = %path.display(), %err, "could not write epoch log");
        }
    }

    fn epoch_log_path(&self, name: &str) -> PathBuf {
        self.settings
            .working_dir
            .join(format!("{}{}.log", self.settings.file_prefix, name))
    }
}

/// True when a group of this name is already stored in the container.
pub fn is_trained(container: &Path, group: &str) -> bool {
    storage::load_models(container, group).is_some()
}
