//! Training configuration and its compact `Key=Value` mini-language
//!
//! One configuration string describes one network: topology, activation,
//! training algorithm and the knobs of the early-stopping loop. The format
//! is a colon-separated list of `Key=Value` tokens, e.g.
//!
//! ```text
//! HiddenLayers=3*N,N:NCycles=10000:NeuronType=SigmoidSymmetric:TestRate=500
//! ```
//!
//! Every key has a default, so an empty string is a valid configuration.
//! Bad values are reported and the default retained; only an unparseable
//! `HiddenLayers` expression is fatal for the configuration as a whole.

mod expr;

pub use expr::Expr;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::model::{Activation, TrainingAlgorithm};

/// A non-fatal problem found while parsing a configuration string.
///
/// The offending key keeps its default; the issue is surfaced to the caller
/// for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub key: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Fully parsed hyperparameters for one network.
///
/// `hidden_layers` stays in expression form until
/// [`resolve_topology`](Self::resolve_topology) binds it to the concrete
/// input dimensionality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Unique key; also the group name in the persistence container.
    pub name: String,
    /// Hidden layer sizes as expressions over the input count `N`.
    pub hidden_layers: Vec<Expr>,
    pub activation: Activation,
    pub algorithm: TrainingAlgorithm,
    /// Maximum training epochs per restart.
    pub cycles: usize,
    /// Fraction of the sample set reserved for validation plus test.
    pub validation_fraction: f64,
    /// Number of independent restarts from fresh random weights.
    pub random_restarts: usize,
    /// Early-stopping look-back window in epochs.
    pub test_rate: usize,
    /// Worker threads for the epoch passes.
    pub threads: usize,
    /// Record and write per-epoch error curves.
    pub epoch_monitoring: bool,
}

impl NetworkConfig {
    /// The defaults every key falls back to.
    pub fn defaults(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hidden_layers: vec![Expr::N],
            activation: Activation::default(),
            algorithm: TrainingAlgorithm::default(),
            cycles: 10_000,
            validation_fraction: 0.5,
            random_restarts: 1,
            test_rate: 500,
            threads: 1,
            epoch_monitoring: true,
        }
    }

    /// Parse a configuration string.
    ///
    /// Returns the configuration plus any non-fatal issues. Only a malformed
    /// `HiddenLayers` expression makes the whole configuration fail.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<(Self, Vec<ConfigIssue>)> {
        let mut config = Self::defaults(name);
        let mut issues = Vec::new();

        for token in text.split(':') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let Some((key, value)) = token.split_once('=') else {
                issues.push(ConfigIssue {
                    key: token.to_string(),
                    message: "expected Key=Value".to_string(),
                });
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "HiddenLayers" => {
                    // Parse failures here abort the whole configuration.
                    config.hidden_layers = value
                        .split(',')
                        .map(Expr::parse)
                        .collect::<Result<Vec<_>>>()?;
                }
                "NCycles" => parse_min_one(key, value, &mut config.cycles, &mut issues),
                "NeuronType" => match Activation::from_name(value) {
                    Some(a) => config.activation = a,
                    None => issues.push(unknown_value(key, value)),
                },
                "TrainingMethod" => match TrainingAlgorithm::from_name(value) {
                    Some(a) => config.algorithm = a,
                    None => issues.push(unknown_value(key, value)),
                },
                "ValidationFraction" => match value.parse::<f64>() {
                    Ok(f) if (0.1..=0.8).contains(&f) => config.validation_fraction = f,
                    _ => issues.push(ConfigIssue {
                        key: key.to_string(),
                        message: format!("'{}' is not a float in [0.1, 0.8]", value),
                    }),
                },
                "RandomSeeds" => parse_min_one(key, value, &mut config.random_restarts, &mut issues),
                "TestRate" => parse_min_one(key, value, &mut config.test_rate, &mut issues),
                "NThreads" => parse_min_one(key, value, &mut config.threads, &mut issues),
                "EpochMonitoring" => match value {
                    "True" | "true" => config.epoch_monitoring = true,
                    "False" | "false" => config.epoch_monitoring = false,
                    _ => issues.push(ConfigIssue {
                        key: key.to_string(),
                        message: format!("'{}' is not True or False", value),
                    }),
                },
                _ => issues.push(ConfigIssue {
                    key: key.to_string(),
                    message: "unknown key".to_string(),
                }),
            }
        }

        Ok((config, issues))
    }

    /// Bind the hidden-layer expressions to the input count.
    ///
    /// Produces the full topology: input layer, hidden layers in order, and
    /// the output layer of size 1 appended automatically.
    pub fn resolve_topology(&self, n_inputs: usize) -> Result<Vec<usize>> {
        let mut topology = Vec::with_capacity(self.hidden_layers.len() + 2);
        topology.push(n_inputs);
        for expr in &self.hidden_layers {
            topology.push(expr.eval_layer_size(n_inputs)?);
        }
        topology.push(1);
        Ok(topology)
    }
}

fn parse_min_one(key: &str, value: &str, slot: &mut usize, issues: &mut Vec<ConfigIssue>) {
    match value.parse::<usize>() {
        Ok(v) if v >= 1 => *slot = v,
        _ => issues.push(ConfigIssue {
            key: key.to_string(),
            message: format!("'{}' is not an integer >= 1", value),
        }),
    }
}

fn unknown_value(key: &str, value: &str) -> ConfigIssue {
    ConfigIssue {
        key: key.to_string(),
        message: format!("unknown value '{}'", value),
    }
}
