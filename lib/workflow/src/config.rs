//! Engine configuration.
//!
//! Loaded via the `config` crate from `CHATFLOW__`-prefixed environment
//! variables, e.g. `CHATFLOW__SIMULATION__MAX_STEPS=50`.

use serde::Deserialize;

/// Configuration for the workflow engine.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub context: ContextConfig,
}

/// Limits for simulated runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Maximum number of steps executed in one run.
    /// Stops runaway loops in hand-wired cyclic workflows.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Iterations for a `loop` step whose output carries no `loopCount`.
    #[serde(default = "default_loop_iterations")]
    pub default_loop_iterations: u64,
}

fn default_max_steps() -> usize {
    20
}

fn default_loop_iterations() -> u64 {
    3
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            default_loop_iterations: default_loop_iterations(),
        }
    }
}

/// Defaults placed in every assembled execution context.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContextConfig {
    /// Currency of the empty cart.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "XOF".to_string()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(
            config::Environment::with_prefix("CHATFLOW")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Loads configuration from any `config` source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or deserialized.
    pub fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.simulation.max_steps, 20);
        assert_eq!(config.simulation.default_loop_iterations, 3);
        assert_eq!(config.context.currency, "XOF");
    }

    #[test]
    fn partial_source_keeps_defaults() {
        let source = File::from_str(r#"{"simulation": {"max_steps": 5}}"#, FileFormat::Json);
        let config = EngineConfig::from_source(source).expect("valid config");
        assert_eq!(config.simulation.max_steps, 5);
        assert_eq!(config.simulation.default_loop_iterations, 3);
        assert_eq!(config.context.currency, "XOF");
    }

    #[test]
    fn empty_source_is_default() {
        let source = File::from_str("{}", FileFormat::Json);
        let config = EngineConfig::from_source(source).expect("valid config");
        assert_eq!(config, EngineConfig::default());
    }
}
