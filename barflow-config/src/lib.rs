//! Layered configuration for Barflow hosts.
//!
//! Settings are merged from `config/default.toml`, `config/{env}.toml`, an
//! optional explicit file and finally `BARFLOW__*` environment variables
//! (`BARFLOW__LOG__LEVEL=debug` overrides `log.level`).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use barflow_core::SessionRule;
use barflow_indicators::graph::{build_graph, KINDS};
use barflow_indicators::{CalculatorGraph, NodeSpec};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "BARFLOW";

/// Root of the Barflow configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarflowConfig {
    /// Logging subscriber settings.
    pub log: LogSettings,
    /// Nodes of the calculator graph.
    pub graph: GraphSettings,
    /// Replay driver settings.
    pub replay: ReplaySettings,
}

/// Subscriber settings consumed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit newline-delimited JSON instead of human-readable lines.
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Declarative calculator graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Node declarations, in any order; inputs refer to other node ids.
    pub nodes: Vec<NodeSpec>,
}

/// How candles are fed to the graph during a replay run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Tentative updates delivered for each bar before its final candle.
    pub revisions_per_bar: usize,
    /// Session boundaries seen by session-aware nodes.
    pub session: SessionRule,
}

impl BarflowConfig {
    /// Parse a single TOML document, without file layering or env overrides.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).context("failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Check node ids, kinds and input references.
    ///
    /// Cycles are only detected when the graph is built.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for node in &self.graph.nodes {
            if !ids.insert(node.id.as_str()) {
                bail!("duplicate graph node id `{}`", node.id);
            }
            if !KINDS.contains(&node.kind.to_ascii_lowercase().as_str()) {
                bail!(
                    "node `{}` has unknown kind `{}` (expected one of: {})",
                    node.id,
                    node.kind,
                    KINDS.join(", ")
                );
            }
        }
        for node in &self.graph.nodes {
            if let Some(missing) = node.inputs.iter().find(|input| !ids.contains(input.as_str())) {
                bail!("node `{}` reads unknown node `{missing}`", node.id);
            }
        }
        Ok(())
    }

    /// Instantiate the configured calculator graph.
    pub fn build_graph(&self) -> Result<CalculatorGraph> {
        build_graph(&self.graph.nodes).context("failed to build calculator graph")
    }
}

/// Loads [`BarflowConfig`] from a directory of layered TOML files.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    dir: PathBuf,
    env: String,
    file: Option<PathBuf>,
    use_env_vars: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new("config")
    }
}

impl ConfigLoader {
    /// Loader reading `default.toml` and `{env}.toml` from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            env: "default".to_string(),
            file: None,
            use_env_vars: true,
        }
    }

    /// Select the environment overlay.
    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    /// Merge an explicit file on top of the directory layers. The file must exist.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Skip `BARFLOW__*` environment overrides.
    pub fn without_env_vars(mut self) -> Self {
        self.use_env_vars = false;
        self
    }

    /// Merge the layers, deserialize and validate.
    pub fn load(&self) -> Result<BarflowConfig> {
        let mut builder =
            Config::builder().add_source(File::from(self.dir.join("default.toml")).required(false));
        if self.env != "default" {
            builder = builder.add_source(
                File::from(self.dir.join(format!("{}.toml", self.env))).required(false),
            );
        }
        if let Some(path) = &self.file {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }
        if self.use_env_vars {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }
        let merged = builder.build().context("failed to read configuration")?;
        let config: BarflowConfig = merged
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        config.validate()?;
        debug!(
            env = %self.env,
            nodes = config.graph.nodes.len(),
            "configuration loaded"
        );
        Ok(config)
    }
}

/// Load `./config` layers for `env`, plus an optional explicit file.
pub fn load_config(env: Option<&str>, file: Option<&Path>) -> Result<BarflowConfig> {
    let mut loader = ConfigLoader::default().env(env.unwrap_or("default"));
    if let Some(path) = file {
        loader = loader.file(path);
    }
    loader.load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use barflow_core::PriceField;
    use std::fs;

    const GRAPH: &str = r#"
        [log]
        level = "debug"

        [[graph.nodes]]
        id = "fast"
        kind = "ema"
        source = "close"
        params = { period = 3 }

        [[graph.nodes]]
        id = "slow"
        kind = "ema"
        params = { period = 8 }

        [[graph.nodes]]
        id = "spread"
        kind = "difference"
        inputs = ["fast", "slow"]
    "#;

    #[test]
    fn defaults_apply_to_missing_sections() {
        let config = BarflowConfig::from_toml_str("").unwrap();
        assert_eq!(config.log.level, "info");
        assert!(!config.log.json);
        assert!(config.graph.nodes.is_empty());
        assert_eq!(config.replay.revisions_per_bar, 0);
        assert_eq!(config.replay.session, SessionRule::Continuous);
    }

    #[test]
    fn parses_graph_nodes() {
        let config = BarflowConfig::from_toml_str(GRAPH).unwrap();
        assert_eq!(config.graph.nodes.len(), 3);
        assert_eq!(config.graph.nodes[0].source, Some(PriceField::Close));
        assert_eq!(config.graph.nodes[2].inputs, vec!["fast", "slow"]);
        let graph = config.build_graph().unwrap();
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn rejects_unknown_kind_and_dangling_inputs() {
        let unknown = r#"
            [[graph.nodes]]
            id = "x"
            kind = "kama"
        "#;
        let err = BarflowConfig::from_toml_str(unknown).unwrap_err();
        assert!(err.to_string().contains("unknown kind"), "{err}");

        let dangling = r#"
            [[graph.nodes]]
            id = "x"
            kind = "sma"
            inputs = ["y"]
        "#;
        let err = BarflowConfig::from_toml_str(dangling).unwrap_err();
        assert!(err.to_string().contains("unknown node `y`"), "{err}");
    }

    #[test]
    fn cycles_surface_when_building() {
        let cyclic = r#"
            [[graph.nodes]]
            id = "a"
            kind = "sma"
            inputs = ["b"]

            [[graph.nodes]]
            id = "b"
            kind = "sma"
            inputs = ["a"]
        "#;
        let config = BarflowConfig::from_toml_str(cyclic).unwrap();
        assert!(config.build_graph().is_err());
    }

    #[test]
    fn combinator_input_count_is_checked_when_building() {
        let short = r#"
            [[graph.nodes]]
            id = "fast"
            kind = "ema"

            [[graph.nodes]]
            id = "spread"
            kind = "difference"
            inputs = ["fast"]
        "#;
        let config = BarflowConfig::from_toml_str(short).unwrap();
        let err = config.build_graph().err().unwrap();
        assert!(format!("{err:#}").contains("exactly 2 inputs"), "{err:#}");
    }

    #[test]
    fn layers_merge_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("default.toml"), GRAPH).unwrap();
        fs::write(
            dir.path().join("research.toml"),
            "[replay]\nrevisions_per_bar = 2\n",
        )
        .unwrap();
        let explicit = dir.path().join("override.toml");
        fs::write(&explicit, "[log]\njson = true\n").unwrap();

        let config = ConfigLoader::new(dir.path())
            .env("research")
            .file(&explicit)
            .without_env_vars()
            .load()
            .unwrap();
        assert_eq!(config.log.level, "debug");
        assert!(config.log.json);
        assert_eq!(config.replay.revisions_per_bar, 2);
        assert_eq!(config.graph.nodes.len(), 3);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigLoader::new(dir.path())
            .file(dir.path().join("absent.toml"))
            .without_env_vars()
            .load();
        assert!(result.is_err());
    }

    #[test]
    fn environment_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("default.toml"), GRAPH).unwrap();
        std::env::set_var("BARFLOW__REPLAY__REVISIONS_PER_BAR", "3");
        let loaded = ConfigLoader::new(dir.path()).load();
        std::env::remove_var("BARFLOW__REPLAY__REVISIONS_PER_BAR");
        let config = loaded.unwrap();
        assert_eq!(config.replay.revisions_per_bar, 3);
        assert_eq!(config.log.level, "debug");
    }
}
