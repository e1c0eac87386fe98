//! # Configuration
//!
//! How a net steps and what new gates start with. Loaded from JSON or from
//! environment variables; everything has a working default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activity::SchedulingConfig;
use crate::error::{NetError, NetResult};
use crate::gate::GateParameters;

/// Master configuration for a net
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Step engine preference
    pub engine: EngineConfig,

    /// Active-set scheduling
    pub scheduling: SchedulingConfig,

    /// Parameters given to every newly created gate
    pub gates: GateParameters,
}

/// Step engine configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Preferred engine
    pub kind: EngineKind,

    /// With `Auto`, nets with at least this many nodes use the batched engine
    pub batch_min_nodes: usize,

    /// Let the batched engine spread work over threads
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::Auto,
            batch_min_nodes: 10_000,
            parallel: true,
        }
    }
}

/// Available step engines
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Choose by net size
    Auto,
    /// One entity at a time
    Scalar,
    /// Structure-of-arrays buffers, optionally parallel
    Batched,
}

impl std::str::FromStr for EngineKind {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(EngineKind::Auto),
            "scalar" => Ok(EngineKind::Scalar),
            "batched" => Ok(EngineKind::Batched),
            other => Err(NetError::config(format!("unknown engine kind '{}'", other))),
        }
    }
}

impl NetConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> NetResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> NetResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults overridden by environment variables
    ///
    /// Reads:
    /// - PSINET_ENGINE: "auto", "scalar" or "batched"
    /// - PSINET_BATCH_MIN_NODES: node count at which `auto` switches to batched
    /// - PSINET_PARALLEL: "0"/"false" keeps the batched engine on one thread
    /// - PSINET_SPARSE: "0"/"false" runs every node every step
    pub fn from_env() -> NetResult<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PSINET_ENGINE") {
            config.engine.kind = val.parse()?;
        }
        if let Ok(val) = std::env::var("PSINET_BATCH_MIN_NODES") {
            config.engine.batch_min_nodes = val
                .parse()
                .map_err(|_| NetError::config(format!("PSINET_BATCH_MIN_NODES='{}'", val)))?;
        }
        if let Ok(val) = std::env::var("PSINET_PARALLEL") {
            config.engine.parallel = parse_flag(&val)?;
        }
        if let Ok(val) = std::env::var("PSINET_SPARSE") {
            config.scheduling.sparse_updates = parse_flag(&val)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NetResult<()> {
        self.gates
            .validate()
            .map_err(|reason| NetError::config(format!("default gate parameters: {}", reason)))
    }
}

fn parse_flag(value: &str) -> NetResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(NetError::config(format!("expected a boolean, got '{}'", other))),
    }
}
