//! Runner settings, read from the environment

use std::env;
use std::path::PathBuf;

use psinet_core::{NetConfig, NetError, NetResult, Nodenet};

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// JSON net configuration; environment overrides when absent
    pub config_path: Option<PathBuf>,

    /// Steps to run
    pub steps: u64,

    /// Log a progress line every this many steps
    pub report_every: u64,

    /// Seed for the demo world's noise
    pub seed: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            steps: 50,
            report_every: 10,
            seed: 42,
        }
    }
}

impl RunnerConfig {
    pub fn from_env() -> NetResult<Self> {
        let mut config = Self::default();

        if let Ok(path) = env::var("PSINET_CONFIG") {
            config.config_path = Some(PathBuf::from(path));
        }
        if let Ok(val) = env::var("PSINET_STEPS") {
            config.steps = parse_number("PSINET_STEPS", &val)?;
        }
        if let Ok(val) = env::var("PSINET_REPORT_EVERY") {
            config.report_every = parse_number("PSINET_REPORT_EVERY", &val)?.max(1);
        }
        if let Ok(val) = env::var("PSINET_SEED") {
            config.seed = parse_number("PSINET_SEED", &val)?;
        }

        Ok(config)
    }

    /// Net configuration from the JSON file if one is set, else from the environment
    pub fn net_config(&self) -> NetResult<NetConfig> {
        match &self.config_path {
            Some(path) => NetConfig::load(path),
            None => NetConfig::from_env(),
        }
    }
}

fn parse_number(name: &str, value: &str) -> NetResult<u64> {
    value
        .parse()
        .map_err(|_| NetError::config(format!("{}='{}' is not a number", name, value)))
}

pub fn print_banner(runner: &RunnerConfig, net: &Nodenet) {
    let config = net.config();
    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║                psinet - node net runner                  ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  Nodes: {:>10}                                       ║", net.node_count());
    println!("║  Links: {:>10}                                       ║", net.link_count());
    println!("║  Engine: {:>16}                                ║", net.engine_name());
    println!("║  Sparse: {:>9}                                       ║", config.scheduling.sparse_updates);
    println!("║  Steps: {:>10}                                       ║", runner.steps);
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("PSINET_STEPS", "12").unwrap(), 12);
        assert!(matches!(
            parse_number("PSINET_STEPS", "many"),
            Err(NetError::Config(_))
        ));
    }
}
