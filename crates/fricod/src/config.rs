//! Environment and command-line configuration.

use std::path::PathBuf;

use anyhow::Context;

/// Runtime configuration: CLI flags layered with the environment contract
/// (`MAX_REALLOC`, `SIMULATION_NAME`, `LOG_PATH`).
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub namespace: String,
    /// Bound on the tier-3 preemption prefix per node.
    pub max_realloc: usize,
    pub simulation_name: String,
    /// Audit log destination; stderr when unset.
    pub log_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env(port: u16, namespace: String) -> anyhow::Result<Self> {
        let max_realloc = std::env::var("MAX_REALLOC")
            .context("MAX_REALLOC is not set")?
            .parse()
            .context("MAX_REALLOC must be a non-negative integer")?;
        let simulation_name =
            std::env::var("SIMULATION_NAME").context("SIMULATION_NAME is not set")?;
        let log_path = std::env::var_os("LOG_PATH").map(PathBuf::from);

        Ok(Self {
            port,
            namespace,
            max_realloc,
            simulation_name,
            log_path,
        })
    }

    /// Run identity: simulation name plus start time.
    pub fn run_id(&self, epoch_secs: u64) -> String {
        format!("{}-{}", self.simulation_name, epoch_secs)
    }
}
