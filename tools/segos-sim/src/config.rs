//! Simulator configuration file
//!
//! ```toml
//! [kernel]
//! num_pcbs = 16
//! mailbox_capacity = 4
//!
//! [scenario]
//! producers = 3
//! messages = 100
//! ```
//!
//! Every key is optional; missing keys take the kernel defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use segos_kernel::KernelConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub kernel: KernelConfig,
    pub scenario: ScenarioConfig,
}

/// Producer/consumer run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Producer processes sharing the mailbox
    pub producers: usize,
    /// Messages sent by each producer
    pub messages: usize,
    /// Mailbox name
    pub mailbox: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            producers: 2,
            messages: 50,
            mailbox: "pipe".to_string(),
        }
    }
}

impl SimConfig {
    /// Load `path`, or the defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: SimConfig = match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => SimConfig::default(),
        };

        config
            .kernel
            .validate()
            .context("Invalid [kernel] configuration")?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
