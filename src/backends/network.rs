//! Wireless network selection
//!
//! Switching between Sonos households means joining a different wireless
//! network. On the device this goes through `wpa_cli`, which expects the
//! networks to be declared in `wpa_supplicant.conf` in a fixed order.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// Network selection capability
#[async_trait]
pub trait NetworkSelector: Send + Sync {
    /// Join the network with the given supplicant id
    async fn select_network(&self, id: u32) -> Result<()>;
}

/// Selects networks by running `wpa_cli select_network <id>`
pub struct WpaCliSelector {
    program: String,
}

impl WpaCliSelector {
    pub fn new() -> Self {
        Self {
            program: "wpa_cli".to_string(),
        }
    }

    /// Use another executable (e.g. an absolute path)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for WpaCliSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkSelector for WpaCliSelector {
    async fn select_network(&self, id: u32) -> Result<()> {
        info!("Selecting wireless network {}", id);
        let output = Command::new(&self.program)
            .arg("select_network")
            .arg(id.to_string())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;

        if !output.status.success() {
            bail!(
                "{} select_network {} failed ({}): {}",
                self.program,
                id,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        debug!(
            "{} select_network {}: {}",
            self.program,
            id,
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }
}

/// Accepts every selection without touching the system (console mode)
pub struct NoopNetworkSelector;

#[async_trait]
impl NetworkSelector for NoopNetworkSelector {
    async fn select_network(&self, id: u32) -> Result<()> {
        info!("(console) would select wireless network {}", id);
        Ok(())
    }
}
