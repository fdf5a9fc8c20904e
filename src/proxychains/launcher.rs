//! Launching applications through proxychains

use crate::error::Result;
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{info, warn};

/// Default launcher binary
pub const DEFAULT_LAUNCHER_BINARY: &str = "proxychains";

/// Runs an application under the proxychains wrapper, with stdio
/// inherited from the current process.
#[derive(Debug, Clone)]
pub struct Launcher {
    binary: String,
}

impl Launcher {
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_LAUNCHER_BINARY.to_string(),
        }
    }

    pub fn with_binary(mut self, binary: String) -> Self {
        self.binary = binary;
        self
    }

    /// Run `app` through the wrapper and wait for it to exit.
    pub async fn launch(&self, app: &str) -> Result<ExitStatus> {
        info!("launching {} through {}", app, self.binary);
        let status = Command::new(&self.binary).arg(app).status().await?;
        if !status.success() {
            warn!("{} exited with {}", app, status);
        }
        Ok(status)
    }
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new()
    }
}
