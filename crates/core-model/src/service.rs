//! Service definitions (§3, §4.6): directories, rendered config files, and
//! ordered startup/validate/shutdown commands executed inside a node's
//! namespace once its links are up.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceCommand {
    pub command: String,
    /// Wait for exit before moving to the next command in the same phase.
    pub blocking: bool,
}

impl ServiceCommand {
    pub fn blocking(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            blocking: true,
        }
    }

    pub fn background(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            blocking: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderedFile {
    pub path: String,
    pub contents: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub directories: Vec<String>,
    pub files: Vec<RenderedFile>,
    pub startup: Vec<ServiceCommand>,
    pub validate: Vec<ServiceCommand>,
    pub shutdown: Vec<ServiceCommand>,
    pub dependencies: Vec<String>,
    pub validation_retries: u32,
    pub validation_period_secs: u64,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directories: Vec::new(),
            files: Vec::new(),
            startup: Vec::new(),
            validate: Vec::new(),
            shutdown: Vec::new(),
            dependencies: Vec::new(),
            validation_retries: 3,
            validation_period_secs: 1,
        }
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }
}
