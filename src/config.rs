// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Dotsetup reads an optional TOML file to decide where the setup store lives,
//! which git binary to call, and what remote and merge target to assume when
//! the user does not name them. Every key is optional. Whatever the file
//! leaves out falls back to a default, and a handful of environment variables
//! take precedence over the file.
//!
//! The fully resolved [`Settings`] value is handed explicitly to every
//! operation that needs it.

use crate::path::{self, NoWayHome};

use serde::{Deserialize, Serialize};
use std::{
    env,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Override path to setup store.
pub const ENV_STORE: &str = "DOTSETUP_STORE";

/// Override git binary to invoke.
pub const ENV_GIT: &str = "DOTSETUP_GIT";

/// Override shell rc file used for alias blocks.
pub const ENV_SHELL_RC: &str = "DOTSETUP_SHELL_RC";

/// Tool configuration file layout.
///
/// Mirrors the on-disk TOML file. All fields are optional so a partial file,
/// or no file at all, is valid.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SettingsFile {
    /// Path to the setup store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,

    /// Directory that houses bare repositories made by init and clone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_dir: Option<PathBuf>,

    /// Git binary to invoke.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,

    /// Default remote name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,

    /// Default branch to merge setup branches into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_target: Option<String>,

    /// Shell rc file that receives alias blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell_rc: Option<PathBuf>,
}

impl FromStr for SettingsFile {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut file: SettingsFile = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        for field in [&mut file.store, &mut file.repo_dir, &mut file.shell_rc] {
            if let Some(value) = field.take() {
                *field = Some(path::expand(value)?);
            }
        }

        Ok(file)
    }
}

impl Display for SettingsFile {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Fully resolved tool settings.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Settings {
    pub store: PathBuf,
    pub repo_dir: PathBuf,
    pub git: String,
    pub remote: String,
    pub merge_target: String,
    pub shell_rc: PathBuf,
}

impl Settings {
    /// Construct settings from platform defaults alone.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if platform directories cannot be
    ///   determined.
    pub fn try_default() -> Result<Self> {
        Ok(Self {
            store: path::default_store_path()?,
            repo_dir: path::default_repo_dir()?,
            git: "git".into(),
            remote: "origin".into(),
            merge_target: "main".into(),
            shell_rc: path::home_dir()?.join(".bashrc"),
        })
    }

    /// Load settings from configuration file, then apply environment
    /// overrides.
    ///
    /// Uses the default configuration file location when `path` is `None`.
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ReadConfig`] if existing file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file contents are invalid.
    /// - Return [`ConfigError::ShellExpansion`] if path expansion fails.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => path::default_config_file()?,
        };

        let file = if config_path.exists() {
            debug!("load configuration from {:?}", config_path.display());
            read_to_string(&config_path)
                .map_err(|err| ConfigError::ReadConfig {
                    source: err,
                    config_path: config_path.clone(),
                })?
                .parse()?
        } else {
            debug!("no configuration at {:?}, using defaults", config_path.display());
            SettingsFile::default()
        };

        Self::try_default()?.merge(file).with_env_overrides()
    }

    /// Overlay values present in configuration file layout.
    pub fn merge(mut self, file: SettingsFile) -> Self {
        if let Some(store) = file.store {
            self.store = store;
        }
        if let Some(repo_dir) = file.repo_dir {
            self.repo_dir = repo_dir;
        }
        if let Some(git) = file.git {
            self.git = git;
        }
        if let Some(remote) = file.remote {
            self.remote = remote;
        }
        if let Some(merge_target) = file.merge_target {
            self.merge_target = merge_target;
        }
        if let Some(shell_rc) = file.shell_rc {
            self.shell_rc = shell_rc;
        }

        self
    }

    /// Apply environment variable overrides.
    ///
    /// Supported variables:
    /// - `DOTSETUP_STORE`: path to setup store
    /// - `DOTSETUP_GIT`: git binary to invoke
    /// - `DOTSETUP_SHELL_RC`: shell rc file for alias blocks
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if path expansion fails.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(store) = env::var(ENV_STORE) {
            self.store = path::expand(store)?;
        }
        if let Ok(git) = env::var(ENV_GIT) {
            self.git = git;
        }
        if let Ok(shell_rc) = env::var(ENV_SHELL_RC) {
            self.shell_rc = path::expand(shell_rc)?;
        }

        Ok(self)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<env::VarError>),

    /// Platform directories cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),

    /// Configuration file exists but cannot be read.
    #[error("failed to read configuration file at {:?}", config_path.display())]
    ReadConfig {
        #[source]
        source: std::io::Error,
        config_path: PathBuf,
    },
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
