// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Setup record layout.

use serde::{Deserialize, Deserializer, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

/// Operating system tag of a setup.
///
/// Purely informational. Parsing is lenient: anything that is not recognized
/// becomes [`Os::Unknown`] instead of an error.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Os {
    Linux,
    MacOS,
    Windows,
    #[default]
    Unknown,
}

impl Os {
    /// Operating system dotsetup was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::MacOS
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Unknown
        }
    }

    /// Canonical name used when persisting.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::MacOS => "MacOS",
            Self::Windows => "Windows",
            Self::Unknown => "Unknown",
        }
    }
}

impl From<&str> for Os {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "linux" => Self::Linux,
            "macos" | "mac" | "osx" | "darwin" => Self::MacOS,
            "windows" | "win" | "win32" => Self::Windows,
            _ => Self::Unknown,
        }
    }
}

impl From<String> for Os {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Os> for String {
    fn from(os: Os) -> Self {
        os.as_str().into()
    }
}

impl Display for Os {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// A named setup.
///
/// Associates a bare repository with the work tree its tracked files live in,
/// an operating system tag, and the branch holding this machine's variant of
/// the dotfiles.
///
/// Only `name` is mandatory. The remaining fields may be absent in a stored
/// record; the resolver decides what an absent field means. An empty value is
/// always held as `None`, so every store format reads back the same record.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Setup {
    /// Unique name of setup.
    pub name: String,

    /// Operating system tag.
    #[serde(default)]
    pub os: Os,

    /// Work tree root.
    #[serde(default, deserialize_with = "non_empty_path")]
    pub folder: Option<PathBuf>,

    /// Path to bare repository.
    #[serde(default, deserialize_with = "non_empty_path")]
    pub repo: Option<PathBuf>,

    /// Branch tracking this setup. Defaults to setup name once resolved.
    #[serde(default, deserialize_with = "non_empty_string")]
    pub branch: Option<String>,
}

fn non_empty_path<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<PathBuf>::deserialize(deserializer)?.filter(|path| !path.as_os_str().is_empty()))
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|value| !value.is_empty()))
}

impl Setup {
    /// Construct new setup with nothing but a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_os(mut self, os: Os) -> Self {
        self.os = os;
        self
    }

    pub fn with_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = Some(folder.into()).filter(|path| !path.as_os_str().is_empty());
        self
    }

    pub fn with_repo(mut self, repo: impl Into<PathBuf>) -> Self {
        self.repo = Some(repo.into()).filter(|path| !path.as_os_str().is_empty());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into()).filter(|branch| !branch.is_empty());
        self
    }

    /// Work tree root, treating an empty path as unset.
    pub fn folder(&self) -> Option<&Path> {
        self.folder
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// Bare repository path, treating an empty path as unset.
    pub fn repo(&self) -> Option<&Path> {
        self.repo
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    /// Branch name, treating an empty string as unset.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref().filter(|branch| !branch.is_empty())
    }
}
