// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations for the files dotsetup reads and writes: the
//! setup store, the tool configuration file, and the directory that houses
//! bare repositories created by `init` or `clone`.

use std::{
    env::VarError,
    path::{Path, PathBuf},
};

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to dotsetup's configuration directory.
///
/// Uses `$XDG_CONFIG_HOME/dotsetup`. Does not check if the path returned
/// actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("dotsetup"))
        .ok_or(NoWayHome)
}

/// Default absolute path to the tool configuration file.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_config_file() -> Result<PathBuf> {
    default_config_dir().map(|path| path.join("config.toml"))
}

/// Default absolute path to the setup store.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_store_path() -> Result<PathBuf> {
    default_config_dir().map(|path| path.join("setups.json"))
}

/// Determine default absolute path to bare repository directory.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/dotsetup`. Bare repositories
/// created without an explicit path are placed here as `<setup>.git`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_repo_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("dotsetup"))
        .ok_or(NoWayHome)
}

/// Perform shell expansion on a path.
///
/// Expands a leading tilde and any `$VAR` or `${VAR}` references. Paths that
/// are not valid UTF-8 are expanded lossily.
///
/// # Errors
///
/// - Return [`shellexpand::LookupError`] if a referenced variable is unset
///   or not unicode.
pub fn expand(path: impl AsRef<Path>) -> Result<PathBuf, shellexpand::LookupError<VarError>> {
    shellexpand::full(path.as_ref().to_string_lossy().as_ref())
        .map(|expanded| PathBuf::from(expanded.into_owned()))
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
