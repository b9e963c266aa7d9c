// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Setup store management.
//!
//! Dotsetup keeps every known setup in one file called the __setup store__.
//! The store is a flat collection of [`Setup`] records keyed by name, kept in
//! insertion order.
//!
//! # Store Formats
//!
//! The store is either a JSON document of the form `{"setups": [...]}`, or a
//! flat delimited file with one record per line. The format is picked from
//! the file extension: `.csv` and `.txt` select the delimited format,
//! anything else selects JSON.
//!
//! # Consistency
//!
//! Every mutation loads the whole store into memory, edits it, and writes it
//! back through a temporary file that is renamed over the original. A crash
//! mid-write therefore never leaves a half-written store behind. There is no
//! locking, so two dotsetup processes mutating the same store at once can
//! still lose an update (last writer wins). Dotsetup is a single-user tool and
//! does not guard against that.

pub mod delimited;
pub mod record;

pub use record::{Os, Setup};

use crate::store::delimited::DelimitedError;

use serde::{Deserialize, Serialize};
use std::{
    fs::read_to_string,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// On-disk encoding of setup store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    #[default]
    Json,
    Delimited,
}

impl StoreFormat {
    /// Pick format based on extension of store path.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("txt") => {
                Self::Delimited
            }
            _ => Self::Json,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct JsonLayout {
    #[serde(default)]
    setups: Vec<Setup>,
}

/// Durable mapping from setup name to setup record.
#[derive(Debug, Clone)]
pub struct SetupStore {
    store_path: PathBuf,
    format: StoreFormat,
}

impl SetupStore {
    /// Construct new handle to setup store at target path.
    ///
    /// Does not touch the file system.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let store_path = path.into();
        let format = StoreFormat::from_path(&store_path);

        Self { store_path, format }
    }

    /// Path to backing store file.
    pub fn path(&self) -> &Path {
        self.store_path.as_path()
    }

    /// Encoding used for backing store file.
    pub fn format(&self) -> StoreFormat {
        self.format
    }

    /// Create empty store if it does not exist yet.
    ///
    /// Creates parent directories as needed.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::CreateStore`] if parent directories cannot be
    ///   created.
    /// - Return [`StoreError::WriteStore`] if empty store cannot be written.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.store_path.exists() {
            return Ok(());
        }

        debug!("create empty setup store at {:?}", self.store_path.display());
        let _ = mkdirp::mkdirp(self.parent_dir()).map_err(|err| StoreError::CreateStore {
            source: err,
            store_path: self.store_path.clone(),
        })?;

        self.save(&[])
    }

    /// List all setups in insertion order.
    ///
    /// An empty list is valid. A store that cannot be parsed is an error, never
    /// an empty list.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ReadStore`] if store cannot be read.
    /// - Return [`StoreError::Json`] or [`StoreError::Delimited`] if store
    ///   contents are corrupt.
    pub fn list_setups(&self) -> Result<Vec<Setup>> {
        self.load()
    }

    /// Find setup by exact name.
    ///
    /// Absence is a normal outcome, reported as `None`.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if store cannot be loaded.
    pub fn find_setup(&self, name: impl AsRef<str>) -> Result<Option<Setup>> {
        Ok(self
            .load()?
            .into_iter()
            .find(|setup| setup.name == name.as_ref()))
    }

    /// Append setup record.
    ///
    /// Does not check for name uniqueness; registration through the resolver
    /// does.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if store cannot be loaded or written.
    #[instrument(skip(self, setup), fields(name = %setup.name), level = "debug")]
    pub fn append_setup(&self, setup: Setup) -> Result<()> {
        self.edit(|setups| {
            setups.push(setup);
            Ok(())
        })
    }

    /// Rewrite branch of named setup.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if no setup has that name.
    /// - Return [`StoreError`] if store cannot be loaded or written.
    #[instrument(skip(self), level = "debug")]
    pub fn update_branch(&self, name: &str, branch: &str) -> Result<()> {
        self.edit(|setups| {
            let setup = setups
                .iter_mut()
                .find(|setup| setup.name == name)
                .ok_or_else(|| StoreError::NotFound { name: name.into() })?;
            setup.branch = Some(branch.into());
            Ok(())
        })
    }

    /// Edit the full set of records, then write them back.
    ///
    /// Nothing is written if the editor fails.
    fn edit<E>(&self, editor: E) -> Result<()>
    where
        E: FnOnce(&mut Vec<Setup>) -> Result<()>,
    {
        let mut setups = self.load()?;
        editor(&mut setups)?;
        self.save(&setups)
    }

    fn load(&self) -> Result<Vec<Setup>> {
        self.ensure_initialized()?;

        let content = read_to_string(&self.store_path).map_err(|err| StoreError::ReadStore {
            source: err,
            store_path: self.store_path.clone(),
        })?;

        match self.format {
            StoreFormat::Json => {
                // INVARIANT: Zero-length file is an empty store, not corruption.
                if content.trim().is_empty() {
                    return Ok(Vec::new());
                }

                let layout: JsonLayout =
                    serde_json::from_str(&content).map_err(|err| StoreError::Json {
                        source: err,
                        store_path: self.store_path.clone(),
                    })?;
                Ok(layout.setups)
            }
            StoreFormat::Delimited => {
                delimited::parse(&content).map_err(|err| StoreError::Delimited {
                    source: err,
                    store_path: self.store_path.clone(),
                })
            }
        }
    }

    fn save(&self, setups: &[Setup]) -> Result<()> {
        let content = match self.format {
            StoreFormat::Json => {
                let layout = JsonLayout {
                    setups: setups.to_vec(),
                };
                let mut content =
                    serde_json::to_string_pretty(&layout).map_err(|err| StoreError::Json {
                        source: err,
                        store_path: self.store_path.clone(),
                    })?;
                content.push('\n');
                content
            }
            StoreFormat::Delimited => {
                delimited::render(setups).map_err(|err| StoreError::Delimited {
                    source: err,
                    store_path: self.store_path.clone(),
                })?
            }
        };

        let write_err = |err: std::io::Error| StoreError::WriteStore {
            source: err,
            store_path: self.store_path.clone(),
        };

        // INVARIANT: Temporary file lives beside store so rename stays on one
        // file system.
        let mut temp = NamedTempFile::new_in(self.parent_dir()).map_err(write_err)?;
        temp.write_all(content.as_bytes()).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(&self.store_path)
            .map_err(|err| write_err(err.error))?;

        debug!("wrote {} setups to {:?}", setups.len(), self.store_path.display());

        Ok(())
    }

    fn parent_dir(&self) -> PathBuf {
        match self.store_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// All possible error types for setup store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No setup with given name exists.
    #[error("no setup named {name:?} in store")]
    NotFound { name: String },

    /// Store directory cannot be created.
    #[error("failed to create setup store at {:?}", store_path.display())]
    CreateStore {
        #[source]
        source: std::io::Error,
        store_path: PathBuf,
    },

    /// Store cannot be read from.
    #[error("failed to read setup store at {:?}", store_path.display())]
    ReadStore {
        #[source]
        source: std::io::Error,
        store_path: PathBuf,
    },

    /// Store cannot be written to.
    #[error("failed to write setup store at {:?}", store_path.display())]
    WriteStore {
        #[source]
        source: std::io::Error,
        store_path: PathBuf,
    },

    /// JSON store cannot be encoded or decoded.
    #[error("setup store at {:?} is not valid JSON", store_path.display())]
    Json {
        #[source]
        source: serde_json::Error,
        store_path: PathBuf,
    },

    /// Delimited store cannot be encoded or decoded.
    #[error("setup store at {:?} has invalid records", store_path.display())]
    Delimited {
        #[source]
        source: DelimitedError,
        store_path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
