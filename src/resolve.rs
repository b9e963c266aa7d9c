// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Setup resolution.
//!
//! Every command that touches a repository first needs to know which bare
//! repository, which work tree, and which branch it is working with. The
//! [`SetupResolver`] turns an optional setup name into a [`ResolvedSetup`]
//! with all three filled in, applying the same defaults for every command:
//!
//! - No name given means the first setup in the store.
//! - A setup without a bare repository path is unusable, and is reported as
//!   not found.
//! - A setup without a work tree is rejected.
//! - A setup without a branch uses its own name as the branch, and that
//!   default is written back to the store right away.
//!
//! The last rule makes resolution a mutating operation. Hence the name
//! [`SetupResolver::resolve_and_persist_default_branch`].

use crate::{
    path,
    store::{Os, Setup, SetupStore, StoreError},
};

use std::{env::VarError, path::PathBuf};
use tracing::{debug, info, instrument};

/// Setup with every field needed to drive Git.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSetup {
    /// Name of setup.
    pub name: String,

    /// Operating system tag.
    pub os: Os,

    /// Expanded path to bare repository.
    pub repo: PathBuf,

    /// Expanded path to work tree.
    pub work_tree: PathBuf,

    /// Branch tracking this setup.
    pub branch: String,
}

/// Resolve setup names against a setup store.
#[derive(Debug, Clone, Copy)]
pub struct SetupResolver<'store> {
    store: &'store SetupStore,
}

impl<'store> SetupResolver<'store> {
    /// Construct new resolver over target store.
    pub fn new(store: &'store SetupStore) -> Self {
        Self { store }
    }

    /// Resolve setup name, persisting a default branch when none is set.
    ///
    /// An absent or empty name selects the first setup in the store.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError::NoSetupsConfigured`] if no name was given and
    ///   the store is empty.
    /// - Return [`ResolveError::SetupNotFound`] if no setup has that name, or
    ///   the setup has no bare repository path.
    /// - Return [`ResolveError::MissingWorkTree`] if the setup has no work
    ///   tree.
    /// - Return [`ResolveError::ShellExpansion`] if path expansion fails.
    /// - Return [`ResolveError::Store`] if the store cannot be read or
    ///   written.
    #[instrument(skip(self), level = "debug")]
    pub fn resolve_and_persist_default_branch(&self, name: Option<&str>) -> Result<ResolvedSetup> {
        let setup = match name.filter(|name| !name.is_empty()) {
            Some(name) => self
                .store
                .find_setup(name)?
                .ok_or_else(|| ResolveError::SetupNotFound { name: name.into() })?,
            None => {
                let first = self
                    .store
                    .list_setups()?
                    .into_iter()
                    .next()
                    .ok_or(ResolveError::NoSetupsConfigured)?;
                debug!("no setup named, using first setup {:?}", first.name);
                first
            }
        };

        let repo = setup
            .repo()
            .ok_or_else(|| ResolveError::SetupNotFound {
                name: setup.name.clone(),
            })?;
        let repo = path::expand(repo)?;

        let work_tree = setup
            .folder()
            .ok_or_else(|| ResolveError::MissingWorkTree {
                name: setup.name.clone(),
            })?;
        let work_tree = path::expand(work_tree)?;

        let branch = match setup.branch() {
            Some(branch) => branch.to_string(),
            None => {
                info!("setup {:?} has no branch, defaulting to its name", setup.name);
                self.store.update_branch(&setup.name, &setup.name)?;
                setup.name.clone()
            }
        };

        Ok(ResolvedSetup {
            name: setup.name,
            os: setup.os,
            repo,
            work_tree,
            branch,
        })
    }

    /// Register new setup, enforcing unique names.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError::SetupExists`] if a setup with that name is
    ///   already registered.
    /// - Return [`ResolveError::Store`] if the store cannot be read or
    ///   written.
    #[instrument(skip(self, setup), fields(name = %setup.name), level = "debug")]
    pub fn register(&self, setup: Setup) -> Result<()> {
        self.ensure_unregistered(&setup.name)?;
        self.store.append_setup(setup)?;

        Ok(())
    }

    /// Fail if setup name is already taken.
    ///
    /// # Errors
    ///
    /// - Return [`ResolveError::SetupExists`] if a setup with that name is
    ///   already registered.
    /// - Return [`ResolveError::Store`] if the store cannot be read.
    pub fn ensure_unregistered(&self, name: &str) -> Result<()> {
        if self.store.find_setup(name)?.is_some() {
            return Err(ResolveError::SetupExists { name: name.into() });
        }

        Ok(())
    }
}

/// Setup resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Store is empty and no setup was named.
    #[error("no setups configured, run `dotsetup init` or `dotsetup clone` first")]
    NoSetupsConfigured,

    /// Named setup is absent, or has no bare repository.
    #[error("setup {name:?} not found or has no repository path")]
    SetupNotFound { name: String },

    /// Setup has no work tree configured.
    #[error("setup {name:?} has no work tree folder configured")]
    MissingWorkTree { name: String },

    /// Setup name already registered.
    #[error("setup {name:?} already exists")]
    SetupExists { name: String },

    /// Path of setup cannot be expanded.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<VarError>),

    /// Setup store interaction failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Friendly result alias :3
pub type Result<T, E = ResolveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use tempfile::TempDir;

    fn store_in(root: &TempDir) -> SetupStore {
        SetupStore::new(root.path().join("setups.json"))
    }

    #[test]
    fn empty_name_on_empty_store_fails() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let store = store_in(&root);

        let result = SetupResolver::new(&store).resolve_and_persist_default_branch(None);
        assert!(matches!(result, Err(ResolveError::NoSetupsConfigured)));

        let result = SetupResolver::new(&store).resolve_and_persist_default_branch(Some(""));
        assert!(matches!(result, Err(ResolveError::NoSetupsConfigured)));

        Ok(())
    }

    #[test]
    fn empty_name_selects_first_inserted_setup() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let store = store_in(&root);
        store.append_setup(
            Setup::new("first")
                .with_os(Os::Linux)
                .with_folder("/home/blah")
                .with_repo("/home/blah/first.git")
                .with_branch("main"),
        )?;
        store.append_setup(
            Setup::new("second")
                .with_folder("/home/blah")
                .with_repo("/home/blah/second.git")
                .with_branch("second"),
        )?;

        let result = SetupResolver::new(&store).resolve_and_persist_default_branch(None)?;
        let expect = ResolvedSetup {
            name: "first".into(),
            os: Os::Linux,
            repo: "/home/blah/first.git".into(),
            work_tree: "/home/blah".into(),
            branch: "main".into(),
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn unknown_name_fails() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let store = store_in(&root);
        store.append_setup(Setup::new("first").with_folder("/a").with_repo("/a.git"))?;

        let result = SetupResolver::new(&store).resolve_and_persist_default_branch(Some("other"));
        assert!(matches!(result, Err(ResolveError::SetupNotFound { name }) if name == "other"));

        Ok(())
    }

    #[test]
    fn setup_without_repo_counts_as_not_found() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let store = store_in(&root);
        store.append_setup(Setup::new("norepo").with_folder("/home/blah"))?;

        let result = SetupResolver::new(&store).resolve_and_persist_default_branch(Some("norepo"));
        assert!(matches!(result, Err(ResolveError::SetupNotFound { name }) if name == "norepo"));

        Ok(())
    }

    #[test]
    fn setup_without_folder_is_missing_work_tree() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let store = store_in(&root);
        store.append_setup(Setup::new("nofolder").with_repo("/a.git").with_folder(""))?;

        let result =
            SetupResolver::new(&store).resolve_and_persist_default_branch(Some("nofolder"));
        assert!(matches!(result, Err(ResolveError::MissingWorkTree { name }) if name == "nofolder"));

        Ok(())
    }

    #[test]
    fn missing_branch_defaults_to_name_and_persists() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let store = store_in(&root);
        store.append_setup(
            Setup::new("laptop-MacOS")
                .with_os(Os::MacOS)
                .with_folder("/Users/blah")
                .with_repo("/Users/blah/dots.git"),
        )?;

        let result =
            SetupResolver::new(&store).resolve_and_persist_default_branch(Some("laptop-MacOS"))?;
        assert_eq!(result.branch, "laptop-MacOS");

        let stored = store.find_setup("laptop-MacOS")?;
        assert_eq!(
            stored.and_then(|setup| setup.branch),
            Some("laptop-MacOS".to_string())
        );

        Ok(())
    }

    #[sealed_test(env = [("DOTS_HOME", "/home/blah")])]
    fn paths_are_shell_expanded() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let store = store_in(&root);
        store.append_setup(
            Setup::new("desk")
                .with_folder("$DOTS_HOME")
                .with_repo("${DOTS_HOME}/.local/share/dotsetup/desk.git")
                .with_branch("desk"),
        )?;

        let result = SetupResolver::new(&store).resolve_and_persist_default_branch(Some("desk"))?;
        assert_eq!(result.work_tree, PathBuf::from("/home/blah"));
        assert_eq!(
            result.repo,
            PathBuf::from("/home/blah/.local/share/dotsetup/desk.git")
        );

        Ok(())
    }

    #[test]
    fn register_rejects_duplicate_names() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let store = store_in(&root);
        let resolver = SetupResolver::new(&store);

        resolver.register(Setup::new("dup").with_folder("/a").with_repo("/a.git"))?;
        let result = resolver.register(Setup::new("dup").with_folder("/b").with_repo("/b.git"));
        assert!(matches!(result, Err(ResolveError::SetupExists { name }) if name == "dup"));
        assert_eq!(store.list_setups()?.len(), 1);

        Ok(())
    }
}
