// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git command proxy.
//!
//! Every setup is a __bare-alias__ repository. Although bare repositories
//! lack a working tree by definition, Git allows the user to force one with
//! the "--work-tree" argument. This keeps the Git directory and the files it
//! tracks apart, so an entire home directory can be tracked without turning it
//! into a Git repository.
//!
//! The [`GitProxy`] runs git against one resolved setup, always passing
//! `--git-dir` and `--work-tree` for it. Plain verbs live here. Branch
//! handling lives in [`branch`], and merging setup branches into a shared
//! target lives in [`merge`].
//!
//! # Failure Policy
//!
//! Fetching is best effort. A remote may be unreachable or may simply lack
//! the requested ref, so fetch failures are logged as warnings and the
//! operation carries on. Failures to check out, commit, create branches, or
//! push are fatal.
//!
//! # See Also
//!
//! 1. [ArchWiki - dotfiles](https://wiki.archlinux.org/title/Dotfiles#Tracking_dotfiles_directly_with_Git)

pub mod branch;
pub mod merge;
pub mod syscall;

pub use branch::FetchTarget;
pub use syscall::{GitCall, Syscall, SyscallError};

use crate::resolve::ResolvedSetup;

use git2::{Repository, RepositoryInitOptions};
use std::{ffi::OsString, path::Path};
use tracing::{debug, info, instrument};

/// Refspec that mirrors remote branches into remote tracking refs.
const ORIGIN_FETCH_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";

/// Configured remote of a setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub url: String,
}

/// Run git against a resolved setup.
#[derive(Debug)]
pub struct GitProxy<C = Syscall>
where
    C: GitCall,
{
    setup: ResolvedSetup,
    caller: C,
}

impl<C> GitProxy<C>
where
    C: GitCall,
{
    /// Open proxy for resolved setup.
    ///
    /// The setup's bare repository must already exist.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::RepositoryMissing`] if no repository can be
    ///   opened at the setup's repository path.
    #[instrument(skip(setup, caller), fields(setup = %setup.name), level = "debug")]
    pub fn open(setup: ResolvedSetup, caller: C) -> Result<Self> {
        debug!("open bare repository {:?}", setup.repo.display());
        Repository::open_bare(&setup.repo).map_err(|err| ProxyError::RepositoryMissing {
            source: err,
            repo: setup.repo.display().to_string(),
        })?;

        Ok(Self::new(setup, caller))
    }

    /// Construct proxy without checking the repository exists.
    pub fn new(setup: ResolvedSetup, caller: C) -> Self {
        Self { setup, caller }
    }

    /// Setup this proxy operates on.
    pub fn setup(&self) -> &ResolvedSetup {
        &self.setup
    }

    /// Run git interactively against setup.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::GitCommand`] if git fails.
    pub fn gitcall_interactive(
        &self,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Result<()> {
        Ok(self.caller.call_interactive(&self.expand_bin_args(args))?)
    }

    /// Run git against setup with output captured.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::GitCommand`] if git fails.
    pub fn gitcall_non_interactive(
        &self,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Result<String> {
        Ok(self.caller.call_non_interactive(&self.expand_bin_args(args))?)
    }

    /// Show status of work tree.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::GitCommand`] if git fails.
    pub fn status(&self) -> Result<()> {
        self.gitcall_interactive(["status"])
    }

    /// Add remote to setup's repository.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::GitCommand`] if git fails, e.g., the remote
    ///   already exists.
    #[instrument(skip(self), level = "debug")]
    pub fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        self.gitcall_non_interactive(["remote", "add", name, url])?;
        info!("added remote {name:?} -> {url}");

        Ok(())
    }

    /// Remove remote from setup's repository.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::RemoteNotConfigured`] if remote does not exist.
    /// - Return [`ProxyError::GitCommand`] if git fails.
    #[instrument(skip(self), level = "debug")]
    pub fn remove_remote(&self, name: &str) -> Result<()> {
        self.require_remote(name)?;
        self.gitcall_non_interactive(["remote", "remove", name])?;
        info!("removed remote {name:?}");

        Ok(())
    }

    /// List configured remotes with their fetch URLs.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::GitCommand`] if git fails.
    pub fn list_remotes(&self) -> Result<Vec<RemoteEntry>> {
        let output = self.gitcall_non_interactive(["remote", "-v"])?;
        let mut remotes = Vec::new();

        for line in output.lines() {
            let mut parts = line.split_whitespace();
            let (Some(name), Some(url), Some("(fetch)")) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            remotes.push(RemoteEntry {
                name: name.into(),
                url: url.into(),
            });
        }

        Ok(remotes)
    }

    /// Fail unless named remote is configured.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::RemoteNotConfigured`] if remote does not exist.
    /// - Return [`ProxyError::GitCommand`] if git fails.
    pub fn require_remote(&self, name: &str) -> Result<()> {
        let output = self.gitcall_non_interactive(["remote"])?;
        if output.lines().any(|line| line.trim() == name) {
            return Ok(());
        }

        Err(ProxyError::RemoteNotConfigured {
            remote: name.into(),
            setup: self.setup.name.clone(),
        })
    }

    /// Check if repository has at least one commit reachable from HEAD.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::GitCommand`] if git cannot be run at all.
    pub fn has_commits(&self) -> Result<bool> {
        self.ref_exists("HEAD")
    }

    /// Check if reference exists locally.
    ///
    /// Git exiting unsuccessfully means the reference is absent.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::GitCommand`] if git cannot be run at all.
    pub fn ref_exists(&self, reference: &str) -> Result<bool> {
        match self.gitcall_non_interactive(["rev-parse", "--verify", "--quiet", reference]) {
            Ok(_) => Ok(true),
            Err(ProxyError::GitCommand(SyscallError::Failed { .. })) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Check if local branch exists.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::GitCommand`] if git cannot be run at all.
    pub fn local_branch_exists(&self, branch: &str) -> Result<bool> {
        self.ref_exists(&format!("refs/heads/{branch}"))
    }

    /// Run arbitrary git command against setup interactively.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::GitCommand`] if git fails.
    pub fn passthrough(&self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Result<()> {
        self.gitcall_interactive(args)
    }

    fn expand_bin_args(&self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Vec<OsString> {
        let mut bin_args: Vec<OsString> = vec![
            "--git-dir".into(),
            self.setup.repo.clone().into_os_string(),
            "--work-tree".into(),
            self.setup.work_tree.clone().into_os_string(),
        ];
        bin_args.extend(args.into_iter().map(Into::into));

        bin_args
    }
}

/// Initialize new bare repository for a setup.
///
/// The repository starts on branch "main" and hides untracked files from
/// status, since the work tree is usually a whole home directory.
///
/// # Errors
///
/// - Return [`ProxyError::Git2`] if the repository cannot be created, or one
///   already exists at target path.
#[instrument(skip(path), level = "debug")]
pub fn init_bare(path: impl AsRef<Path>) -> Result<()> {
    info!("initialize bare repository {:?}", path.as_ref().display());
    let mut opts = RepositoryInitOptions::new();
    opts.bare(true)
        .no_reinit(true)
        .mkpath(true)
        .initial_head("main");
    let repository = Repository::init_opts(path.as_ref(), &opts)?;

    let mut config = repository.config()?;
    config.set_str("status.showUntrackedFiles", "no")?;

    Ok(())
}

/// Clone remote as bare repository for a setup.
///
/// Bare clones do not track remote branches by default. The origin remote
/// gets a fetch refspec afterwards so fetching populates `origin/<branch>`.
///
/// # Errors
///
/// - Return [`ProxyError::GitCommand`] if git clone fails.
/// - Return [`ProxyError::Git2`] if cloned repository cannot be configured.
#[instrument(skip(caller, path), level = "debug")]
pub fn clone_bare<C>(caller: &C, url: &str, path: impl AsRef<Path>) -> Result<()>
where
    C: GitCall,
{
    info!("clone {url} into {:?}", path.as_ref().display());
    let args: Vec<OsString> = vec![
        "clone".into(),
        "--bare".into(),
        url.into(),
        path.as_ref().as_os_str().to_os_string(),
    ];
    caller.call_non_interactive(&args)?;

    let repository = Repository::open_bare(path.as_ref())?;
    let mut config = repository.config()?;
    config.set_str("remote.origin.fetch", ORIGIN_FETCH_REFSPEC)?;
    config.set_str("status.showUntrackedFiles", "no")?;

    Ok(())
}

/// Git command proxy error types.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Setup's bare repository cannot be opened.
    #[error("no bare repository at {repo:?}, run `dotsetup init` or `dotsetup clone` first")]
    RepositoryMissing {
        #[source]
        source: git2::Error,
        repo: String,
    },

    /// Operation needs a remote the setup does not have.
    #[error("remote {remote:?} is not configured for setup {setup:?}")]
    RemoteNotConfigured { remote: String, setup: String },

    /// Repository has no commits and git has no identity to create one.
    #[error(
        "repository has no commits and git identity is not configured, set user.name and \
         user.email with `git config --global`"
    )]
    MissingGitIdentity,

    /// Merge stopped on conflicts.
    #[error(
        "merging {source_ref} into {target} produced conflicts in:\n  {}\n\
         resolve them in the work tree, commit, then push {target}",
        .paths.join("\n  ")
    )]
    MergeConflict {
        source_ref: String,
        target: String,
        paths: Vec<String>,
    },

    /// Git invocation failed.
    #[error(transparent)]
    GitCommand(#[from] SyscallError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = ProxyError> = std::result::Result<T, E>;
