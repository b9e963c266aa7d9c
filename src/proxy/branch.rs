// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Setup branch handling.
//!
//! Each setup tracks its own branch, usually named after the setup itself,
//! e.g., "laptop-MacOS". A freshly cloned remote often only has "main", so
//! fetching falls back to "main" whenever the setup's branch is not on the
//! remote yet. Pushing the setup's branch once with
//! [`GitProxy::ensure_branch_pushed`] makes it available from then on.

use crate::proxy::{GitCall, GitProxy, ProxyError, Result, SyscallError};

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{info, instrument, warn};

/// Branch fetched when the setup's own branch is missing on the remote.
pub const FALLBACK_BRANCH: &str = "main";

/// Remote branch selected for fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    /// Remote name.
    pub remote: String,

    /// Branch on remote.
    pub branch: String,

    /// True if the setup's own branch was missing and the fallback was used.
    pub fell_back: bool,
}

impl FetchTarget {
    /// Remote tracking reference, e.g., "origin/main".
    pub fn reference(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }
}

impl Display for FetchTarget {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}/{}", self.remote, self.branch)
    }
}

impl<C> GitProxy<C>
where
    C: GitCall,
{
    /// Select and fetch remote branch for setup.
    ///
    /// Uses the setup's branch if the remote has it, otherwise falls back to
    /// "main" with a warning. A failed query or fetch is only a warning.
    ///
    /// # Errors
    ///
    /// Never fails on git errors. Kept fallible for symmetry with the other
    /// branch operations.
    #[instrument(skip(self), fields(setup = %self.setup.name), level = "debug")]
    pub fn remote_branch_for_fetch(&self, remote: &str) -> Result<FetchTarget> {
        let branch = self.setup.branch.as_str();
        let target = if self.remote_has_branch(remote, branch) {
            FetchTarget {
                remote: remote.into(),
                branch: branch.into(),
                fell_back: false,
            }
        } else {
            warn!(
                "branch {branch:?} not found on remote {remote:?}, falling back to \
                 {remote}/{FALLBACK_BRANCH}"
            );
            FetchTarget {
                remote: remote.into(),
                branch: FALLBACK_BRANCH.into(),
                fell_back: true,
            }
        };

        self.fetch_best_effort(remote, Some(&target.branch));

        Ok(target)
    }

    /// Make sure setup's branch exists locally and on the remote.
    ///
    /// An empty repository gets an empty initial commit on the setup's
    /// branch so there is something to push. The branch is pushed with
    /// upstream tracking.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::RemoteNotConfigured`] if remote does not exist.
    /// - Return [`ProxyError::MissingGitIdentity`] if an initial commit is
    ///   needed but user.name or user.email is unset.
    /// - Return [`ProxyError::GitCommand`] if checkout, commit, or push fails.
    #[instrument(skip(self), fields(setup = %self.setup.name), level = "debug")]
    pub fn ensure_branch_pushed(&self, remote: &str) -> Result<()> {
        self.require_remote(remote)?;
        let branch = self.setup.branch.as_str();

        if self.has_commits()? {
            self.checkout_or_create(branch, None)?;
        } else {
            self.require_identity()?;
            info!("repository is empty, creating initial commit on {branch:?}");
            self.point_unborn_head_at(branch)?;
            self.gitcall_non_interactive([
                "commit",
                "--allow-empty",
                "-m",
                format!("Initialize {branch}").as_str(),
            ])?;
        }

        self.gitcall_non_interactive(["push", "--set-upstream", remote, branch])?;
        info!("pushed {branch:?} to {remote:?} with upstream tracking");

        Ok(())
    }

    /// Bring setup's branch up to date with its remote.
    ///
    /// Fetches with the usual fallback, checks out the setup's branch
    /// (creating it from the fetched branch when absent), and merges the
    /// fetched branch in. Optionally pushes the result.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::RemoteNotConfigured`] if remote does not exist.
    /// - Return [`ProxyError::MergeConflict`] if merging stops on conflicts.
    /// - Return [`ProxyError::GitCommand`] if checkout or push fails.
    #[instrument(skip(self), fields(setup = %self.setup.name), level = "debug")]
    pub fn sync(&self, remote: &str, push: bool) -> Result<FetchTarget> {
        self.require_remote(remote)?;
        let branch = self.setup.branch.as_str();
        let target = self.remote_branch_for_fetch(remote)?;
        let reference = target.reference();
        let target_known = self.ref_exists(&format!("refs/remotes/{reference}"))?;

        if target_known {
            self.checkout_or_create(branch, Some(&reference))?;
            match self.gitcall_non_interactive([
                "merge",
                "--no-edit",
                "--allow-unrelated-histories",
                reference.as_str(),
            ]) {
                Ok(output) => info!("{output}"),
                Err(error) => {
                    let paths = self.conflicted_paths();
                    if !paths.is_empty() {
                        return Err(ProxyError::MergeConflict {
                            source_ref: reference,
                            target: branch.into(),
                            paths,
                        });
                    }
                    warn!("could not merge {reference} into {branch}: {error}");
                }
            }
        } else {
            warn!("{reference} is not available locally, skipping merge");
            if self.has_commits()? {
                self.checkout_or_create(branch, None)?;
            } else {
                self.point_unborn_head_at(branch)?;
            }
        }

        if push {
            self.gitcall_non_interactive(["push", "--set-upstream", remote, branch])?;
            info!("pushed {branch:?} to {remote:?}");
        }

        Ok(target)
    }

    /// Check out branch, creating it when it does not exist locally.
    ///
    /// New branches start at `start_point` if given, otherwise at HEAD, and
    /// never track the start point.
    pub(crate) fn checkout_or_create(&self, branch: &str, start_point: Option<&str>) -> Result<()> {
        if self.local_branch_exists(branch)? {
            self.gitcall_non_interactive(["checkout", branch])?;
            return Ok(());
        }

        info!("creating branch {branch:?}");
        let mut args = vec!["checkout", "--no-track", "-b", branch];
        if let Some(start_point) = start_point {
            args.push(start_point);
        }
        self.gitcall_non_interactive(args)?;

        Ok(())
    }

    /// Fetch from remote, downgrading failure to a warning.
    pub(crate) fn fetch_best_effort(&self, remote: &str, branch: Option<&str>) {
        let mut args = vec!["fetch", remote];
        if let Some(branch) = branch {
            args.push(branch);
        }

        if let Err(error) = self.gitcall_non_interactive(args) {
            warn!("fetch from {remote:?} failed, continuing with local state: {error}");
        }
    }

    /// Paths left unmerged by a stopped merge.
    pub(crate) fn conflicted_paths(&self) -> Vec<String> {
        self.gitcall_non_interactive(["diff", "--name-only", "--diff-filter=U"])
            .map(|output| {
                output
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn remote_has_branch(&self, remote: &str, branch: &str) -> bool {
        let head = format!("refs/heads/{branch}");
        match self.gitcall_non_interactive(["ls-remote", "--heads", remote, head.as_str()]) {
            Ok(output) => output
                .lines()
                .any(|line| line.split_whitespace().nth(1) == Some(head.as_str())),
            Err(error) => {
                warn!("cannot list branches of remote {remote:?}: {error}");
                false
            }
        }
    }

    fn point_unborn_head_at(&self, branch: &str) -> Result<()> {
        let head = format!("refs/heads/{branch}");
        self.gitcall_non_interactive(["symbolic-ref", "HEAD", head.as_str()])?;

        Ok(())
    }

    fn require_identity(&self) -> Result<()> {
        for key in ["user.name", "user.email"] {
            // INVARIANT: `config --get` exits unsuccessfully for unset keys.
            let value = match self.gitcall_non_interactive(["config", "--get", key]) {
                Ok(value) => value,
                Err(ProxyError::GitCommand(SyscallError::Failed { .. })) => String::new(),
                Err(error) => return Err(error),
            };
            if value.trim().is_empty() {
                return Err(ProxyError::MissingGitIdentity);
            }
        }

        Ok(())
    }
}
