// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Merge setup branches into a shared target.
//!
//! Setups diverge on their own branches. Changes worth sharing across every
//! machine get merged from a setup branch into a common target, "main" by
//! default, and the target is pushed. The setup branch on the remote is left
//! alone.
//!
//! The target is checked out by force. Local modifications in the work tree
//! are discarded on purpose, so the merge always starts from the target's
//! committed state. A merge that stops on conflicts is left as is for the
//! user to resolve by hand: nothing is aborted, retried, or pushed.

use crate::proxy::{GitCall, GitProxy, ProxyError, Result};

use tracing::{info, instrument, warn};

impl<C> GitProxy<C>
where
    C: GitCall,
{
    /// Merge remote source branch into target branch, then push target.
    ///
    /// `source` defaults to the setup's branch when absent or empty.
    ///
    /// # Errors
    ///
    /// - Return [`ProxyError::RemoteNotConfigured`] if remote does not exist.
    /// - Return [`ProxyError::MergeConflict`] if merging stops on conflicts.
    /// - Return [`ProxyError::GitCommand`] if checkout, merge, or push fails.
    #[instrument(skip(self), fields(setup = %self.setup.name), level = "debug")]
    pub fn merge_into_target(&self, source: Option<&str>, target: &str, remote: &str) -> Result<()> {
        let source = source
            .filter(|source| !source.is_empty())
            .unwrap_or(self.setup.branch.as_str());
        self.require_remote(remote)?;
        self.fetch_best_effort(remote, None);

        let target_ref = format!("{remote}/{target}");
        let target_known = self.ref_exists(&format!("refs/remotes/{target_ref}"))?;

        // INVARIANT: Force checkout discards local modifications.
        if self.local_branch_exists(target)? {
            self.gitcall_non_interactive(["checkout", "--force", target])?;
        } else if target_known {
            self.gitcall_non_interactive([
                "checkout",
                "--force",
                "--track",
                "-b",
                target,
                target_ref.as_str(),
            ])?;
        } else {
            self.gitcall_non_interactive(["checkout", "--force", "-b", target])?;
        }

        if target_known {
            if let Err(error) =
                self.gitcall_non_interactive(["merge", "--ff-only", target_ref.as_str()])
            {
                warn!("could not fast-forward {target} to {target_ref}: {error}");
            }
        }

        let source_ref = format!("{remote}/{source}");
        info!("merging {source_ref} into {target}");
        if let Err(error) = self.gitcall_non_interactive([
            "merge",
            "--no-edit",
            "--allow-unrelated-histories",
            source_ref.as_str(),
        ]) {
            let paths = self.conflicted_paths();
            if !paths.is_empty() {
                return Err(ProxyError::MergeConflict {
                    source_ref,
                    target: target.into(),
                    paths,
                });
            }

            return Err(error);
        }

        self.gitcall_non_interactive(["push", remote, target])?;
        info!("pushed {target:?} to {remote:?}, {source_ref} left untouched");

        Ok(())
    }
}
