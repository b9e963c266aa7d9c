// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

mod integration;

use anyhow::Result;
use git2::{Oid, Repository, RepositoryInitOptions, Signature};
use std::path::{Path, PathBuf};

/// Bare repository standing in for a remote.
pub(crate) struct RepoFixture {
    repo: Repository,
    path: PathBuf,
}

impl RepoFixture {
    pub(crate) fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        opts.bare(true);
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(Self {
            repo,
            path: path.as_ref().to_path_buf(),
        })
    }

    pub(crate) fn url(&self) -> String {
        self.path.display().to_string()
    }

    /// Commit file on top of branch, creating the branch if needed.
    pub(crate) fn commit_on(
        &self,
        branch: &str,
        filename: &str,
        contents: &str,
    ) -> Result<Oid> {
        let parent = match self.tip(branch)? {
            Some(oid) => Some(self.repo.find_commit(oid)?),
            None => None,
        };
        self.commit_with_parent(branch, filename, contents, parent)
    }

    /// Commit file as new root commit of branch, unrelated to any history.
    pub(crate) fn commit_orphan(&self, branch: &str, filename: &str, contents: &str) -> Result<Oid> {
        self.commit_with_parent(branch, filename, contents, None)
    }

    /// Create branch pointing at the tip of another.
    pub(crate) fn branch_from(&self, branch: &str, from: &str) -> Result<()> {
        let oid = self
            .tip(from)?
            .ok_or_else(|| anyhow::anyhow!("no branch {from:?}"))?;
        let commit = self.repo.find_commit(oid)?;
        self.repo.branch(branch, &commit, false)?;

        Ok(())
    }

    pub(crate) fn tip(&self, branch: &str) -> Result<Option<Oid>> {
        match self.repo.find_reference(&format!("refs/heads/{branch}")) {
            Ok(reference) => Ok(reference.target()),
            Err(err) if err.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn commit_with_parent(
        &self,
        branch: &str,
        filename: &str,
        contents: &str,
        parent: Option<git2::Commit<'_>>,
    ) -> Result<Oid> {
        // INVARIANT: Build on parent tree so earlier files stay tracked.
        let base = match parent.as_ref() {
            Some(commit) => Some(commit.tree()?),
            None => None,
        };
        let mut builder = self.repo.treebuilder(base.as_ref())?;
        let blob = self.repo.blob(contents.as_bytes())?;
        builder.insert(filename, blob, 0o100644)?;
        let tree = self.repo.find_tree(builder.write()?)?;

        let signature = Signature::now("John Doe", "john@doe.com")?;
        let parents = parent.iter().collect::<Vec<_>>();
        let oid = self.repo.commit(
            Some(&format!("refs/heads/{branch}")),
            &signature,
            &signature,
            format!("chore: add {filename:?}").as_str(),
            &tree,
            &parents,
        )?;

        Ok(oid)
    }
}
