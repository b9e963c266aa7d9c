// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::RepoFixture;

use anyhow::Result;
use dotsetup::{
    proxy::{clone_bare, init_bare, GitProxy, ProxyError, Syscall},
    resolve::{ResolvedSetup, SetupResolver},
    store::{Os, Setup, SetupStore},
};
use git2::Repository;
use pretty_assertions::assert_eq;
use std::{
    fs::{create_dir_all, read_to_string},
    path::Path,
};
use tempfile::TempDir;

fn with_identity(repo: impl AsRef<Path>) -> Result<()> {
    let repository = Repository::open_bare(repo.as_ref())?;
    let mut config = repository.config()?;
    config.set_str("user.name", "John Doe")?;
    config.set_str("user.email", "john@doe.com")?;

    Ok(())
}

fn cloned_setup(root: &TempDir, origin: &RepoFixture, branch: &str) -> Result<GitProxy> {
    let repo = root.path().join("setup.git");
    let work_tree = root.path().join("home");
    create_dir_all(&work_tree)?;
    clone_bare(&Syscall::default(), &origin.url(), &repo)?;
    with_identity(&repo)?;

    let setup = ResolvedSetup {
        name: "laptop".into(),
        os: Os::Linux,
        repo,
        work_tree,
        branch: branch.into(),
    };

    Ok(GitProxy::open(setup, Syscall::default())?)
}

#[test]
fn clone_bare_tracks_remote_branches() -> Result<()> {
    let root = TempDir::new()?;
    let origin = RepoFixture::new(root.path().join("origin.git"))?;
    origin.commit_on("main", ".bashrc", "alias ls='ls --color'\n")?;

    let repo = root.path().join("setup.git");
    clone_bare(&Syscall::default(), &origin.url(), &repo)?;

    let repository = Repository::open_bare(&repo)?;
    let config = repository.config()?;
    assert_eq!(
        config.get_string("remote.origin.fetch")?,
        "+refs/heads/*:refs/remotes/origin/*"
    );
    assert_eq!(config.get_string("status.showUntrackedFiles")?, "no");

    Ok(())
}

#[test]
fn fetch_prefers_setup_branch_then_falls_back_to_main() -> Result<()> {
    let root = TempDir::new()?;
    let origin = RepoFixture::new(root.path().join("origin.git"))?;
    origin.commit_on("main", ".bashrc", "export EDITOR=vim\n")?;
    origin.branch_from("laptop-setup", "main")?;
    let laptop = origin.commit_on("laptop-setup", ".vimrc", "set number\n")?;

    let proxy = cloned_setup(&root, &origin, "laptop-setup")?;
    let target = proxy.remote_branch_for_fetch("origin")?;
    assert_eq!(target.reference(), "origin/laptop-setup");
    assert!(!target.fell_back);
    let fetched = Repository::open_bare(&proxy.setup().repo)?
        .find_reference("refs/remotes/origin/laptop-setup")?
        .target();
    assert_eq!(fetched, Some(laptop));

    let other = TempDir::new()?;
    let proxy = cloned_setup(&other, &origin, "desktop-setup")?;
    let target = proxy.remote_branch_for_fetch("origin")?;
    assert_eq!(target.reference(), "origin/main");
    assert!(target.fell_back);

    Ok(())
}

#[test]
fn ensure_branch_pushed_seeds_empty_repository() -> Result<()> {
    let root = TempDir::new()?;
    let origin = root.path().join("origin.git");
    init_bare(&origin)?;

    let repo = root.path().join("setup.git");
    let work_tree = root.path().join("home");
    create_dir_all(&work_tree)?;
    init_bare(&repo)?;
    with_identity(&repo)?;

    let setup = ResolvedSetup {
        name: "laptop".into(),
        os: Os::Linux,
        repo: repo.clone(),
        work_tree,
        branch: "laptop-setup".into(),
    };
    let proxy = GitProxy::open(setup, Syscall::default())?;
    proxy.add_remote("origin", origin.display().to_string().as_str())?;
    proxy.ensure_branch_pushed("origin")?;

    let remote = Repository::open_bare(&origin)?;
    let tip = remote
        .find_reference("refs/heads/laptop-setup")?
        .peel_to_commit()?;
    assert_eq!(tip.parent_count(), 0);

    let local = Repository::open_bare(&repo)?;
    let config = local.config()?;
    assert_eq!(config.get_string("branch.laptop-setup.remote")?, "origin");

    Ok(())
}

#[test]
fn sync_publishes_setup_branch_from_main() -> Result<()> {
    let root = TempDir::new()?;
    let origin = RepoFixture::new(root.path().join("origin.git"))?;
    let main = origin.commit_on("main", ".bashrc", "export EDITOR=vim\n")?;

    let proxy = cloned_setup(&root, &origin, "desktop-setup")?;
    let target = proxy.sync("origin", true)?;
    assert_eq!(target.reference(), "origin/main");
    assert!(target.fell_back);

    assert_eq!(origin.tip("desktop-setup")?, Some(main));
    assert_eq!(origin.tip("main")?, Some(main));
    let config = Repository::open_bare(&proxy.setup().repo)?.config()?;
    assert_eq!(config.get_string("branch.desktop-setup.remote")?, "origin");

    Ok(())
}

#[test]
fn merge_into_target_pushes_target_and_leaves_source() -> Result<()> {
    let root = TempDir::new()?;
    let origin = RepoFixture::new(root.path().join("origin.git"))?;
    origin.commit_on("main", ".bashrc", "export EDITOR=vim\n")?;
    origin.branch_from("laptop-setup", "main")?;
    let laptop = origin.commit_on("laptop-setup", ".vimrc", "set number\n")?;

    let proxy = cloned_setup(&root, &origin, "laptop-setup")?;
    proxy.merge_into_target(None, "main", "origin")?;

    assert_eq!(origin.tip("main")?, Some(laptop));
    assert_eq!(origin.tip("laptop-setup")?, Some(laptop));
    let vimrc = read_to_string(proxy.setup().work_tree.join(".vimrc"))?;
    assert_eq!(vimrc, "set number\n");

    Ok(())
}

#[test]
fn merge_into_target_stops_on_conflict() -> Result<()> {
    let root = TempDir::new()?;
    let origin = RepoFixture::new(root.path().join("origin.git"))?;
    let main = origin.commit_on("main", ".bashrc", "export EDITOR=vim\n")?;
    origin.commit_orphan("laptop-setup", ".bashrc", "export EDITOR=nano\n")?;

    let proxy = cloned_setup(&root, &origin, "laptop-setup")?;
    let result = proxy.merge_into_target(None, "main", "origin");
    match result {
        Err(ProxyError::MergeConflict {
            source_ref,
            target,
            paths,
        }) => {
            assert_eq!(source_ref, "origin/laptop-setup");
            assert_eq!(target, "main");
            assert_eq!(paths, vec![".bashrc".to_string()]);
        }
        other => panic!("expected merge conflict, got {other:?}"),
    }

    assert_eq!(origin.tip("main")?, Some(main));
    let head = Repository::open_bare(&proxy.setup().repo)?
        .find_reference("HEAD")?
        .symbolic_target()
        .map(ToString::to_string);
    assert_eq!(head.as_deref(), Some("refs/heads/main"));
    let bashrc = read_to_string(proxy.setup().work_tree.join(".bashrc"))?;
    assert!(bashrc.contains("<<<<<<<"));

    Ok(())
}

#[test]
fn registered_setup_resolves_against_initialized_repository() -> Result<()> {
    let root = TempDir::new()?;
    let store = SetupStore::new(root.path().join("setups.json"));
    let repo = root.path().join("repos").join("laptop.git");
    let work_tree = root.path().join("home");
    create_dir_all(&work_tree)?;
    init_bare(&repo)?;

    let resolver = SetupResolver::new(&store);
    resolver.register(
        Setup::new("laptop")
            .with_os(Os::Linux)
            .with_folder(&work_tree)
            .with_repo(&repo),
    )?;

    let resolved = resolver.resolve_and_persist_default_branch(None)?;
    assert_eq!(resolved.branch, "laptop");
    assert_eq!(
        store.find_setup("laptop")?.and_then(|setup| setup.branch().map(String::from)),
        Some("laptop".to_string())
    );

    let proxy = GitProxy::open(resolved, Syscall::default())?;
    assert!(!proxy.has_commits()?);

    Ok(())
}
