// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotsetup::{
    config::Settings,
    path::home_dir,
    proxy::{clone_bare, init_bare, GitProxy, Syscall},
    resolve::{ResolvedSetup, SetupResolver},
    shell::ShellRc,
    store::{Os, Setup, SetupStore},
};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::{
    ffi::OsString,
    path::{self, Path, PathBuf},
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  dotsetup [options] <dotsetup-command>\n  dotsetup [options] <setup> <git-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Path to setup store, overriding configuration.
    #[arg(long, global = true, value_name = "path")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let context = Context::load(self.config.as_deref(), self.store)?;

        match self.command {
            Command::Init(opts) => run_init(&context, opts),
            Command::Clone(opts) => run_clone(&context, opts),
            Command::List => run_list(&context),
            Command::AddRemote(opts) => run_add_remote(&context, opts),
            Command::ListRemotes(opts) => run_list_remotes(&context, opts),
            Command::RemoveRemote(opts) => run_remove_remote(&context, opts),
            Command::BranchEnsure(opts) => run_branch_ensure(&context, opts),
            Command::Sync(opts) => run_sync(&context, opts),
            Command::Merge(opts) => run_merge(&context, opts),
            Command::Status(opts) => run_status(&context, opts),
            Command::BashInit(opts) => run_bash_init(&context, opts),
            Command::BashReload => run_bash_reload(&context),
            Command::BashList => run_bash_list(&context),
            Command::SetupShow(opts) => run_setup_show(&context, opts),
            Command::Git(opts) => run_git(&context, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Initialize new setup with an empty bare repository.
    #[command(override_usage = "dotsetup init [options] <setup_name>")]
    Init(InitOptions),

    /// Clone existing remote into new setup.
    #[command(override_usage = "dotsetup clone [options] <setup_name> <url>")]
    Clone(CloneOptions),

    /// List registered setups.
    #[command(override_usage = "dotsetup list")]
    List,

    /// Add remote to setup.
    #[command(override_usage = "dotsetup add-remote [options] <remote_name> <url>")]
    AddRemote(AddRemoteOptions),

    /// List remotes of setup.
    #[command(override_usage = "dotsetup list-remotes [setup_name]")]
    ListRemotes(SetupOptions),

    /// Remove remote from setup.
    #[command(override_usage = "dotsetup remove-remote [options] <remote_name>")]
    RemoveRemote(RemoveRemoteOptions),

    /// Make sure setup branch exists locally and on remote.
    #[command(
        alias = "ensure-remote-branch",
        override_usage = "dotsetup branch-ensure [options] [setup_name]"
    )]
    BranchEnsure(RemoteOptions),

    /// Fetch and merge remote changes into setup branch.
    #[command(override_usage = "dotsetup sync [options] [setup_name]")]
    Sync(SyncOptions),

    /// Merge setup branch into shared target branch and push it.
    #[command(override_usage = "dotsetup merge [options] [setup_name]")]
    Merge(MergeOptions),

    /// Show work tree status of setup.
    #[command(override_usage = "dotsetup status [setup_name]")]
    Status(SetupOptions),

    /// Write shell alias for setup into shell rc file.
    #[command(name = "bash:init", override_usage = "dotsetup bash:init [options] [setup_name]")]
    BashInit(BashInitOptions),

    /// Show command that reloads shell rc file.
    #[command(name = "bash:reload", override_usage = "dotsetup bash:reload")]
    BashReload,

    /// List shell aliases written by dotsetup.
    #[command(name = "bash:list", override_usage = "dotsetup bash:list")]
    BashList,

    /// Show fully resolved setup.
    #[command(name = "setup:show", override_usage = "dotsetup setup:show [setup_name]")]
    SetupShow(SetupOptions),

    /// Run Git binary directly on target setup.
    #[command(external_subcommand)]
    Git(Vec<OsString>),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Name of setup to register.
    #[arg(value_name = "setup_name")]
    pub setup_name: String,

    /// Work tree of setup, defaults to home directory.
    #[arg(short, long, value_name = "path")]
    pub folder: Option<PathBuf>,

    /// Operating system tag, defaults to current system.
    #[arg(short, long, value_name = "os")]
    pub os: Option<String>,

    /// Path to bare repository, defaults to data directory.
    #[arg(short, long, value_name = "path")]
    pub repo: Option<PathBuf>,

    /// Branch of setup, defaults to setup name.
    #[arg(short, long, value_name = "branch")]
    pub branch: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CloneOptions {
    /// Name of setup to register.
    #[arg(required = true, value_name = "setup_name")]
    pub setup_name: String,

    /// URL of remote to clone from.
    #[arg(required = true, value_name = "url")]
    pub url: String,

    /// Work tree of setup, defaults to home directory.
    #[arg(short, long, value_name = "path")]
    pub folder: Option<PathBuf>,

    /// Operating system tag, defaults to current system.
    #[arg(short, long, value_name = "os")]
    pub os: Option<String>,

    /// Path to bare repository, defaults to data directory.
    #[arg(short, long, value_name = "path")]
    pub repo: Option<PathBuf>,

    /// Branch of setup, defaults to setup name.
    #[arg(short, long, value_name = "branch")]
    pub branch: Option<String>,

    /// Check out tracked files into work tree after cloning.
    #[arg(short, long)]
    pub checkout: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SetupOptions {
    /// Name of setup, defaults to first registered setup.
    #[arg(value_name = "setup_name")]
    pub setup_name: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddRemoteOptions {
    /// Name of remote.
    #[arg(required = true, value_name = "remote_name")]
    pub remote_name: String,

    /// URL of remote.
    #[arg(required = true, value_name = "url")]
    pub url: String,

    /// Name of setup, defaults to first registered setup.
    #[arg(short, long, value_name = "setup_name")]
    pub setup: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoveRemoteOptions {
    /// Name of remote.
    #[arg(required = true, value_name = "remote_name")]
    pub remote_name: String,

    /// Name of setup, defaults to first registered setup.
    #[arg(short, long, value_name = "setup_name")]
    pub setup: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RemoteOptions {
    /// Name of setup, defaults to first registered setup.
    #[arg(value_name = "setup_name")]
    pub setup_name: Option<String>,

    /// Remote to use, defaults to configured remote.
    #[arg(long, value_name = "remote_name")]
    pub remote: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SyncOptions {
    /// Name of setup, defaults to first registered setup.
    #[arg(value_name = "setup_name")]
    pub setup_name: Option<String>,

    /// Remote to use, defaults to configured remote.
    #[arg(long, value_name = "remote_name")]
    pub remote: Option<String>,

    /// Push setup branch after merging.
    #[arg(short, long)]
    pub push: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MergeOptions {
    /// Name of setup, defaults to first registered setup.
    #[arg(value_name = "setup_name")]
    pub setup_name: Option<String>,

    /// Branch to merge from, defaults to setup branch.
    #[arg(short, long, value_name = "branch")]
    pub source: Option<String>,

    /// Branch to merge into, defaults to configured merge target.
    #[arg(short, long, value_name = "branch")]
    pub target: Option<String>,

    /// Remote to use, defaults to configured remote.
    #[arg(long, value_name = "remote_name")]
    pub remote: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BashInitOptions {
    /// Name of setup, defaults to first registered setup.
    #[arg(value_name = "setup_name")]
    pub setup_name: Option<String>,

    /// Name of alias, defaults to setup name.
    #[arg(short, long, value_name = "alias")]
    pub alias: Option<String>,
}

/// Everything a command needs, loaded once.
struct Context {
    settings: Settings,
    store: SetupStore,
}

impl Context {
    fn load(config: Option<&Path>, store: Option<PathBuf>) -> Result<Self> {
        let mut settings = Settings::load(config)?;
        if let Some(store) = store {
            settings.store = store;
        }
        let store = SetupStore::new(&settings.store);

        Ok(Self { settings, store })
    }

    fn caller(&self) -> Syscall {
        Syscall::new(&self.settings.git)
    }

    fn resolve(&self, setup_name: Option<&str>) -> Result<ResolvedSetup> {
        Ok(SetupResolver::new(&self.store).resolve_and_persist_default_branch(setup_name)?)
    }

    fn proxy(&self, setup_name: Option<&str>) -> Result<GitProxy> {
        Ok(GitProxy::open(self.resolve(setup_name)?, self.caller())?)
    }

    fn remote<'a>(&'a self, remote: Option<&'a str>) -> &'a str {
        remote.unwrap_or(self.settings.remote.as_str())
    }

    fn new_setup(
        &self,
        name: &str,
        folder: Option<PathBuf>,
        os: Option<&str>,
        repo: Option<PathBuf>,
        branch: Option<String>,
    ) -> Result<Setup> {
        let folder = match folder {
            Some(folder) => path::absolute(folder)?,
            None => home_dir()?,
        };
        let repo = match repo {
            Some(repo) => path::absolute(repo)?,
            None => self.settings.repo_dir.join(format!("{name}.git")),
        };
        let os = os.map(Os::from).unwrap_or_else(Os::current);

        let mut setup = Setup::new(name)
            .with_os(os)
            .with_folder(folder)
            .with_repo(repo);
        if let Some(branch) = branch {
            setup = setup.with_branch(branch);
        }

        Ok(setup)
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:#}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_init(context: &Context, opts: InitOptions) -> Result<()> {
    let resolver = SetupResolver::new(&context.store);
    resolver.ensure_unregistered(&opts.setup_name)?;

    let setup = context.new_setup(
        &opts.setup_name,
        opts.folder,
        opts.os.as_deref(),
        opts.repo,
        opts.branch,
    )?;
    let repo = setup
        .repo()
        .ok_or_else(|| anyhow!("setup {:?} has no repository path", setup.name))?;
    init_bare(repo)?;
    resolver.register(setup)?;
    info!("initialized setup {:?}", opts.setup_name);

    Ok(())
}

fn run_clone(context: &Context, opts: CloneOptions) -> Result<()> {
    let resolver = SetupResolver::new(&context.store);
    resolver.ensure_unregistered(&opts.setup_name)?;

    let setup = context.new_setup(
        &opts.setup_name,
        opts.folder,
        opts.os.as_deref(),
        opts.repo,
        opts.branch,
    )?;
    let repo = setup
        .repo()
        .ok_or_else(|| anyhow!("setup {:?} has no repository path", setup.name))?;
    clone_bare(&context.caller(), &opts.url, repo)?;
    resolver.register(setup)?;
    info!("cloned {} into setup {:?}", opts.url, opts.setup_name);

    if opts.checkout {
        let proxy = context.proxy(Some(&opts.setup_name))?;
        let output = proxy.gitcall_non_interactive(["checkout"])?;
        if !output.is_empty() {
            info!("{output}");
        }
    }

    Ok(())
}

fn run_list(context: &Context) -> Result<()> {
    let setups = context.store.list_setups()?;
    if setups.is_empty() {
        info!("no setups configured");
        return Ok(());
    }

    for setup in setups {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            setup.name,
            setup.os,
            setup.folder().map(|path| path.display().to_string()).unwrap_or_default(),
            setup.repo().map(|path| path.display().to_string()).unwrap_or_default(),
            setup.branch().unwrap_or_default(),
        );
    }

    Ok(())
}

fn run_add_remote(context: &Context, opts: AddRemoteOptions) -> Result<()> {
    let proxy = context.proxy(opts.setup.as_deref())?;
    proxy.add_remote(&opts.remote_name, &opts.url)?;

    Ok(())
}

fn run_list_remotes(context: &Context, opts: SetupOptions) -> Result<()> {
    let proxy = context.proxy(opts.setup_name.as_deref())?;
    for remote in proxy.list_remotes()? {
        println!("{}\t{}", remote.name, remote.url);
    }

    Ok(())
}

fn run_remove_remote(context: &Context, opts: RemoveRemoteOptions) -> Result<()> {
    let proxy = context.proxy(opts.setup.as_deref())?;
    proxy.remove_remote(&opts.remote_name)?;

    Ok(())
}

fn run_branch_ensure(context: &Context, opts: RemoteOptions) -> Result<()> {
    let proxy = context.proxy(opts.setup_name.as_deref())?;
    proxy.ensure_branch_pushed(context.remote(opts.remote.as_deref()))?;

    Ok(())
}

fn run_sync(context: &Context, opts: SyncOptions) -> Result<()> {
    let proxy = context.proxy(opts.setup_name.as_deref())?;
    let target = proxy.sync(context.remote(opts.remote.as_deref()), opts.push)?;
    info!("setup {:?} synced with {target}", proxy.setup().name);

    Ok(())
}

fn run_merge(context: &Context, opts: MergeOptions) -> Result<()> {
    let proxy = context.proxy(opts.setup_name.as_deref())?;
    let target = opts
        .target
        .as_deref()
        .unwrap_or(context.settings.merge_target.as_str());
    proxy.merge_into_target(
        opts.source.as_deref(),
        target,
        context.remote(opts.remote.as_deref()),
    )?;

    Ok(())
}

fn run_status(context: &Context, opts: SetupOptions) -> Result<()> {
    let proxy = context.proxy(opts.setup_name.as_deref())?;
    proxy.status()?;

    Ok(())
}

fn run_bash_init(context: &Context, opts: BashInitOptions) -> Result<()> {
    let setup = context.resolve(opts.setup_name.as_deref())?;
    let alias = opts.alias.unwrap_or_else(|| setup.name.clone());
    let rc = ShellRc::new(&context.settings.shell_rc);
    rc.install_alias(&setup, &alias, &context.settings.git)?;
    println!("{}", rc.reload_command());

    Ok(())
}

fn run_bash_reload(context: &Context) -> Result<()> {
    let rc = ShellRc::new(&context.settings.shell_rc);
    println!("{}", rc.reload_command());

    Ok(())
}

fn run_bash_list(context: &Context) -> Result<()> {
    let rc = ShellRc::new(&context.settings.shell_rc);
    for block in rc.list_aliases()? {
        println!("{}\t{}", block.setup, block.body.join(" "));
    }

    Ok(())
}

fn run_setup_show(context: &Context, opts: SetupOptions) -> Result<()> {
    let setup = context.resolve(opts.setup_name.as_deref())?;
    println!("name:      {}", setup.name);
    println!("os:        {}", setup.os);
    println!("repo:      {}", setup.repo.display());
    println!("work tree: {}", setup.work_tree.display());
    println!("branch:    {}", setup.branch);

    Ok(())
}

fn run_git(context: &Context, opts: Vec<OsString>) -> Result<()> {
    let Some((target, args)) = opts.split_first() else {
        return Err(anyhow!("no setup named for git command"));
    };
    let proxy = context.proxy(Some(target.to_string_lossy().as_ref()))?;
    proxy.passthrough(args.to_vec())?;

    Ok(())
}
