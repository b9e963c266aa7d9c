// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shell alias integration.
//!
//! Typing `git --git-dir=... --work-tree=...` gets old quickly, so dotsetup
//! can write an alias for a setup into the user's shell rc file. Each alias
//! lives in its own marked block:
//!
//! ```text
//! # >>> dotsetup:laptop-MacOS >>>
//! alias dots='git --git-dir='\''/Users/blah/.dots.git'\'' --work-tree='\''/Users/blah'\'''
//! # <<< dotsetup:laptop-MacOS <<<
//! ```
//!
//! Blocks are replaced wholesale when a setup is initialized again, and
//! everything outside of them is left as is.

use crate::resolve::ResolvedSetup;

use std::{
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

const BLOCK_OPEN: &str = "# >>> dotsetup:";
const BLOCK_OPEN_END: &str = " >>>";
const BLOCK_CLOSE: &str = "# <<< dotsetup:";
const BLOCK_CLOSE_END: &str = " <<<";

/// Alias block found in shell rc file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasBlock {
    /// Setup the block belongs to.
    pub setup: String,

    /// Lines between the block markers.
    pub body: Vec<String>,
}

/// Manage alias blocks in a shell rc file.
#[derive(Debug, Clone)]
pub struct ShellRc {
    rc_path: PathBuf,
}

impl ShellRc {
    /// Construct new handle to shell rc file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            rc_path: path.into(),
        }
    }

    /// Path to shell rc file.
    pub fn path(&self) -> &Path {
        self.rc_path.as_path()
    }

    /// Write alias block for setup, replacing any existing one.
    ///
    /// # Errors
    ///
    /// - Return [`ShellError::InvalidAlias`] if alias is not a valid shell
    ///   word.
    /// - Return [`ShellError::ReadRc`] or [`ShellError::WriteRc`] if rc file
    ///   cannot be accessed.
    #[instrument(skip(self, setup), fields(setup = %setup.name), level = "debug")]
    pub fn install_alias(&self, setup: &ResolvedSetup, alias: &str, git: &str) -> Result<()> {
        if alias.is_empty()
            || !alias
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
        {
            return Err(ShellError::InvalidAlias {
                alias: alias.into(),
            });
        }

        let content = self.read()?;
        let mut lines = strip_block(&content, &setup.name);
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }

        let command = format!(
            "{} --git-dir={} --work-tree={}",
            git,
            quote(setup.repo.to_string_lossy().as_ref()),
            quote(setup.work_tree.to_string_lossy().as_ref()),
        );
        lines.push(format!("{BLOCK_OPEN}{}{BLOCK_OPEN_END}", setup.name));
        lines.push(format!("alias {alias}={}", quote(&command)));
        lines.push(format!("{BLOCK_CLOSE}{}{BLOCK_CLOSE_END}", setup.name));

        let mut out = lines.join("\n");
        out.push('\n');

        // INVARIANT: Write in place so a symlinked rc file stays a symlink.
        write(&self.rc_path, out).map_err(|err| ShellError::WriteRc {
            source: err,
            rc_path: self.rc_path.clone(),
        })?;
        info!("wrote alias {alias:?} to {:?}", self.rc_path.display());

        Ok(())
    }

    /// List all alias blocks in rc file.
    ///
    /// A missing rc file has no blocks.
    ///
    /// # Errors
    ///
    /// - Return [`ShellError::ReadRc`] if rc file cannot be read.
    pub fn list_aliases(&self) -> Result<Vec<AliasBlock>> {
        let content = self.read()?;
        let mut blocks = Vec::new();
        let mut current: Option<AliasBlock> = None;

        for line in content.lines() {
            if let Some(name) = marker_name(line, BLOCK_OPEN, BLOCK_OPEN_END) {
                current = Some(AliasBlock {
                    setup: name.into(),
                    body: Vec::new(),
                });
            } else if let Some(name) = marker_name(line, BLOCK_CLOSE, BLOCK_CLOSE_END) {
                if let Some(block) = current.take().filter(|block| block.setup == name) {
                    blocks.push(block);
                }
            } else if let Some(block) = current.as_mut() {
                block.body.push(line.into());
            }
        }

        Ok(blocks)
    }

    /// Command that reloads rc file in the user's shell.
    ///
    /// A child process cannot change its parent shell, so reloading is left
    /// to the user.
    pub fn reload_command(&self) -> String {
        format!("source {}", quote(self.rc_path.to_string_lossy().as_ref()))
    }

    fn read(&self) -> Result<String> {
        match read_to_string(&self.rc_path) {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(ShellError::ReadRc {
                source: err,
                rc_path: self.rc_path.clone(),
            }),
        }
    }
}

fn marker_name<'a>(line: &'a str, open: &str, close: &str) -> Option<&'a str> {
    line.trim()
        .strip_prefix(open)
        .and_then(|rest| rest.strip_suffix(close))
}

fn strip_block(content: &str, setup: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut inside = false;

    for line in content.lines() {
        if marker_name(line, BLOCK_OPEN, BLOCK_OPEN_END) == Some(setup) {
            inside = true;
            continue;
        }

        if inside {
            if marker_name(line, BLOCK_CLOSE, BLOCK_CLOSE_END) == Some(setup) {
                inside = false;
            }
            continue;
        }

        lines.push(line.to_string());
    }

    lines
}

/// Quote value as single shell word.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Shell integration error types.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// Alias name is not a plain shell word.
    #[error("invalid alias name {alias:?}, use letters, digits, '_', '-', or '.'")]
    InvalidAlias { alias: String },

    /// Shell rc file cannot be read from.
    #[error("failed to read shell rc file at {:?}", rc_path.display())]
    ReadRc {
        #[source]
        source: std::io::Error,
        rc_path: PathBuf,
    },

    /// Shell rc file cannot be written to.
    #[error("failed to write shell rc file at {:?}", rc_path.display())]
    WriteRc {
        #[source]
        source: std::io::Error,
        rc_path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ShellError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Os;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn laptop() -> ResolvedSetup {
        ResolvedSetup {
            name: "laptop".into(),
            os: Os::MacOS,
            repo: "/Users/blah/.dots.git".into(),
            work_tree: "/Users/blah".into(),
            branch: "laptop".into(),
        }
    }

    #[test]
    fn install_appends_block_after_existing_content() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let rc = ShellRc::new(root.path().join(".bashrc"));
        write(rc.path(), "export EDITOR=vim\n\n")?;

        rc.install_alias(&laptop(), "dots", "git")?;

        let result = read_to_string(rc.path())?;
        let expect = indoc! {r#"
            export EDITOR=vim

            # >>> dotsetup:laptop >>>
            alias dots='git --git-dir='\''/Users/blah/.dots.git'\'' --work-tree='\''/Users/blah'\'''
            # <<< dotsetup:laptop <<<
        "#};
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn install_replaces_existing_block() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let rc = ShellRc::new(root.path().join(".bashrc"));

        rc.install_alias(&laptop(), "dots", "git")?;
        rc.install_alias(&laptop(), "cfg", "/usr/bin/git")?;

        let blocks = rc.list_aliases()?;
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].setup, "laptop");
        assert!(blocks[0].body[0].starts_with("alias cfg='/usr/bin/git "));

        Ok(())
    }

    #[test]
    fn blocks_of_other_setups_survive() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let rc = ShellRc::new(root.path().join(".zshrc"));
        let mut desktop = laptop();
        desktop.name = "desktop".into();

        rc.install_alias(&laptop(), "dots", "git")?;
        rc.install_alias(&desktop, "desk", "git")?;
        rc.install_alias(&laptop(), "dots", "git")?;

        let setups = rc
            .list_aliases()?
            .into_iter()
            .map(|block| block.setup)
            .collect::<Vec<_>>();
        assert_eq!(setups, vec!["desktop".to_string(), "laptop".to_string()]);

        Ok(())
    }

    #[test]
    fn missing_rc_file_lists_nothing() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let rc = ShellRc::new(root.path().join("absent"));
        assert_eq!(rc.list_aliases()?, Vec::new());

        Ok(())
    }

    #[test]
    fn alias_with_shell_metacharacters_is_rejected() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let rc = ShellRc::new(root.path().join(".bashrc"));

        let result = rc.install_alias(&laptop(), "dots;rm", "git");
        assert!(matches!(result, Err(ShellError::InvalidAlias { .. })));
        assert!(!rc.path().exists());

        Ok(())
    }
}
