// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile management across named setups.
//!
//! A __setup__ ties a bare repository to the work tree whose files it tracks,
//! usually a home directory, plus the branch that holds one machine's flavor
//! of the dotfiles. Setups are kept in a [`store::SetupStore`], looked up
//! through a [`resolve::SetupResolver`], and driven through git by a
//! [`proxy::GitProxy`].

pub mod config;
pub mod path;
pub mod proxy;
pub mod resolve;
pub mod shell;
pub mod store;
