// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Flat delimited setup records.
//!
//! One setup per line, fields separated by commas in the order given by
//! [`HEADER`]. An empty field means the value is unset. There is no quoting,
//! so a value holding a comma or a line break cannot be stored in this
//! format at all.

use crate::store::record::{Os, Setup};

use std::path::{Path, PathBuf};

/// Header line written at the top of every delimited store.
pub const HEADER: &str = "name,os,folder,repo,branch";

const DELIMITER: char = ',';
const FIELD_COUNT: usize = 5;

/// Parse delimited records.
///
/// Blank lines and the header line are skipped.
///
/// # Errors
///
/// - Return [`DelimitedError::FieldCount`] if a line does not have exactly
///   five fields.
/// - Return [`DelimitedError::EmptyName`] if a record has no name.
pub fn parse(content: &str) -> Result<Vec<Setup>> {
    let mut setups = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line == HEADER {
            continue;
        }

        let fields = line.split(DELIMITER).collect::<Vec<_>>();
        if fields.len() != FIELD_COUNT {
            return Err(DelimitedError::FieldCount {
                line: index + 1,
                found: fields.len(),
            });
        }

        if fields[0].is_empty() {
            return Err(DelimitedError::EmptyName { line: index + 1 });
        }

        setups.push(Setup {
            name: fields[0].into(),
            os: Os::from(fields[1]),
            folder: non_empty(fields[2]).map(PathBuf::from),
            repo: non_empty(fields[3]).map(PathBuf::from),
            branch: non_empty(fields[4]).map(ToString::to_string),
        });
    }

    Ok(setups)
}

/// Render setups as delimited records, header first.
///
/// # Errors
///
/// - Return [`DelimitedError::InvalidField`] if any value contains the
///   delimiter or a line break, or a path is not valid unicode.
pub fn render(setups: &[Setup]) -> Result<String> {
    let mut out = String::from(HEADER);
    out.push('\n');

    for setup in setups {
        let folder = path_field(setup, "folder", setup.folder.as_deref())?;
        let repo = path_field(setup, "repo", setup.repo.as_deref())?;
        let branch = setup.branch.clone().unwrap_or_default();

        let fields = [
            ("name", setup.name.clone()),
            ("os", setup.os.to_string()),
            ("folder", folder),
            ("repo", repo),
            ("branch", branch),
        ];

        for (field, value) in &fields {
            if value.contains([DELIMITER, '\n', '\r']) {
                return Err(DelimitedError::InvalidField {
                    name: setup.name.clone(),
                    field: *field,
                });
            }
        }

        let line = fields
            .iter()
            .map(|(_, value)| value.as_str())
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }

    Ok(out)
}

// INVARIANT: Paths are stored verbatim, so non-unicode paths are rejected.
fn path_field(setup: &Setup, field: &'static str, path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => path
            .to_str()
            .map(ToString::to_string)
            .ok_or_else(|| DelimitedError::InvalidField {
                name: setup.name.clone(),
                field,
            }),
        None => Ok(String::new()),
    }
}

fn non_empty(field: &str) -> Option<&str> {
    (!field.is_empty()).then_some(field)
}

/// Delimited record error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DelimitedError {
    /// Record line has wrong number of fields.
    #[error("line {line} has {found} fields, expected 5")]
    FieldCount { line: usize, found: usize },

    /// Record line has no setup name.
    #[error("line {line} has an empty setup name")]
    EmptyName { line: usize },

    /// Value cannot be stored verbatim in delimited format.
    #[error("field {field:?} of setup {name:?} cannot be stored as delimited text")]
    InvalidField { name: String, field: &'static str },
}

/// Friendly result alias :3
type Result<T, E = DelimitedError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_skips_header_and_blank_lines() -> anyhow::Result<()> {
        let content = indoc! {"
            name,os,folder,repo,branch

            laptop,macos,/Users/blah,/Users/blah/.dots.git,laptop
            desktop,Linux,/home/blah,/home/blah/.dots.git,
        "};

        let result = parse(content)?;
        let expect = vec![
            Setup::new("laptop")
                .with_os(Os::MacOS)
                .with_folder("/Users/blah")
                .with_repo("/Users/blah/.dots.git")
                .with_branch("laptop"),
            Setup::new("desktop")
                .with_os(Os::Linux)
                .with_folder("/home/blah")
                .with_repo("/home/blah/.dots.git"),
        ];
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        let content = indoc! {"
            name,os,folder,repo,branch
            laptop,MacOS,/Users/blah
        "};

        assert_eq!(
            parse(content),
            Err(DelimitedError::FieldCount { line: 2, found: 3 })
        );
    }

    #[test]
    fn render_writes_empty_fields_for_unset_values() -> anyhow::Result<()> {
        let result = render(&[Setup::new("work").with_os(Os::Windows)])?;
        let expect = indoc! {"
            name,os,folder,repo,branch
            work,Windows,,,
        "};
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn render_rejects_delimiter_in_value() {
        let result = render(&[Setup::new("work").with_folder("/home/a,b")]);
        assert_eq!(
            result,
            Err(DelimitedError::InvalidField {
                name: "work".into(),
                field: "folder",
            })
        );
    }

    #[cfg(unix)]
    #[test]
    fn render_rejects_non_unicode_path() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let repo = PathBuf::from(OsStr::from_bytes(b"/home/blah/\xffdots.git"));
        let result = render(&[Setup::new("work").with_repo(repo)]);
        assert_eq!(
            result,
            Err(DelimitedError::InvalidField {
                name: "work".into(),
                field: "repo",
            })
        );
    }
}
