//! Configuration and schema loader (spec.md §4.1).
//!
//! Loading proceeds in the four passes spec.md describes: main config,
//! directive table, authority-area list (with each area's SOA/schema/
//! attribute-defs files), then the punt and allow/deny files. `reload`
//! re-runs the same four passes and swaps in the result, matching the
//! SIGHUP idempotent-reload requirement.

mod acl;
mod area_list;
mod directive_table;
mod main_config;
mod root;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

pub use acl::{Acl, AclRule, HostAcl};
pub use area_list::load_area_list;
pub use directive_table::{DirectiveEntry, DirectiveTable};
pub use main_config::MainConfig;
pub use root::ServerRoot;

use crate::model::AuthorityArea;

#[derive(Debug)]
pub enum Error {
    Io { path: String, source: std::io::Error },
    Parse { path: String, line: usize, message: String },
    PathEscapesRoot { path: String },
    Model(crate::model::ModelError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io { path, source } => write!(f, "{path}: {source}"),
            Error::Parse { path, line, message } => {
                write!(f, "{path}:{line}: {message}")
            }
            Error::PathEscapesRoot { path } => {
                write!(f, "path '{path}' resolves outside the server root")
            }
            Error::Model(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Model(e) => Some(e),
            _ => None,
        }
    }
}

impl From<crate::model::ModelError> for Error {
    fn from(e: crate::model::ModelError) -> Self {
        Error::Model(e)
    }
}

/// A `tag: value` line from one of the on-disk config formats, and the
/// record separators (`---...`, `_NEW_`) that delimit repeated blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub tag: String,
    pub value: String,
}

/// Whether a raw source line is a tag/value pair, a record separator, a
/// comment, or blank.
pub enum ParsedLine {
    TagValue(Line),
    Separator,
    Blank,
}

/// Parses one line of any of the `tag: value` on-disk formats (spec.md
/// §6): `#` starts a comment, a bare `---` or `_NEW_` line is a record
/// separator, everything else must be `tag: value`.
pub fn parse_line(raw: &str) -> Option<ParsedLine> {
    let trimmed = raw.trim_end_matches(['\r', '\n']);
    let trimmed = trimmed.trim();
    if trimmed.is_empty() {
        return Some(ParsedLine::Blank);
    }
    if trimmed.starts_with('#') {
        return Some(ParsedLine::Blank);
    }
    if trimmed.starts_with("---") || trimmed == "_NEW_" {
        return Some(ParsedLine::Separator);
    }
    let (tag, value) = trimmed.split_once(':')?;
    Some(ParsedLine::TagValue(Line { tag: tag.trim().to_string(), value: value.trim().to_string() }))
}

/// Reads `path` and yields its tag/value lines, skipping blanks/comments,
/// tracking 1-based line numbers for error reporting.
pub fn read_tag_value_lines(path: &Path) -> Result<Vec<(usize, Line)>, Error> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| Error::Io { path: path.display().to_string(), source })?;
    let mut lines = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        if let Some(ParsedLine::TagValue(line)) = parse_line(raw) {
            lines.push((idx + 1, line));
        }
    }
    Ok(lines)
}

/// The fully loaded, immutable configuration snapshot a session borrows
/// (spec.md §4.1; the accept loop hands an `Arc<Config>` to each session
/// per the DESIGN NOTES redesign guidance).
#[derive(Debug, Clone)]
pub struct Config {
    pub main: MainConfig,
    pub directives: DirectiveTable,
    pub areas: HashMap<String, AuthorityArea>,
    pub punt_referrals: Vec<String>,
    pub acl: Acl,
}

impl Config {
    /// Runs the four load passes rooted at `config_path`.
    pub fn load(config_path: &Path) -> Result<Config, Error> {
        let main = MainConfig::load(config_path)?;
        let root = ServerRoot::new(main.root_dir.clone(), main.chroot);

        let directive_path = root.resolve(&main.directive_file)?;
        let directives = DirectiveTable::load(&directive_path, &main.extended_directive_file, &root)?;

        let area_list_path = root.resolve(&main.auth_area_list_file)?;
        let areas = area_list::load_area_list(&area_list_path, &root)?;

        let punt_path = root.resolve(&main.punt_file)?;
        let punt_referrals = load_punt_file(&punt_path)?;

        let allow_path = root.resolve(&main.allow_file)?;
        let deny_path = root.resolve(&main.deny_file)?;
        let acl = Acl::load(&allow_path, &deny_path)?;

        Ok(Config { main, directives, areas, punt_referrals, acl })
    }

    /// Re-executes every load pass and replaces `self` in place (spec.md
    /// §4.1's SIGHUP requirement: idempotent, does not disturb in-flight
    /// sessions because each session already holds its own `Arc<Config>`
    /// snapshot from before the reload).
    pub fn reload(&mut self, config_path: &Path) -> Result<(), Error> {
        *self = Config::load(config_path)?;
        Ok(())
    }
}

fn load_punt_file(path: &Path) -> Result<Vec<String>, Error> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|source| Error::Io { path: path.display().to_string(), source })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tag_value_line() {
        match parse_line("root-dir: /srv/rwhois").unwrap() {
            ParsedLine::TagValue(line) => {
                assert_eq!(line.tag, "root-dir");
                assert_eq!(line.value, "/srv/rwhois");
            }
            _ => panic!("expected a tag/value line"),
        }
    }

    #[test]
    fn comments_and_blanks_are_ignored() {
        assert!(matches!(parse_line("# a comment").unwrap(), ParsedLine::Blank));
        assert!(matches!(parse_line("").unwrap(), ParsedLine::Blank));
    }

    #[test]
    fn recognises_record_separators() {
        assert!(matches!(parse_line("---").unwrap(), ParsedLine::Separator));
        assert!(matches!(parse_line("_NEW_").unwrap(), ParsedLine::Separator));
    }
}
