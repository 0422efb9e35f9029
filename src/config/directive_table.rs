//! Directive table (spec.md §4.1 pass 2, §4.5).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{read_tag_value_lines, Error, ServerRoot};
use crate::wire::banner::Capability;

/// The closed built-in directive set (spec.md §4.5), each with its
/// capability bit (spec.md §6).
const BUILTIN: &[(&str, Capability)] = &[
    ("rwhois", Capability::Rwhois),
    ("class", Capability::Class),
    ("directive", Capability::Directive),
    ("display", Capability::Display),
    ("forward", Capability::Forward),
    ("holdconnect", Capability::HoldConnect),
    ("limit", Capability::Limit),
    ("notify", Capability::Notify),
    ("quit", Capability::Quit),
    ("register", Capability::Register),
    ("schema", Capability::Schema),
    ("security", Capability::Security),
    ("soa", Capability::Soa),
    ("status", Capability::Status),
    ("xfer", Capability::Xfer),
];

/// One built-in directive's enablement state.
#[derive(Debug, Clone)]
pub struct DirectiveEntry {
    pub name: String,
    pub capability: Capability,
    pub disabled: bool,
}

/// Enable/disable bitmap for the built-in directives, plus the set of
/// dynamically loaded `X-` extended directives, each bound to an external
/// program (spec.md §4.1: "extended directives are programs with a
/// two-character `X-` prefix and a required executable").
#[derive(Debug, Clone)]
pub struct DirectiveTable {
    entries: HashMap<String, DirectiveEntry>,
    extended: HashMap<String, PathBuf>,
}

impl DirectiveTable {
    /// A table with every built-in directive enabled and no extensions,
    /// used before the directive file has loaded and in tests.
    pub fn all_enabled() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(name, cap)| {
                (name.to_string(), DirectiveEntry { name: name.to_string(), capability: *cap, disabled: false })
            })
            .collect();
        DirectiveTable { entries, extended: HashMap::new() }
    }

    pub fn load(directive_path: &Path, extended_file: &str, root: &ServerRoot) -> Result<Self, Error> {
        let mut table = DirectiveTable::all_enabled();

        if directive_path.exists() {
            for (line_no, line) in read_tag_value_lines(directive_path)? {
                let Some(entry) = table.entries.get_mut(line.tag.as_str()) else {
                    tracing::warn!(directive = %line.tag, "unrecognised directive in directive table, ignoring");
                    continue;
                };
                entry.disabled = match line.value.to_ascii_lowercase().as_str() {
                    "off" | "disabled" => true,
                    "on" | "enabled" => false,
                    _ => {
                        return Err(Error::Parse {
                            path: directive_path.display().to_string(),
                            line: line_no,
                            message: format!("invalid enable state '{}'", line.value),
                        })
                    }
                };
            }
        }

        let extended_path = root.resolve(extended_file)?;
        if extended_path.exists() {
            for (line_no, line) in read_tag_value_lines(&extended_path)? {
                if !line.tag.starts_with("X-") {
                    return Err(Error::Parse {
                        path: extended_path.display().to_string(),
                        line: line_no,
                        message: format!("extended directive '{}' must carry the X- prefix", line.tag),
                    });
                }
                let program = root.resolve(&line.value)?;
                table.extended.insert(line.tag.clone(), program);
            }
        }

        Ok(table)
    }

    pub fn get(&self, name: &str) -> Option<&DirectiveEntry> {
        self.entries.get(name)
    }

    /// Every built-in directive entry, for the `-directive` introspection
    /// directive (spec.md §4.5).
    pub fn iter(&self) -> impl Iterator<Item = &DirectiveEntry> {
        self.entries.values()
    }

    pub fn extended_program(&self, name: &str) -> Option<&Path> {
        self.extended.get(name).map(PathBuf::as_path)
    }

    pub fn is_extended(&self, name: &str) -> bool {
        name.starts_with("X-")
    }

    /// The capability bitmap's enabled set, for the banner line.
    pub fn enabled_capabilities(&self) -> Vec<Capability> {
        self.entries
            .values()
            .filter(|entry| !entry.disabled)
            .map(|entry| entry.capability)
            .chain(self.extended.keys().map(|_| Capability::Extended))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_enabled_carries_every_builtin_directive() {
        let table = DirectiveTable::all_enabled();
        assert!(table.get("rwhois").is_some());
        assert!(table.get("schema").is_some());
        assert!(table.get("xfer").is_some());
        assert!(table.get("bogus").is_none());
    }

    #[test]
    fn disabled_directives_are_excluded_from_capabilities() {
        let mut table = DirectiveTable::all_enabled();
        table.entries.get_mut("xfer").unwrap().disabled = true;
        let caps = table.enabled_capabilities();
        assert!(!caps.contains(&Capability::Xfer));
        assert!(caps.contains(&Capability::Class));
    }
}
