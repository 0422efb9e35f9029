//! TCP-wrappers-style `hosts.allow`/`hosts.deny` parsing (spec.md §6, SPEC_FULL §2).
//!
//! spec.md treats the matching engine against live PTR/host data as an
//! external collaborator; this module still parses and stores the rule
//! tables, and exposes a [`HostAcl`] trait the listener calls, with a
//! permissive default so a server with no ACL files configured behaves as
//! it always did before this feature existed.

use std::path::Path;

use super::Error;

/// One `daemon_list : client_list` line.
#[derive(Debug, Clone)]
pub struct AclRule {
    pub daemons: Vec<String>,
    pub clients: Vec<String>,
}

impl AclRule {
    fn matches(&self, daemon: &str, client: &str) -> bool {
        list_matches(&self.daemons, daemon) && list_matches(&self.clients, client)
    }
}

fn list_matches(list: &[String], candidate: &str) -> bool {
    list.iter().any(|entry| entry == "ALL" || entry.eq_ignore_ascii_case(candidate))
}

/// Parsed `hosts.allow`/`hosts.deny` rule tables.
#[derive(Debug, Clone, Default)]
pub struct Acl {
    allow: Vec<AclRule>,
    deny: Vec<AclRule>,
}

impl Acl {
    pub fn load(allow_path: &Path, deny_path: &Path) -> Result<Acl, Error> {
        Ok(Acl { allow: parse_file(allow_path)?, deny: parse_file(deny_path)? })
    }
}

fn parse_file(path: &Path) -> Result<Vec<AclRule>, Error> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|source| Error::Io { path: path.display().to_string(), source })?;
    let mut rules = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((daemons, rest)) = line.split_once(':') else { continue };
        let clients = rest.split_once(':').map(|(c, _)| c).unwrap_or(rest);
        rules.push(AclRule {
            daemons: split_list(daemons),
            clients: split_list(clients),
        });
    }
    Ok(rules)
}

fn split_list(s: &str) -> Vec<String> {
    s.split([',', ' ', '\t'])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// The ACL decision point the listener consults before serving a client.
pub trait HostAcl {
    fn is_allowed(&self, daemon: &str, client_host: &str) -> bool;
}

impl HostAcl for Acl {
    /// `hosts.allow` is checked first: a match there always allows. Then
    /// `hosts.deny`: a match there denies. With no match in either table
    /// the connection is allowed, matching the library default when no ACL
    /// files are configured.
    fn is_allowed(&self, daemon: &str, client_host: &str) -> bool {
        if self.allow.iter().any(|rule| rule.matches(daemon, client_host)) {
            return true;
        }
        if self.deny.iter().any(|rule| rule.matches(daemon, client_host)) {
            return false;
        }
        true
    }
}

/// A permissive stand-in for deployments with no ACL configured.
pub struct AllowAll;

impl HostAcl for AllowAll {
    fn is_allowed(&self, _daemon: &str, _client_host: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_rule_blocks_unlisted_allow() {
        let acl = Acl {
            allow: vec![],
            deny: vec![AclRule { daemons: vec!["ALL".into()], clients: vec!["10.0.0.1".into()] }],
        };
        assert!(!acl.is_allowed("rwhoisd", "10.0.0.1"));
        assert!(acl.is_allowed("rwhoisd", "10.0.0.2"));
    }

    #[test]
    fn allow_rule_overrides_deny() {
        let acl = Acl {
            allow: vec![AclRule { daemons: vec!["ALL".into()], clients: vec!["10.0.0.1".into()] }],
            deny: vec![AclRule { daemons: vec!["ALL".into()], clients: vec!["ALL".into()] }],
        };
        assert!(acl.is_allowed("rwhoisd", "10.0.0.1"));
        assert!(!acl.is_allowed("rwhoisd", "10.0.0.2"));
    }

    #[test]
    fn no_rules_means_permissive() {
        let acl = Acl::default();
        assert!(acl.is_allowed("rwhoisd", "anyone"));
    }
}
