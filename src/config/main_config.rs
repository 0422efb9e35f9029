//! Main config file (spec.md §4.1, pass 1).

use std::path::{Path, PathBuf};

use super::{read_tag_value_lines, Error};

/// The closed set of recognised main-config tags (spec.md §4.1). Unknown
/// tags are warned and ignored, not rejected.
#[derive(Debug, Clone)]
pub struct MainConfig {
    pub root_dir: PathBuf,
    pub bin_path: PathBuf,
    pub auth_area_list_file: String,
    pub directive_file: String,
    pub extended_directive_file: String,
    pub punt_file: String,
    pub allow_file: String,
    pub deny_file: String,
    pub hostname: String,
    pub port: u16,
    pub process_uid: Option<String>,
    pub chroot: bool,
    pub deadman_seconds: u32,
    pub max_hits_ceiling: u32,
    pub max_hits_default: u32,
    pub max_children: u32,
    pub verbosity: u8,
    pub pid_file: String,
    pub syslog_facility: String,
    pub listen_queue_length: u32,
    pub child_priority_offset: i32,
    pub query_allow_wildcard: bool,
    pub query_allow_substring: bool,
    pub skip_referral_search: bool,
}

impl Default for MainConfig {
    fn default() -> Self {
        MainConfig {
            root_dir: PathBuf::from("."),
            bin_path: PathBuf::from("bin"),
            auth_area_list_file: "rwhoisd.auth_area".into(),
            directive_file: "rwhoisd.dir".into(),
            extended_directive_file: "rwhoisd.x.dir".into(),
            punt_file: "rwhoisd.root".into(),
            allow_file: "hosts.allow".into(),
            deny_file: "hosts.deny".into(),
            hostname: "localhost".into(),
            port: 4321,
            process_uid: None,
            chroot: false,
            deadman_seconds: 60,
            max_hits_ceiling: 256,
            max_hits_default: 50,
            max_children: 40,
            verbosity: 1,
            pid_file: "rwhoisd.pid".into(),
            syslog_facility: "daemon".into(),
            listen_queue_length: 16,
            child_priority_offset: 0,
            query_allow_wildcard: false,
            query_allow_substring: false,
            skip_referral_search: false,
        }
    }
}

impl MainConfig {
    pub fn load(path: &Path) -> Result<MainConfig, Error> {
        let lines = read_tag_value_lines(path)?;
        let mut config = MainConfig::default();

        for (line_no, line) in &lines {
            let value = line.value.as_str();
            match line.tag.as_str() {
                "root-dir" => config.root_dir = PathBuf::from(value),
                "bin-path" => config.bin_path = PathBuf::from(value),
                "auth-area-list-file" => config.auth_area_list_file = value.to_string(),
                "directive-file" => config.directive_file = value.to_string(),
                "extended-directive-file" => config.extended_directive_file = value.to_string(),
                "punt-file" => config.punt_file = value.to_string(),
                "allow-file" => config.allow_file = value.to_string(),
                "deny-file" => config.deny_file = value.to_string(),
                "hostname" => config.hostname = value.to_string(),
                "port" => config.port = parse_field(path, *line_no, value)?,
                "process-uid" => config.process_uid = Some(value.to_string()),
                "chroot" => config.chroot = parse_bool(path, *line_no, value)?,
                "deadman-time" => config.deadman_seconds = parse_field(path, *line_no, value)?,
                "max-hits-ceiling" => config.max_hits_ceiling = parse_field(path, *line_no, value)?,
                "max-hits-default" => config.max_hits_default = parse_field(path, *line_no, value)?,
                "max-children" => config.max_children = parse_field(path, *line_no, value)?,
                "verbosity" => config.verbosity = parse_field(path, *line_no, value)?,
                "pid-file" => config.pid_file = value.to_string(),
                "syslog-facility" => config.syslog_facility = value.to_string(),
                "listen-queue-length" => {
                    config.listen_queue_length = parse_field(path, *line_no, value)?
                }
                "child-priority-offset" => {
                    config.child_priority_offset = parse_field(path, *line_no, value)?
                }
                "query-allow-wildcard" => {
                    config.query_allow_wildcard = parse_bool(path, *line_no, value)?
                }
                "query-allow-substring" => {
                    config.query_allow_substring = parse_bool(path, *line_no, value)?
                }
                "skip-referral-search" => {
                    config.skip_referral_search = parse_bool(path, *line_no, value)?
                }
                unknown => {
                    tracing::warn!(tag = unknown, "unrecognised main-config tag, ignoring");
                }
            }
        }

        config.verify(path)?;
        Ok(config)
    }

    /// The bounded-interval and ordering checks from spec.md §4.1's
    /// verification pass.
    fn verify(&self, path: &Path) -> Result<(), Error> {
        if self.deadman_seconds == 0 {
            return Err(Error::Parse {
                path: path.display().to_string(),
                line: 0,
                message: "deadman-time must be at least 1 second".into(),
            });
        }
        // max-hits-ceiling == 0 means "no cap" (spec.md §9, Open Questions).
        if self.max_hits_ceiling != 0 && self.max_hits_default > self.max_hits_ceiling {
            return Err(Error::Parse {
                path: path.display().to_string(),
                line: 0,
                message: "max-hits-default must not exceed max-hits-ceiling".into(),
            });
        }
        Ok(())
    }
}

fn parse_field<T: std::str::FromStr>(path: &Path, line: usize, value: &str) -> Result<T, Error> {
    value.parse().map_err(|_| Error::Parse {
        path: path.display().to_string(),
        line,
        message: format!("invalid value '{value}'"),
    })
}

fn parse_bool(path: &Path, line: usize, value: &str) -> Result<bool, Error> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(Error::Parse {
            path: path.display().to_string(),
            line,
            message: format!("invalid boolean value '{value}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_recognised_tags_and_defaults_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rwhoisd.conf");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "root-dir: /srv/rwhois").unwrap();
        writeln!(file, "port: 4321").unwrap();
        writeln!(file, "chroot: on").unwrap();
        writeln!(file, "some-future-tag: ignored").unwrap();
        drop(file);

        let config = MainConfig::load(&path).unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/srv/rwhois"));
        assert_eq!(config.port, 4321);
        assert!(config.chroot);
        assert_eq!(config.max_children, 40);
    }

    #[test]
    fn rejects_max_hits_default_above_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rwhoisd.conf");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "max-hits-ceiling: 10").unwrap();
        writeln!(file, "max-hits-default: 20").unwrap();
        drop(file);

        assert!(MainConfig::load(&path).is_err());
    }

    #[test]
    fn zero_ceiling_means_no_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rwhoisd.conf");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "max-hits-ceiling: 0").unwrap();
        writeln!(file, "max-hits-default: 1000").unwrap();
        drop(file);

        assert!(MainConfig::load(&path).is_ok());
    }
}
