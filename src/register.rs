//! Registration pipeline (spec.md §4.6): spool parsing, the external
//! parse-program hook, and the five-step commit sequence.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::model::{AttrValue, RegisterAction};
use crate::store::{self, RecordStore};

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Store(store::Error),
    Spool { message: String },
    UniquenessViolation { class: String },
    Deferred,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "{e}"),
            Error::Store(e) => write!(f, "{e}"),
            Error::Spool { message } => write!(f, "malformed registration spool: {message}"),
            Error::UniquenessViolation { class } => {
                write!(f, "registration would violate a primary-key uniqueness constraint on '{class}'")
            }
            Error::Deferred => write!(f, "registration deferred by the external parse program"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<store::Error> for Error {
    fn from(e: store::Error) -> Self {
        Error::Store(e)
    }
}

/// An append-only per-session file accumulating spooled record lines
/// between `-register on` and `-register off` (spec.md §4.5).
pub struct Spool {
    path: PathBuf,
}

impl Spool {
    /// Creates a uniquely-named spool file under `spool_dir`.
    pub fn create(spool_dir: &Path, session_id: u64) -> Result<Self, Error> {
        std::fs::create_dir_all(spool_dir)?;
        let path = spool_dir.join(format!("spool.{session_id}.{}", std::process::id()));
        std::fs::File::create(&path)?;
        Ok(Spool { path })
    }

    /// Reopens a handle to a spool file already created by [`Spool::create`],
    /// from the path a session stashed in its [`crate::model::ProtocolPhase`].
    pub fn at(path: PathBuf) -> Self {
        Spool { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one spool line verbatim (spec.md §4.5: "every non-directive
    /// line is appended verbatim to the spool file").
    pub fn append_line(&self, line: &str) -> Result<(), Error> {
        let mut file = std::fs::OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn read_lines(&self) -> Result<Vec<String>, Error> {
        Ok(std::fs::read_to_string(&self.path)?.lines().map(str::to_string).collect())
    }

    pub fn remove(&self) -> Result<(), Error> {
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

/// One spool's worth of parsed fields, in the layout spec.md §4.6 gives per
/// action.
#[derive(Debug, Clone)]
pub enum RegistrationRequest {
    Add { fields: Vec<AttrValue> },
    Mod { old_id: String, old_updated: Option<String>, fields: Vec<AttrValue> },
    Del { old_id: String },
}

/// Parses spool lines into a [`RegistrationRequest`] per `action`'s layout:
/// - add: one record, `Name:Value` lines.
/// - mod: old identifier lines, a `---`/`_NEW_` separator, then the
///   replacement record.
/// - del: old identifier lines only.
pub fn parse_spool(lines: &[String], action: RegisterAction) -> Result<RegistrationRequest, Error> {
    let parse_fields = |lines: &[&String]| -> Vec<AttrValue> {
        lines
            .iter()
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| AttrValue { name: name.trim().to_string(), value: value.trim().to_string() })
            .collect()
    };

    match action {
        RegisterAction::Add => {
            let all: Vec<&String> = lines.iter().collect();
            let fields = parse_fields(&all);
            if fields.is_empty() {
                return Err(Error::Spool { message: "add spool carries no fields".into() });
            }
            Ok(RegistrationRequest::Add { fields })
        }
        RegisterAction::Del => {
            let all: Vec<&String> = lines.iter().collect();
            let id_fields = parse_fields(&all);
            let old_id = id_fields
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case("ID"))
                .map(|f| f.value.clone())
                .ok_or_else(|| Error::Spool { message: "del spool missing 'ID'".into() })?;
            Ok(RegistrationRequest::Del { old_id })
        }
        RegisterAction::Mod => {
            let split_at = lines
                .iter()
                .position(|line| line.trim() == "---" || line.trim() == "_NEW_")
                .ok_or_else(|| Error::Spool { message: "mod spool missing a record separator".into() })?;
            let old_lines: Vec<&String> = lines[..split_at].iter().collect();
            let new_lines: Vec<&String> = lines[split_at + 1..].iter().collect();

            let old_fields = parse_fields(&old_lines);
            let old_id = old_fields
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case("ID"))
                .map(|f| f.value.clone())
                .ok_or_else(|| Error::Spool { message: "mod spool missing old 'ID'".into() })?;
            let old_updated =
                old_fields.iter().find(|f| f.name.eq_ignore_ascii_case("Updated")).map(|f| f.value.clone());

            let fields = parse_fields(&new_lines);
            if fields.is_empty() {
                return Err(Error::Spool { message: "mod spool carries no replacement fields".into() });
            }
            Ok(RegistrationRequest::Mod { old_id, old_updated, fields })
        }
    }
}

/// Outcome of handing a spool to a class's external parse program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Ok,
    Deferred,
    Error,
}

/// Invokes `program` with the spool path as its argument and the
/// environment variables spec.md §4.6 names, mapping its exit code to
/// {ok, deferred, error}. Exit code 0 is `Ok`, 1 is `Deferred`, anything
/// else is `Error` (the original's convention, per `original_source`'s
/// parse-program contract).
pub fn run_parse_program(
    program: &Path,
    spool_path: &Path,
    bin_path: &str,
    action: RegisterAction,
    email: &str,
    client_vendor: &str,
) -> Result<ParseOutcome, Error> {
    let status = Command::new(program)
        .arg(spool_path)
        .env("BIN_PATH", bin_path)
        .env("ACTION", action.as_str())
        .env("EMAIL", email)
        .env("CLIENT_VENDOR", client_vendor)
        .status()?;

    Ok(match status.code() {
        Some(0) => ParseOutcome::Ok,
        Some(1) => ParseOutcome::Deferred,
        _ => ParseOutcome::Error,
    })
}

/// Formats `millis_since_epoch` as the protocol's `YYYYMMDDHHMMSSmmm`
/// timestamp (spec.md §4.6, step 1).
pub fn format_timestamp(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("{}{:03}", now.format("%Y%m%d%H%M%S"), now.timestamp_subsec_millis())
}

/// `max(now, serial + 1)` in the same timestamp form (spec.md §4.6, step 4).
pub fn bump_serial(current_serial: &str, now: chrono::DateTime<chrono::Utc>) -> String {
    let now_str = format_timestamp(now);
    let incremented: u64 = current_serial.parse::<u64>().map(|n| n + 1).unwrap_or(0);
    let now_num: u64 = now_str.parse().unwrap_or(0);
    std::cmp::max(now_num, incremented).to_string()
}

/// Runs a uniqueness check over a class's primary-key attributes: for
/// `add`, requires zero existing matches; for `mod`, requires the one
/// match found to equal the stated old `ID` (and `Updated`, if supplied).
pub fn check_primary_key_uniqueness(
    store: &RecordStore,
    area: &str,
    class: &str,
    fields: &[AttrValue],
    expect_existing: Option<(&str, Option<&str>)>,
) -> Result<(), Error> {
    let Some(id_field) = fields.iter().find(|f| f.name.eq_ignore_ascii_case("ID")) else {
        return Ok(());
    };
    let matches = store.lookup_exact(area, class, "ID", &id_field.value)?;

    match expect_existing {
        None if matches.is_empty() => Ok(()),
        Some((old_id, old_updated)) if matches.len() <= 1 => {
            if let Some(record) = matches.first() {
                let matches_id = record.field(&["ID"]) == Some(old_id);
                let matches_updated =
                    old_updated.is_none() || record.field(&["Updated"]) == old_updated;
                if matches_id && matches_updated {
                    return Ok(());
                }
            } else {
                return Ok(());
            }
            Err(Error::UniquenessViolation { class: class.to_string() })
        }
        _ => Err(Error::UniquenessViolation { class: class.to_string() }),
    }
}

/// Performs steps 2-3 of the commit sequence (steps 1/4/5 — timestamp
/// stamping, SOA bump, lock release — are the caller's, since they require
/// the enclosing `AuthorityArea`'s SOA, which this module has no handle on).
pub async fn commit_to_store(
    store: &mut RecordStore,
    area: &str,
    class: &str,
    request: RegistrationRequest,
) -> Result<(), Error> {
    match request {
        RegistrationRequest::Add { fields } => {
            store.append(area, class, fields).await?;
        }
        RegistrationRequest::Mod { old_id, fields, .. } => {
            let matches = store.lookup_exact(area, class, "ID", &old_id)?;
            for record in &matches {
                store.delete(area, class, record.data_file_id, record.offset)?;
            }
            store.append(area, class, fields).await?;
        }
        RegistrationRequest::Del { old_id } => {
            let matches = store.lookup_exact(area, class, "ID", &old_id)?;
            for record in &matches {
                store.delete(area, class, record.data_file_id, record.offset)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_spool() {
        let lines = vec!["Domain-Name:example.com".to_string(), "ID:X.1".to_string()];
        let request = parse_spool(&lines, RegisterAction::Add).unwrap();
        match request {
            RegistrationRequest::Add { fields } => assert_eq!(fields.len(), 2),
            _ => panic!("expected Add"),
        }
    }

    #[test]
    fn parses_mod_spool_around_separator() {
        let lines = vec![
            "ID:X.1".to_string(),
            "Updated:20260101000000000".to_string(),
            "---".to_string(),
            "ID:X.1".to_string(),
            "Domain-Name:new.example.com".to_string(),
        ];
        let request = parse_spool(&lines, RegisterAction::Mod).unwrap();
        match request {
            RegistrationRequest::Mod { old_id, old_updated, fields } => {
                assert_eq!(old_id, "X.1");
                assert_eq!(old_updated.as_deref(), Some("20260101000000000"));
                assert_eq!(fields.len(), 2);
            }
            _ => panic!("expected Mod"),
        }
    }

    #[test]
    fn parses_del_spool() {
        let lines = vec!["ID:X.1".to_string()];
        let request = parse_spool(&lines, RegisterAction::Del).unwrap();
        match request {
            RegistrationRequest::Del { old_id } => assert_eq!(old_id, "X.1"),
            _ => panic!("expected Del"),
        }
    }

    #[test]
    fn rejects_mod_spool_missing_separator() {
        let lines = vec!["ID:X.1".to_string()];
        let err = parse_spool(&lines, RegisterAction::Mod).unwrap_err();
        assert!(matches!(err, Error::Spool { .. }));
    }

    #[test]
    fn serial_bump_never_goes_backwards() {
        let now = chrono::DateTime::parse_from_rfc3339("2026-07-28T00:00:00Z").unwrap().with_timezone(&chrono::Utc);
        let now_str = format_timestamp(now);
        // A serial already ahead of "now" (e.g. from clock skew) still only
        // advances by one, never regresses to the wall-clock value.
        let far_future_serial: u64 = now_str.parse::<u64>().unwrap() + 1_000_000;
        let bumped = bump_serial(&far_future_serial.to_string(), now);
        assert_eq!(bumped, (far_future_serial + 1).to_string());
    }
}
