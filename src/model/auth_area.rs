//! Authority area definitions (spec.md §3, Authority area row).

use std::path::PathBuf;

use super::class::Class;
use super::ModelError;

/// Whether an authority area is served directly or mirrored from elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaType {
    Primary,
    Secondary,
}

/// A `host:port` pair referencing another server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRef {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for ServerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Start-Of-Authority metadata (spec.md §6, SOA file tags).
#[derive(Debug, Clone)]
pub struct Soa {
    pub serial_number: String,
    pub refresh_interval: u32,
    pub increment_interval: u32,
    pub retry_interval: u32,
    pub time_to_live: u32,
    pub primary_server: ServerRef,
    pub hostmaster: String,
}

/// A contiguous portion of the directory namespace this server is
/// authoritative (primary) or caching (secondary) for.
#[derive(Debug, Clone)]
pub struct AuthorityArea {
    name: String,
    area_type: AreaType,
    data_dir: PathBuf,
    schema_file: PathBuf,
    soa_file: PathBuf,
    soa: Soa,
    masters: Vec<ServerRef>,
    slaves: Vec<ServerRef>,
    guardians: Vec<String>,
    schema: Vec<Class>,
}

impl AuthorityArea {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        area_type: AreaType,
        data_dir: PathBuf,
        schema_file: PathBuf,
        soa_file: PathBuf,
        soa: Soa,
        masters: Vec<ServerRef>,
        slaves: Vec<ServerRef>,
        guardians: Vec<String>,
        schema: Vec<Class>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        if !is_valid_area_name(&name) {
            return Err(ModelError::InvalidAreaName { value: name });
        }

        match area_type {
            AreaType::Primary => {
                if !masters.is_empty() || schema.is_empty() {
                    return Err(ModelError::InconsistentServerLists { area: name });
                }
            }
            AreaType::Secondary => {
                if masters.is_empty() || !slaves.is_empty() {
                    return Err(ModelError::InconsistentServerLists { area: name });
                }
            }
        }

        let mut seen: Vec<String> = Vec::with_capacity(schema.len() * 2);
        for class in &schema {
            for candidate in std::iter::once(class.name().to_string()).chain(class.aliases().iter().cloned()) {
                if seen.iter().any(|s| s.eq_ignore_ascii_case(&candidate)) {
                    return Err(ModelError::DuplicateClassName { area: name, name: candidate });
                }
                seen.push(candidate);
            }
        }

        Ok(AuthorityArea {
            name,
            area_type,
            data_dir,
            schema_file,
            soa_file,
            soa,
            masters,
            slaves,
            guardians,
            schema,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn area_type(&self) -> AreaType {
        self.area_type
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn schema_file(&self) -> &PathBuf {
        &self.schema_file
    }

    pub fn soa_file(&self) -> &PathBuf {
        &self.soa_file
    }

    pub fn soa(&self) -> &Soa {
        &self.soa
    }

    pub fn soa_mut(&mut self) -> &mut Soa {
        &mut self.soa
    }

    pub fn masters(&self) -> &[ServerRef] {
        &self.masters
    }

    pub fn slaves(&self) -> &[ServerRef] {
        &self.slaves
    }

    pub fn guardians(&self) -> &[String] {
        &self.guardians
    }

    pub fn schema(&self) -> &[Class] {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Vec<Class> {
        &mut self.schema
    }

    pub fn class(&self, name: &str) -> Option<&Class> {
        self.schema.iter().find(|class| class.matches_name(name))
    }

    /// True if this area carries a `Referral` class, a precondition for
    /// link-referral emission (spec.md §4.4).
    pub fn has_referral_class(&self) -> bool {
        self.class("Referral").is_some()
    }
}

/// Accepts a DNS-like name (labels separated by `.`, trailing dot allowed)
/// or a CIDR-like network (`a.b.c.d/len` or an IPv6 equivalent). This is a
/// coarse structural check; full parsing happens in `referral::HierKey`.
fn is_valid_area_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    if name.contains('/') {
        return name.parse::<crate::referral::key::NetworkPrefix>().is_ok();
    }
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    !trimmed.is_empty()
        && trimmed
            .split('.')
            .all(|label| !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soa() -> Soa {
        Soa {
            serial_number: "20260101000000000".into(),
            refresh_interval: 3600,
            increment_interval: 3600,
            retry_interval: 600,
            time_to_live: 86400,
            primary_server: ServerRef { host: "rwhois.example".into(), port: 4321 },
            hostmaster: "hostmaster@example".into(),
        }
    }

    #[test]
    fn primary_area_must_have_schema_and_no_masters() {
        let err = AuthorityArea::new(
            "example.com",
            AreaType::Primary,
            "/data".into(),
            "/schema".into(),
            "/soa".into(),
            soa(),
            vec![],
            vec![],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::InconsistentServerLists { .. }));
    }

    #[test]
    fn secondary_area_requires_a_master() {
        let class = Class::new(
            "domain",
            vec![],
            "",
            "0",
            "/data".into(),
            "/attrs".into(),
            None,
            Class::base_attributes(),
            vec![crate::model::attribute::AttributeBuilder::new("Domain-Name")
                .index(crate::model::attribute::IndexKind::ExactValue)
                .build()
                .unwrap()],
        )
        .unwrap();
        let err = AuthorityArea::new(
            "example.com",
            AreaType::Secondary,
            "/data".into(),
            "/schema".into(),
            "/soa".into(),
            soa(),
            vec![],
            vec![],
            vec![],
            vec![class],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::InconsistentServerLists { .. }));
    }

    #[test]
    fn rejects_class_alias_colliding_with_another_classs_name() {
        fn class(name: &str, aliases: Vec<&str>) -> Class {
            Class::new(
                name,
                aliases.into_iter().map(String::from).collect(),
                "",
                "0",
                "/data".into(),
                "/attrs".into(),
                None,
                Class::base_attributes(),
                vec![crate::model::attribute::AttributeBuilder::new("Domain-Name")
                    .index(crate::model::attribute::IndexKind::ExactValue)
                    .build()
                    .unwrap()],
            )
            .unwrap()
        }

        let err = AuthorityArea::new(
            "example.com",
            AreaType::Primary,
            "/data".into(),
            "/schema".into(),
            "/soa".into(),
            soa(),
            vec![],
            vec![],
            vec![],
            vec![class("domain", vec![]), class("host", vec!["domain"])],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateClassName { .. }));
    }

    #[test]
    fn rejects_malformed_area_name() {
        assert!(!is_valid_area_name(""));
        assert!(!is_valid_area_name(".."));
        assert!(is_valid_area_name("sub.biz."));
        assert!(is_valid_area_name("10.0.0.0/8"));
    }
}
