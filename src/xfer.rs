//! `-xfer` directive support (spec.md §4.5): builds the file manifest and
//! SOA summary a zone transfer sends before the session drops into raw
//! transfer mode.

use crate::model::AuthorityArea;
use crate::store::master_file_list::{FileEntry, FileKind};
use crate::store::RecordStore;

/// One line of the manifest: a master-file-list entry annotated with the
/// class it belongs to, for the client to know where to write it locally.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub class: String,
    pub kind: FileKind,
    pub filename: String,
    pub file_no: u32,
    pub size: u64,
    pub num_recs: u64,
}

/// Gathers every searchable (unlocked) file across `area`'s schema, for the
/// `-xfer` directive's manifest (spec.md §4.5: "a full-area transfer lists
/// every unlocked file across every class").
pub fn build_transfer_manifest(store: &RecordStore, area: &AuthorityArea) -> Vec<ManifestEntry> {
    let mut manifest = Vec::new();
    for class in area.schema() {
        let Ok(mfl) = store.master_file_list(area.name(), class.name()) else { continue };
        manifest.extend(mfl.entries().iter().filter(|e: &&FileEntry| !e.locked).map(|entry| ManifestEntry {
            class: class.name().to_string(),
            kind: entry.kind,
            filename: entry.filename.clone(),
            file_no: entry.file_no,
            size: entry.size,
            num_recs: entry.num_recs,
        }));
    }
    manifest
}

/// The wire tag for a manifest entry's file kind, matching the master file
/// list's own on-disk vocabulary.
pub fn kind_tag(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Data => "data",
        FileKind::ExactIndex => "exact-index",
        FileKind::CidrIndex => "cidr-index",
        FileKind::SoundexIndex => "soundex-index",
    }
}

/// Renders one manifest entry as the `%xferfile` line body the session
/// writes ahead of the raw file bytes.
pub fn render_manifest_line(entry: &ManifestEntry) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        entry.class,
        kind_tag(entry.kind),
        entry.filename,
        entry.size,
        entry.num_recs
    )
}

/// Renders the area's SOA as the `%soa` summary line `-xfer` sends first,
/// matching the `-soa` directive's own field order.
pub fn render_soa_lines(area: &AuthorityArea) -> Vec<String> {
    let soa = area.soa();
    vec![
        format!("soa:Auth-Area:{}", area.name()),
        format!("soa:Serial-Number:{}", soa.serial_number),
        format!("soa:Primary-Server:{}", soa.primary_server),
        format!("soa:Hostmaster:{}", soa.hostmaster),
        format!("soa:Refresh-Interval:{}", soa.refresh_interval),
        format!("soa:Retry-Interval:{}", soa.retry_interval),
        format!("soa:Increment-Interval:{}", soa.increment_interval),
        format!("soa:Time-To-Live:{}", soa.time_to_live),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AreaType, Class as ModelClass, Soa, ServerRef};

    fn area_with_no_classes(name: &str) -> AuthorityArea {
        AuthorityArea::new(
            name,
            AreaType::Primary,
            "/data".into(),
            "/schema".into(),
            "/soa".into(),
            Soa {
                serial_number: "1".into(),
                refresh_interval: 3600,
                increment_interval: 3600,
                retry_interval: 600,
                time_to_live: 86400,
                primary_server: ServerRef { host: "rwhois.example".into(), port: 4321 },
                hostmaster: "hostmaster@example".into(),
            },
            vec![],
            vec![],
            vec![],
            vec![dummy_class()],
        )
        .unwrap()
    }

    fn dummy_class() -> ModelClass {
        ModelClass::new(
            "domain",
            vec![],
            "",
            "0",
            "/data".into(),
            "/attrs".into(),
            None,
            ModelClass::base_attributes(),
            vec![crate::model::AttributeBuilder::new("Domain-Name")
                .index(crate::model::IndexKind::ExactValue)
                .build()
                .unwrap()],
        )
        .unwrap()
    }

    #[test]
    fn renders_soa_summary_lines() {
        let area = area_with_no_classes("example.com");
        let lines = render_soa_lines(&area);
        assert!(lines.iter().any(|l| l == "soa:Auth-Area:example.com"));
        assert!(lines.iter().any(|l| l.starts_with("soa:Serial-Number:")));
    }

    #[test]
    fn manifest_line_formats_class_kind_filename_size_and_count() {
        let entry = ManifestEntry {
            class: "domain".into(),
            kind: FileKind::Data,
            filename: "1.dat".into(),
            file_no: 1,
            size: 128,
            num_recs: 3,
        };
        assert_eq!(render_manifest_line(&entry), "domain:data:1.dat:128:3");
    }
}
