//! Record store (spec.md §4.2): a `RecordStore` owning one
//! [`ClassStore`] per `(area, class)`, each backed by a master file list,
//! append-only data files, and per-attribute indexes.

pub mod class_store;
pub mod data_file;
pub mod index;
pub mod lock;
pub mod master_file_list;
pub mod repack;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use class_store::ClassStore;

use crate::model::{AnonymousRecord, AttrValue, AuthorityArea};
use crate::referral::key::{HierKey, NetworkPrefix};
use crate::referral::ReferralLookup;

#[derive(Debug)]
pub enum Error {
    Io { path: String, source: std::io::Error },
    Parse { path: String, line: usize, message: String },
    Lock(std::io::Error),
    UnknownClass { area: String, class: String },
    MissingDataFile { area: String, class: String, file_no: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io { path, source } => write!(f, "{path}: {source}"),
            Error::Parse { path, line, message } => write!(f, "{path}:{line}: {message}"),
            Error::Lock(e) => write!(f, "failed to acquire master file list lock: {e}"),
            Error::UnknownClass { area, class } => write!(f, "no class '{class}' in area '{area}'"),
            Error::MissingDataFile { area, class, file_no } => {
                write!(f, "data file {file_no} missing for '{area}'/'{class}'")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Lock(source) => Some(source),
            _ => None,
        }
    }
}

/// Owns one [`ClassStore`] per `(area, class)` pair and answers the
/// attribute-indexed and referral lookups the session layer needs.
pub struct RecordStore {
    areas: HashMap<String, AuthorityArea>,
    classes: HashMap<(String, String), ClassStore>,
}

impl RecordStore {
    /// Opens (or creates) every `(area, class)` directory named by `areas`.
    pub fn open(areas: HashMap<String, AuthorityArea>) -> Result<Self, Error> {
        let mut classes = HashMap::new();
        for area in areas.values() {
            for class in area.schema() {
                let dir = area.data_dir().join(class.data_dir());
                let store = ClassStore::open(dir, class)?;
                classes.insert((area.name().to_string(), class.name().to_string()), store);
            }
        }
        Ok(RecordStore { areas, classes })
    }

    pub fn area(&self, name: &str) -> Option<&AuthorityArea> {
        self.areas.get(name)
    }

    pub fn areas(&self) -> &HashMap<String, AuthorityArea> {
        &self.areas
    }

    fn class_store(&self, area: &str, class: &str) -> Result<&ClassStore, Error> {
        self.classes
            .get(&(area.to_string(), class.to_string()))
            .ok_or_else(|| Error::UnknownClass { area: area.to_string(), class: class.to_string() })
    }

    fn class_store_mut(&mut self, area: &str, class: &str) -> Result<&mut ClassStore, Error> {
        self.classes
            .get_mut(&(area.to_string(), class.to_string()))
            .ok_or_else(|| Error::UnknownClass { area: area.to_string(), class: class.to_string() })
    }

    pub fn lookup_exact(&self, area: &str, class: &str, attribute: &str, value: &str) -> Result<Vec<AnonymousRecord>, Error> {
        self.class_store(area, class)?.lookup_exact(attribute, value)
    }

    pub fn lookup_cidr(&self, area: &str, class: &str, attribute: &str, query: &NetworkPrefix) -> Result<Vec<AnonymousRecord>, Error> {
        self.class_store(area, class)?.lookup_cidr(attribute, query)
    }

    pub fn lookup_soundex(&self, area: &str, class: &str, attribute: &str, value: &str) -> Result<Vec<AnonymousRecord>, Error> {
        self.class_store(area, class)?.lookup_soundex(attribute, value)
    }

    pub fn all_records(&self, area: &str, class: &str) -> Result<Vec<AnonymousRecord>, Error> {
        self.class_store(area, class)?.all_records()
    }

    /// Appends a record to `(area, class)`'s current writable data file
    /// under the master-file-list lock (spec.md §4.6, registration commit
    /// step 2).
    pub async fn append(&mut self, area: &str, class_name: &str, fields: Vec<AttrValue>) -> Result<(u32, u64), Error> {
        let class = self
            .areas
            .get(area)
            .and_then(|a| a.class(class_name))
            .cloned()
            .ok_or_else(|| Error::UnknownClass { area: area.to_string(), class: class_name.to_string() })?;
        self.class_store_mut(area, class_name)?.append(&class, fields).await
    }

    pub fn delete(&mut self, area: &str, class: &str, file_no: u32, offset: u64) -> Result<(), Error> {
        self.class_store_mut(area, class)?.delete(file_no, offset)
    }

    /// Fetches the single record living at `(file_no, offset)` in
    /// `(area, class)`, for resolving a query hit's location into fields.
    pub fn record_at(
        &self,
        area: &str,
        class: &str,
        file_no: u32,
        offset: u64,
    ) -> Result<Option<AnonymousRecord>, Error> {
        self.class_store(area, class)?.record_at(file_no, offset)
    }

    /// The master file list backing `(area, class)`, for the `-xfer`
    /// directive's manifest.
    pub fn master_file_list(&self, area: &str, class: &str) -> Result<&master_file_list::MasterFileList, Error> {
        Ok(self.class_store(area, class)?.master_file_list())
    }
}

impl ReferralLookup for RecordStore {
    /// Searches the area's `referral` class for records whose
    /// `Referred-Auth-Area` attribute exactly matches `key`, returning every
    /// value of their (repeatable) `Referral` attribute — the synthetic
    /// query spec.md §4.4 describes as `referral Referred-Auth-Area=<key>`.
    fn find_referral_urls(&self, area: &AuthorityArea, key: &HierKey) -> Vec<String> {
        let Some(class) = area.class("referral") else { return Vec::new() };
        let Ok(records) = self.lookup_exact(area.name(), class.name(), "Referred-Auth-Area", &key.to_string())
        else {
            return Vec::new();
        };
        records
            .iter()
            .flat_map(|record| {
                record
                    .fields
                    .iter()
                    .filter(|f| f.name.eq_ignore_ascii_case("Referral"))
                    .map(|f| f.value.clone())
            })
            .collect()
    }
}
