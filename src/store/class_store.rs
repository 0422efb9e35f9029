//! The on-disk home of one `(area, class)` pair: its master file list, data
//! files, and per-attribute indexes (spec.md §4.2).

use std::collections::HashMap;
use std::path::PathBuf;

use super::data_file::DataFile;
use super::index::{CidrIndex, ExactIndex, Location, SoundexIndex};
use super::master_file_list::{FileKind, MasterFileList, MflOp};
use super::Error;
use crate::model::{AnonymousRecord, AttrValue, Class};
use crate::referral::key::NetworkPrefix;

pub struct ClassStore {
    dir: PathBuf,
    mfl: MasterFileList,
    data_files: HashMap<u32, DataFile>,
    exact: HashMap<String, ExactIndex>,
    cidr: HashMap<String, CidrIndex>,
    soundex: HashMap<String, SoundexIndex>,
}

impl ClassStore {
    pub fn open(dir: PathBuf, class: &Class) -> Result<Self, Error> {
        std::fs::create_dir_all(&dir).map_err(|source| Error::Io { path: dir.display().to_string(), source })?;
        let mfl = MasterFileList::load(dir.clone())?;

        let mut data_files = HashMap::new();
        for entry in mfl.entries().iter().filter(|e| e.kind == FileKind::Data) {
            data_files.insert(entry.file_no, DataFile::open(dir.join(&entry.filename))?);
        }

        let mut exact = HashMap::new();
        let mut cidr = HashMap::new();
        let mut soundex = HashMap::new();
        for attr in class.attributes() {
            let index_path = |suffix: &str| dir.join(format!("{}.{suffix}", attr.name().to_ascii_lowercase()));
            match attr.index() {
                crate::model::IndexKind::ExactValue | crate::model::IndexKind::AllWords => {
                    exact.insert(attr.name().to_string(), ExactIndex::load(index_path("exact"))?);
                }
                crate::model::IndexKind::Cidr => {
                    cidr.insert(attr.name().to_string(), CidrIndex::load(index_path("cidr"))?);
                }
                crate::model::IndexKind::Soundex => {
                    soundex.insert(attr.name().to_string(), SoundexIndex::load(index_path("soundex"))?);
                }
                crate::model::IndexKind::None => {}
            }
        }

        Ok(ClassStore { dir, mfl, data_files, exact, cidr, soundex })
    }

    fn current_data_file_no(&self) -> Option<u32> {
        self.mfl
            .entries()
            .iter()
            .filter(|e| e.kind == FileKind::Data && !e.locked)
            .map(|e| e.file_no)
            .max()
    }

    async fn ensure_data_file(&mut self) -> Result<u32, Error> {
        if let Some(file_no) = self.current_data_file_no() {
            return Ok(file_no);
        }
        let filename = format!("{}.dat", self.mfl.entries().iter().map(|e| e.file_no).max().unwrap_or(0) + 1);
        self.mfl
            .apply(vec![MflOp::Add { kind: FileKind::Data, filename: filename.clone(), locked: false }])
            .await?;
        let file_no = self.current_data_file_no().expect("just added a data file");
        self.data_files.insert(file_no, DataFile::open(self.dir.join(&filename))?);
        Ok(file_no)
    }

    /// Appends a record, updates its class's indexes, and bumps the master
    /// file list's size/record-count fields for the file it landed in.
    pub async fn append(&mut self, class: &Class, fields: Vec<AttrValue>) -> Result<(u32, u64), Error> {
        let file_no = self.ensure_data_file().await?;
        let data_file = self.data_files.get(&file_no).expect("ensured above");
        let offset = data_file.append(&fields).map_err(|source| Error::Io {
            path: data_file.path().display().to_string(),
            source,
        })?;

        for field in &fields {
            let Some(attr) = class.attribute(&field.name) else { continue };
            let loc = Location { file_no, offset };
            match attr.index() {
                crate::model::IndexKind::ExactValue | crate::model::IndexKind::AllWords => {
                    if let Some(index) = self.exact.get_mut(attr.name()) {
                        index.insert(&field.value, loc);
                    }
                }
                crate::model::IndexKind::Cidr => {
                    if let (Some(index), Ok(prefix)) =
                        (self.cidr.get_mut(attr.name()), field.value.parse::<NetworkPrefix>())
                    {
                        index.insert(prefix, loc);
                    }
                }
                crate::model::IndexKind::Soundex => {
                    if let Some(index) = self.soundex.get_mut(attr.name()) {
                        index.insert(&field.value, loc);
                    }
                }
                crate::model::IndexKind::None => {}
            }
        }
        self.flush_indexes()?;

        let size = self.data_files[&file_no]
            .path()
            .metadata()
            .map(|m| m.len())
            .map_err(|source| Error::Io { path: self.dir.display().to_string(), source })?;
        let num_recs = self.data_files[&file_no].read_all(file_no)?.len() as u64;
        let mfl_entry = self.mfl.entries().iter().find(|e| e.file_no == file_no).map(|e| e.file_no);
        if let Some(file_no) = mfl_entry {
            self.mfl.apply(vec![MflOp::Modify { file_no, size, num_recs }]).await?;
        }

        Ok((file_no, offset))
    }

    pub fn delete(&mut self, file_no: u32, offset: u64) -> Result<(), Error> {
        let data_file = self
            .data_files
            .get(&file_no)
            .ok_or_else(|| Error::MissingDataFile { area: String::new(), class: String::new(), file_no })?;
        data_file
            .tombstone(offset)
            .map_err(|source| Error::Io { path: data_file.path().display().to_string(), source })
    }

    fn flush_indexes(&self) -> Result<(), Error> {
        for index in self.exact.values() {
            index.flush().map_err(|source| Error::Io { path: self.dir.display().to_string(), source })?;
        }
        for index in self.cidr.values() {
            index.flush().map_err(|source| Error::Io { path: self.dir.display().to_string(), source })?;
        }
        for index in self.soundex.values() {
            index.flush().map_err(|source| Error::Io { path: self.dir.display().to_string(), source })?;
        }
        Ok(())
    }

    fn resolve(&self, locations: &[Location]) -> Result<Vec<AnonymousRecord>, Error> {
        let mut records = Vec::new();
        for loc in locations {
            let Some(data_file) = self.data_files.get(&loc.file_no) else { continue };
            if let Some(record) = data_file
                .read_at(loc.file_no, loc.offset)
                .map_err(|source| Error::Io { path: data_file.path().display().to_string(), source })?
            {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn lookup_exact(&self, attribute: &str, value: &str) -> Result<Vec<AnonymousRecord>, Error> {
        let Some(index) = self.exact.get(attribute) else { return Ok(Vec::new()) };
        self.resolve(index.lookup(value))
    }

    pub fn lookup_cidr(&self, attribute: &str, query: &NetworkPrefix) -> Result<Vec<AnonymousRecord>, Error> {
        let Some(index) = self.cidr.get(attribute) else { return Ok(Vec::new()) };
        self.resolve(&index.lookup(query))
    }

    pub fn lookup_soundex(&self, attribute: &str, value: &str) -> Result<Vec<AnonymousRecord>, Error> {
        let Some(index) = self.soundex.get(attribute) else { return Ok(Vec::new()) };
        self.resolve(index.lookup(value))
    }

    /// Every non-tombstoned record across every searchable (unlocked) data
    /// file, for unindexed/substring scans.
    pub fn all_records(&self) -> Result<Vec<AnonymousRecord>, Error> {
        let mut records = Vec::new();
        for entry in self.mfl.searchable().filter(|e| e.kind == FileKind::Data) {
            let Some(data_file) = self.data_files.get(&entry.file_no) else { continue };
            records.extend(
                data_file
                    .read_all(entry.file_no)
                    .map_err(|source| Error::Io { path: data_file.path().display().to_string(), source })?,
            );
        }
        Ok(records)
    }

    pub fn master_file_list(&self) -> &MasterFileList {
        &self.mfl
    }

    /// Fetches the single record living at `(file_no, offset)`, for
    /// resolving a query hit's location back into its fields.
    pub fn record_at(&self, file_no: u32, offset: u64) -> Result<Option<AnonymousRecord>, Error> {
        Ok(self.resolve(&[Location { file_no, offset }])?.into_iter().next())
    }
}
