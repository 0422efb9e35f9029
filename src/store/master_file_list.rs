//! The master file list (spec.md §4.2): the per-`(area, class)` catalogue
//! of data and index files, their sizes, record counts, and lock bits.
//!
//! Three copies coexist on disk under a well-known basename (`local.db`):
//! the current *read* copy, a *write* copy built under lock, and a *backup*
//! renamed from the previous read copy. A reader never observes a
//! half-installed list — the write-then-rename sequence in [`install`]
//! guarantees either the old or the new complete list is visible.

use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::lock::PlaceholderLock;
use super::Error;

const BASENAME: &str = "local.db";
const LOCK_RETRIES: u32 = 20;
const LOCK_BACKOFF: Duration = Duration::from_millis(50);

/// A row of the master file list (spec.md §3, File descriptor entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Data,
    ExactIndex,
    CidrIndex,
    SoundexIndex,
}

impl FileKind {
    fn as_tag(self) -> &'static str {
        match self {
            FileKind::Data => "data",
            FileKind::ExactIndex => "exact-index",
            FileKind::CidrIndex => "cidr-index",
            FileKind::SoundexIndex => "soundex-index",
        }
    }

    fn from_tag(tag: &str) -> Option<FileKind> {
        match tag {
            "data" => Some(FileKind::Data),
            "exact-index" => Some(FileKind::ExactIndex),
            "cidr-index" => Some(FileKind::CidrIndex),
            "soundex-index" => Some(FileKind::SoundexIndex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub kind: FileKind,
    pub filename: String,
    pub file_no: u32,
    pub size: u64,
    pub num_recs: u64,
    pub locked: bool,
}

/// A batched mutation against the list, applied atomically (spec.md §4.2).
#[derive(Debug, Clone)]
pub enum MflOp {
    Add { kind: FileKind, filename: String, locked: bool },
    Delete { file_no: u32 },
    Modify { file_no: u32, size: u64, num_recs: u64 },
    Lock { file_no: u32 },
    Unlock { file_no: u32 },
}

#[derive(Debug, Clone)]
pub struct MasterFileList {
    dir: PathBuf,
    entries: Vec<FileEntry>,
    next_file_no: u32,
}

impl MasterFileList {
    fn read_path(&self) -> PathBuf {
        self.dir.join(BASENAME)
    }

    fn write_path(&self) -> PathBuf {
        self.dir.join(format!("{BASENAME}.write"))
    }

    fn backup_path(&self) -> PathBuf {
        self.dir.join(format!("{BASENAME}.bak"))
    }

    /// Loads the current read copy, or an empty list if none exists yet
    /// (a brand-new `(area, class)` directory).
    pub fn load(dir: PathBuf) -> Result<Self, Error> {
        let path = dir.join(BASENAME);
        let entries = if path.exists() { read_list(&path)? } else { Vec::new() };
        let next_file_no = entries.iter().map(|e| e.file_no).max().map(|n| n + 1).unwrap_or(1);
        Ok(MasterFileList { dir, entries, next_file_no })
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Files currently eligible for search: not lock-bit set (spec.md §4.2,
    /// Failure semantics: "a locked file is excluded from searches but
    /// still on disk").
    pub fn searchable(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter().filter(|e| !e.locked)
    }

    /// Applies a batch of operations under the placeholder lock, dense file
    /// numbers preserved by creation order, and installs the result via the
    /// read/write/backup dance.
    pub async fn apply(&mut self, ops: Vec<MflOp>) -> Result<(), Error> {
        let lock_target = self.read_path();
        let _lock = PlaceholderLock::acquire(&lock_target, LOCK_RETRIES, LOCK_BACKOFF)
            .await
            .map_err(Error::Lock)?;

        // Re-read under lock: another writer may have installed a newer
        // list since this handle was loaded.
        if lock_target.exists() {
            self.entries = read_list(&lock_target)?;
            self.next_file_no = self.entries.iter().map(|e| e.file_no).max().map(|n| n + 1).unwrap_or(1);
        }

        for op in ops {
            match op {
                MflOp::Add { kind, filename, locked } => {
                    let file_no = self.next_file_no;
                    self.next_file_no += 1;
                    self.entries.push(FileEntry { kind, filename, file_no, size: 0, num_recs: 0, locked });
                }
                MflOp::Delete { file_no } => {
                    self.entries.retain(|e| e.file_no != file_no);
                }
                MflOp::Modify { file_no, size, num_recs } => {
                    if let Some(entry) = self.entries.iter_mut().find(|e| e.file_no == file_no) {
                        entry.size = size;
                        entry.num_recs = num_recs;
                    }
                }
                MflOp::Lock { file_no } => {
                    if let Some(entry) = self.entries.iter_mut().find(|e| e.file_no == file_no) {
                        entry.locked = true;
                    }
                }
                MflOp::Unlock { file_no } => {
                    if let Some(entry) = self.entries.iter_mut().find(|e| e.file_no == file_no) {
                        entry.locked = false;
                    }
                }
            }
        }

        self.install()
    }

    /// Writes the new list to the `.write` copy, backs up the current read
    /// copy, then renames both into place. The two renames are each
    /// individually atomic on a POSIX filesystem, so a reader opening
    /// `local.db` at any point sees a complete file.
    fn install(&self) -> Result<(), Error> {
        let write_path = self.write_path();
        write_list(&write_path, &self.entries)?;

        let read_path = self.read_path();
        if read_path.exists() {
            std::fs::rename(&read_path, self.backup_path())
                .map_err(|source| Error::Io { path: read_path.display().to_string(), source })?;
        }
        std::fs::rename(&write_path, &read_path)
            .map_err(|source| Error::Io { path: write_path.display().to_string(), source })?;
        Ok(())
    }
}

fn read_list(path: &Path) -> Result<Vec<FileEntry>, Error> {
    let file = std::fs::File::open(path)
        .map_err(|source| Error::Io { path: path.display().to_string(), source })?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    let mut current: Vec<(String, String)> = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| Error::Io { path: path.display().to_string(), source })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "---" || trimmed == "_NEW_" {
            if let Some(entry) = entry_from_tags(path, line_no, &current)? {
                entries.push(entry);
            }
            current.clear();
            continue;
        }
        if let Some((tag, value)) = trimmed.split_once(':') {
            current.push((tag.to_string(), value.to_string()));
        }
    }
    if let Some(entry) = entry_from_tags(path, 0, &current)? {
        entries.push(entry);
    }
    Ok(entries)
}

fn entry_from_tags(path: &Path, line_no: usize, tags: &[(String, String)]) -> Result<Option<FileEntry>, Error> {
    if tags.is_empty() {
        return Ok(None);
    }
    let get = |tag: &str| tags.iter().find(|(t, _)| t == tag).map(|(_, v)| v.as_str());
    let parse_err = |field: &str, value: &str| Error::Parse {
        path: path.display().to_string(),
        line: line_no,
        message: format!("invalid {field} value '{value}' in master file list"),
    };

    let kind_tag = get("type").ok_or_else(|| Error::Parse {
        path: path.display().to_string(),
        line: line_no,
        message: "master file list entry missing 'type'".into(),
    })?;
    let kind = FileKind::from_tag(kind_tag).ok_or_else(|| parse_err("type", kind_tag))?;
    let filename = get("file")
        .ok_or_else(|| Error::Parse {
            path: path.display().to_string(),
            line: line_no,
            message: "master file list entry missing 'file'".into(),
        })?
        .to_string();
    let file_no: u32 = get("file-no")
        .ok_or_else(|| Error::Parse {
            path: path.display().to_string(),
            line: line_no,
            message: "master file list entry missing 'file-no'".into(),
        })?
        .parse()
        .map_err(|_| parse_err("file-no", get("file-no").unwrap_or("")))?;
    let size: u64 = get("size").unwrap_or("0").parse().unwrap_or(0);
    let num_recs: u64 = get("num-recs").unwrap_or("0").parse().unwrap_or(0);
    let locked = matches!(get("lock"), Some("1") | Some("on") | Some("true"));

    Ok(Some(FileEntry { kind, filename, file_no, size, num_recs, locked }))
}

fn write_list(path: &Path, entries: &[FileEntry]) -> Result<(), Error> {
    let mut file = std::fs::File::create(path)
        .map_err(|source| Error::Io { path: path.display().to_string(), source })?;
    for entry in entries {
        writeln!(file, "type:{}", entry.kind.as_tag())
            .and_then(|_| writeln!(file, "file:{}", entry.filename))
            .and_then(|_| writeln!(file, "file-no:{}", entry.file_no))
            .and_then(|_| writeln!(file, "size:{}", entry.size))
            .and_then(|_| writeln!(file, "num-recs:{}", entry.num_recs))
            .and_then(|_| writeln!(file, "lock:{}", if entry.locked { 1 } else { 0 }))
            .and_then(|_| writeln!(file, "---"))
            .map_err(|source| Error::Io { path: path.display().to_string(), source })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_modify_is_dense_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut mfl = MasterFileList::load(dir.path().to_path_buf()).unwrap();

        mfl.apply(vec![MflOp::Add { kind: FileKind::Data, filename: "1.dat".into(), locked: false }])
            .await
            .unwrap();
        let file_no = mfl.entries()[0].file_no;
        assert_eq!(file_no, 1);

        mfl.apply(vec![MflOp::Modify { file_no, size: 128, num_recs: 3 }]).await.unwrap();

        let reloaded = MasterFileList::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(reloaded.entries().len(), 1);
        assert_eq!(reloaded.entries()[0].size, 128);
        assert_eq!(reloaded.entries()[0].num_recs, 3);
    }

    #[tokio::test]
    async fn locked_entries_are_excluded_from_searchable() {
        let dir = tempfile::tempdir().unwrap();
        let mut mfl = MasterFileList::load(dir.path().to_path_buf()).unwrap();
        mfl.apply(vec![
            MflOp::Add { kind: FileKind::Data, filename: "1.dat".into(), locked: false },
            MflOp::Add { kind: FileKind::Data, filename: "2.dat".into(), locked: true },
        ])
        .await
        .unwrap();

        assert_eq!(mfl.searchable().count(), 1);
    }

    #[tokio::test]
    async fn delete_removes_the_entry_and_keeps_a_backup_copy() {
        let dir = tempfile::tempdir().unwrap();
        let mut mfl = MasterFileList::load(dir.path().to_path_buf()).unwrap();
        mfl.apply(vec![MflOp::Add { kind: FileKind::Data, filename: "1.dat".into(), locked: false }])
            .await
            .unwrap();
        let file_no = mfl.entries()[0].file_no;

        mfl.apply(vec![MflOp::Delete { file_no }]).await.unwrap();

        assert!(mfl.entries().is_empty());
        assert!(dir.path().join("local.db.bak").exists());
    }
}
