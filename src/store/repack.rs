//! `rwhois_repack`-equivalent: lock the `(area, class)` master file list,
//! rebuild it with tombstoned records collapsed out and file numbers
//! re-densified, then unlock (SPEC_FULL §2; spec.md §4.2 "Repack is an
//! external collaborator which uses lock→rebuild→unlock").
//!
//! Only the primitive is implemented here; scheduling repack (a cron-like
//! external trigger) stays out of scope.

use std::path::PathBuf;
use std::time::Duration;

use super::data_file::DataFile;
use super::lock::PlaceholderLock;
use super::master_file_list::{FileKind, MasterFileList, MflOp};
use super::Error;

const LOCK_RETRIES: u32 = 20;
const LOCK_BACKOFF: Duration = Duration::from_millis(50);

/// Rewrites every data file in `dir` with tombstoned records dropped, then
/// installs a fresh master file list with dense file numbers.
pub async fn repack(dir: PathBuf) -> Result<(), Error> {
    let lock_target = dir.join("local.db");
    let _lock = PlaceholderLock::acquire(&lock_target, LOCK_RETRIES, LOCK_BACKOFF)
        .await
        .map_err(Error::Lock)?;

    let mut mfl = MasterFileList::load(dir.clone())?;
    let data_entries: Vec<_> = mfl.entries().iter().filter(|e| e.kind == FileKind::Data).cloned().collect();

    let mut ops = Vec::new();
    for entry in &data_entries {
        let old_path = dir.join(&entry.filename);
        let old_file = DataFile::open(old_path.clone())?;
        let records = old_file
            .read_all(entry.file_no)
            .map_err(|source| Error::Io { path: old_path.display().to_string(), source })?;

        let new_filename = format!("{}.repacked", entry.filename);
        let new_file = DataFile::open(dir.join(&new_filename))?;
        for record in &records {
            new_file
                .append(&record.fields)
                .map_err(|source| Error::Io { path: new_filename.clone(), source })?;
        }

        ops.push(MflOp::Delete { file_no: entry.file_no });
        ops.push(MflOp::Add { kind: FileKind::Data, filename: new_filename, locked: false });
    }

    mfl.apply(ops).await?;

    for entry in &data_entries {
        let _ = std::fs::remove_file(dir.join(&entry.filename));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttrValue;

    #[tokio::test]
    async fn repack_drops_tombstoned_records_and_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let dir_path = dir.path().to_path_buf();

        let mut mfl = MasterFileList::load(dir_path.clone()).unwrap();
        mfl.apply(vec![MflOp::Add { kind: FileKind::Data, filename: "1.dat".into(), locked: false }])
            .await
            .unwrap();

        let data_file = DataFile::open(dir_path.join("1.dat")).unwrap();
        let offset = data_file
            .append(&[AttrValue { name: "ID".into(), value: "X.1".into() }])
            .unwrap();
        data_file
            .append(&[AttrValue { name: "ID".into(), value: "X.2".into() }])
            .unwrap();
        data_file.tombstone(offset).unwrap();

        repack(dir_path.clone()).await.unwrap();

        let mfl = MasterFileList::load(dir_path.clone()).unwrap();
        let data_entry = mfl.entries().iter().find(|e| e.kind == FileKind::Data).unwrap();
        let rebuilt = DataFile::open(dir_path.join(&data_entry.filename)).unwrap();
        let records = rebuilt.read_all(data_entry.file_no).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field(&["ID"]), Some("X.2"));
    }
}
