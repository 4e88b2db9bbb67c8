// Backup export/import of all clips and folders as one JSON snapshot

use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::clips::{all_clips, ensure_folder_exists, insert_clip, validate_clip, Clip};
use super::database::{now_millis, DatabaseManager, StorageResult};
use super::folders::{all_folders, Folder};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: i64,
    pub folders: Vec<Folder>,
    pub clips: Vec<Clip>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSnapshotInput {
    pub snapshot: Snapshot,
    /// Wipe existing clips and folders before importing
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub folders_imported: usize,
    pub clips_imported: usize,
    /// Records whose ID already existed and were left untouched
    pub skipped: usize,
}

impl DatabaseManager {
    /// Read folders and clips in one transaction so every exported
    /// `folderId` names an exported folder
    pub fn export_snapshot(&self) -> StorageResult<Snapshot> {
        self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            let folders = all_folders(&tx)?;
            let clips = all_clips(&tx)?;
            tx.commit()?;

            Ok(Snapshot {
                version: SNAPSHOT_VERSION,
                exported_at: now_millis(),
                folders,
                clips,
            })
        })
    }

    /// Import a snapshot in one transaction.
    ///
    /// Existing IDs are skipped unless `replace` is set, in which case the
    /// store is emptied first. Folders are written before clips.
    pub fn import_snapshot(
        &self,
        snapshot: &Snapshot,
        replace: bool,
    ) -> StorageResult<ImportSummary> {
        let summary = self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            let mut summary = ImportSummary::default();

            if replace {
                tx.execute("DELETE FROM clips", [])?;
                tx.execute("DELETE FROM folders", [])?;
            }

            for folder in &snapshot.folders {
                let inserted = tx.execute(
                    "INSERT OR IGNORE INTO folders (id, name, color, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![folder.id, folder.name, folder.color, folder.created_at],
                )?;
                if inserted > 0 {
                    summary.folders_imported += 1;
                } else {
                    summary.skipped += 1;
                }
            }

            // Snapshots list clips newest first; insert oldest first so
            // clips sharing a timestamp keep their relative order
            for clip in snapshot.clips.iter().rev() {
                let exists: bool = tx.query_row(
                    "SELECT COUNT(*) > 0 FROM clips WHERE id = ?1",
                    params![clip.id],
                    |row| row.get(0),
                )?;
                if exists {
                    summary.skipped += 1;
                    continue;
                }

                validate_clip(clip)?;
                ensure_folder_exists(&tx, clip.folder_id.as_deref())?;
                insert_clip(&tx, clip)?;
                summary.clips_imported += 1;
            }

            tx.commit()?;
            Ok(summary)
        })?;

        info!(
            folders = summary.folders_imported,
            clips = summary.clips_imported,
            skipped = summary.skipped,
            replace,
            "Snapshot imported"
        );
        Ok(summary)
    }
}
