// Folders data model and storage operations
// Folders categorize clips; deleting one leaves its clips uncategorized

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::clips::double_option;
use super::database::{now_millis, DatabaseManager, StorageError, StorageResult};

/// A Folder groups clips under a user-chosen name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: i64,
}

/// Input for creating a new folder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderInput {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Input for updating an existing folder
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFolderInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<String>>,
}

const FOLDER_COLUMNS: &str = "id, name, color, created_at";

fn row_to_folder(row: &Row) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn find_folder(conn: &Connection, id: &str) -> rusqlite::Result<Option<Folder>> {
    conn.query_row(
        &format!("SELECT {} FROM folders WHERE id = ?1", FOLDER_COLUMNS),
        params![id],
        row_to_folder,
    )
    .optional()
}

/// Every folder, oldest first
pub(crate) fn all_folders(conn: &Connection) -> rusqlite::Result<Vec<Folder>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM folders ORDER BY created_at ASC, rowid ASC",
        FOLDER_COLUMNS
    ))?;
    let folders = stmt
        .query_map([], row_to_folder)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(folders)
}

fn validate_name(name: &str) -> StorageResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StorageError::validation("Folder name is required"));
    }
    Ok(trimmed.to_string())
}

impl DatabaseManager {
    /// Create a new folder
    pub fn create_folder(&self, input: CreateFolderInput) -> StorageResult<Folder> {
        let folder = Folder {
            id: Uuid::new_v4().to_string(),
            name: validate_name(&input.name)?,
            color: input.color,
            created_at: now_millis(),
        };

        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO folders (id, name, color, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![folder.id, folder.name, folder.color, folder.created_at],
            )?;
            Ok(())
        })?;

        Ok(folder)
    }

    /// Get a folder by ID
    pub fn get_folder(&self, id: &str) -> StorageResult<Option<Folder>> {
        self.with_connection(|conn| find_folder(conn, id))
    }

    /// Get all folders, oldest first
    pub fn get_all_folders(&self) -> StorageResult<Vec<Folder>> {
        self.with_connection(all_folders)
    }

    pub fn rename_folder(&self, id: &str, name: &str) -> StorageResult<Option<Folder>> {
        self.update_folder(
            id,
            UpdateFolderInput {
                name: Some(name.to_string()),
                color: None,
            },
        )
    }

    /// Update an existing folder
    pub fn update_folder(
        &self,
        id: &str,
        input: UpdateFolderInput,
    ) -> StorageResult<Option<Folder>> {
        self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;

            if find_folder(&tx, id)?.is_none() {
                return Ok(None);
            }

            let name = input.name.as_deref().map(validate_name).transpose()?;

            let mut updates: Vec<&str> = vec![];
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![];

            if let Some(name) = name {
                updates.push("name = ?");
                params_vec.push(Box::new(name));
            }
            if let Some(color) = input.color {
                updates.push("color = ?");
                params_vec.push(Box::new(color));
            }

            if !updates.is_empty() {
                params_vec.push(Box::new(id.to_string()));
                let sql = format!("UPDATE folders SET {} WHERE id = ?", updates.join(", "));
                tx.execute(
                    &sql,
                    rusqlite::params_from_iter(params_vec.iter().map(|p| p.as_ref())),
                )?;
            }

            let folder = find_folder(&tx, id)?;
            tx.commit()?;
            Ok(folder)
        })
    }

    /// Delete a folder; its clips become uncategorized in the same transaction
    pub fn delete_folder(&self, id: &str) -> StorageResult<bool> {
        let (deleted, released) = self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;

            let released = tx.execute(
                "UPDATE clips SET folder_id = NULL, updated_at = ?1 WHERE folder_id = ?2",
                params![now_millis(), id],
            )?;
            let rows_affected = tx.execute("DELETE FROM folders WHERE id = ?1", params![id])?;

            tx.commit()?;
            Ok((rows_affected > 0, released))
        })?;

        if deleted {
            info!(folder_id = id, released, "Folder deleted");
        }
        Ok(deleted)
    }

    /// Number of clips filed under a folder
    pub fn get_folder_clip_count(&self, folder_id: &str) -> StorageResult<u64> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM clips WHERE folder_id = ?1",
                params![folder_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Delete every folder, uncategorizing all clips; returns folders removed
    pub fn clear_folders(&self) -> StorageResult<usize> {
        self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE clips SET folder_id = NULL, updated_at = ?1 WHERE folder_id IS NOT NULL",
                params![now_millis()],
            )?;
            let removed = tx.execute("DELETE FROM folders", [])?;
            tx.commit()?;
            Ok(removed)
        })
    }
}
