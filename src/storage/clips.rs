// Clips data model and storage operations
// A clip is one captured page or video, optionally annotated by AI

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::database::{now_millis, DatabaseManager, StorageError, StorageResult};

/// Where a clip was captured from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClipSource {
    Webpage,
    Youtube,
    Bilibili,
    Other,
}

impl ClipSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipSource::Webpage => "webpage",
            ClipSource::Youtube => "youtube",
            ClipSource::Bilibili => "bilibili",
            ClipSource::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "webpage" => Some(ClipSource::Webpage),
            "youtube" => Some(ClipSource::Youtube),
            "bilibili" => Some(ClipSource::Bilibili),
            "other" => Some(ClipSource::Other),
            _ => None,
        }
    }
}

/// An image attached to a clip (data URL or remote URL)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClipImage {
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// A captured unit of page or video content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: String,
    pub source: ClipSource,
    pub url: String,
    pub title: String,
    pub raw_text_snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text_full: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ClipImage>>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_scenarios: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_comment: Option<String>,
}

/// Input for capturing a new clip
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClipInput {
    pub source: ClipSource,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub raw_text_snippet: String,
    #[serde(default)]
    pub raw_text_full: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<ClipImage>>,
    #[serde(default)]
    pub ai_categories: Option<Vec<String>>,
    #[serde(default)]
    pub ai_scenarios: Option<Vec<String>>,
    #[serde(default)]
    pub ai_rating: Option<u8>,
    #[serde(default)]
    pub personal_comment: Option<String>,
}

/// Partial update for a clip.
///
/// Nullable fields use `Option<Option<T>>`: an absent key leaves the field
/// alone, an explicit `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClipInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ClipSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text_snippet: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub raw_text_full: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub summary: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_points: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub images: Option<Option<Vec<ClipImage>>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub ai_categories: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub ai_scenarios: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub ai_rating: Option<Option<u8>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub personal_comment: Option<Option<String>>,
}

/// One page of clips, newest first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClipPage {
    pub items: Vec<Clip>,
    pub total: u64,
    pub has_more: bool,
}

/// Distinguishes a present-but-null key from an absent one
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

const CLIP_COLUMNS: &str = "id, source, url, title, raw_text_snippet, raw_text_full, summary, \
     key_points, tags, folder_id, images, ai_categories, ai_scenarios, ai_rating, \
     personal_comment, created_at, updated_at";

fn json_error(idx: usize, err: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| json_error(idx, e))
}

fn optional_json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| serde_json::from_str(&t).map_err(|e| json_error(idx, e)))
        .transpose()
}

fn to_optional_json<T: Serialize>(value: &Option<T>) -> StorageResult<Option<String>> {
    Ok(value.as_ref().map(serde_json::to_string).transpose()?)
}

fn row_to_clip(row: &Row) -> rusqlite::Result<Clip> {
    let source_str: String = row.get(1)?;
    Ok(Clip {
        id: row.get(0)?,
        source: ClipSource::from_str(&source_str).unwrap_or(ClipSource::Other),
        url: row.get(2)?,
        title: row.get(3)?,
        raw_text_snippet: row.get(4)?,
        raw_text_full: row.get(5)?,
        summary: row.get(6)?,
        key_points: json_column(row, 7)?,
        tags: json_column(row, 8)?,
        folder_id: row.get(9)?,
        images: optional_json_column(row, 10)?,
        ai_categories: optional_json_column(row, 11)?,
        ai_scenarios: optional_json_column(row, 12)?,
        ai_rating: row.get(13)?,
        personal_comment: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn query_clips<P: Params>(
    conn: &Connection,
    where_clause: &str,
    limit_clause: &str,
    params: P,
) -> rusqlite::Result<Vec<Clip>> {
    let sql = format!(
        "SELECT {} FROM clips {} ORDER BY created_at DESC, rowid DESC {}",
        CLIP_COLUMNS, where_clause, limit_clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let clips = stmt
        .query_map(params, row_to_clip)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(clips)
}

/// Every clip, newest first
pub(crate) fn all_clips(conn: &Connection) -> rusqlite::Result<Vec<Clip>> {
    query_clips(conn, "", "", [])
}

fn find_clip(conn: &Connection, id: &str) -> rusqlite::Result<Option<Clip>> {
    conn.query_row(
        &format!("SELECT {} FROM clips WHERE id = ?1", CLIP_COLUMNS),
        params![id],
        row_to_clip,
    )
    .optional()
}

/// Insert a fully-formed clip row
pub(crate) fn insert_clip(conn: &Connection, clip: &Clip) -> StorageResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO clips ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, \
             ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            CLIP_COLUMNS
        ),
        params![
            clip.id,
            clip.source.as_str(),
            clip.url,
            clip.title,
            clip.raw_text_snippet,
            clip.raw_text_full,
            clip.summary,
            serde_json::to_string(&clip.key_points)?,
            serde_json::to_string(&clip.tags)?,
            clip.folder_id,
            to_optional_json(&clip.images)?,
            to_optional_json(&clip.ai_categories)?,
            to_optional_json(&clip.ai_scenarios)?,
            clip.ai_rating,
            clip.personal_comment,
            clip.created_at,
            clip.updated_at,
        ],
    )?;
    Ok(())
}

/// Overwrite every mutable column of an existing clip
fn write_clip(conn: &Connection, clip: &Clip) -> StorageResult<()> {
    conn.execute(
        r#"
        UPDATE clips SET
            source = ?2, url = ?3, title = ?4, raw_text_snippet = ?5, raw_text_full = ?6,
            summary = ?7, key_points = ?8, tags = ?9, folder_id = ?10, images = ?11,
            ai_categories = ?12, ai_scenarios = ?13, ai_rating = ?14, personal_comment = ?15,
            updated_at = ?16
        WHERE id = ?1
        "#,
        params![
            clip.id,
            clip.source.as_str(),
            clip.url,
            clip.title,
            clip.raw_text_snippet,
            clip.raw_text_full,
            clip.summary,
            serde_json::to_string(&clip.key_points)?,
            serde_json::to_string(&clip.tags)?,
            clip.folder_id,
            to_optional_json(&clip.images)?,
            to_optional_json(&clip.ai_categories)?,
            to_optional_json(&clip.ai_scenarios)?,
            clip.ai_rating,
            clip.personal_comment,
            clip.updated_at,
        ],
    )?;
    Ok(())
}

/// A folder reference must point at an existing folder
pub(crate) fn ensure_folder_exists(
    conn: &Connection,
    folder_id: Option<&str>,
) -> StorageResult<()> {
    let Some(folder_id) = folder_id else {
        return Ok(());
    };
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM folders WHERE id = ?1",
        params![folder_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(StorageError::validation(format!("Folder not found: {}", folder_id)))
    }
}

pub(crate) fn validate_clip(clip: &Clip) -> StorageResult<()> {
    if clip.title.trim().is_empty() {
        return Err(StorageError::validation("Clip title is required"));
    }
    if clip.url.trim().is_empty() {
        return Err(StorageError::validation("Clip url is required"));
    }
    if let Some(rating) = clip.ai_rating {
        if !(1..=5).contains(&rating) {
            return Err(StorageError::validation(format!(
                "Rating must be between 1 and 5, got {}",
                rating
            )));
        }
    }
    Ok(())
}

/// Tags behave as a set; the first occurrence wins
fn dedupe_tags(tags: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

impl Clip {
    fn apply(&mut self, patch: UpdateClipInput) {
        if let Some(source) = patch.source {
            self.source = source;
        }
        if let Some(url) = patch.url {
            self.url = url;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(snippet) = patch.raw_text_snippet {
            self.raw_text_snippet = snippet;
        }
        if let Some(full) = patch.raw_text_full {
            self.raw_text_full = full;
        }
        if let Some(summary) = patch.summary {
            self.summary = summary;
        }
        if let Some(key_points) = patch.key_points {
            self.key_points = key_points;
        }
        if let Some(tags) = patch.tags {
            self.tags = dedupe_tags(tags);
        }
        if let Some(folder_id) = patch.folder_id {
            self.folder_id = folder_id;
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
        if let Some(categories) = patch.ai_categories {
            self.ai_categories = categories;
        }
        if let Some(scenarios) = patch.ai_scenarios {
            self.ai_scenarios = scenarios;
        }
        if let Some(rating) = patch.ai_rating {
            self.ai_rating = rating;
        }
        if let Some(comment) = patch.personal_comment {
            self.personal_comment = comment;
        }
    }

    fn matches_keyword(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.raw_text_snippet.to_lowercase().contains(needle)
            || self
                .summary
                .as_deref()
                .map(|s| s.to_lowercase().contains(needle))
                .unwrap_or(false)
    }
}

impl DatabaseManager {
    /// All clips, newest first
    pub fn get_all_clips(&self) -> StorageResult<Vec<Clip>> {
        self.with_connection(all_clips)
    }

    /// Get a clip by ID
    pub fn get_clip(&self, id: &str) -> StorageResult<Option<Clip>> {
        self.with_connection(|conn| find_clip(conn, id))
    }

    /// Newest clip captured from exactly this url
    pub fn get_clip_by_url(&self, url: &str) -> StorageResult<Option<Clip>> {
        self.with_connection(|conn| {
            let mut clips = query_clips(conn, "WHERE url = ?1", "LIMIT 1", params![url])?;
            Ok(clips.pop())
        })
    }

    pub fn get_clips_by_source(&self, source: ClipSource) -> StorageResult<Vec<Clip>> {
        self.with_connection(|conn| {
            query_clips(conn, "WHERE source = ?1", "", params![source.as_str()])
        })
    }

    /// Clips in a folder; `None` selects uncategorized clips
    pub fn get_clips_by_folder(&self, folder_id: Option<&str>) -> StorageResult<Vec<Clip>> {
        self.with_connection(|conn| match folder_id {
            Some(folder_id) => query_clips(conn, "WHERE folder_id = ?1", "", params![folder_id]),
            None => query_clips(conn, "WHERE folder_id IS NULL", "", []),
        })
    }

    /// One page of clips; `page` starts at 1
    pub fn get_clips_paginated(&self, page: u32, page_size: u32) -> StorageResult<ClipPage> {
        if page == 0 {
            return Err(StorageError::validation("Page must be at least 1"));
        }
        if page_size == 0 {
            return Err(StorageError::validation("Page size must be at least 1"));
        }

        // Offsets past i64 can only land beyond the last row
        let offset = (page as u64 - 1)
            .checked_mul(page_size as u64)
            .and_then(|offset| i64::try_from(offset).ok());
        self.with_connection(|conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM clips", [], |row| row.get(0))?;
            let total = total as u64;
            let items = match offset {
                Some(offset) if offset < total as i64 => query_clips(
                    conn,
                    "",
                    "LIMIT ?1 OFFSET ?2",
                    params![page_size as i64, offset],
                )?,
                _ => Vec::new(),
            };
            Ok(ClipPage {
                items,
                total,
                has_more: (page as u64) * (page_size as u64) < total,
            })
        })
    }

    /// Capture a new clip, assigning its ID and timestamps
    pub fn add_clip(&self, input: CreateClipInput) -> StorageResult<Clip> {
        let now = now_millis();
        let clip = Clip {
            id: Uuid::new_v4().to_string(),
            source: input.source,
            url: input.url,
            title: input.title,
            raw_text_snippet: input.raw_text_snippet,
            raw_text_full: input.raw_text_full,
            summary: input.summary,
            key_points: input.key_points,
            tags: dedupe_tags(input.tags),
            folder_id: input.folder_id,
            images: input.images,
            created_at: now,
            updated_at: now,
            ai_categories: input.ai_categories,
            ai_scenarios: input.ai_scenarios,
            ai_rating: input.ai_rating,
            personal_comment: input.personal_comment,
        };
        validate_clip(&clip)?;

        self.with_connection_mut(|conn| {
            ensure_folder_exists(conn, clip.folder_id.as_deref())?;
            insert_clip(conn, &clip)
        })?;

        debug!(clip_id = %clip.id, source = clip.source.as_str(), "Clip added");
        Ok(clip)
    }

    /// Merge `patch` into an existing clip and stamp `updated_at`
    pub fn update_clip(&self, id: &str, patch: UpdateClipInput) -> StorageResult<Option<Clip>> {
        self.modify_clip(id, |clip| {
            clip.apply(patch);
            true
        })
    }

    /// Load, mutate and write back one clip inside a transaction.
    /// The closure returns false to leave the clip untouched.
    fn modify_clip<F>(&self, id: &str, f: F) -> StorageResult<Option<Clip>>
    where
        F: FnOnce(&mut Clip) -> bool,
    {
        self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(mut clip) = find_clip(&tx, id)? else {
                return Ok(None);
            };
            if !f(&mut clip) {
                return Ok(None);
            }

            validate_clip(&clip)?;
            ensure_folder_exists(&tx, clip.folder_id.as_deref())?;
            clip.updated_at = now_millis();
            write_clip(&tx, &clip)?;

            tx.commit()?;
            Ok(Some(clip))
        })
    }

    /// Delete a clip by ID
    pub fn delete_clip(&self, id: &str) -> StorageResult<bool> {
        self.with_connection(|conn| {
            let rows_affected = conn.execute("DELETE FROM clips WHERE id = ?1", params![id])?;
            Ok(rows_affected > 0)
        })
    }

    /// Delete several clips in one transaction; returns how many existed
    pub fn delete_clips(&self, ids: &[String]) -> StorageResult<usize> {
        self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            let mut deleted = 0;
            for id in ids {
                deleted += tx.execute("DELETE FROM clips WHERE id = ?1", params![id])?;
            }
            tx.commit()?;
            Ok(deleted)
        })
    }

    /// Append an image to a clip
    pub fn add_clip_image(&self, id: &str, image: ClipImage) -> StorageResult<Option<Clip>> {
        self.modify_clip(id, |clip| {
            clip.images.get_or_insert_with(Vec::new).push(image);
            true
        })
    }

    /// Remove the image at `index`; out of range is a no-op returning None
    pub fn remove_clip_image(&self, id: &str, index: usize) -> StorageResult<Option<Clip>> {
        self.modify_clip(id, |clip| match clip.images.as_mut() {
            Some(images) if index < images.len() => {
                images.remove(index);
                true
            }
            _ => false,
        })
    }

    /// Move one clip; `None` makes it uncategorized
    pub fn move_clip_to_folder(
        &self,
        id: &str,
        folder_id: Option<&str>,
    ) -> StorageResult<Option<Clip>> {
        let folder_id = folder_id.map(str::to_string);
        self.modify_clip(id, |clip| {
            clip.folder_id = folder_id;
            true
        })
    }

    /// Move several clips in one transaction; all or nothing
    pub fn move_clips_to_folder(
        &self,
        ids: &[String],
        folder_id: Option<&str>,
    ) -> StorageResult<usize> {
        let moved = self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            ensure_folder_exists(&tx, folder_id)?;

            let now = now_millis();
            let mut moved = 0;
            for id in ids {
                moved += tx.execute(
                    "UPDATE clips SET folder_id = ?1, updated_at = ?2 WHERE id = ?3",
                    params![folder_id, now, id],
                )?;
            }

            tx.commit()?;
            Ok(moved)
        })?;

        info!(requested = ids.len(), moved, folder_id = ?folder_id, "Moved clips");
        Ok(moved)
    }

    /// Case-insensitive substring search over title, summary and snippet.
    /// A blank keyword returns every clip.
    pub fn search_clips(&self, keyword: &str) -> StorageResult<Vec<Clip>> {
        let clips = self.get_all_clips()?;
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(clips);
        }

        Ok(clips
            .into_iter()
            .filter(|clip| clip.matches_keyword(&needle))
            .collect())
    }

    pub fn count_clips(&self) -> StorageResult<u64> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM clips", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    /// Delete every clip; returns how many were removed
    pub fn clear_clips(&self) -> StorageResult<usize> {
        self.with_connection(|conn| conn.execute("DELETE FROM clips", []))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn clip_input(title: &str) -> CreateClipInput {
        CreateClipInput {
            source: ClipSource::Webpage,
            url: format!("https://example.com/{}", title.to_lowercase().replace(' ', "-")),
            title: title.to_string(),
            raw_text_snippet: format!("Snippet for {}", title),
            raw_text_full: None,
            summary: None,
            key_points: vec![],
            tags: vec![],
            folder_id: None,
            images: None,
            ai_categories: None,
            ai_scenarios: None,
            ai_rating: None,
            personal_comment: None,
        }
    }
}
