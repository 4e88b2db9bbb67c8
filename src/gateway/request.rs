// Typed storage requests, one variant per gateway action

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{GatewayError, GatewayResult};
use crate::storage::{
    ClipImage, ClipSource, CreateClipInput, CreateFolderInput, ImportSnapshotInput,
    UpdateClipInput, UpdateFolderInput, UpdateSettingsInput,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdPayload {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdsPayload {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlPayload {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePayload {
    pub source: ClipSource,
}

/// Absent or null `folderId` selects uncategorized clips
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFilterPayload {
    #[serde(default)]
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePayload {
    pub page: u32,
    /// Falls back to the stored default page size
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateClipPayload {
    pub id: String,
    pub updates: UpdateClipInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddImagePayload {
    pub id: String,
    pub image: ClipImage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveImagePayload {
    pub id: String,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToFolderPayload {
    pub id: String,
    #[serde(default)]
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveManyToFolderPayload {
    pub ids: Vec<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPayload {
    #[serde(default)]
    pub keyword: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameFolderPayload {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFolderPayload {
    pub id: String,
    pub updates: UpdateFolderInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderClipCountPayload {
    pub folder_id: String,
}

/// Every operation the gateway can execute
#[derive(Debug, Clone)]
pub enum StorageRequest {
    ClipsGetAll,
    ClipsGetById(IdPayload),
    ClipsGetByUrl(UrlPayload),
    ClipsGetBySource(SourcePayload),
    ClipsGetByFolder(FolderFilterPayload),
    ClipsGetPaginated(PagePayload),
    ClipsAdd(CreateClipInput),
    ClipsUpdate(UpdateClipPayload),
    ClipsDelete(IdPayload),
    ClipsDeleteMany(IdsPayload),
    ClipsAddImage(AddImagePayload),
    ClipsRemoveImage(RemoveImagePayload),
    ClipsMoveToFolder(MoveToFolderPayload),
    ClipsMoveManyToFolder(MoveManyToFolderPayload),
    ClipsSearch(SearchPayload),
    ClipsCount,
    ClipsClearAll,
    FoldersGetAll,
    FoldersGetById(IdPayload),
    FoldersCreate(CreateFolderInput),
    FoldersRename(RenameFolderPayload),
    FoldersUpdate(UpdateFolderPayload),
    FoldersDelete(IdPayload),
    FoldersGetClipCount(FolderClipCountPayload),
    FoldersClearAll,
    BackupExport,
    BackupImport(ImportSnapshotInput),
    SettingsGet,
    SettingsUpdate(UpdateSettingsInput),
}

/// Decode a payload; a missing or null payload decodes like `{}`
fn decode<T: DeserializeOwned>(action: &str, payload: Option<Value>) -> GatewayResult<T> {
    let value = match payload {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value) => value,
    };
    serde_json::from_value(value).map_err(|e| GatewayError::InvalidPayload {
        action: action.to_string(),
        message: e.to_string(),
    })
}

impl StorageRequest {
    pub fn parse(action: &str, payload: Option<Value>) -> GatewayResult<Self> {
        let request = match action {
            "clips:getAll" => StorageRequest::ClipsGetAll,
            "clips:getById" => StorageRequest::ClipsGetById(decode(action, payload)?),
            "clips:getByUrl" => StorageRequest::ClipsGetByUrl(decode(action, payload)?),
            "clips:getBySource" => StorageRequest::ClipsGetBySource(decode(action, payload)?),
            "clips:getByFolder" => StorageRequest::ClipsGetByFolder(decode(action, payload)?),
            "clips:getPaginated" => StorageRequest::ClipsGetPaginated(decode(action, payload)?),
            "clips:add" => StorageRequest::ClipsAdd(decode(action, payload)?),
            "clips:update" => StorageRequest::ClipsUpdate(decode(action, payload)?),
            "clips:delete" => StorageRequest::ClipsDelete(decode(action, payload)?),
            "clips:deleteMany" => StorageRequest::ClipsDeleteMany(decode(action, payload)?),
            "clips:addImage" => StorageRequest::ClipsAddImage(decode(action, payload)?),
            "clips:removeImage" => StorageRequest::ClipsRemoveImage(decode(action, payload)?),
            "clips:moveToFolder" => StorageRequest::ClipsMoveToFolder(decode(action, payload)?),
            "clips:moveManyToFolder" => {
                StorageRequest::ClipsMoveManyToFolder(decode(action, payload)?)
            }
            "clips:search" => StorageRequest::ClipsSearch(decode(action, payload)?),
            "clips:count" => StorageRequest::ClipsCount,
            "clips:clearAll" => StorageRequest::ClipsClearAll,
            "folders:getAll" => StorageRequest::FoldersGetAll,
            "folders:getById" => StorageRequest::FoldersGetById(decode(action, payload)?),
            "folders:create" => StorageRequest::FoldersCreate(decode(action, payload)?),
            "folders:rename" => StorageRequest::FoldersRename(decode(action, payload)?),
            "folders:update" => StorageRequest::FoldersUpdate(decode(action, payload)?),
            "folders:delete" => StorageRequest::FoldersDelete(decode(action, payload)?),
            "folders:getClipCount" => {
                StorageRequest::FoldersGetClipCount(decode(action, payload)?)
            }
            "folders:clearAll" => StorageRequest::FoldersClearAll,
            "backup:export" => StorageRequest::BackupExport,
            "backup:import" => StorageRequest::BackupImport(decode(action, payload)?),
            "settings:get" => StorageRequest::SettingsGet,
            "settings:update" => StorageRequest::SettingsUpdate(decode(action, payload)?),
            other => return Err(GatewayError::UnknownAction(other.to_string())),
        };
        Ok(request)
    }

    /// The wire name of this request's action
    pub fn action(&self) -> &'static str {
        match self {
            StorageRequest::ClipsGetAll => "clips:getAll",
            StorageRequest::ClipsGetById(_) => "clips:getById",
            StorageRequest::ClipsGetByUrl(_) => "clips:getByUrl",
            StorageRequest::ClipsGetBySource(_) => "clips:getBySource",
            StorageRequest::ClipsGetByFolder(_) => "clips:getByFolder",
            StorageRequest::ClipsGetPaginated(_) => "clips:getPaginated",
            StorageRequest::ClipsAdd(_) => "clips:add",
            StorageRequest::ClipsUpdate(_) => "clips:update",
            StorageRequest::ClipsDelete(_) => "clips:delete",
            StorageRequest::ClipsDeleteMany(_) => "clips:deleteMany",
            StorageRequest::ClipsAddImage(_) => "clips:addImage",
            StorageRequest::ClipsRemoveImage(_) => "clips:removeImage",
            StorageRequest::ClipsMoveToFolder(_) => "clips:moveToFolder",
            StorageRequest::ClipsMoveManyToFolder(_) => "clips:moveManyToFolder",
            StorageRequest::ClipsSearch(_) => "clips:search",
            StorageRequest::ClipsCount => "clips:count",
            StorageRequest::ClipsClearAll => "clips:clearAll",
            StorageRequest::FoldersGetAll => "folders:getAll",
            StorageRequest::FoldersGetById(_) => "folders:getById",
            StorageRequest::FoldersCreate(_) => "folders:create",
            StorageRequest::FoldersRename(_) => "folders:rename",
            StorageRequest::FoldersUpdate(_) => "folders:update",
            StorageRequest::FoldersDelete(_) => "folders:delete",
            StorageRequest::FoldersGetClipCount(_) => "folders:getClipCount",
            StorageRequest::FoldersClearAll => "folders:clearAll",
            StorageRequest::BackupExport => "backup:export",
            StorageRequest::BackupImport(_) => "backup:import",
            StorageRequest::SettingsGet => "settings:get",
            StorageRequest::SettingsUpdate(_) => "settings:update",
        }
    }
}
