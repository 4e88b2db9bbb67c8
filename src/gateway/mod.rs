// Storage gateway: the single place where storage actions are executed
// Callers send {action, payload} envelopes and get {success, data | error} back

pub mod request;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::storage::settings::{self, DEFAULT_PAGE_SIZE};
use crate::storage::{DatabaseManager, KeyValueStore, StorageError};

pub use request::StorageRequest;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Missing action")]
    MissingAction,
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Malformed request: {0}")]
    MalformedEnvelope(String),
    #[error("Invalid payload for {action}: {message}")]
    InvalidPayload { action: String, message: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Failed to serialize result: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage worker failed: {0}")]
    Worker(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Incoming message as sent by callers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Reply to a request envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StorageResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: &GatewayError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Turn an envelope into a typed request
pub fn parse_envelope(envelope: Value) -> GatewayResult<StorageRequest> {
    let envelope: RequestEnvelope = serde_json::from_value(envelope)
        .map_err(|e| GatewayError::MalformedEnvelope(e.to_string()))?;

    let action = envelope
        .action
        .filter(|a| !a.trim().is_empty())
        .ok_or(GatewayError::MissingAction)?;

    StorageRequest::parse(&action, envelope.payload)
}

/// Executes storage requests against one shared database
pub struct StorageGateway {
    db: Arc<DatabaseManager>,
    settings: Arc<dyn KeyValueStore>,
    default_page_size: u32,
}

impl StorageGateway {
    /// Gateway whose settings live in the same database as the clips
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        let settings: Arc<dyn KeyValueStore> = db.clone();
        Self {
            db,
            settings,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Use a different key-value store for settings
    pub fn with_settings_store(mut self, settings: Arc<dyn KeyValueStore>) -> Self {
        self.settings = settings;
        self
    }

    /// Page size used when neither the request nor the stored settings name one
    pub fn with_default_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size.max(1);
        self
    }

    pub fn database(&self) -> &Arc<DatabaseManager> {
        &self.db
    }

    /// Execute a typed request on the blocking pool
    pub async fn dispatch(&self, request: StorageRequest) -> GatewayResult<Value> {
        let db = Arc::clone(&self.db);
        let settings = Arc::clone(&self.settings);
        let default_page_size = self.default_page_size;

        tokio::task::spawn_blocking(move || {
            execute(&db, settings.as_ref(), default_page_size, request)
        })
        .await
        .map_err(|e| GatewayError::Worker(e.to_string()))?
    }

    /// Handle an envelope; every failure becomes an error response
    pub async fn handle(&self, envelope: Value) -> StorageResponse {
        let request = match parse_envelope(envelope) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Rejected storage request");
                return StorageResponse::failure(&e);
            }
        };

        let action = request.action();
        debug!(action, "Dispatching storage request");

        match self.dispatch(request).await {
            Ok(data) => StorageResponse::ok(data),
            Err(e) => {
                warn!(action, error = %e, "Storage action failed");
                StorageResponse::failure(&e)
            }
        }
    }

    /// Handle a JSON-encoded envelope and reply with JSON
    pub async fn handle_json(&self, text: &str) -> String {
        let response = match serde_json::from_str::<Value>(text) {
            Ok(envelope) => self.handle(envelope).await,
            Err(e) => StorageResponse::failure(&GatewayError::MalformedEnvelope(e.to_string())),
        };

        serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"success":false,"error":"Failed to serialize response"}"#.to_string()
        })
    }

    /// Handle several envelopes concurrently; replies keep request order
    pub async fn handle_batch(&self, envelopes: Vec<Value>) -> Vec<StorageResponse> {
        join_all(envelopes.into_iter().map(|envelope| self.handle(envelope))).await
    }
}

fn reply<T: Serialize>(value: T) -> GatewayResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn execute(
    db: &DatabaseManager,
    settings_store: &dyn KeyValueStore,
    default_page_size: u32,
    request: StorageRequest,
) -> GatewayResult<Value> {
    match request {
        StorageRequest::ClipsGetAll => reply(db.get_all_clips()?),
        StorageRequest::ClipsGetById(p) => reply(db.get_clip(&p.id)?),
        StorageRequest::ClipsGetByUrl(p) => reply(db.get_clip_by_url(&p.url)?),
        StorageRequest::ClipsGetBySource(p) => reply(db.get_clips_by_source(p.source)?),
        StorageRequest::ClipsGetByFolder(p) => {
            reply(db.get_clips_by_folder(p.folder_id.as_deref())?)
        }
        StorageRequest::ClipsGetPaginated(p) => {
            let page_size = match p.page_size {
                Some(size) => size,
                None => settings::get_default_page_size(settings_store, default_page_size)?,
            };
            reply(db.get_clips_paginated(p.page, page_size)?)
        }
        StorageRequest::ClipsAdd(input) => reply(db.add_clip(input)?),
        StorageRequest::ClipsUpdate(p) => reply(db.update_clip(&p.id, p.updates)?),
        StorageRequest::ClipsDelete(p) => reply(db.delete_clip(&p.id)?),
        StorageRequest::ClipsDeleteMany(p) => reply(db.delete_clips(&p.ids)?),
        StorageRequest::ClipsAddImage(p) => reply(db.add_clip_image(&p.id, p.image)?),
        StorageRequest::ClipsRemoveImage(p) => reply(db.remove_clip_image(&p.id, p.index)?),
        StorageRequest::ClipsMoveToFolder(p) => {
            reply(db.move_clip_to_folder(&p.id, p.folder_id.as_deref())?)
        }
        StorageRequest::ClipsMoveManyToFolder(p) => {
            reply(db.move_clips_to_folder(&p.ids, p.folder_id.as_deref())?)
        }
        StorageRequest::ClipsSearch(p) => reply(db.search_clips(&p.keyword)?),
        StorageRequest::ClipsCount => reply(db.count_clips()?),
        StorageRequest::ClipsClearAll => reply(db.clear_clips()?),
        StorageRequest::FoldersGetAll => reply(db.get_all_folders()?),
        StorageRequest::FoldersGetById(p) => reply(db.get_folder(&p.id)?),
        StorageRequest::FoldersCreate(input) => reply(db.create_folder(input)?),
        StorageRequest::FoldersRename(p) => reply(db.rename_folder(&p.id, &p.name)?),
        StorageRequest::FoldersUpdate(p) => reply(db.update_folder(&p.id, p.updates)?),
        StorageRequest::FoldersDelete(p) => reply(db.delete_folder(&p.id)?),
        StorageRequest::FoldersGetClipCount(p) => reply(db.get_folder_clip_count(&p.folder_id)?),
        StorageRequest::FoldersClearAll => reply(db.clear_folders()?),
        StorageRequest::BackupExport => reply(db.export_snapshot()?),
        StorageRequest::BackupImport(input) => {
            reply(db.import_snapshot(&input.snapshot, input.replace)?)
        }
        StorageRequest::SettingsGet => {
            reply(settings::get_settings(settings_store, default_page_size)?)
        }
        StorageRequest::SettingsUpdate(input) => reply(settings::update_settings(
            settings_store,
            input,
            default_page_size,
        )?),
    }
}
