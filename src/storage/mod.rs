// Local persistence for captured clips and their folders

pub mod backup;
pub mod clips;
pub mod database;
pub mod folders;
pub mod kv;
pub mod settings;

pub use backup::{ImportSnapshotInput, ImportSummary, Snapshot};
pub use clips::{Clip, ClipImage, ClipPage, ClipSource, CreateClipInput, UpdateClipInput};
pub use database::{get_default_db_path, DatabaseManager, StorageError, StorageResult};
pub use folders::{CreateFolderInput, Folder, UpdateFolderInput};
pub use kv::{KeyValueStore, MemoryKeyValueStore};
pub use settings::{ClipSettings, UpdateSettingsInput};
