// Local data layer for captured clips: storage, the message gateway,
// and the small services (settings, locale cache, translation) around them

// Module declarations
pub mod config;
pub mod gateway;
pub mod i18n;
pub mod logging;
pub mod storage;
pub mod translate;

pub use config::{ConfigError, StoreConfig};
pub use gateway::{GatewayError, StorageGateway, StorageRequest, StorageResponse};
pub use storage::{DatabaseManager, StorageError, StorageResult};

/// Install logging from the config and open the gateway it describes
pub fn start(config: &StoreConfig) -> Result<StorageGateway, ConfigError> {
    logging::init_logging(&config.logging.filter);
    let gateway = config.open_gateway()?;
    tracing::info!(
        db_path = %gateway.database().db_path().display(),
        "[Startup] Clip store ready"
    );
    Ok(gateway)
}
