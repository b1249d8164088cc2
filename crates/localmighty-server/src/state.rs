use std::sync::Arc;

use tokio::sync::Mutex;

use localmighty_store::Database;

use crate::auth::{ConnectionAuthenticator, StoreAuthenticator};
use crate::blob_store::BlobStore;
use crate::channel::Namespace;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::hub::files::HubFiles;
use crate::hub::vault::HubVault;
use crate::hub::HubClipboard;
use crate::relay::CommandRelay;
use crate::session::SessionRegistry;
use crate::sync::Reconciler;

/// The store is a single SQLite connection; every handler takes the lock
/// for the duration of one store call and releases it before emitting.
pub type SharedDb = Arc<Mutex<Database>>;

pub const MAIN_NAMESPACE: &str = "main";
pub const HUB_NAMESPACE: &str = "share";

/// Everything the socket and REST handlers share.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub db: SharedDb,
    pub authenticator: Arc<dyn ConnectionAuthenticator>,
    pub main: Namespace,
    pub hub: Namespace,
    pub sessions: Arc<SessionRegistry>,
    pub reconciler: Reconciler,
    pub relay: CommandRelay,
    pub hub_clipboard: HubClipboard,
    pub hub_files: Arc<HubFiles>,
    pub hub_vault: HubVault,
}

impl AppState {
    pub async fn new(config: ServerConfig, db: Database) -> Result<Self, ServerError> {
        let db: SharedDb = Arc::new(Mutex::new(db));
        let main = Namespace::new(MAIN_NAMESPACE);
        let hub = Namespace::new(HUB_NAMESPACE);

        let blobs = BlobStore::new(config.uploads_dir(), config.max_upload_size).await?;

        Ok(Self {
            authenticator: Arc::new(StoreAuthenticator::new(db.clone())),
            sessions: Arc::new(SessionRegistry::new(
                main.clone(),
                config.require_phone_token,
            )),
            reconciler: Reconciler::new(db.clone(), main.clone()),
            relay: CommandRelay::new(db.clone(), main.clone()),
            hub_clipboard: HubClipboard::new(db.clone(), hub.clone()),
            hub_files: Arc::new(HubFiles::new(db.clone(), hub.clone(), blobs)),
            hub_vault: HubVault::new(db.clone(), hub.clone()),
            config: Arc::new(config),
            db,
            main,
            hub,
        })
    }
}

#[cfg(test)]
pub(crate) fn open_test_db() -> (SharedDb, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_dir(dir.path()).unwrap();
    (Arc::new(Mutex::new(db)), dir)
}

#[cfg(test)]
pub(crate) async fn test_state() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        data_dir: dir.path().to_path_buf(),
        ..ServerConfig::default()
    };
    let db = Database::open_in_dir(&config.data_dir).unwrap();
    let state = AppState::new(config, db).await.unwrap();
    (state, dir)
}
