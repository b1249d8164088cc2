//! Shared files: upload, listing, deletion and the retention sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use localmighty_shared::constants::{EVT_HUB_FILE_DELETED, EVT_HUB_FILE_NEW};
use localmighty_shared::protocol::Frame;
use localmighty_shared::types::{now_millis, Deleted, HubFile, Retention};
use localmighty_store::{StoreError, StoredHubFile};

use crate::blob_store::BlobStore;
use crate::channel::{Delivery, Namespace};
use crate::error::ServerError;
use crate::state::SharedDb;

/// Download URL of a stored file.
pub fn file_url(base_url: &str, stored_name: &str) -> String {
    format!("{}/hub/files/{}", base_url.trim_end_matches('/'), stored_name)
}

/// A file as received by the upload endpoint.
#[derive(Debug, Clone)]
pub struct Upload<'a> {
    pub original_name: &'a str,
    pub mime_type: &'a str,
    pub data: &'a [u8],
    pub retention: Retention,
    pub uploader_ip: &'a str,
}

/// Outcome of one sweep pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Ids of the records removed.
    pub removed: Vec<String>,
    /// Blobs that could not be deleted. Their records are removed anyway.
    pub blob_failures: usize,
}

pub struct HubFiles {
    db: SharedDb,
    hub: Namespace,
    blobs: BlobStore,
}

impl HubFiles {
    pub fn new(db: SharedDb, hub: Namespace, blobs: BlobStore) -> Self {
        Self { db, hub, blobs }
    }

    /// Store the blob and its record, then announce the file to every hub
    /// connection, uploader included.
    pub async fn upload(&self, upload: Upload<'_>, base_url: &str) -> Result<HubFile, ServerError> {
        let blob = self.blobs.store(upload.original_name, upload.data).await?;
        let now = now_millis();

        let record = StoredHubFile {
            id: blob.id.to_string(),
            original_name: upload.original_name.to_string(),
            mime_type: upload.mime_type.to_string(),
            size: blob.size as i64,
            stored_name: blob.stored_name,
            uploader_ip: upload.uploader_ip.to_string(),
            created_at: now,
            expires_at: upload.retention.expires_at(now),
            retention: upload.retention,
        };

        let inserted = self.db.lock().await.insert_hub_file(&record);
        if let Err(e) = inserted {
            if let Err(cleanup) = self.blobs.delete(&record.stored_name).await {
                warn!(stored_name = %record.stored_name, error = %cleanup, "Orphaned upload left on disk");
            }
            return Err(e.into());
        }

        let file = record.to_hub_file(file_url(base_url, &record.stored_name));
        let delivery = self.hub.broadcast(&Frame::new(EVT_HUB_FILE_NEW, &file)?).await;
        info!(
            id = %file.id,
            name = %file.original_name,
            size = file.size,
            retention = file.retention.as_str(),
            recipients = delivery.count(),
            "File shared"
        );
        Ok(file)
    }

    /// Non-expired files, newest first.
    pub async fn list(&self, base_url: &str) -> Result<Vec<HubFile>, ServerError> {
        let records = self.db.lock().await.list_active_hub_files(now_millis())?;
        Ok(records
            .iter()
            .map(|r| r.to_hub_file(file_url(base_url, &r.stored_name)))
            .collect())
    }

    /// Record and contents of a live file, looked up by its on-disk name.
    pub async fn download(&self, stored_name: &str) -> Result<(StoredHubFile, Vec<u8>), ServerError> {
        let record = self
            .db
            .lock()
            .await
            .hub_file_by_stored_name(stored_name)?;
        if record.is_expired(now_millis()) {
            return Err(ServerError::NotFound(format!("File {stored_name}")));
        }
        let data = self.blobs.read(stored_name).await?;
        Ok((record, data))
    }

    pub async fn delete(&self, id: &str) -> Result<Delivery, ServerError> {
        let record = match self.db.lock().await.get_hub_file(id) {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                return Err(ServerError::NotFound(format!("File {id}")));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.blobs.delete(&record.stored_name).await {
            warn!(id, error = %e, "Failed to delete blob");
        }
        self.db.lock().await.delete_hub_file(id)?;

        let delivery = self.announce_deleted(id).await?;
        info!(id, name = %record.original_name, "File deleted");
        Ok(delivery)
    }

    async fn announce_deleted(&self, id: &str) -> Result<Delivery, ServerError> {
        let frame = Frame::new(EVT_HUB_FILE_DELETED, &Deleted { id: id.to_string() })?;
        Ok(self.hub.broadcast(&frame).await)
    }

    /// Remove every file whose retention ran out before `now`.
    ///
    /// Blob deletions are attempted one by one and never block each other;
    /// the records are then removed in a single statement and each removal
    /// is announced.
    pub async fn sweep(&self, now: i64) -> Result<SweepReport, ServerError> {
        let expired = self.db.lock().await.expired_hub_files(now)?;
        if expired.is_empty() {
            return Ok(SweepReport::default());
        }

        let mut report = SweepReport::default();
        for record in &expired {
            match self.blobs.delete(&record.stored_name).await {
                Ok(true) => {}
                Ok(false) => debug!(id = %record.id, "Expired file had no blob"),
                Err(e) => {
                    warn!(id = %record.id, error = %e, "Failed to delete expired blob");
                    report.blob_failures += 1;
                }
            }
            report.removed.push(record.id.clone());
        }

        self.db.lock().await.delete_hub_files(&report.removed)?;

        for id in &report.removed {
            self.announce_deleted(id).await?;
        }

        info!(
            removed = report.removed.len(),
            blob_failures = report.blob_failures,
            "Expired files swept"
        );
        Ok(report)
    }

    /// Sweep now, then every `period`.
    pub fn spawn_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = self.sweep(now_millis()).await {
                    error!(error = %e, "File sweep failed");
                }
            }
        })
    }
}
