//! Hub (`/share` namespace): clipboard sync, shared files and the vault
//! relay. The three are independent; they only share the namespace.

pub mod files;
pub mod vault;

use tracing::{debug, info};

use localmighty_shared::constants::{EVT_HUB_TEXT_SYNC, HUB_TEXT_MAX_BYTES};
use localmighty_shared::protocol::Frame;
use localmighty_shared::types::{now_millis, HubText, HubTextHistoryEntry};

use crate::channel::{ConnectionId, Delivery, Namespace};
use crate::error::ServerError;
use crate::state::SharedDb;

/// Result of a clipboard write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextUpdate {
    Applied { text: HubText, delivery: Delivery },
    /// Content over [`HUB_TEXT_MAX_BYTES`]; nothing was stored or sent.
    Rejected { size: usize },
}

/// The shared clipboard singleton.
#[derive(Clone)]
pub struct HubClipboard {
    db: SharedDb,
    hub: Namespace,
}

impl HubClipboard {
    pub fn new(db: SharedDb, hub: Namespace) -> Self {
        Self { db, hub }
    }

    pub async fn current(&self) -> Result<HubText, ServerError> {
        Ok(self.db.lock().await.get_clipboard()?)
    }

    /// Reply to `hub:text:request` with the current value, to the requester
    /// only.
    pub async fn send_current(&self, to: ConnectionId) -> Result<Delivery, ServerError> {
        let text = self.current().await?;
        let frame = Frame::new(EVT_HUB_TEXT_SYNC, &text)?;
        Ok(self.hub.emit_to(to, &frame).await)
    }

    /// Overwrite the clipboard and fan the new value out.
    ///
    /// With `except` set (a socket write) the sender is skipped, since it
    /// already shows the value. REST writes pass `None` and reach everyone.
    pub async fn update(
        &self,
        content: &str,
        author_ip: &str,
        except: Option<ConnectionId>,
    ) -> Result<TextUpdate, ServerError> {
        let size = content.len();
        if size > HUB_TEXT_MAX_BYTES {
            debug!(size, max = HUB_TEXT_MAX_BYTES, "Oversized clipboard update dropped");
            return Ok(TextUpdate::Rejected { size });
        }

        let text = self
            .db
            .lock()
            .await
            .overwrite_clipboard(content, author_ip, now_millis())?;

        let frame = Frame::new(EVT_HUB_TEXT_SYNC, &text)?;
        let delivery = match except {
            Some(sender) => self.hub.broadcast_except(sender, &frame).await,
            None => self.hub.broadcast(&frame).await,
        };
        debug!(size, author = %author_ip, recipients = delivery.count(), "Clipboard updated");

        Ok(TextUpdate::Applied { text, delivery })
    }

    pub async fn history(&self) -> Result<Vec<HubTextHistoryEntry>, ServerError> {
        Ok(self.db.lock().await.text_history()?)
    }

    pub async fn clear_history(&self) -> Result<usize, ServerError> {
        let removed = self.db.lock().await.clear_text_history()?;
        info!(removed, "Clipboard history cleared");
        Ok(removed)
    }
}
