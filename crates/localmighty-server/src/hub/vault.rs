//! Vault relay. Entries are opaque ciphertext: the server stores and
//! rebroadcasts them to every hub connection, author included, and never
//! inspects the secret fields.

use serde::{Deserialize, Serialize};
use tracing::info;

use localmighty_shared::constants::{
    EVT_HUB_VAULT_DELETED, EVT_HUB_VAULT_NEW, EVT_HUB_VAULT_UPDATED,
};
use localmighty_shared::protocol::Frame;
use localmighty_shared::types::{now_millis, Deleted, HubVaultEntry, HubVaultEntryInput, HubVaultMeta};

use crate::channel::Namespace;
use crate::error::ServerError;
use crate::state::SharedDb;

/// `GET /api/hub/vault/meta` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaultStatus {
    pub is_setup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_blob: Option<String>,
}

fn validate(input: &HubVaultEntryInput) -> Result<(), ServerError> {
    if input.label.trim().is_empty() {
        return Err(ServerError::BadRequest("label is required".into()));
    }
    if input.password_encrypted.is_empty() {
        return Err(ServerError::BadRequest("passwordEncrypted is required".into()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct HubVault {
    db: SharedDb,
    hub: Namespace,
}

impl HubVault {
    pub fn new(db: SharedDb, hub: Namespace) -> Self {
        Self { db, hub }
    }

    pub async fn status(&self) -> Result<VaultStatus, ServerError> {
        let meta = self.db.lock().await.get_vault_meta()?;
        Ok(match meta {
            Some(meta) => VaultStatus {
                is_setup: true,
                salt: Some(meta.salt),
                verification_blob: Some(meta.verification_blob),
            },
            None => VaultStatus {
                is_setup: false,
                salt: None,
                verification_blob: None,
            },
        })
    }

    /// One-time initialisation. A second call is a conflict and leaves the
    /// existing material untouched.
    pub async fn setup(&self, meta: &HubVaultMeta) -> Result<(), ServerError> {
        if meta.salt.is_empty() || meta.verification_blob.is_empty() {
            return Err(ServerError::BadRequest(
                "salt and verificationBlob are required".into(),
            ));
        }
        if !self.db.lock().await.set_vault_meta(meta)? {
            return Err(ServerError::Conflict("Vault already set up".into()));
        }
        info!("Vault initialised");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<HubVaultEntry>, ServerError> {
        Ok(self.db.lock().await.list_vault_entries()?)
    }

    pub async fn create(&self, input: &HubVaultEntryInput) -> Result<HubVaultEntry, ServerError> {
        validate(input)?;
        let entry = self.db.lock().await.insert_vault_entry(input, now_millis())?;
        self.hub
            .broadcast(&Frame::new(EVT_HUB_VAULT_NEW, &entry)?)
            .await;
        info!(id = %entry.id, "Vault entry created");
        Ok(entry)
    }

    pub async fn update(
        &self,
        id: &str,
        input: &HubVaultEntryInput,
    ) -> Result<HubVaultEntry, ServerError> {
        validate(input)?;
        let entry = self
            .db
            .lock()
            .await
            .update_vault_entry(id, input, now_millis())?;
        self.hub
            .broadcast(&Frame::new(EVT_HUB_VAULT_UPDATED, &entry)?)
            .await;
        info!(id, "Vault entry updated");
        Ok(entry)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServerError> {
        if !self.db.lock().await.delete_vault_entry(id)? {
            return Err(ServerError::NotFound(format!("Vault entry {id}")));
        }
        let frame = Frame::new(EVT_HUB_VAULT_DELETED, &Deleted { id: id.to_string() })?;
        self.hub.broadcast(&frame).await;
        info!(id, "Vault entry deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use crate::channel::testing::{connect, drain};
    use crate::state::open_test_db;
    use serde_json::json;

    fn input(label: &str) -> HubVaultEntryInput {
        HubVaultEntryInput {
            label: label.into(),
            username: "me".into(),
            password_encrypted: "b64:iv:ciphertext".into(),
            totp_secret_encrypted: None,
            url: String::new(),
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn test_setup_once() {
        let (db, _dir) = open_test_db();
        let vault = HubVault::new(db, Namespace::new("share"));
        assert!(!vault.status().await.unwrap().is_setup);

        let meta = HubVaultMeta {
            salt: "c2FsdA==".into(),
            verification_blob: "blob".into(),
        };
        vault.setup(&meta).await.unwrap();
        assert!(matches!(
            vault
                .setup(&HubVaultMeta {
                    salt: "other".into(),
                    verification_blob: "other".into()
                })
                .await,
            Err(ServerError::Conflict(_))
        ));

        let status = vault.status().await.unwrap();
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"isSetup": true, "salt": "c2FsdA==", "verificationBlob": "blob"})
        );
    }

    #[tokio::test]
    async fn test_mutations_reach_author_and_others() {
        let (db, _dir) = open_test_db();
        let hub = Namespace::new("share");
        let (_author, mut rx_author) = connect(&hub, Identity::Anonymous).await;
        let (_other, mut rx_other) = connect(&hub, Identity::Anonymous).await;
        let vault = HubVault::new(db, hub);

        let entry = vault.create(&input("Bank")).await.unwrap();
        let updated = vault.update(&entry.id, &input("Bank (old)")).await.unwrap();
        assert_eq!(updated.created_at, entry.created_at);
        vault.delete(&entry.id).await.unwrap();

        for rx in [&mut rx_author, &mut rx_other] {
            let events: Vec<_> = drain(rx).into_iter().map(|f| f.event).collect();
            assert_eq!(
                events,
                vec![EVT_HUB_VAULT_NEW, EVT_HUB_VAULT_UPDATED, EVT_HUB_VAULT_DELETED]
            );
        }
        assert!(vault.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_and_missing_entries() {
        let (db, _dir) = open_test_db();
        let vault = HubVault::new(db, Namespace::new("share"));

        assert!(matches!(
            vault.create(&input("  ")).await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            vault.delete("nope").await,
            Err(ServerError::NotFound(_))
        ));
        assert!(vault.update("nope", &input("x")).await.is_err());
    }
}
