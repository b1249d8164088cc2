//! Connection authentication, run once per socket before it is registered.

use axum::http::HeaderMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;

use localmighty_store::StoreError;

use crate::state::SharedDb;

/// Who a connection proved to be at handshake time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// No token was presented (browsers on the local network).
    Anonymous,
    /// A valid pairing token was presented.
    Paired { device_name: String },
}

impl Identity {
    pub fn is_paired(&self) -> bool {
        matches!(self, Identity::Paired { .. })
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication failed")]
    InvalidToken,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Decides whether an incoming connection may be registered.
pub trait ConnectionAuthenticator: Send + Sync {
    fn authenticate<'a>(&'a self, token: Option<&'a str>) -> BoxFuture<'a, Result<Identity, AuthError>>;
}

/// Validates tokens against the pairing table. A missing token admits the
/// connection as [`Identity::Anonymous`]; a wrong one rejects it.
pub struct StoreAuthenticator {
    db: SharedDb,
}

impl StoreAuthenticator {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }
}

impl ConnectionAuthenticator for StoreAuthenticator {
    fn authenticate<'a>(&'a self, token: Option<&'a str>) -> BoxFuture<'a, Result<Identity, AuthError>> {
        async move {
            let Some(token) = token.filter(|t| !t.is_empty()) else {
                return Ok(Identity::Anonymous);
            };

            let db = self.db.lock().await;
            match db.validate_token(token)? {
                Some(found) => Ok(Identity::Paired {
                    device_name: found.device_name,
                }),
                None => Err(AuthError::InvalidToken),
            }
        }
        .boxed()
    }
}

/// Token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::open_test_db;

    #[tokio::test]
    async fn test_missing_token_is_anonymous() {
        let (db, _dir) = open_test_db();
        let auth = StoreAuthenticator::new(db);
        assert_eq!(auth.authenticate(None).await.unwrap(), Identity::Anonymous);
        assert_eq!(auth.authenticate(Some("")).await.unwrap(), Identity::Anonymous);
    }

    #[tokio::test]
    async fn test_valid_and_invalid_tokens() {
        let (db, _dir) = open_test_db();
        let token = db.lock().await.create_auth_token("Pixel").unwrap();
        let auth = StoreAuthenticator::new(db);

        let identity = auth.authenticate(Some(&token.token)).await.unwrap();
        assert_eq!(
            identity,
            Identity::Paired {
                device_name: "Pixel".into()
            }
        );
        assert!(matches!(
            auth.authenticate(Some("forged")).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc123"));
    }
}
