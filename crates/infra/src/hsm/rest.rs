//! Key-vault-style REST HSM client
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list keys | `GET {base}/keys` |
//! | resolve key | `GET {base}/keys/{name}` |
//! | wrap | `POST {base}/keys/{name}/encrypt` |
//! | unwrap | `POST {base}/keys/{name}/decrypt` |
//!
//! Binary payloads travel as base64 `value` fields. Every request carries a
//! bearer token read from the configured env var when the session opens.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auditvault_common::SecureString;
use auditvault_core::keys::HsmKeyHandle;
use auditvault_core::{HsmClient, HsmConnector, TierError};
use auditvault_domain::HsmConfig;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::errors::IntoTierError;

#[derive(Debug, Deserialize)]
struct KeyListResponse {
    keys: Vec<KeyEntry>,
}

#[derive(Debug, Deserialize)]
struct KeyEntry {
    name: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Serialize)]
struct CryptoRequest<'a> {
    alg: &'a str,
    value: String,
}

#[derive(Debug, Deserialize)]
struct CryptoResponse {
    value: String,
}

/// Opens [`RestHsmClient`] sessions.
#[derive(Debug, Clone)]
pub struct RestHsmConnector {
    base_url: String,
    token_env: String,
}

impl RestHsmConnector {
    pub fn new(config: &HsmConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_env: config.token_env.clone(),
        }
    }
}

#[async_trait]
impl HsmConnector for RestHsmConnector {
    /// Build the client and prove the endpoint answers by listing keys.
    async fn connect(&self, timeout: Duration) -> Result<Arc<dyn HsmClient>, TierError> {
        let token = match std::env::var(&self.token_env) {
            Ok(token) if !token.is_empty() => SecureString::new(token),
            _ => {
                return Err(TierError::Misconfigured(format!(
                    "{} is not set; cannot authenticate to the HSM",
                    self.token_env
                )))
            }
        };

        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TierError::Backend(format!("failed to build HSM client: {e}")))?;

        let session = RestHsmClient { client, base_url: self.base_url.clone(), token };
        session.list_keys().await?;

        debug!(base_url = %self.base_url, "hsm.session_opened");
        Ok(Arc::new(session))
    }
}

/// An authenticated REST HSM session.
pub struct RestHsmClient {
    client: Client,
    base_url: String,
    token: SecureString,
}

impl std::fmt::Debug for RestHsmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestHsmClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl RestHsmClient {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(self.token.expose())
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, TierError> {
        let response = builder.send().await.map_err(IntoTierError::into_tier_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(status.into_tier_error())
        }
    }

    async fn crypto(
        &self,
        key: &HsmKeyHandle,
        operation: &str,
        algorithm: &str,
        input: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, TierError> {
        let body = CryptoRequest { alg: algorithm, value: STANDARD.encode(input) };
        let response = self
            .send(self.request(Method::POST, &format!("/keys/{}/{operation}", key.name)).json(&body))
            .await?;
        let payload: CryptoResponse =
            response.json().await.map_err(IntoTierError::into_tier_error)?;

        STANDARD
            .decode(payload.value)
            .map(Zeroizing::new)
            .map_err(|e| TierError::Backend(format!("HSM {operation} returned invalid base64: {e}")))
    }
}

#[async_trait]
impl HsmClient for RestHsmClient {
    async fn list_keys(&self) -> Result<Vec<String>, TierError> {
        let response = self.send(self.request(Method::GET, "/keys")).await?;
        let listing: KeyListResponse =
            response.json().await.map_err(IntoTierError::into_tier_error)?;
        Ok(listing.keys.into_iter().map(|entry| entry.name).collect())
    }

    async fn get_key(&self, name: &str) -> Result<HsmKeyHandle, TierError> {
        let response = self.send(self.request(Method::GET, &format!("/keys/{name}"))).await?;
        let entry: KeyEntry = response.json().await.map_err(IntoTierError::into_tier_error)?;
        Ok(HsmKeyHandle { name: entry.name, version: entry.version })
    }

    async fn encrypt(
        &self,
        key: &HsmKeyHandle,
        algorithm: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, TierError> {
        let wrapped = self.crypto(key, "encrypt", algorithm, plaintext).await?;
        Ok(wrapped.to_vec())
    }

    async fn decrypt(
        &self,
        key: &HsmKeyHandle,
        algorithm: &str,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, TierError> {
        self.crypto(key, "decrypt", algorithm, ciphertext).await
    }
}
