//! HTTP remote authority.
//!
//! Every call is scoped to one remote user: `{base_url}/users/{user_id}/...`.

use std::time::Duration;

use api_types::{
    ErrorResponse,
    sync::{CategoriesResponse, SnapshotQuery, SnapshotResponse, WalletsResponse},
};
use engine::{Category, Mutation, RemoteAuthority, RemoteError, Snapshot, Wallet};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

pub use error::ClientError;

mod convert;
mod error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    token: Option<String>,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let mut base_url =
            Url::parse(base_url).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!(
                "{base_url} cannot be a base"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            http,
            token: None,
        })
    }

    /// Bearer token sent with every request.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, user_id: &str, leaf: &str) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["users", user_id, leaf]);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let res = self.authorize(request).send().await?;
        if res.status().is_success() {
            return Ok(res);
        }

        let status = res.status();
        let message = res
            .json::<ErrorResponse>()
            .await
            .map(|err| err.error)
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
        Err(ClientError::Status { status, message })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        user_id: &str,
        leaf: &str,
    ) -> Result<T, ClientError> {
        let endpoint = self.endpoint(user_id, leaf)?;
        let res = self.send(self.http.get(endpoint)).await?;
        Ok(res.json::<T>().await?)
    }

    pub async fn write(&self, user_id: &str, mutation: &Mutation) -> Result<(), ClientError> {
        let endpoint = self.endpoint(user_id, "writes")?;
        let payload = convert::write_request(mutation);
        self.send(self.http.post(endpoint).json(&payload)).await?;
        tracing::debug!("remote accepted {} {}", mutation.label(), mutation.entity_id());
        Ok(())
    }

    pub async fn snapshot(
        &self,
        user_id: &str,
        transaction_limit: u32,
    ) -> Result<Snapshot, ClientError> {
        let endpoint = self.endpoint(user_id, "snapshot")?;
        let query = SnapshotQuery { transaction_limit };
        let res = self.send(self.http.get(endpoint).query(&query)).await?;
        let snapshot = res.json::<SnapshotResponse>().await?;
        Ok(convert::snapshot_from_wire(snapshot))
    }

    pub async fn seed_defaults(&self, user_id: &str) -> Result<(), ClientError> {
        let endpoint = self.endpoint(user_id, "seed")?;
        self.send(self.http.post(endpoint)).await?;
        Ok(())
    }

    pub async fn wallets(&self, user_id: &str) -> Result<Vec<Wallet>, ClientError> {
        let res: WalletsResponse = self.get(user_id, "wallets").await?;
        Ok(res
            .wallets
            .into_iter()
            .map(convert::wallet_from_wire)
            .collect())
    }

    pub async fn categories(&self, user_id: &str) -> Result<Vec<Category>, ClientError> {
        let res: CategoriesResponse = self.get(user_id, "categories").await?;
        Ok(res
            .categories
            .into_iter()
            .map(convert::category_from_wire)
            .collect())
    }
}

impl RemoteAuthority for Client {
    async fn write(&self, user_id: &str, mutation: &Mutation) -> Result<(), RemoteError> {
        Ok(Client::write(self, user_id, mutation).await?)
    }

    async fn snapshot(&self, user_id: &str, transaction_limit: u32) -> Result<Snapshot, RemoteError> {
        Ok(Client::snapshot(self, user_id, transaction_limit).await?)
    }

    async fn seed_defaults(&self, user_id: &str) -> Result<(), RemoteError> {
        Ok(Client::seed_defaults(self, user_id).await?)
    }

    async fn wallets(&self, user_id: &str) -> Result<Vec<Wallet>, RemoteError> {
        Ok(Client::wallets(self, user_id).await?)
    }

    async fn categories(&self, user_id: &str) -> Result<Vec<Category>, RemoteError> {
        Ok(Client::categories(self, user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_scoped_to_the_user() {
        let client = Client::new("https://api.example.com/v1").unwrap();
        assert_eq!(
            client.endpoint("alice", "snapshot").unwrap().as_str(),
            "https://api.example.com/v1/users/alice/snapshot"
        );

        let client = Client::new("https://api.example.com/").unwrap();
        assert_eq!(
            client.endpoint("a b", "writes").unwrap().as_str(),
            "https://api.example.com/users/a%20b/writes"
        );
    }

    #[test]
    fn rejects_urls_that_cannot_be_a_base() {
        assert!(matches!(
            Client::new("mailto:someone@example.com"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            Client::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
