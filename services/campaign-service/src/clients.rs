// Pryv identity provider client
use anyhow::{anyhow, bail, Result};
use reqwest::{StatusCode, Url};

use crate::domain::is_valid_pryv_username;

/// Outcome of asking the identity provider about an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCheck {
    Valid,
    Invalid,
    UnknownUser,
}

#[async_trait::async_trait]
pub trait AccessVerifier: Send + Sync {
    async fn check_access(&self, pryv_username: &str, token: &str) -> Result<AccessCheck>;
}

#[derive(Clone)]
pub struct PryvClient {
    domain: String,
    client: reqwest::Client,
}

impl PryvClient {
    pub fn new(domain: String) -> Self {
        Self {
            domain,
            client: reqwest::Client::new(),
        }
    }

    fn access_info_url(&self, pryv_username: &str) -> Result<Url> {
        if !is_valid_pryv_username(pryv_username) {
            bail!("Refusing to call Pryv for invalid username {:?}", pryv_username);
        }
        let url = Url::parse(&format!("https://{}.{}/access-info", pryv_username, self.domain))?;
        Ok(url)
    }
}

#[async_trait::async_trait]
impl AccessVerifier for PryvClient {
    async fn check_access(&self, pryv_username: &str, token: &str) -> Result<AccessCheck> {
        let response = self
            .client
            .get(self.access_info_url(pryv_username)?)
            .header("Authorization", token)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(AccessCheck::Valid),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(AccessCheck::Invalid),
            StatusCode::NOT_FOUND => Ok(AccessCheck::UnknownUser),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(anyhow!("Pryv API error ({}): {}", status, error_text))
            }
        }
    }
}
