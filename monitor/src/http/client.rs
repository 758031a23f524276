//! HTTP client implementation

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::MonitorError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Credentials attached to every request
#[derive(Debug)]
pub enum Credentials {
    None,
    Basic { user: String, password: SecretString },
    Bearer(SecretString),
}

/// HTTP client bound to a base URL
pub struct HttpClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, MonitorError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::None => request,
            Credentials::Basic { user, password } => {
                request.basic_auth(user, Some(password.expose_secret()))
            }
            Credentials::Bearer(token) => request.bearer_auth(token.expose_secret()),
        }
    }

    async fn send(&self, method: &str, url: &str, request: RequestBuilder) -> Result<Response, MonitorError> {
        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP {} {} failed: {} - {}", method, url, status, body);
            return Err(MonitorError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        Ok(response)
    }

    /// Make a GET request and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, MonitorError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self.send("GET", &url, self.client.get(&url)).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Make a GET request and return the raw body
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, MonitorError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} (binary)", url);

        let response = self.send("GET", &url, self.client.get(&url)).await?;
        let body = response.bytes().await?;
        Ok(body.to_vec())
    }

    /// Make a POST request with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, MonitorError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .send("POST", &url, self.client.post(&url).json(body))
            .await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
