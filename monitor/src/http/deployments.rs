//! Remote deploy service client

use async_trait::async_trait;
use openapi_client::models::{DeployIdResponse, DeployRequest, DeployStatus, DeployStatusResponse};
use secrecy::SecretString;
use tracing::debug;

use crate::errors::MonitorError;
use crate::http::client::{Credentials, HttpClient};

const DEPLOY_ROUTE: &str = "/v1.0/deploy";

/// The cluster deploy service this monitor hands work to
#[async_trait]
pub trait DeployService: Send + Sync {
    /// Submit a deploy, returning the identifier issued by the service
    async fn submit(&self, request: &DeployRequest) -> Result<String, MonitorError>;

    /// Current status of a submitted deploy
    async fn status(&self, deploy_id: &str) -> Result<DeployStatus, MonitorError>;
}

pub struct DeployServiceClient {
    http: HttpClient,
}

impl DeployServiceClient {
    pub fn new(deploy_url: &str, token: SecretString) -> Result<Self, MonitorError> {
        Ok(Self {
            http: HttpClient::new(deploy_url, Credentials::Bearer(token))?,
        })
    }
}

#[async_trait]
impl DeployService for DeployServiceClient {
    async fn submit(&self, request: &DeployRequest) -> Result<String, MonitorError> {
        let response: DeployIdResponse = self.http.post(DEPLOY_ROUTE, request).await?;
        if response.deploy_id.is_empty() {
            return Err(MonitorError::DeployServiceError(format!(
                "No deploy id returned for {} {}",
                request.name, request.version
            )));
        }

        debug!("Deploy {} {} submitted as {}", request.name, request.version, response.deploy_id);
        Ok(response.deploy_id)
    }

    async fn status(&self, deploy_id: &str) -> Result<DeployStatus, MonitorError> {
        let path = format!("{}/{}", DEPLOY_ROUTE, deploy_id);
        let response: DeployStatusResponse = self.http.get(&path).await?;
        Ok(response.status)
    }
}
