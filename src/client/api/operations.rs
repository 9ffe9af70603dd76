//! Operations API.

use crate::client::error::Result;
use crate::client::types::Operation;
use crate::client::{segment, AzdoClient, Host};
use crate::config::defaults::API_VERSION;

/// Operations API client.
pub struct OperationsApi {
    client: AzdoClient,
}

impl OperationsApi {
    pub(crate) fn new(client: AzdoClient) -> Self {
        Self { client }
    }

    /// Current state of an operation.
    pub async fn get(&self, id: &str) -> Result<Operation> {
        let url = self
            .client
            .url(Host::Organization, &format!("_apis/operations/{}", segment(id)))?;
        self.client.get(url, API_VERSION).await
    }
}
