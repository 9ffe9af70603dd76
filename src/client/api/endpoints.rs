//! Service endpoints API.

use serde_json::json;

use crate::client::error::Result;
use crate::client::types::{
    EndpointProjectReference, EndpointProxyResult, ListResponse, ServiceEndpoint,
};
use crate::client::{segment, AzdoClient, Host};
use crate::config::defaults::API_VERSION;

/// Service endpoints API client.
pub struct EndpointsApi {
    client: AzdoClient,
}

impl EndpointsApi {
    pub(crate) fn new(client: AzdoClient) -> Self {
        Self { client }
    }

    /// Endpoints visible to a project.
    pub async fn list(&self, project: &str) -> Result<Vec<ServiceEndpoint>> {
        let url = self.client.url(
            Host::Organization,
            &format!("{}/_apis/serviceendpoint/endpoints", segment(project)),
        )?;
        let list: ListResponse<ServiceEndpoint> = self.client.get(url, API_VERSION).await?;
        Ok(list.value)
    }

    /// Get an endpoint by ID.
    pub async fn get(&self, project: &str, id: &str) -> Result<ServiceEndpoint> {
        let url = self.client.url(
            Host::Organization,
            &format!(
                "{}/_apis/serviceendpoint/endpoints/{}",
                segment(project),
                segment(id)
            ),
        )?;
        self.client.get(url, API_VERSION).await
    }

    /// Create an endpoint; project references are part of the body.
    pub async fn create(&self, endpoint: &ServiceEndpoint) -> Result<ServiceEndpoint> {
        let url = self
            .client
            .url(Host::Organization, "_apis/serviceendpoint/endpoints")?;
        self.client.post(url, API_VERSION, endpoint).await
    }

    /// Remove an endpoint from the given projects.
    pub async fn delete(&self, id: &str, project_ids: &[String]) -> Result<()> {
        let mut url = self.client.url(
            Host::Organization,
            &format!("_apis/serviceendpoint/endpoints/{}", segment(id)),
        )?;
        url.query_pairs_mut()
            .append_pair("projectIds", &project_ids.join(","));
        self.client.delete(url, API_VERSION).await
    }

    /// Share an endpoint with more projects.
    pub async fn share(&self, id: &str, references: &[EndpointProjectReference]) -> Result<()> {
        let url = self.client.url(
            Host::Organization,
            &format!("_apis/serviceendpoint/endpoints/{}", segment(id)),
        )?;
        self.client
            .patch::<serde_json::Value, _>(url, API_VERSION, references)
            .await
            .map(|_| ())
    }

    /// Ask the service to test the endpoint's credentials.
    pub async fn test_connection(&self, project: &str, endpoint: &ServiceEndpoint) -> Result<EndpointProxyResult> {
        let mut url = self.client.url(
            Host::Organization,
            &format!("{}/_apis/serviceendpoint/endpointproxy", segment(project)),
        )?;
        if let Some(id) = &endpoint.id {
            url.query_pairs_mut().append_pair("endpointId", id);
        }
        let body = json!({
            "dataSourceDetails": { "dataSourceName": "TestConnection" },
            "serviceEndpointDetails": {
                "type": endpoint.kind,
                "url": endpoint.url,
                "authorization": endpoint.authorization,
                "data": endpoint.data,
            },
        });
        self.client.post(url, API_VERSION, &body).await
    }
}
