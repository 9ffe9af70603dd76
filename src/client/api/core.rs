//! Core API: projects, processes, connection data.

use crate::client::error::Result;
use crate::client::types::{
    ConnectionData, CreateProjectRequest, ListResponse, OperationReference, Process, Project,
};
use crate::client::{segment, AzdoClient, Host};
use crate::config::defaults::{API_VERSION, API_VERSION_PREVIEW};

/// Core API client.
pub struct CoreApi {
    client: AzdoClient,
}

impl CoreApi {
    pub(crate) fn new(client: AzdoClient) -> Self {
        Self { client }
    }

    /// Who the token belongs to; also validates the token.
    pub async fn connection_data(&self) -> Result<ConnectionData> {
        let url = self.client.url(Host::Organization, "_apis/connectionData")?;
        self.client.get(url, API_VERSION_PREVIEW).await
    }

    /// List projects, optionally by state (`wellFormed`, `all`...).
    pub async fn projects(&self, state: Option<&str>, limit: Option<usize>) -> Result<Vec<Project>> {
        let url = self.client.url(Host::Organization, "_apis/projects")?;
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(state) = state {
            query.push(("stateFilter", state.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("$top", limit.to_string()));
        }
        self.client.get_all(url, API_VERSION, &query, limit).await
    }

    /// Get a project by name or ID.
    pub async fn project(&self, name_or_id: &str) -> Result<Project> {
        let url = self
            .client
            .url(Host::Organization, &format!("_apis/projects/{}", segment(name_or_id)))?;
        self.client.get(url, API_VERSION).await
    }

    /// Queue project creation.
    pub async fn create_project(&self, request: &CreateProjectRequest) -> Result<OperationReference> {
        let url = self.client.url(Host::Organization, "_apis/projects")?;
        self.client.post(url, API_VERSION, request).await
    }

    /// Queue project deletion.
    pub async fn delete_project(&self, id: &str) -> Result<OperationReference> {
        let url = self
            .client
            .url(Host::Organization, &format!("_apis/projects/{}", segment(id)))?;
        self.client.delete_json(url, API_VERSION).await
    }

    /// List process templates.
    pub async fn processes(&self) -> Result<Vec<Process>> {
        let url = self
            .client
            .url(Host::Organization, "_apis/process/processes")?;
        let list: ListResponse<Process> = self.client.get(url, API_VERSION).await?;
        Ok(list.value)
    }
}
